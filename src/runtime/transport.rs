use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token};

/// Largest datagram this protocol accepts; anything beyond is truncated.
pub const MAX_DATAGRAM: usize = 4096;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// One datagram socket per configured input port, bound to loopback and
/// multiplexed through a single poll instance. Advertisements to peers are
/// sent from the first socket.
pub struct Transport {
    poll: Poll,
    events: Events,
    sockets: Vec<UdpSocket>,
}

impl Transport {
    pub fn bind(ports: &[u16]) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut sockets = Vec::with_capacity(ports.len());
        for (index, port) in ports.iter().enumerate() {
            let mut socket = UdpSocket::bind(SocketAddr::new(LOOPBACK, *port))?;
            poll.registry()
                .register(&mut socket, Token(index), Interest::READABLE)?;
            sockets.push(socket);
        }
        Ok(Self {
            poll,
            events: Events::with_capacity(64),
            sockets,
        })
    }

    /// Blocks until at least one socket is readable or `timeout` elapses
    /// (indefinitely when `timeout` is `None`). Returns the indices of the
    /// ready sockets; an interrupted wait reports none ready.
    pub fn wait_ready(&mut self, timeout: Option<Duration>) -> io::Result<Vec<usize>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(err) => return Err(err),
        }
        Ok(self.events.iter().map(|event| event.token().0).collect())
    }

    /// Receives one datagram from the socket at `index` into `buf`.
    /// Returns `None` once the socket is drained.
    pub fn try_recv(&self, index: usize, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.sockets[index].recv_from(buf) {
            Ok((len, _addr)) => Ok(Some(len)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Unicasts `payload` to the peer listening on `port`.
    pub fn send(&self, payload: &[u8], port: u16) -> io::Result<usize> {
        self.sockets[0].send_to(payload, SocketAddr::new(LOOPBACK, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_sockets_deliver_to_the_right_index() {
        let mut transport = Transport::bind(&[39001, 39002]).expect("bind should succeed");
        transport
            .send(b"hello", 39002)
            .expect("loopback send should succeed");

        let ready = transport
            .wait_ready(Some(Duration::from_secs(2)))
            .expect("poll should succeed");
        assert_eq!(ready, vec![1]);

        let mut buf = [0_u8; MAX_DATAGRAM];
        let len = transport
            .try_recv(1, &mut buf)
            .expect("recv should succeed")
            .expect("a datagram should be waiting");
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(transport.try_recv(1, &mut buf).expect("drained"), None);
    }

    #[test]
    fn wait_ready_times_out_when_idle() {
        let mut transport = Transport::bind(&[39011]).expect("bind should succeed");
        let ready = transport
            .wait_ready(Some(Duration::from_millis(50)))
            .expect("poll should succeed");
        assert!(ready.is_empty());
    }

    #[test]
    fn binding_a_taken_port_fails() {
        let _first = Transport::bind(&[39021]).expect("bind should succeed");
        assert!(Transport::bind(&[39021]).is_err());
    }
}
