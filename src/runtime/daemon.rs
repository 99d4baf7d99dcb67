use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::model::packet;
use crate::model::routing::{Metric, RouteEntry, RouterId, RoutingTable, INFINITY_METRIC};
use crate::model::state::{Neighbour, NeighbourTable};
use crate::protocol::relax::{relax, ReceivedTable};
use crate::protocol::timer::{TimerKind, TimerWheel};
use crate::runtime::config::RouterConfig;
use crate::runtime::transport::{Transport, MAX_DATAGRAM};

/// One router process: the routing table, the timer wheel and the sockets,
/// driven by a single-threaded event loop. All timer lifecycle transitions
/// happen here; the table and the wheel never reference each other.
pub struct RouterDaemon {
    cfg: RouterConfig,
    transport: Transport,
    neighbours: NeighbourTable,
    table: RoutingTable,
    timers: TimerWheel,
    epoch: Instant,
}

impl RouterDaemon {
    pub fn new(cfg: RouterConfig) -> Result<Self> {
        let transport = Transport::bind(&cfg.inputs)
            .with_context(|| format!("failed to bind input ports {:?}", cfg.inputs))?;
        let neighbours = NeighbourTable::new(
            cfg.outputs
                .iter()
                .map(|output| Neighbour {
                    router_id: output.router_id,
                    cost: output.metric,
                    port: output.port,
                })
                .collect(),
        );
        let table = RoutingTable::new(cfg.id);
        Ok(Self {
            cfg,
            transport,
            neighbours,
            table,
            timers: TimerWheel::new(),
            epoch: Instant::now(),
        })
    }

    pub fn run_forever(&mut self) -> Result<()> {
        info!(
            "rip-daemon start: router_id={} inputs={:?} neighbours={:?} period={}s timeout={}s garbage={}s",
            self.cfg.id,
            self.cfg.inputs,
            self.neighbours.router_ids(),
            self.cfg.period,
            self.cfg.timeout,
            self.cfg.garbage,
        );

        self.arm_update_timer();
        self.send_table();

        loop {
            self.run_once()?;
            println!("{}", self.table.render());
        }
    }

    /// One event-loop iteration: wait for a datagram or the nearest timer
    /// deadline, process everything that is ready, then fire expired timers.
    fn run_once(&mut self) -> Result<()> {
        let timeout = self
            .timers
            .next_deadline(self.now_secs())
            .map(|delta| Duration::from_secs(delta.max(0) as u64));

        let ready = self
            .transport
            .wait_ready(timeout)
            .context("socket readiness wait failed")?;

        let mut changed = false;
        let mut buf = [0_u8; MAX_DATAGRAM];
        for index in ready {
            loop {
                match self.transport.try_recv(index, &mut buf) {
                    Ok(Some(len)) => changed |= self.handle_datagram(&buf[..len]),
                    Ok(None) => break,
                    Err(err) => {
                        warn!("receive error on socket {index}: {err}");
                        break;
                    }
                }
            }
        }

        if changed {
            self.send_triggered_update();
        }
        self.integrity_sweep();
        self.fire_expired_timers();
        Ok(())
    }

    /// Decodes and applies one advertisement. Returns whether the routing
    /// table changed.
    fn handle_datagram(&mut self, payload: &[u8]) -> bool {
        let (sender, entries) = match packet::decode(payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("drop malformed packet: {err}");
                return false;
            }
        };

        if self.neighbours.link_cost(sender).is_none() && !self.table.contains(sender) {
            debug!("drop advertisement from unknown router {sender}");
            return false;
        }
        debug!("advertisement from {sender} with {} entries", entries.len());

        let received: ReceivedTable = entries
            .iter()
            .map(|&(destination, metric)| (destination, (sender, metric)))
            .collect();

        // Every destination the advertisement still reaches is alive:
        // restart its liveness timer.
        let now = self.now_secs();
        for (&destination, &(_, metric)) in &received {
            if destination != self.cfg.id && metric != INFINITY_METRIC {
                self.timers.remove(TimerKind::Timeout, Some(destination));
                self.timers.add(
                    now + self.cfg.timeout,
                    format!("timeout for router {destination}"),
                    TimerKind::Timeout,
                    Some(destination),
                );
            }
        }

        let before = self.table.entries();
        let updated = relax(&mut self.table, &received, sender, self.neighbours.links());
        for destination in updated {
            self.timers.remove(TimerKind::Garbage, Some(destination));
        }
        self.table.entries() != before
    }

    /// Advertises the table to every neighbour, poisoning in reverse.
    fn send_table(&self) {
        for neighbour in self.neighbours.iter() {
            let entries = self.serialize_for(neighbour.router_id);
            match packet::encode(self.cfg.id, &entries) {
                Ok(payload) => {
                    if let Err(err) = self.transport.send(&payload, neighbour.port) {
                        warn!(
                            "send to router {} on port {} failed: {err}",
                            neighbour.router_id, neighbour.port
                        );
                    }
                }
                Err(err) => warn!("skip advertisement: {err}"),
            }
        }
    }

    /// The wire view of the table for one neighbour: every route through
    /// that neighbour is reported as unreachable. The table itself is not
    /// touched.
    fn serialize_for(&self, neighbour: RouterId) -> Vec<(RouterId, Metric)> {
        self.table
            .iter()
            .map(|(destination, entry)| {
                if entry.next_hop == neighbour {
                    (destination, INFINITY_METRIC)
                } else {
                    (destination, entry.cost)
                }
            })
            .collect()
    }

    /// Triggered and periodic updates share one mechanism: drop the pending
    /// update timer, advertise now, re-arm with fresh jitter.
    fn send_triggered_update(&mut self) {
        debug!("triggered update");
        self.timers.remove(TimerKind::Update, None);
        self.send_table();
        self.arm_update_timer();
    }

    fn arm_update_timer(&mut self) {
        let duration = draw_update_interval(self.cfg.period);
        self.timers.add(
            self.now_secs() + duration,
            format!("update in {duration}s"),
            TimerKind::Update,
            None,
        );
    }

    /// Routes whose next hop is no longer a known destination cannot be
    /// used; mark them unreachable. Their timers are left alone - garbage
    /// collection removes them eventually.
    fn integrity_sweep(&mut self) {
        let known = self.table.destinations();
        let dangling: Vec<(RouterId, RouteEntry)> = self
            .table
            .iter()
            .filter(|(_, entry)| !known.contains(&entry.next_hop))
            .collect();
        for (destination, entry) in dangling {
            self.table.set(
                destination,
                RouteEntry {
                    next_hop: entry.next_hop,
                    cost: INFINITY_METRIC,
                },
            );
        }
    }

    fn fire_expired_timers(&mut self) {
        let now = self.now_secs();
        let mut fired = self.timers.expired(now);
        // A timeout may enqueue a garbage for the same destination; firing
        // timeouts first keeps a stale garbage from deleting an unpoisoned
        // route.
        fired.sort_by_key(|event| match event.kind {
            TimerKind::Timeout => 0,
            TimerKind::Update => 1,
            TimerKind::Garbage => 2,
        });

        for event in fired {
            // A handler earlier in this tick may have cancelled or re-armed
            // this event (a timeout's triggered update replaces the pending
            // update timer); act only on entries the wheel still holds.
            if !self.timers.contains_event(&event) {
                continue;
            }
            self.timers.remove(event.kind, event.key);
            debug!("timer fired: {}", event.message);
            match (event.kind, event.key) {
                (TimerKind::Update, _) => {
                    self.send_table();
                    self.arm_update_timer();
                }
                (TimerKind::Timeout, Some(destination)) => self.on_route_timeout(destination),
                (TimerKind::Garbage, Some(destination)) => {
                    if self.table.contains(destination) {
                        info!("route to router {destination} garbage-collected");
                        self.table.remove(destination);
                    }
                }
                _ => {}
            }
        }
    }

    /// A destination went quiet: poison it, tell the neighbours, and start
    /// the clock on removing it entirely.
    fn on_route_timeout(&mut self, destination: RouterId) {
        let Some(entry) = self.table.get(destination) else {
            return;
        };
        info!("route to router {destination} timed out");
        self.table.set(
            destination,
            RouteEntry {
                next_hop: entry.next_hop,
                cost: INFINITY_METRIC,
            },
        );
        self.send_triggered_update();
        self.timers.remove(TimerKind::Garbage, Some(destination));
        self.timers.add(
            self.now_secs() + self.cfg.garbage,
            format!("garbage for router {destination}"),
            TimerKind::Garbage,
            Some(destination),
        );
    }

    fn now_secs(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }
}

/// Uniform random integer seconds in [0.8*period, 1.2*period], re-drawn on
/// every re-arm so peer advertisement schedules drift apart.
fn draw_update_interval(period: u64) -> u64 {
    let lo = (4 * period).div_ceil(5);
    let hi = 6 * period / 5;
    rand::thread_rng().gen_range(lo..=hi)
}
