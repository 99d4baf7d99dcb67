use crate::model::routing::RouterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Update,
    Timeout,
    Garbage,
}

/// A pending timer. `key` is the destination for `Timeout`/`Garbage`
/// timers and `None` for the single periodic `Update` timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEvent {
    pub deadline: u64,
    pub message: String,
    pub kind: TimerKind,
    pub key: Option<RouterId>,
}

/// Ordered set of pending timers, keyed by `(kind, key)`.
///
/// The wheel is a plain data structure over explicit `now` values; the
/// engine owns all lifecycle transitions. Callers keep at most one event
/// per `(kind, key)` by removing before re-adding.
#[derive(Debug, Default)]
pub struct TimerWheel {
    pending: Vec<TimerEvent>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, deadline: u64, message: String, kind: TimerKind, key: Option<RouterId>) {
        self.pending.push(TimerEvent {
            deadline,
            message,
            kind,
            key,
        });
    }

    /// Removes one event matching `(kind, key)`, if any.
    pub fn remove(&mut self, kind: TimerKind, key: Option<RouterId>) {
        if let Some(index) = self
            .pending
            .iter()
            .position(|event| event.kind == kind && event.key == key)
        {
            self.pending.remove(index);
        }
    }

    /// Seconds until the nearest pending deadline that is not yet past, or
    /// `None` when the wheel is empty. When every deadline is already past,
    /// the earliest one is reported with a delta ≤ 0.
    pub fn next_deadline(&self, now: u64) -> Option<i64> {
        let nearest = self
            .pending
            .iter()
            .filter(|event| event.deadline >= now)
            .map(|event| event.deadline)
            .min()
            .or_else(|| self.pending.iter().map(|event| event.deadline).min())?;
        Some(nearest as i64 - now as i64)
    }

    /// Snapshot of every event whose deadline has been reached. Nothing is
    /// removed; the caller drops each fired event by `(kind, key)`.
    pub fn expired(&self, now: u64) -> Vec<TimerEvent> {
        self.pending
            .iter()
            .filter(|event| event.deadline <= now)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, kind: TimerKind, key: Option<RouterId>) -> bool {
        self.pending
            .iter()
            .any(|event| event.kind == kind && event.key == key)
    }

    /// Whether this exact event is still pending. A re-armed timer shares
    /// the `(kind, key)` of the event it replaced but not its deadline, so
    /// this distinguishes a live event from a stale snapshot of one.
    pub fn contains_event(&self, event: &TimerEvent) -> bool {
        self.pending.contains(event)
    }
}
