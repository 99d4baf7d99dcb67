use std::collections::BTreeMap;

pub type RouterId = u32;
pub type Metric = u32;

/// Reserved metric meaning unreachable; caps all cost arithmetic.
pub const INFINITY_METRIC: Metric = 16;

/// Adds two metrics, clamping at the unreachable sentinel.
pub fn clamp_add(a: Metric, b: Metric) -> Metric {
    INFINITY_METRIC.min(a.saturating_add(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub next_hop: RouterId,
    pub cost: Metric,
}

/// Per-router view of the network: destination -> (next hop, cost).
///
/// The owner's self entry `(owner, 0)` is installed at construction and is
/// never removed or overwritten through the mutating accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    owner: RouterId,
    entries: BTreeMap<RouterId, RouteEntry>,
}

impl RoutingTable {
    pub fn new(owner: RouterId) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            owner,
            RouteEntry {
                next_hop: owner,
                cost: 0,
            },
        );
        Self { owner, entries }
    }

    pub fn owner(&self) -> RouterId {
        self.owner
    }

    pub fn get(&self, destination: RouterId) -> Option<RouteEntry> {
        self.entries.get(&destination).copied()
    }

    pub fn contains(&self, destination: RouterId) -> bool {
        self.entries.contains_key(&destination)
    }

    /// Inserts or replaces the route to `destination`. The self entry is
    /// immutable; writes to it are ignored.
    pub fn set(&mut self, destination: RouterId, entry: RouteEntry) {
        if destination == self.owner {
            return;
        }
        self.entries.insert(destination, entry);
    }

    /// Removes the route to `destination`, except the self entry.
    pub fn remove(&mut self, destination: RouterId) {
        if destination == self.owner {
            return;
        }
        self.entries.remove(&destination);
    }

    pub fn iter(&self) -> impl Iterator<Item = (RouterId, RouteEntry)> + '_ {
        self.entries.iter().map(|(dest, entry)| (*dest, *entry))
    }

    pub fn destinations(&self) -> Vec<RouterId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the entry map, used by the engine to detect changes
    /// across a relaxation pass.
    pub fn entries(&self) -> BTreeMap<RouterId, RouteEntry> {
        self.entries.clone()
    }

    /// Human-readable rendering of the table.
    pub fn render(&self) -> String {
        let rule = "-".repeat(43);
        let mut lines = Vec::with_capacity(self.entries.len() + 5);
        lines.push(rule.clone());
        lines.push(format!("Routing table for Router {}", self.owner));
        lines.push(rule.clone());
        lines.push(format!(
            "|{:>12} |{:>12} |{:>12} |",
            "Destination", "Next Hop", "Cost"
        ));
        lines.push(rule);
        for (destination, entry) in &self.entries {
            lines.push(format!(
                "|{:>12} |{:>12} |{:>12} |",
                destination, entry.next_hop, entry.cost
            ));
        }
        lines.join("\n")
    }
}
