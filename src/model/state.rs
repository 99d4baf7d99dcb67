use std::collections::BTreeMap;

use crate::model::routing::{Metric, RouterId};

/// A directly connected peer: the cost of the link to it and the port its
/// advertisements are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbour {
    pub router_id: RouterId,
    pub cost: Metric,
    pub port: u16,
}

/// The neighbour set, derived once from configuration and immutable for the
/// process lifetime.
#[derive(Debug, Clone)]
pub struct NeighbourTable {
    links: BTreeMap<RouterId, Metric>,
    neighbours: Vec<Neighbour>,
}

impl NeighbourTable {
    pub fn new(neighbours: Vec<Neighbour>) -> Self {
        let links = neighbours
            .iter()
            .map(|neighbour| (neighbour.router_id, neighbour.cost))
            .collect();
        Self { links, neighbours }
    }

    /// Direct link costs keyed by neighbour router id.
    pub fn links(&self) -> &BTreeMap<RouterId, Metric> {
        &self.links
    }

    pub fn link_cost(&self, router_id: RouterId) -> Option<Metric> {
        self.links.get(&router_id).copied()
    }

    /// Advertisement targets, in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Neighbour> {
        self.neighbours.iter()
    }

    pub fn router_ids(&self) -> Vec<RouterId> {
        self.neighbours
            .iter()
            .map(|neighbour| neighbour.router_id)
            .collect()
    }
}
