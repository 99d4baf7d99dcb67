use std::collections::BTreeMap;

use crate::model::routing::{clamp_add, Metric, RouteEntry, RouterId, RoutingTable, INFINITY_METRIC};

/// A received advertisement, keyed by destination. The next hop of every
/// entry is the advertisement's sender.
pub type ReceivedTable = BTreeMap<RouterId, (RouterId, Metric)>;

/// Applies one received advertisement to the local table.
///
/// `received` is the sender's advertised table, `sender` its router id and
/// `links` the direct link costs from configuration. Returns the set of
/// destinations the advertisement carried with finite cost. Pure over its
/// arguments; never touches timers or sockets.
pub fn relax(
    table: &mut RoutingTable,
    received: &ReceivedTable,
    sender: RouterId,
    links: &BTreeMap<RouterId, Metric>,
) -> Vec<RouterId> {
    let mut updated = Vec::new();
    if received.is_empty() {
        return updated;
    }

    // The cost of a direct link never changes; the configured value wins
    // over whatever the table currently holds.
    if let Some(&cost) = links.get(&sender) {
        table.set(
            sender,
            RouteEntry {
                next_hop: sender,
                cost,
            },
        );
    }

    // Every relaxation is relative to our cost to reach the sender. A
    // sender we cannot reach at all gives us nothing to relax against.
    let Some(via_sender) = table.get(sender) else {
        return updated;
    };
    let base = via_sender.cost;

    for (&destination, &(next_hop, metric)) in received {
        if metric < INFINITY_METRIC {
            updated.push(destination);
        }

        match table.get(destination) {
            None => {
                if metric != INFINITY_METRIC {
                    table.set(
                        destination,
                        RouteEntry {
                            next_hop: sender,
                            cost: clamp_add(metric, base),
                        },
                    );
                }
            }
            Some(current) => {
                if next_hop == current.next_hop && next_hop < INFINITY_METRIC {
                    // Same upstream we already route through: its reported
                    // cost is authoritative, even when worse.
                    table.set(
                        destination,
                        RouteEntry {
                            next_hop,
                            cost: clamp_add(metric, base),
                        },
                    );
                } else if current.cost > clamp_add(metric, base) {
                    table.set(
                        destination,
                        RouteEntry {
                            next_hop: sender,
                            cost: clamp_add(metric, base),
                        },
                    );
                }
            }
        }
    }

    updated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received_from(sender: RouterId, entries: &[(RouterId, Metric)]) -> ReceivedTable {
        entries
            .iter()
            .map(|(destination, metric)| (*destination, (sender, *metric)))
            .collect()
    }

    fn line_links() -> BTreeMap<RouterId, Metric> {
        BTreeMap::from([(2, 1)])
    }

    #[test]
    fn neighbour_advertisement_installs_direct_and_transitive_routes() {
        let mut table = RoutingTable::new(1);
        let received = received_from(2, &[(2, 0), (3, 1)]);

        let updated = relax(&mut table, &received, 2, &line_links());

        assert_eq!(updated, vec![2, 3]);
        assert_eq!(
            table.get(2),
            Some(RouteEntry {
                next_hop: 2,
                cost: 1
            })
        );
        assert_eq!(
            table.get(3),
            Some(RouteEntry {
                next_hop: 2,
                cost: 2
            })
        );
    }

    #[test]
    fn same_next_hop_refresh_accepts_a_worse_cost() {
        let mut table = RoutingTable::new(1);
        relax(
            &mut table,
            &received_from(2, &[(2, 0), (3, 1)]),
            2,
            &line_links(),
        );

        relax(
            &mut table,
            &received_from(2, &[(2, 0), (3, 5)]),
            2,
            &line_links(),
        );

        assert_eq!(
            table.get(3),
            Some(RouteEntry {
                next_hop: 2,
                cost: 6
            })
        );
    }

    #[test]
    fn cheaper_path_is_adopted_and_ties_leave_the_table_alone() {
        let links = BTreeMap::from([(2, 1), (4, 1)]);
        let mut table = RoutingTable::new(1);
        relax(&mut table, &received_from(2, &[(2, 0), (3, 4)]), 2, &links);
        assert_eq!(
            table.get(3),
            Some(RouteEntry {
                next_hop: 2,
                cost: 5
            })
        );

        // Equal cost via 4: current entry wins the tie.
        relax(&mut table, &received_from(4, &[(4, 0), (3, 4)]), 4, &links);
        assert_eq!(
            table.get(3),
            Some(RouteEntry {
                next_hop: 2,
                cost: 5
            })
        );

        // Strictly cheaper via 4: adopted.
        relax(&mut table, &received_from(4, &[(4, 0), (3, 2)]), 4, &links);
        assert_eq!(
            table.get(3),
            Some(RouteEntry {
                next_hop: 4,
                cost: 3
            })
        );
    }

    #[test]
    fn unreachable_destinations_are_not_inserted() {
        let mut table = RoutingTable::new(1);
        let updated = relax(
            &mut table,
            &received_from(2, &[(2, 0), (9, 16)]),
            2,
            &line_links(),
        );

        assert_eq!(updated, vec![2]);
        assert!(!table.contains(9));
    }

    #[test]
    fn cost_arithmetic_clamps_at_infinity() {
        let mut table = RoutingTable::new(1);
        relax(
            &mut table,
            &received_from(2, &[(2, 0), (3, 15)]),
            2,
            &line_links(),
        );
        assert_eq!(
            table.get(3),
            Some(RouteEntry {
                next_hop: 2,
                cost: INFINITY_METRIC
            })
        );
    }

    #[test]
    fn relaxation_is_idempotent() {
        let links = BTreeMap::from([(2, 1)]);
        let received = received_from(2, &[(2, 0), (3, 2), (5, 7)]);

        let mut once = RoutingTable::new(1);
        relax(&mut once, &received, 2, &links);

        let mut twice = once.clone();
        relax(&mut twice, &received, 2, &links);

        assert_eq!(once, twice);
    }

    #[test]
    fn unknown_sender_changes_nothing() {
        let mut table = RoutingTable::new(1);
        let before = table.entries();
        let updated = relax(
            &mut table,
            &received_from(9, &[(9, 0), (3, 1)]),
            9,
            &line_links(),
        );

        assert!(updated.is_empty());
        assert_eq!(table.entries(), before);
    }

    #[test]
    fn poisoned_upstream_route_is_adopted_in_one_advertisement() {
        // A routes to D via B at cost 4. B reports D unreachable; A must
        // take cost 16 immediately rather than counting upward.
        let mut table = RoutingTable::new(1);
        relax(
            &mut table,
            &received_from(2, &[(2, 0), (7, 3)]),
            2,
            &line_links(),
        );
        assert_eq!(
            table.get(7),
            Some(RouteEntry {
                next_hop: 2,
                cost: 4
            })
        );

        let updated = relax(
            &mut table,
            &received_from(2, &[(2, 0), (7, 16)]),
            2,
            &line_links(),
        );
        assert_eq!(updated, vec![2]);
        assert_eq!(
            table.get(7),
            Some(RouteEntry {
                next_hop: 2,
                cost: INFINITY_METRIC
            })
        );
    }

    #[test]
    fn no_relaxer_output_exceeds_infinity() {
        let links = BTreeMap::from([(2, 16)]);
        let mut table = RoutingTable::new(1);
        relax(
            &mut table,
            &received_from(2, &[(2, 0), (3, u32::MAX)]),
            2,
            &links,
        );
        for (_, entry) in table.iter() {
            assert!(entry.cost <= INFINITY_METRIC);
        }
    }
}
