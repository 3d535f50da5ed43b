//! Cross-Node Intersection Filter
//!
//! Keeps the devices visible from every selected storage node, one
//! representative per WWN.

use super::catalog::FlatEntry;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Devices seen under one WWN
struct WwnGroup<'a> {
    representative: &'a FlatEntry,
    nodes: HashSet<&'a str>,
}

/// Return one entry per WWN reported by exactly `node_count` distinct nodes.
///
/// The representative is the first occurrence in input order. A node that
/// reports the same WWN more than once (multipath) counts once. With
/// `node_count == 0` nothing is shared; with `node_count == 1` every device
/// of that node is returned.
pub fn intersect_shared(entries: &[FlatEntry], node_count: usize) -> Vec<FlatEntry> {
    if node_count == 0 {
        return Vec::new();
    }

    let mut groups: IndexMap<&str, WwnGroup<'_>> = IndexMap::new();
    for entry in entries {
        groups
            .entry(entry.wwn.as_str())
            .or_insert_with(|| WwnGroup {
                representative: entry,
                nodes: HashSet::new(),
            })
            .nodes
            .insert(entry.node_name.as_str());
    }

    groups
        .into_values()
        .filter(|group| group.nodes.len() == node_count)
        .map(|group| group.representative.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::build_catalog;
    use crate::engine::catalog::fixtures::node_result;

    fn wwns(entries: &[FlatEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.wwn.as_str()).collect()
    }

    #[test]
    fn test_three_nodes_share_two() {
        let catalog = build_catalog(&[
            node_result("worker-0", &["A", "B", "C"]),
            node_result("worker-1", &["A", "B", "D"]),
            node_result("worker-2", &["A", "B", "E"]),
        ]);

        let shared = intersect_shared(&catalog, 3);
        assert_eq!(wwns(&shared), vec!["A", "B"]);
    }

    #[test]
    fn test_present_on_two_of_three_is_not_shared() {
        let catalog = build_catalog(&[
            node_result("worker-0", &["A", "B"]),
            node_result("worker-1", &["A", "B"]),
            node_result("worker-2", &["A"]),
        ]);

        assert_eq!(wwns(&intersect_shared(&catalog, 3)), vec!["A"]);
    }

    #[test]
    fn test_representative_is_first_seen() {
        let catalog = build_catalog(&[
            node_result("worker-0", &["X", "A"]),
            node_result("worker-1", &["A"]),
        ]);

        let shared = intersect_shared(&catalog, 2);
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].node_name, "worker-0");
        assert_eq!(shared[0].path, "/dev/sdc");
    }

    #[test]
    fn test_duplicate_reports_from_one_node_count_once() {
        let catalog = build_catalog(&[
            node_result("worker-0", &["A", "A"]),
            node_result("worker-1", &["B"]),
        ]);

        assert!(intersect_shared(&catalog, 2).is_empty());
    }

    #[test]
    fn test_zero_and_one_node() {
        let catalog = build_catalog(&[node_result("worker-0", &["A", "B"])]);

        assert!(intersect_shared(&catalog, 0).is_empty());
        assert_eq!(wwns(&intersect_shared(&catalog, 1)), vec!["A", "B"]);
    }

    #[test]
    fn test_membership_never_grows_with_node_count() {
        let results = vec![
            node_result("worker-0", &["A", "B", "C", "D"]),
            node_result("worker-1", &["A", "B", "C"]),
            node_result("worker-2", &["A", "B"]),
            node_result("worker-3", &["A"]),
        ];

        let mut previous: Option<Vec<String>> = None;
        for n in 1..=results.len() {
            let catalog = build_catalog(&results[..n]);
            let shared: Vec<String> = intersect_shared(&catalog, n)
                .into_iter()
                .map(|e| e.wwn)
                .collect();
            if let Some(prev) = &previous {
                assert!(shared.iter().all(|w| prev.contains(w)));
            }
            previous = Some(shared);
        }
        assert_eq!(previous.unwrap(), vec!["A".to_string()]);
    }

    #[test]
    fn test_count_matches_node_count_exactly() {
        let results = vec![
            node_result("worker-0", &["A", "B"]),
            node_result("worker-1", &["B", "C"]),
        ];
        let catalog = build_catalog(&results);

        for entry in intersect_shared(&catalog, results.len()) {
            let seen = results
                .iter()
                .filter(|r| r.discovered_devices.iter().any(|d| d.wwn == entry.wwn))
                .count();
            assert_eq!(seen, results.len());
        }
    }
}
