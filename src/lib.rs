//! A lock-free, contention-adapting ordered set of `i64` keys.
//!
//! The tree is a binary tree of two node kinds: *route* nodes that only
//! steer lookups, and *base* nodes that each own a slice of the key space
//! as an immutable ordered collection ([`ImmutableSet`]). All mutation is
//! CAS-replacement of a base with a freshly built one; no lock is ever held
//! across more than a single pointer swap.
//!
//! Every base node tracks a running contention statistic. A hot base splits
//! into two under a route; two cold sibling bases join back into one. Both
//! adaptations, and the range-query snapshot protocol, are designed so any
//! thread that meets a node mid-adaptation can finish the work on the
//! original thread's behalf instead of blocking on it — see
//! [`help::help_if_needed`].
//!
//! This design follows Winblad, Sagonas & Jonsson's Contention-Adapting
//! Search Tree (PPoPP '18).

mod atm;
mod base;
mod config;
mod error;
mod help;
mod imm_set;
mod join;
mod node;
mod ops;
mod range;
mod routing;
mod split;
mod stat;
mod tree;

pub use config::TreeConfig;
pub use error::{TreeError, TreeResult};
pub use imm_set::{ImmutableSet, SortedSet};
pub use tree::{InitialNode, Tree};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_lookup_remove_roundtrip() {
        let tree: Tree<SortedSet> = Tree::new();
        assert!(!tree.lookup(42));
        assert!(tree.insert(42));
        assert!(!tree.insert(42));
        assert!(tree.lookup(42));
        assert_eq!(tree.len(), 1);
        assert!(tree.remove(42));
        assert!(!tree.remove(42));
        assert!(!tree.lookup(42));
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn query_returns_sorted_range() {
        let tree: Tree<SortedSet> = Tree::new();
        for k in [5, 1, 9, 3, 7, -2] {
            tree.insert(k);
        }
        let snapshot = tree.query(0, 9);
        assert_eq!(snapshot.to_vec(), vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn from_initial_bases_rejects_empty_layout() {
        let err = Tree::<SortedSet>::from_initial_bases(Vec::new()).unwrap_err();
        assert_eq!(err, TreeError::EmptyInitialLayout);
    }

    #[test]
    fn from_initial_bases_rejects_bad_parent_link() {
        let nodes = vec![
            InitialNode::Route {
                parent: None,
                key: 10,
                left: 1,
                right: 2,
            },
            InitialNode::Base {
                parent: Some(99), // wrong: should be Some(0)
                data: SortedSet::from_sorted_vec(vec![1, 2]),
            },
            InitialNode::Base {
                parent: Some(0),
                data: SortedSet::from_sorted_vec(vec![11, 12]),
            },
        ];
        let err = Tree::<SortedSet>::from_initial_bases(nodes).unwrap_err();
        assert!(matches!(err, TreeError::InconsistentParentLink { .. }));
    }

    #[test]
    fn from_initial_bases_builds_queryable_tree() {
        let nodes = vec![
            InitialNode::Route {
                parent: None,
                key: 10,
                left: 1,
                right: 2,
            },
            InitialNode::Base {
                parent: Some(0),
                data: SortedSet::from_sorted_vec(vec![1, 2, 3]),
            },
            InitialNode::Base {
                parent: Some(0),
                data: SortedSet::from_sorted_vec(vec![11, 12]),
            },
        ];
        let tree = Tree::<SortedSet>::from_initial_bases(nodes).unwrap();
        assert_eq!(tree.len(), 5);
        assert!(tree.lookup(2));
        assert!(tree.lookup(12));
        assert!(!tree.lookup(7));
    }

    #[test]
    fn many_inserts_stay_consistent() {
        let tree: Tree<SortedSet> = Tree::new();
        for k in 0..2000i64 {
            tree.insert(k);
        }
        assert_eq!(tree.len(), 2000);
        for k in 0..2000i64 {
            assert!(tree.lookup(k), "missing key {k}");
        }
        let mut all = tree.to_vec();
        all.sort_unstable();
        let expected: Vec<i64> = (0..2000).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn bulk_insert_then_remove_drains_to_empty() {
        let tree: Tree<SortedSet> = Tree::new();
        for k in 0..500i64 {
            tree.insert(k);
        }
        for k in 0..500i64 {
            assert!(tree.remove(k));
        }
        assert!(tree.is_empty());
        assert_eq!(tree.to_vec(), Vec::<i64>::new());
    }

    #[test]
    fn multi_base_tree_query_and_to_vec_cover_every_base() {
        // root(key=5) -> left: base[1,2]
        //             -> right: route(key=8) -> left: base[6,7], right: base[9,10]
        let nodes = vec![
            InitialNode::Route { parent: None, key: 5, left: 1, right: 2 },
            InitialNode::Base { parent: Some(0), data: SortedSet::from_sorted_vec(vec![1, 2]) },
            InitialNode::Route { parent: Some(0), key: 8, left: 3, right: 4 },
            InitialNode::Base { parent: Some(2), data: SortedSet::from_sorted_vec(vec![6, 7]) },
            InitialNode::Base { parent: Some(2), data: SortedSet::from_sorted_vec(vec![9, 10]) },
        ];
        let tree = Tree::<SortedSet>::from_initial_bases(nodes).unwrap();
        assert_eq!(tree.to_vec(), vec![1, 2, 6, 7, 9, 10]);
        assert_eq!(tree.query(0, 10).to_vec(), vec![1, 2, 6, 7, 9, 10]);
        assert_eq!(tree.query(3, 6).to_vec(), vec![6]);
    }

    #[test]
    fn low_contention_remove_joins_sibling_bases() {
        // root(key=5) -> left: base[1,2], right: base[7,8]. Remove 2 drives
        // the left base's stat below a low_cont of 0 on the very first
        // update, triggering a join with its sibling.
        let nodes = vec![
            InitialNode::Route { parent: None, key: 5, left: 1, right: 2 },
            InitialNode::Base { parent: Some(0), data: SortedSet::from_sorted_vec(vec![1, 2]) },
            InitialNode::Base { parent: Some(0), data: SortedSet::from_sorted_vec(vec![7, 8]) },
        ];
        let config = TreeConfig::default().with_low_cont(0);
        let tree = Tree::<SortedSet>::from_initial_bases_with_config(nodes, config).unwrap();
        assert!(tree.remove(2));
        assert_eq!(tree.to_vec(), vec![1, 7, 8]);
        assert_eq!(tree.len(), 3);
        assert!(tree.lookup(1));
        assert!(tree.lookup(7));
        assert!(tree.lookup(8));
        assert!(!tree.lookup(2));
    }

    #[test]
    fn fuzz_against_a_btreeset_model() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeSet;

        let mut rng = StdRng::seed_from_u64(0xCA_7EEE);
        let tree: Tree<SortedSet> = Tree::new();
        let mut model: BTreeSet<i64> = BTreeSet::new();

        for _ in 0..20_000 {
            let key = rng.gen_range(-500..500);
            match rng.gen_range(0..3) {
                0 => {
                    let changed = tree.insert(key);
                    assert_eq!(changed, model.insert(key));
                }
                1 => {
                    let changed = tree.remove(key);
                    assert_eq!(changed, model.remove(&key));
                }
                _ => {
                    assert_eq!(tree.lookup(key), model.contains(&key));
                }
            }
        }

        assert_eq!(tree.len(), model.len());
        assert_eq!(tree.to_vec(), model.into_iter().collect::<Vec<_>>());
    }
}
