//! Multi-threaded stress test: many tenants racing inserts and lookups
//! against a shared tree, rushed through a starting gate so contention is
//! as high as the scheduler allows.

use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use catree::{SortedSet, Tree};

const SPAM_INSERT: usize = 8_192;
const SPAM_TENANTS: usize = 16;

#[test]
fn multispam_insert() {
    let _ = env_logger::try_init();
    let tree = Arc::new(Tree::<SortedSet>::new());
    let token = Arc::new(RwLock::new(()));
    let hold = token.write();

    let keys: Vec<i64> = (0..SPAM_INSERT as i64).collect();
    let chunks: Vec<Vec<i64>> = keys
        .chunks(SPAM_INSERT / SPAM_TENANTS)
        .map(|c| c.to_vec())
        .collect();

    let threads: Vec<JoinHandle<_>> = chunks
        .into_iter()
        .enumerate()
        .map(|(tid, this_keys)| {
            let this_token = token.clone();
            let this_tree = tree.clone();
            thread::Builder::new()
                .name(tid.to_string())
                .spawn(move || {
                    let _token = this_token.read();
                    for k in this_keys {
                        assert!(this_tree.insert(k));
                    }
                })
                .unwrap()
        })
        .collect();

    // rush everyone to insert at once
    drop(hold);
    threads
        .into_iter()
        .map(JoinHandle::join)
        .for_each(Result::unwrap);

    assert_eq!(tree.len(), SPAM_INSERT);
    for k in 0..SPAM_INSERT as i64 {
        assert!(tree.lookup(k), "missing key {k}");
    }
}

#[test]
fn concurrent_insert_and_remove_converge() {
    let tree = Arc::new(Tree::<SortedSet>::new());
    for k in 0..4096i64 {
        tree.insert(k);
    }

    let token = Arc::new(RwLock::new(()));
    let hold = token.write();

    let removers: Vec<JoinHandle<_>> = (0..8)
        .map(|tid| {
            let this_token = token.clone();
            let this_tree = tree.clone();
            thread::Builder::new()
                .name(format!("remover-{tid}"))
                .spawn(move || {
                    let _token = this_token.read();
                    let mut k = tid as i64;
                    while k < 4096 {
                        this_tree.remove(k);
                        k += 8;
                    }
                })
                .unwrap()
        })
        .collect();
    let readers: Vec<JoinHandle<_>> = (0..4)
        .map(|tid| {
            let this_token = token.clone();
            let this_tree = tree.clone();
            thread::Builder::new()
                .name(format!("reader-{tid}"))
                .spawn(move || {
                    let _token = this_token.read();
                    for k in 0..4096i64 {
                        this_tree.lookup(k);
                    }
                })
                .unwrap()
        })
        .collect();

    drop(hold);
    removers
        .into_iter()
        .map(JoinHandle::join)
        .for_each(Result::unwrap);
    readers
        .into_iter()
        .map(JoinHandle::join)
        .for_each(Result::unwrap);

    assert!(tree.is_empty());
    assert_eq!(tree.to_vec(), Vec::<i64>::new());
}

#[test]
fn query_under_concurrent_mutation_is_sorted_and_bounded() {
    let tree = Tree::<SortedSet>::new();
    for k in 0..2048i64 {
        tree.insert(k);
    }

    // Borrowed scoped threads instead of `Arc`-cloning: both closures only
    // need a shared reference to `tree`, and neither outlives this scope.
    crossbeam_utils::thread::scope(|s| {
        s.spawn(|_| {
            for k in 2048..4096i64 {
                tree.insert(k);
            }
            for k in (0..2048i64).step_by(2) {
                tree.remove(k);
            }
        });
        s.spawn(|_| {
            for _ in 0..50 {
                let snapshot = tree.query(0, 4095).to_vec();
                assert!(snapshot.windows(2).all(|w| w[0] < w[1]));
                assert!(snapshot.iter().all(|&k| (0..4096).contains(&k)));
            }
        });
    })
    .unwrap();
}
