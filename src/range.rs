//! Range-query snapshot: `all_in_range` walks every base whose data can
//! intersect `[lo, hi]`, tagging each one as a `Range` base sharing a single
//! [`ResultStorage`] so that a concurrent `do_update` which finds one of
//! these bases non-replaceable can instead help finish the query (see
//! [`crate::help::help_if_needed`]) rather than spin against it.

use std::sync::Arc;

use crossbeam_epoch::{Guard, Owned};

use crate::base::try_replace;
use crate::imm_set::ImmutableSet;
use crate::node::{BaseKind, BaseNode, Node, RangeState, ResultStorage};
use crate::routing::{find_base_stack, find_next_base_stack, Stack};
use crate::tree::Tree;

/// Collect every key in `[lo, hi]` into a single immutable snapshot.
///
/// `help_storage` is `Some` when this call is helping finish a query another
/// thread already started; the published result is shared with that caller
/// via the common `Arc<ResultStorage<S>>`.
pub fn all_in_range<'g, S: ImmutableSet>(
    tree: &Tree<S>,
    lo: i64,
    hi: i64,
    help_storage: Option<Arc<ResultStorage<S>>>,
    guard: &'g Guard,
) -> S {
    let storage = help_storage.unwrap_or_else(|| Arc::new(ResultStorage::new()));
    if let Some(existing) = storage.get() {
        return (*existing).clone();
    }

    let mut stack: Stack<S> = Vec::new();
    let root = tree.root.ld_acq(guard);
    let mut cur = find_base_stack(root, lo, &mut stack, guard);
    let mut keys: Vec<i64> = Vec::new();
    let mut touched = 0u32;

    loop {
        let base = match unsafe { cur.as_ref() }.and_then(Node::as_base) {
            Some(b) => b,
            None => break,
        };
        keys.extend(base.data.range(lo, hi));
        touched += 1;

        // Best-effort tag so a concurrent updater has a committed snapshot
        // to hand back instead of spinning on a base we are mid-read of.
        // The keys were already read above from the node's immutable `data`
        // field, which never changes in place, so a lost race here does not
        // affect correctness of the snapshot, only whether helpers can see it.
        if base.is_normal() {
            let tagged = BaseNode {
                data: base.data.clone(),
                stat: base.stat,
                parent: crate::atm::Atomic::null(),
                kind: BaseKind::Range(Arc::new(RangeState {
                    lo,
                    hi,
                    storage: storage.clone(),
                })),
            };
            let parent_ptr = base.parent.ld_acq(guard);
            tagged.parent.st(parent_ptr, crate::atm::ORD_RLX);
            let _ = try_replace(tree, cur, Owned::new(Node::Base(tagged)), guard);
        }

        let reached_hi = matches!(base.data.max(), Some(m) if m >= hi);
        if reached_hi {
            break;
        }
        match find_next_base_stack(&mut stack, guard) {
            Some(next) => cur = next,
            None => break,
        }
    }

    if touched > 1 {
        storage.set_more_than_one_base();
    }

    let mut acc = S::empty();
    for k in keys {
        acc = acc.insert(k).0;
    }
    storage.try_set(acc.clone());
    storage.get().map(|arc| (*arc).clone()).unwrap_or(acc)
}
