//! Single-shot CAS replacement of a base node, and the predicate that
//! decides whether a base is safe to replace right now.

use crossbeam_epoch::{Guard, Owned, Shared};

use crate::atm::{retire, ORD_ACQ};
use crate::imm_set::ImmutableSet;
use crate::node::{load_neigh2, BaseKind, Neigh2, Node};
use crate::tree::Tree;

/// Attempt to swap `old` (a base reachable in `tree`) for `new`. Returns
/// whether the CAS that would install `new` succeeded. On success, `old`
/// is retired: it stays valid for any guard that already loaded it, and is
/// reclaimed once no such guard remains.
///
/// `old` must be a base node; replacing a route node is not part of this
/// protocol (routes are spliced out explicitly during `complete_join`).
pub fn try_replace<'g, S: ImmutableSet>(
    tree: &Tree<S>,
    old: Shared<'g, Node<S>>,
    new: Owned<Node<S>>,
    guard: &'g Guard,
) -> bool {
    let old_base = match unsafe { old.as_ref() } {
        Some(Node::Base(b)) => b,
        _ => return false,
    };
    let parent_ptr = old_base.parent.ld_acq(guard);
    let won = if parent_ptr.is_null() {
        tree.root.cx(old, new, guard).is_ok()
    } else {
        match unsafe { parent_ptr.as_ref() } {
            Some(Node::Route(r)) if r.left.ld_acq(guard) == old => {
                r.left.cx(old, new, guard).is_ok()
            }
            Some(Node::Route(r)) if r.right.ld_acq(guard) == old => {
                r.right.cx(old, new, guard).is_ok()
            }
            _ => false,
        }
    };
    if won {
        unsafe { retire(old, guard) };
    }
    won
}

/// True iff `n` is safe to replace without tearing apart an in-flight
/// join or range-query protocol.
pub fn is_replaceable<'g, S: ImmutableSet>(n: Shared<'g, Node<S>>, guard: &'g Guard) -> bool {
    match unsafe { n.as_ref() } {
        None => false,
        Some(Node::Route(_)) => false,
        Some(Node::Base(b)) => match &b.kind {
            BaseKind::Normal => true,
            BaseKind::JoinMain(state) => matches!(load_neigh2(state, guard), Neigh2::Aborted),
            BaseKind::JoinNeighbor { main_node } => {
                let main_ptr = main_node.ld(ORD_ACQ, guard);
                match unsafe { main_ptr.as_ref() } {
                    Some(Node::Base(main_b)) => match &main_b.kind {
                        BaseKind::JoinMain(state) => {
                            matches!(load_neigh2(state, guard), Neigh2::Aborted | Neigh2::Done)
                        }
                        _ => false,
                    },
                    _ => false,
                }
            }
            BaseKind::Range(range) => range.storage.is_set(),
        },
    }
}
