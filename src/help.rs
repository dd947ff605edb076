//! `help_if_needed`: arbitrates between aborting a stalled join, finishing
//! one, or finishing a stalled range query, so that one thread's slow path
//! never blocks another's progress.

use crossbeam_epoch::{Guard, Shared};
use log::debug;

use crate::imm_set::ImmutableSet;
use crate::join::{abort_join, complete_join};
use crate::node::{load_neigh2, BaseKind, Neigh2, Node};
use crate::range::all_in_range;
use crate::tree::Tree;

pub fn help_if_needed<'g, S: ImmutableSet>(tree: &Tree<S>, n: Shared<'g, Node<S>>, guard: &'g Guard) {
    let base = match unsafe { n.as_ref() } {
        Some(Node::Base(b)) => b,
        _ => return,
    };
    let (n, base) = match &base.kind {
        BaseKind::JoinNeighbor { main_node } => {
            let main_ptr = main_node.ld_acq(guard);
            match unsafe { main_ptr.as_ref() }.and_then(Node::as_base) {
                Some(main_b) => (main_ptr, main_b),
                None => return,
            }
        }
        _ => (n, base),
    };
    match &base.kind {
        BaseKind::JoinMain(state) => match load_neigh2(state, guard) {
            Neigh2::Preparing => {
                debug!("helping: aborting a stalled join");
                abort_join(state, guard);
            }
            Neigh2::Committed(_) => {
                debug!("helping: completing a committed join");
                complete_join(tree, n, guard);
            }
            Neigh2::Aborted | Neigh2::Done => {}
        },
        BaseKind::Range(range) => {
            if !range.storage.is_set() {
                debug!("helping: finishing a stalled range query");
                let _ = all_in_range(tree, range.lo, range.hi, Some(range.storage.clone()), guard);
            }
        }
        _ => {}
    }
}
