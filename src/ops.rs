//! Point operations: lookup, insert, remove, all built on `do_update`.

use crossbeam_epoch::{Guard, Owned};

use crate::base::{is_replaceable, try_replace};
use crate::help::help_if_needed;
use crate::imm_set::ImmutableSet;
use crate::node::{BaseNode, Node};
use crate::routing::find_base_node;
use crate::stat::{new_stat, ContInfo};
use crate::tree::Tree;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Insert,
    Remove,
}

/// Wait-free: observes one base node's snapshot.
pub fn lookup<S: ImmutableSet>(tree: &Tree<S>, key: i64, guard: &Guard) -> bool {
    let base = find_base_node(tree.root.ld_acq(guard), key, guard);
    match unsafe { base.as_ref() } {
        Some(Node::Base(b)) => b.data.contains(key),
        _ => false,
    }
}

/// Insert or remove `key`, retrying through the replace-or-help loop until
/// a CAS commits. Returns whether the underlying collection reports a
/// logical change (present-afterward for insert, removed for remove).
pub fn do_update<S: ImmutableSet>(tree: &Tree<S>, op: Op, key: i64, guard: &Guard) -> bool {
    let mut cont = ContInfo::Uncontended;
    loop {
        let base_ptr = find_base_node(tree.root.ld_acq(guard), key, guard);
        if is_replaceable(base_ptr, guard) {
            let base = match unsafe { base_ptr.as_ref() } {
                Some(Node::Base(b)) => b,
                _ => {
                    cont = ContInfo::Contended;
                    continue;
                }
            };
            let (new_data, changed) = match op {
                Op::Insert => base.data.insert(key),
                Op::Remove => base.data.remove(key),
            };
            let stat = new_stat(base, cont, &tree.config);
            let new_base = Owned::new(Node::Base(BaseNode::normal(
                new_data,
                stat,
                clone_parent(base, guard),
            )));
            if try_replace(tree, base_ptr, new_base, guard) {
                let new_ptr = find_base_node(tree.root.ld_acq(guard), key, guard);
                tree.adapt_if_needed(new_ptr, guard);
                if changed {
                    match op {
                        Op::Insert => tree.len.fetch_add(1, std::sync::atomic::Ordering::Relaxed),
                        Op::Remove => tree.len.fetch_sub(1, std::sync::atomic::Ordering::Relaxed),
                    };
                }
                return changed;
            }
        } else {
            help_if_needed(tree, base_ptr, guard);
        }
        cont = ContInfo::Contended;
    }
}

fn clone_parent<S: ImmutableSet>(
    base: &BaseNode<S>,
    guard: &Guard,
) -> crate::atm::Atomic<Node<S>> {
    let parent = base.parent.ld_acq(guard);
    if parent.is_null() {
        crate::atm::Atomic::null()
    } else {
        let owned_slot = crate::atm::Atomic::null();
        owned_slot.st(parent, crate::atm::ORD_RLX);
        owned_slot
    }
}
