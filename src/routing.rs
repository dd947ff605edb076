//! Routing: descending from the root to the base node responsible for a
//! key, and the stack-based traversal helpers range queries use to advance
//! base-to-base in ascending key order.

use crossbeam_epoch::{Guard, Shared};

use crate::atm::ORD_ACQ;
use crate::node::Node;

/// Path from the root down to a base: every route visited, then the base.
pub type Stack<'g, S> = Vec<Shared<'g, Node<S>>>;

/// Wait-free: descend to the base responsible for `key`.
pub fn find_base_node<'g, S: crate::imm_set::ImmutableSet>(
    root: Shared<'g, Node<S>>,
    key: i64,
    guard: &'g Guard,
) -> Shared<'g, Node<S>> {
    let mut n = root;
    loop {
        match unsafe { n.as_ref() } {
            Some(Node::Route(r)) => {
                n = if key < r.key {
                    r.left.ld(ORD_ACQ, guard)
                } else {
                    r.right.ld(ORD_ACQ, guard)
                };
            }
            _ => return n,
        }
    }
}

/// As [`find_base_node`] but records every route visited plus the base.
pub fn find_base_stack<'g, S: crate::imm_set::ImmutableSet>(
    root: Shared<'g, Node<S>>,
    key: i64,
    stack: &mut Stack<'g, S>,
    guard: &'g Guard,
) -> Shared<'g, Node<S>> {
    stack.clear();
    let mut n = root;
    loop {
        stack.push(n);
        match unsafe { n.as_ref() } {
            Some(Node::Route(r)) => {
                n = if key < r.key {
                    r.left.ld(ORD_ACQ, guard)
                } else {
                    r.right.ld(ORD_ACQ, guard)
                };
            }
            _ => return n,
        }
    }
}

/// Descend leftmost from `n`, pushing every route node, and return the base
/// reached (also pushed).
pub fn leftmost_and_stack<'g, S: crate::imm_set::ImmutableSet>(
    n: Shared<'g, Node<S>>,
    stack: &mut Stack<'g, S>,
    guard: &'g Guard,
) -> Shared<'g, Node<S>> {
    let mut cur = n;
    loop {
        stack.push(cur);
        match unsafe { cur.as_ref() } {
            Some(Node::Route(r)) => cur = r.left.ld(ORD_ACQ, guard),
            _ => return cur,
        }
    }
}

pub fn leftmost<'g, S: crate::imm_set::ImmutableSet>(
    n: Shared<'g, Node<S>>,
    guard: &'g Guard,
) -> Shared<'g, Node<S>> {
    let mut cur = n;
    loop {
        match unsafe { cur.as_ref() } {
            Some(Node::Route(r)) => cur = r.left.ld(ORD_ACQ, guard),
            _ => return cur,
        }
    }
}

pub fn rightmost<'g, S: crate::imm_set::ImmutableSet>(
    n: Shared<'g, Node<S>>,
    guard: &'g Guard,
) -> Shared<'g, Node<S>> {
    let mut cur = n;
    loop {
        match unsafe { cur.as_ref() } {
            Some(Node::Route(r)) => cur = r.right.ld(ORD_ACQ, guard),
            _ => return cur,
        }
    }
}

/// Advance to the in-order successor base during a range-query traversal.
/// `stack` is the path to the base just consumed; it is mutated in place to
/// the path of the returned base. Returns `None` when there is no further
/// base (the traversal has passed the rightmost base in the tree).
pub fn find_next_base_stack<'g, S: crate::imm_set::ImmutableSet>(
    stack: &mut Stack<'g, S>,
    guard: &'g Guard,
) -> Option<Shared<'g, Node<S>>> {
    let just_popped = stack.pop()?;
    let top = stack.last().copied()?;
    let route = match unsafe { top.as_ref() } {
        Some(Node::Route(r)) => r,
        _ => return None,
    };
    if route.is_valid() && route.left.ld(ORD_ACQ, guard) == just_popped {
        // just_popped was top's left child: its in-order successor is
        // immediately the leftmost base of top's right subtree.
        let next = route.right.ld(ORD_ACQ, guard);
        return Some(leftmost_and_stack(next, stack, guard));
    }
    // just_popped was top's right child (or top is stale): top's whole
    // subtree is exhausted. Climb, using top's key as a fixed watermark,
    // until we reach the first still-valid ancestor whose key is greater
    // than it -- the first one we're climbing out of the left side of.
    let be_greater_than = route.key;
    stack.pop();
    while let Some(&anc) = stack.last() {
        let anc_route = match unsafe { anc.as_ref() } {
            Some(Node::Route(r)) => r,
            _ => return None,
        };
        if anc_route.is_valid() && anc_route.key > be_greater_than {
            let next = anc_route.right.ld(ORD_ACQ, guard);
            return Some(leftmost_and_stack(next, stack, guard));
        }
        stack.pop();
    }
    None
}

/// Which child of `r` currently holds `n`: `Some(true)` for the left child,
/// `Some(false)` for the right, `None` if `n` is neither (the tree moved
/// under us).
pub fn route_side<'g, S: crate::imm_set::ImmutableSet>(
    r: &crate::node::RouteNode<S>,
    n: Shared<'g, Node<S>>,
    guard: &'g Guard,
) -> Option<bool> {
    if r.left.ld(ORD_ACQ, guard) == n {
        Some(true)
    } else if r.right.ld(ORD_ACQ, guard) == n {
        Some(false)
    } else {
        None
    }
}

/// Walk from the root toward `n` by key, returning the last route visited
/// before reaching it (or `None` if `n` is the root). If the tree changed
/// under us so the walk cannot reach `n`, returns `Err(())`, the `NOT_FOUND`
/// sentinel.
pub fn parent_of<'g, S: crate::imm_set::ImmutableSet>(
    root: Shared<'g, Node<S>>,
    n: Shared<'g, Node<S>>,
    key_hint: i64,
    guard: &'g Guard,
) -> Result<Option<Shared<'g, Node<S>>>, ()> {
    if root == n {
        return Ok(None);
    }
    let mut cur = root;
    let mut parent = None;
    loop {
        if cur == n {
            return Ok(parent);
        }
        match unsafe { cur.as_ref() } {
            Some(Node::Route(r)) => {
                parent = Some(cur);
                cur = if key_hint < r.key {
                    r.left.ld(ORD_ACQ, guard)
                } else {
                    r.right.ld(ORD_ACQ, guard)
                };
            }
            _ => return Err(()),
        }
    }
}
