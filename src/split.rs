//! High-contention split: replace an overloaded base with a route over two
//! freshly halved bases.

use crossbeam_epoch::{Guard, Owned, Shared};

use crate::atm::Atomic;
use crate::base::try_replace;
use crate::imm_set::ImmutableSet;
use crate::node::{BaseNode, Node, RouteNode};
use crate::tree::Tree;

/// Attempt to split `b` (already confirmed replaceable and over
/// `high_cont`) into a route over two children. A CAS loss here is benign:
/// another thread has already replaced `b`.
pub fn high_contention_split<'g, S: ImmutableSet>(
    tree: &Tree<S>,
    b_ptr: Shared<'g, Node<S>>,
    guard: &'g Guard,
) {
    let b = match unsafe { b_ptr.as_ref() } {
        Some(Node::Base(b)) => b,
        _ => return,
    };
    if b.data.len() < 2 {
        return;
    }
    let split_key = b.data.median_key();
    let (left_data, right_data) = b.data.split_at(split_key);
    if left_data.is_empty() || right_data.is_empty() {
        return;
    }

    // The route is allocated first with placeholder children so we can
    // point the fresh bases' `parent` at it before it is published.
    let route = Owned::new(Node::Route(RouteNode::new(
        split_key,
        Node::Base(BaseNode::normal(S::empty(), 0, Atomic::null())),
        Node::Base(BaseNode::normal(S::empty(), 0, Atomic::null())),
    )))
    .into_shared(guard);

    let left = Owned::new(Node::Base(BaseNode::normal(
        left_data,
        0,
        parent_atomic(route),
    )));
    let right = Owned::new(Node::Base(BaseNode::normal(
        right_data,
        0,
        parent_atomic(route),
    )));

    if let Some(Node::Route(r)) = unsafe { route.as_ref() } {
        r.left.st(left.into_shared(guard), crate::atm::ORD_RLX);
        r.right.st(right.into_shared(guard), crate::atm::ORD_RLX);
    }

    let route_owned = unsafe { route.into_owned() };
    // On failure `try_replace` drops the `Owned` we handed it, which frees
    // the route and the two fresh children we just linked under it; no
    // guard could have observed any of this since it was never published.
    try_replace(tree, b_ptr, route_owned, guard);
}

fn parent_atomic<S: ImmutableSet>(parent: Shared<Node<S>>) -> Atomic<Node<S>> {
    let a = Atomic::null();
    a.st(parent, crate::atm::ORD_RLX);
    a
}
