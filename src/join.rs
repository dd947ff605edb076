//! The two-phase, helper-completable join protocol.
//!
//! Phase one (`secure_join_left` / `secure_join_right`) claims the route
//! and both participating bases and publishes the merged replacement under
//! a tagged `neigh2`. Phase two (`complete_join`) splices the route out of
//! the tree; any thread that encounters the `JoinMain` mid-flight may run
//! phase two on the initiator's behalf.

use crossbeam_epoch::{Guard, Owned, Shared};

use crate::atm::{Atomic, ORD_RLX};
use crate::base::{is_replaceable, try_replace};
use crate::imm_set::ImmutableSet;
use crate::node::{
    load_gparent, load_neigh2, BaseKind, BaseNode, GParent, JoinMainState, Neigh2, Node, RouteNode,
    NEIGH2_ABORTED, NEIGH2_COMMITTED_TAG, NEIGH2_DONE,
};
use crate::routing::{leftmost, parent_of, rightmost};
use crate::tree::Tree;

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn own<'a, S: ImmutableSet>(self, r: &'a RouteNode<S>) -> &'a Atomic<Node<S>> {
        match self {
            Side::Left => &r.left,
            Side::Right => &r.right,
        }
    }

    fn other<'a, S: ImmutableSet>(self, r: &'a RouteNode<S>) -> &'a Atomic<Node<S>> {
        match self {
            Side::Left => &r.right,
            Side::Right => &r.left,
        }
    }

    fn neighbor<'g, S: ImmutableSet>(
        self,
        subtree: Shared<'g, Node<S>>,
        guard: &'g Guard,
    ) -> Shared<'g, Node<S>> {
        match self {
            Side::Left => leftmost(subtree, guard),
            Side::Right => rightmost(subtree, guard),
        }
    }
}

fn atomic_of<'g, S: ImmutableSet>(ptr: Shared<'g, Node<S>>) -> Atomic<Node<S>> {
    let a = Atomic::null();
    a.st(ptr, ORD_RLX);
    a
}

fn base_ref<'g, S: ImmutableSet>(ptr: Shared<'g, Node<S>>) -> Option<&'g BaseNode<S>> {
    unsafe { ptr.as_ref() }.and_then(Node::as_base)
}

fn route_ref<'g, S: ImmutableSet>(ptr: Shared<'g, Node<S>>) -> Option<&'g RouteNode<S>> {
    unsafe { ptr.as_ref() }.and_then(Node::as_route)
}

/// Abort a stalled join: CAS `neigh2` from PREPARING to ABORTED. A no-op if
/// it already left the PREPARING state.
pub fn abort_join<'g, S: ImmutableSet>(m: &JoinMainState<S>, guard: &'g Guard) {
    let preparing: Shared<'g, Node<S>> = Shared::null().with_tag(crate::node::NEIGH2_PREPARING);
    let aborted: Shared<'g, Node<S>> = Shared::null().with_tag(NEIGH2_ABORTED);
    let _ = m.neigh2.cx_tag(preparing, aborted, guard);
}

pub fn secure_join_left<'g, S: ImmutableSet>(
    tree: &Tree<S>,
    b_ptr: Shared<'g, Node<S>>,
    guard: &'g Guard,
) -> Option<Shared<'g, Node<S>>> {
    secure_join(tree, b_ptr, Side::Left, guard)
}

pub fn secure_join_right<'g, S: ImmutableSet>(
    tree: &Tree<S>,
    b_ptr: Shared<'g, Node<S>>,
    guard: &'g Guard,
) -> Option<Shared<'g, Node<S>>> {
    secure_join(tree, b_ptr, Side::Right, guard)
}

fn secure_join<'g, S: ImmutableSet>(
    tree: &Tree<S>,
    b_ptr: Shared<'g, Node<S>>,
    side: Side,
    guard: &'g Guard,
) -> Option<Shared<'g, Node<S>>> {
    let b = base_ref(b_ptr)?;
    let parent_ptr = b.parent.ld_acq(guard);
    if parent_ptr.is_null() {
        return None; // root cannot join
    }
    let parent_route = route_ref(parent_ptr)?;

    // 1. locate the in-order neighbor under the opposite child.
    let n0_ptr = side.neighbor(side.other(parent_route).ld_acq(guard), guard);
    if !is_replaceable(n0_ptr, guard) {
        return None;
    }
    let n0 = base_ref(n0_ptr)?;

    // 2. m = deep_copy(b) as JoinMain, neigh2 = PREPARING; claim b's slot.
    let m_owned = Owned::new(Node::Base(BaseNode {
        data: b.data.clone(),
        stat: b.stat,
        parent: atomic_of(parent_ptr),
        kind: BaseKind::JoinMain(JoinMainState::preparing()),
    }));
    let m_ptr = m_owned.into_shared(guard);
    if side.own(parent_route).cx(b_ptr, unsafe { m_ptr.into_owned() }, guard).is_err() {
        // `cx`'s Err carries the `Owned` back; dropping the Result here
        // frees it since `m` was never published.
        return None;
    }
    unsafe { crate::atm::retire(b_ptr, guard) };
    let m = base_ref(m_ptr)?;
    let m_state = match &m.kind {
        BaseKind::JoinMain(state) => state,
        _ => unreachable!("just constructed as JoinMain"),
    };

    // 3. n1 = deep_copy(n0) as JoinNeighbor, main_node = m. Capture the
    // installed pointer directly rather than reloading whatever slot n0
    // used to sit in: when n0 is nested below an untouched route (the
    // "deep" case) that slot never held n0 or n1 in the first place.
    let n1_owned = Owned::new(Node::Base(BaseNode {
        data: n0.data.clone(),
        stat: n0.stat,
        parent: atomic_of(n0.parent.ld_acq(guard)),
        kind: BaseKind::JoinNeighbor {
            main_node: atomic_of(m_ptr),
        },
    }));
    let n1_ptr = n1_owned.into_shared(guard);
    if !try_replace(tree, n0_ptr, unsafe { n1_ptr.into_owned() }, guard) {
        abort_join(m_state, guard);
        return None;
    }

    // 4. claim the shared route for this join. `join_id` is a non-owning
    // marker pointer, so this is a tag-style CAS, not an ownership move.
    if parent_route.join_id.cx_tag(Shared::null(), m_ptr, guard).is_err() {
        abort_join(m_state, guard);
        return None;
    }

    // 5. claim the grandparent's join_id, if there is a grandparent.
    let gparent = match parent_of(tree.root.ld_acq(guard), parent_ptr, parent_route.key, guard) {
        Err(()) => {
            parent_route.join_id.st(Shared::null(), ORD_RLX);
            return None;
        }
        Ok(gp) => gp,
    };
    if let Some(gp_ptr) = gparent {
        if let Some(gp) = route_ref(gp_ptr) {
            if gp.join_id.cx_tag(Shared::null(), m_ptr, guard).is_err() {
                parent_route.join_id.st(Shared::null(), ORD_RLX);
                return None;
            }
        }
    }

    // 6. record gparent / otherb / neigh1.
    let gparent_encoded: Shared<Node<S>> = match gparent {
        None => Shared::null(),
        Some(gp) => gp,
    };
    m_state.gparent.st(gparent_encoded, ORD_RLX);
    let otherb_ptr = side.other(parent_route).ld_acq(guard); // now holds n1, or the untouched subtree
    m_state.otherb.st(otherb_ptr, ORD_RLX);
    m_state.neigh1.st(n1_ptr, ORD_RLX);

    // 7/8. build the merged replacement n2 and publish it.
    let joinedp = if otherb_ptr == n1_ptr {
        gparent_encoded
    } else {
        base_ref(n1_ptr)?.parent.ld_acq(guard)
    };
    let n2_owned = Owned::new(Node::Base(BaseNode {
        data: b.data.join(&n0.data),
        stat: 0,
        parent: atomic_of(joinedp),
        kind: BaseKind::Normal,
    }));
    let n2_ptr = n2_owned.into_shared(guard);
    let committed = n2_ptr.with_tag(NEIGH2_COMMITTED_TAG);
    let preparing_tagged: Shared<Node<S>> = Shared::null().with_tag(crate::node::NEIGH2_PREPARING);
    if m_state.neigh2.cx_tag(preparing_tagged, committed, guard).is_err() {
        // someone else aborted the join first
        drop(unsafe { n2_ptr.into_owned() });
        parent_route.join_id.st(Shared::null(), ORD_RLX);
        if let Some(gp_ptr) = gparent {
            if let Some(gp) = route_ref(gp_ptr) {
                gp.join_id.st(Shared::null(), ORD_RLX);
            }
        }
        return None;
    }
    Some(m_ptr)
}

/// Finish a join whose `neigh2` already holds the committed `n2`. Safe to
/// call redundantly; every step is benign-on-failure.
///
/// `n2` ends up installed at two independent slots in the shallow case
/// (`otherb == neigh1`): the doomed `neigh1` slot inside the
/// soon-to-be-discarded route, and the grandparent slot that actually
/// survives. Each installation gets its own freshly allocated copy so the
/// two atomics never alias the same heap node (aliasing would make a later
/// `defer_destroy` of either slot race the other into a double free). In
/// the deep case `otherb` is not `n2`, so it is relinked by pointer value
/// with no clone needed: the edge simply moves from the doomed route to
/// the grandparent.
pub fn complete_join<'g, S: ImmutableSet>(tree: &Tree<S>, m_ptr: Shared<'g, Node<S>>, guard: &'g Guard) {
    let m = match base_ref(m_ptr) {
        Some(b) => b,
        None => return,
    };
    let state = match &m.kind {
        BaseKind::JoinMain(state) => state,
        _ => return,
    };
    let n2_ptr = match load_neigh2(state, guard) {
        Neigh2::Done => return,
        Neigh2::Committed(n2) => n2,
        _ => return,
    };

    let neigh1_ptr = state.neigh1.ld_acq(guard);
    let _ = try_replace(tree, neigh1_ptr, Owned::new(clone_n2(n2_ptr, guard)), guard);

    let parent_ptr = m.parent.ld_acq(guard);
    if let Some(parent_route) = route_ref(parent_ptr) {
        parent_route.invalidate();
        let otherb_ptr = state.otherb.ld_acq(guard);
        let shallow = otherb_ptr == neigh1_ptr;

        let spliced = match load_gparent(state, guard) {
            GParent::Root => {
                if shallow {
                    tree.root
                        .cx(parent_ptr, Owned::new(clone_n2(n2_ptr, guard)), guard)
                        .is_ok()
                } else {
                    tree.root.cx_tag(parent_ptr, otherb_ptr, guard).is_ok()
                }
            }
            GParent::Route(gp_ptr) => {
                if let Some(gp) = route_ref(gp_ptr) {
                    let slot = if gp.left.ld_acq(guard) == parent_ptr {
                        Some(&gp.left)
                    } else if gp.right.ld_acq(guard) == parent_ptr {
                        Some(&gp.right)
                    } else {
                        None
                    };
                    match slot {
                        Some(slot) => {
                            let ok = if shallow {
                                slot.cx(parent_ptr, Owned::new(clone_n2(n2_ptr, guard)), guard)
                                    .is_ok()
                            } else {
                                slot.cx_tag(parent_ptr, otherb_ptr, guard).is_ok()
                            };
                            if ok {
                                gp.join_id.st(Shared::null(), ORD_RLX);
                            }
                            ok
                        }
                        None => false,
                    }
                } else {
                    false
                }
            }
            GParent::NotFound => false,
        };
        if spliced {
            // `parent_route` and the `JoinMain` it held are now unreachable
            // from anywhere else in the tree.
            unsafe {
                crate::atm::retire(parent_ptr, guard);
                crate::atm::retire(m_ptr, guard);
            }
        }
    }

    let done: Shared<Node<S>> = Shared::null().with_tag(NEIGH2_DONE);
    let _ = state.neigh2.cx_tag(n2_ptr.with_tag(NEIGH2_COMMITTED_TAG), done, guard);
}

/// A fresh, independently owned copy of `n2`'s contents, used whenever `n2`
/// needs to be installed at more than one atomic slot.
fn clone_n2<S: ImmutableSet>(n2_ptr: Shared<Node<S>>, guard: &Guard) -> Node<S> {
    let b = base_ref(n2_ptr).expect("neigh2's committed value is always a Normal base");
    Node::Base(BaseNode {
        data: b.data.clone(),
        stat: b.stat,
        parent: atomic_of(b.parent.ld_acq(guard)),
        kind: BaseKind::Normal,
    })
}
