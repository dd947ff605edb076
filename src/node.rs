//! The node model: route nodes and the four base-node kinds.
//!
//! Nodes are never mutated in place except through the specific atomic
//! fields called out below; every other field is set once, before the node
//! is published via a CAS, and is safe to read without synchronization once
//! a reader has acquired-loaded a pointer to the node.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crossbeam_epoch::{Guard, Shared};

use crate::atm::Atomic;
use crate::imm_set::ImmutableSet;

/// Tag used on `neigh2` to mean "join initiated, outcome not yet decided".
pub const NEIGH2_PREPARING: usize = 0;
/// Tag used on `neigh2` to mean "join will not complete".
pub const NEIGH2_ABORTED: usize = 1;
/// Tag used on `neigh2` to mean "join completed and spliced in".
pub const NEIGH2_DONE: usize = 2;
/// A non-sentinel `neigh2` (any pointer stored with this tag) is the
/// committed merged replacement, `n2`.
pub const NEIGH2_COMMITTED_TAG: usize = 3;

/// Tag used on `gparent` to mean "the route's grandparent link changed
/// under us before we could claim it; the join must abort".
pub const GPARENT_NOT_FOUND_TAG: usize = 1;

pub enum Node<S: ImmutableSet> {
    Route(RouteNode<S>),
    Base(BaseNode<S>),
}

impl<S: ImmutableSet> Node<S> {
    pub fn as_route(&self) -> Option<&RouteNode<S>> {
        match self {
            Node::Route(r) => Some(r),
            Node::Base(_) => None,
        }
    }

    pub fn as_base(&self) -> Option<&BaseNode<S>> {
        match self {
            Node::Base(b) => Some(b),
            Node::Route(_) => None,
        }
    }

    pub fn is_route(&self) -> bool {
        matches!(self, Node::Route(_))
    }
}

pub struct RouteNode<S: ImmutableSet> {
    pub key: i64,
    pub left: Atomic<Node<S>>,
    pub right: Atomic<Node<S>>,
    /// Cleared when this route is being spliced out by a join.
    pub valid: AtomicBool,
    /// Null until a join claims this route; holds the claiming `JoinMain`.
    pub join_id: Atomic<Node<S>>,
}

impl<S: ImmutableSet> RouteNode<S> {
    pub fn new(key: i64, left: Node<S>, right: Node<S>) -> Self {
        Self {
            key,
            left: Atomic::new(left),
            right: Atomic::new(right),
            valid: AtomicBool::new(true),
            join_id: Atomic::null(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

pub enum BaseKind<S: ImmutableSet> {
    Normal,
    JoinMain(JoinMainState<S>),
    JoinNeighbor {
        /// Write-once: the matching `JoinMain`.
        main_node: Atomic<Node<S>>,
    },
    Range(Arc<RangeState<S>>),
}

pub struct JoinMainState<S: ImmutableSet> {
    /// Write-once: the `JoinNeighbor` sibling.
    pub neigh1: Atomic<Node<S>>,
    /// Tagged: PREPARING / ABORTED / DONE / Committed(n2).
    pub neigh2: Atomic<Node<S>>,
    /// Write-once: the shared route's parent. Tag 1 means NOT_FOUND; a null
    /// pointer with tag 0 means the shared route is the tree root.
    pub gparent: Atomic<Node<S>>,
    /// Write-once: the route child opposite `neigh1`.
    pub otherb: Atomic<Node<S>>,
}

impl<S: ImmutableSet> JoinMainState<S> {
    pub fn preparing() -> Self {
        Self {
            neigh1: Atomic::null(),
            neigh2: Atomic::null(),
            gparent: Atomic::null(),
            otherb: Atomic::null(),
        }
    }
}

pub struct RangeState<S: ImmutableSet> {
    pub lo: i64,
    pub hi: i64,
    pub storage: Arc<ResultStorage<S>>,
}

/// Shared, publish-once outcome of a range query. `result` starts unset and
/// transitions at most once to a concrete snapshot.
pub struct ResultStorage<S: ImmutableSet> {
    result: ArcSwapOption<S>,
    more_than_one_base: AtomicBool,
}

impl<S: ImmutableSet> ResultStorage<S> {
    pub fn new() -> Self {
        Self {
            result: ArcSwapOption::from(None),
            more_than_one_base: AtomicBool::new(false),
        }
    }

    pub fn is_set(&self) -> bool {
        self.result.load().is_some()
    }

    pub fn get(&self) -> Option<Arc<S>> {
        self.result.load_full()
    }

    /// Publish the result if unset. Returns `true` iff this call won the
    /// race to publish.
    pub fn try_set(&self, value: S) -> bool {
        let prev = self.result.compare_and_swap(None::<Arc<S>>, Some(Arc::new(value)));
        // `compare_and_swap` returns the previous value; `None` means we won.
        prev.is_none()
    }

    pub fn set_more_than_one_base(&self) {
        self.more_than_one_base.store(true, Ordering::Release);
    }

    pub fn more_than_one_base(&self) -> bool {
        self.more_than_one_base.load(Ordering::Acquire)
    }
}

impl<S: ImmutableSet> Default for ResultStorage<S> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BaseNode<S: ImmutableSet> {
    pub data: S,
    pub stat: i32,
    /// Write-once: null iff this base is the tree root.
    pub parent: Atomic<Node<S>>,
    pub kind: BaseKind<S>,
}

impl<S: ImmutableSet> BaseNode<S> {
    pub fn normal(data: S, stat: i32, parent: Atomic<Node<S>>) -> Self {
        Self {
            data,
            stat,
            parent,
            kind: BaseKind::Normal,
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self.kind, BaseKind::Normal)
    }
}

/// Decoded form of a `JoinMain::neigh2` load.
pub enum Neigh2<'g, S: ImmutableSet> {
    Preparing,
    Aborted,
    Done,
    Committed(Shared<'g, Node<S>>),
}

pub fn load_neigh2<'g, S: ImmutableSet>(
    state: &JoinMainState<S>,
    guard: &'g Guard,
) -> Neigh2<'g, S> {
    let ptr = state.neigh2.ld_acq(guard);
    match ptr.tag() {
        NEIGH2_PREPARING => Neigh2::Preparing,
        NEIGH2_ABORTED => Neigh2::Aborted,
        NEIGH2_DONE => Neigh2::Done,
        _ => Neigh2::Committed(ptr),
    }
}

/// Decoded form of a `JoinMain::gparent` load.
pub enum GParent<'g, S: ImmutableSet> {
    Root,
    Route(Shared<'g, Node<S>>),
    NotFound,
}

pub fn load_gparent<'g, S: ImmutableSet>(
    state: &JoinMainState<S>,
    guard: &'g Guard,
) -> GParent<'g, S> {
    let ptr = state.gparent.ld_acq(guard);
    if ptr.tag() == GPARENT_NOT_FOUND_TAG {
        GParent::NotFound
    } else if ptr.is_null() {
        GParent::Root
    } else {
        GParent::Route(ptr)
    }
}
