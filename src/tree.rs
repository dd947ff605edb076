//! The public `Tree` type: construction, the point/range API, and the
//! internal adaptation dispatch that `do_update` drives after every
//! successful replacement.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_epoch::{pin, Guard, Owned, Shared};
use log::debug;

use crate::atm::Atomic;
use crate::config::TreeConfig;
use crate::error::{TreeError, TreeResult};
use crate::imm_set::ImmutableSet;
use crate::join::{complete_join, secure_join_left, secure_join_right};
use crate::node::{BaseNode, Node, RouteNode};
use crate::ops::{do_update, lookup, Op};
use crate::range::all_in_range;
use crate::routing::route_side;
use crate::split::high_contention_split;
use crate::stat::{decide_adaptation, Adaptation};

/// A lock-free ordered set of `i64` keys, whose internal shape adapts to
/// observed contention: hot regions split into finer-grained base nodes,
/// cold regions join back together.
pub struct Tree<S: ImmutableSet> {
    pub(crate) root: Atomic<Node<S>>,
    pub(crate) config: TreeConfig,
    pub(crate) len: AtomicUsize,
}

/// One node in a flat description of an initial tree layout, used by
/// [`Tree::from_initial_bases`]. Indices are positions into the slice passed
/// to that function; `parent` must be `None` for exactly one node (the
/// root).
pub enum InitialNode<S: ImmutableSet> {
    Route {
        parent: Option<usize>,
        key: i64,
        left: usize,
        right: usize,
    },
    Base {
        parent: Option<usize>,
        data: S,
    },
}

impl<S: ImmutableSet> InitialNode<S> {
    fn parent(&self) -> Option<usize> {
        match self {
            InitialNode::Route { parent, .. } => *parent,
            InitialNode::Base { parent, .. } => *parent,
        }
    }
}

impl<S: ImmutableSet> Tree<S> {
    /// An empty tree: a single empty base at the root.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        let root = Node::Base(BaseNode::normal(S::empty(), 0, Atomic::null()));
        Self {
            root: Atomic::new(root),
            config,
            len: AtomicUsize::new(0),
        }
    }

    /// Build a tree from an explicit initial layout, validating parent/child
    /// consistency before committing to it.
    pub fn from_initial_bases(nodes: Vec<InitialNode<S>>) -> TreeResult<Self> {
        Self::from_initial_bases_with_config(nodes, TreeConfig::default())
    }

    pub fn from_initial_bases_with_config(
        nodes: Vec<InitialNode<S>>,
        config: TreeConfig,
    ) -> TreeResult<Self> {
        config.validate()?;
        if nodes.is_empty() {
            return Err(TreeError::EmptyInitialLayout);
        }
        for (idx, node) in nodes.iter().enumerate() {
            if let InitialNode::Route { left, right, .. } = node {
                for &child in &[*left, *right] {
                    let child_parent = nodes
                        .get(child)
                        .and_then(InitialNode::parent);
                    if child_parent != Some(idx) {
                        return Err(TreeError::InconsistentParentLink {
                            parent: idx,
                            child,
                        });
                    }
                }
            }
        }
        let root_idx = nodes
            .iter()
            .position(|n| n.parent().is_none())
            .ok_or(TreeError::EmptyInitialLayout)?;

        let len = nodes
            .iter()
            .map(|n| match n {
                InitialNode::Base { data, .. } => data.len(),
                InitialNode::Route { .. } => 0,
            })
            .sum();

        let guard = pin();
        let root = build_initial(&nodes, root_idx, Shared::null(), &guard);
        Ok(Self {
            root: Atomic::from_owned(root),
            config,
            len: AtomicUsize::new(len),
        })
    }

    pub fn pin(&self) -> Guard {
        pin()
    }

    pub fn insert(&self, key: i64) -> bool {
        let guard = pin();
        do_update(self, Op::Insert, key, &guard)
    }

    pub fn remove(&self, key: i64) -> bool {
        let guard = pin();
        do_update(self, Op::Remove, key, &guard)
    }

    pub fn lookup(&self, key: i64) -> bool {
        let guard = pin();
        lookup(self, key, &guard)
    }

    /// Every key in `[lo, hi]`, as a fresh snapshot.
    pub fn query(&self, lo: i64, hi: i64) -> S {
        let guard = pin();
        all_in_range(self, lo, hi, None, &guard)
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<i64> {
        self.query(i64::MIN, i64::MAX).to_vec()
    }

    /// Dispatch a just-replaced base to a split or join attempt if its stat
    /// crossed a threshold. Called after every successful `do_update` CAS.
    pub(crate) fn adapt_if_needed<'g>(&self, b_ptr: Shared<'g, Node<S>>, guard: &'g Guard) {
        let base = match unsafe { b_ptr.as_ref() }.and_then(Node::as_base) {
            Some(b) => b,
            None => return,
        };
        match decide_adaptation(base, &self.config) {
            Adaptation::None => {}
            Adaptation::Split => {
                debug!("splitting base under high contention");
                high_contention_split(self, b_ptr, guard);
            }
            Adaptation::Join => {
                let parent_ptr = base.parent.ld_acq(guard);
                if parent_ptr.is_null() {
                    return; // root has no sibling to join with
                }
                let side = match unsafe { parent_ptr.as_ref() }.and_then(Node::as_route) {
                    Some(r) => route_side(r, b_ptr, guard),
                    None => return,
                };
                let joined = match side {
                    Some(true) => secure_join_left(self, b_ptr, guard),
                    Some(false) => secure_join_right(self, b_ptr, guard),
                    None => None,
                };
                if let Some(m_ptr) = joined {
                    debug!("completed low-contention join");
                    complete_join(self, m_ptr, guard);
                }
            }
        }
    }
}

impl<S: ImmutableSet> Default for Tree<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively materialize the validated flat layout into real nodes.
/// Routes are allocated with placeholder children first so the real
/// children's `parent` field can point at the route's address before it is
/// linked into its own parent.
fn build_initial<'g, S: ImmutableSet>(
    nodes: &[InitialNode<S>],
    idx: usize,
    parent_ptr: Shared<'g, Node<S>>,
    guard: &'g Guard,
) -> Owned<Node<S>> {
    match &nodes[idx] {
        InitialNode::Base { data, .. } => {
            let parent = Atomic::null();
            parent.st(parent_ptr, crate::atm::ORD_RLX);
            Owned::new(Node::Base(BaseNode::normal(data.clone(), 0, parent)))
        }
        InitialNode::Route { key, left, right, .. } => {
            let route_shared = Owned::new(Node::Route(RouteNode::new(
                *key,
                Node::Base(BaseNode::normal(S::empty(), 0, Atomic::null())),
                Node::Base(BaseNode::normal(S::empty(), 0, Atomic::null())),
            )))
            .into_shared(guard);
            let left_owned = build_initial(nodes, *left, route_shared, guard);
            let right_owned = build_initial(nodes, *right, route_shared, guard);
            if let Some(Node::Route(r)) = unsafe { route_shared.as_ref() } {
                r.left.st(left_owned.into_shared(guard), crate::atm::ORD_RLX);
                r.right.st(right_owned.into_shared(guard), crate::atm::ORD_RLX);
            }
            unsafe { route_shared.into_owned() }
        }
    }
}
