//! Thin wrapper around `crossbeam_epoch`.
//!
//! Every node-to-node link in the tree goes through [`Atomic`] so that a
//! superseded node can be retired with [`retire`] instead of freed outright;
//! concurrent readers that already loaded a `Shared` to it keep it alive
//! until their guard is dropped.

use crossbeam_epoch::{CompareExchangeError, Guard, Owned, Shared};
use std::sync::atomic::Ordering;

pub use crossbeam_epoch::pin;

pub const ORD_RLX: Ordering = Ordering::Relaxed;
pub const ORD_ACQ: Ordering = Ordering::Acquire;
pub const ORD_REL: Ordering = Ordering::Release;

/// A tagged atomic pointer to a `T`.
pub struct Atomic<T> {
    inner: crossbeam_epoch::Atomic<T>,
}

impl<T> Atomic<T> {
    pub fn null() -> Self {
        Self {
            inner: crossbeam_epoch::Atomic::null(),
        }
    }

    pub fn new(value: T) -> Self {
        Self {
            inner: crossbeam_epoch::Atomic::new(value),
        }
    }

    pub fn from_owned(owned: Owned<T>) -> Self {
        Self {
            inner: crossbeam_epoch::Atomic::from(owned),
        }
    }

    #[inline]
    pub fn ld<'g>(&self, ord: Ordering, guard: &'g Guard) -> Shared<'g, T> {
        self.inner.load(ord, guard)
    }

    #[inline]
    pub fn ld_acq<'g>(&self, guard: &'g Guard) -> Shared<'g, T> {
        self.ld(ORD_ACQ, guard)
    }

    #[inline]
    pub fn ld_rlx<'g>(&self, guard: &'g Guard) -> Shared<'g, T> {
        self.ld(ORD_RLX, guard)
    }

    #[inline]
    pub fn st(&self, new: Shared<T>, ord: Ordering) {
        self.inner.store(new, ord);
    }

    /// Compare-exchange, release on success and relaxed on failure: the
    /// ordering every replacement CAS in this crate needs. On failure the
    /// freshly built `new` node is handed back inside the error so the
    /// caller can retry without reallocating.
    #[inline]
    pub fn cx<'g>(
        &self,
        current: Shared<'g, T>,
        new: Owned<T>,
        guard: &'g Guard,
    ) -> Result<Shared<'g, T>, CompareExchangeError<'g, T, Owned<T>>> {
        self.inner
            .compare_exchange(current, new, ORD_REL, ORD_RLX, guard)
    }

    /// As [`Atomic::cx`] but permitted to fail spuriously. Every call site
    /// already sits inside a retry loop so the weak form is free.
    #[inline]
    pub fn cx_weak<'g>(
        &self,
        current: Shared<'g, T>,
        new: Owned<T>,
        guard: &'g Guard,
    ) -> Result<Shared<'g, T>, CompareExchangeError<'g, T, Owned<T>>> {
        self.inner
            .compare_exchange_weak(current, new, ORD_REL, ORD_RLX, guard)
    }

    /// Compare-exchange where `new` is already a `Shared` rather than a
    /// fresh allocation: used for the tagged sentinel transitions
    /// (`neigh2`'s PREPARING/ABORTED/DONE dance) where no new node is being
    /// installed, only a tag bit on an existing or null pointer.
    #[inline]
    pub fn cx_tag<'g>(
        &self,
        current: Shared<'g, T>,
        new: Shared<'g, T>,
        guard: &'g Guard,
    ) -> Result<Shared<'g, T>, CompareExchangeError<'g, T, Shared<'g, T>>> {
        self.inner
            .compare_exchange(current, new, ORD_REL, ORD_RLX, guard)
    }
}

/// Retire `ptr` once no guard can observe it any longer.
///
/// # Safety
/// `ptr` must already be unlinked: no live atomic slot may still point at it.
#[inline]
pub unsafe fn retire<T>(ptr: Shared<T>, guard: &Guard) {
    if !ptr.is_null() {
        guard.defer_destroy(ptr);
    }
}
