//! Small concurrency helpers shared by the server and client loops.

use arc_swap::ArcSwap;

use crate::prelude::*;

/// A cheap-to-read, rare-to-write shared value: readers take an `Arc` snapshot without blocking a
/// writer, writers install a fresh `Arc` without blocking readers. Used for [`crate::config::GameConfig`],
/// which the accept loop and the per-tick world loop both read every iteration but which only
/// changes on an explicit admin action.
///
/// Ported near-verbatim from the teacher's own `ocg_common::concurrency::VersionedArc`.
pub struct VersionedArc<T> {
    inner: ArcSwap<T>,
}

impl<T> VersionedArc<T> {
    /// Wraps an initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::new(Arc::new(value)),
        }
    }

    /// Returns a cheap, shared snapshot of the current value.
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Installs a new value, visible to subsequent [`Self::load`] calls.
    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Replaces the current value by applying `f` to a clone of it, and returns the new value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Arc<T> {
        let next = Arc::new(f(&self.inner.load()));
        self.inner.store(Arc::clone(&next));
        next
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_reflects_latest_store() {
        let v = VersionedArc::new(1u32);
        assert_eq!(*v.load(), 1);
        v.store(2);
        assert_eq!(*v.load(), 2);
    }

    #[test]
    fn update_derives_from_previous_value() {
        let v = VersionedArc::new(10u32);
        v.update(|old| old + 5);
        assert_eq!(*v.load(), 15);
    }
}
