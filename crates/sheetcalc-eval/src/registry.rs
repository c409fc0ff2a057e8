//! One cycle detector per evaluation context.
//!
//! Callers open an [`EvalContext`] for each independent evaluation session
//! (typically one per thread) and pass it to every evaluate call. The
//! registry hands back that context's [`CycleDetector`] for as long as the
//! context lives. Dropping the context drops its detector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::cycle::CycleDetector;

/// Opaque identity of an evaluation context, unique for the life of the
/// process (like `std::thread::ThreadId`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Handle for one evaluation context. Owns the context's detector.
///
/// Not `Clone`: a context is driven by one caller at a time. It is `Send`, so
/// a context may be opened on one thread and moved to a worker.
#[derive(Debug)]
pub struct EvalContext {
    id: ContextId,
    detector: Arc<CycleDetector>,
}

impl EvalContext {
    pub fn id(&self) -> ContextId {
        self.id
    }
}

/// Hands out context-local cycle detectors.
///
/// The registry only holds weak handles; a detector lives exactly as long as
/// the [`EvalContext`] that owns it (plus any evaluation still borrowing it).
/// Entries whose context has gone away are pruned lazily on the next
/// `open_context`. Detectors are never shared between two contexts, so no
/// evaluation ever waits on another context's cycle state.
#[derive(Debug, Default)]
pub struct DetectorRegistry {
    detectors: DashMap<ContextId, Weak<CycleDetector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_context(&self) -> EvalContext {
        self.prune();
        let ctx = EvalContext {
            id: ContextId::next(),
            detector: Arc::new(CycleDetector::new()),
        };
        self.detectors.insert(ctx.id, Arc::downgrade(&ctx.detector));
        tracing::trace!(context = ctx.id.0, "opened evaluation context");
        ctx
    }

    /// The context's detector. Repeated calls return the same instance.
    pub fn detector_for(&self, ctx: &EvalContext) -> Arc<CycleDetector> {
        let mut slot = self
            .detectors
            .entry(ctx.id)
            .or_insert_with(|| Arc::downgrade(&ctx.detector));
        match slot.upgrade() {
            Some(det) => det,
            None => {
                *slot = Arc::downgrade(&ctx.detector);
                ctx.detector.clone()
            }
        }
    }

    /// Force-clear the context's active set.
    pub fn reset(&self, ctx: &EvalContext) {
        self.detector_for(ctx).reset();
    }

    /// Number of contexts that are still alive.
    pub fn live_contexts(&self) -> usize {
        self.prune();
        self.detectors.len()
    }

    fn prune(&self) {
        self.detectors.retain(|_, det| det.strong_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::EvalKey;
    use sheetcalc_common::SheetCell;

    #[test]
    fn detector_is_reused_per_context() {
        let reg = DetectorRegistry::new();
        let ctx = reg.open_context();
        let a = reg.detector_for(&ctx);
        let b = reg.detector_for(&ctx);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.live_contexts(), 1);
    }

    #[test]
    fn contexts_get_distinct_detectors() {
        let reg = DetectorRegistry::new();
        let (c1, c2) = (reg.open_context(), reg.open_context());
        assert_ne!(c1.id(), c2.id());
        let key = EvalKey::cell(0, SheetCell::new(0, 0, 0));
        let d1 = reg.detector_for(&c1);
        let _g = d1.enter(key).unwrap();
        let d2 = reg.detector_for(&c2);
        assert!(!d2.contains(&key));
        assert!(d2.enter(key).is_ok());
    }

    #[test]
    fn dropping_context_releases_detector() {
        let reg = DetectorRegistry::new();
        let ctx = reg.open_context();
        let det = reg.detector_for(&ctx);
        let weak = Arc::downgrade(&det);
        assert_eq!(reg.live_contexts(), 1);
        drop(ctx);
        // An evaluation still holding the detector keeps it alive.
        assert!(weak.upgrade().is_some());
        drop(det);
        assert!(weak.upgrade().is_none());
        assert_eq!(reg.live_contexts(), 0);
    }

    #[test]
    fn reset_clears_leaked_entries() {
        let reg = DetectorRegistry::new();
        let ctx = reg.open_context();
        let det = reg.detector_for(&ctx);
        let key = EvalKey::name(0, 3);
        std::mem::forget(det.enter(key).unwrap());
        assert!(det.contains(&key));
        reg.reset(&ctx);
        assert!(det.is_empty());
    }
}
