//! Re-entry detection for one evaluation context.
//!
//! A [`CycleDetector`] owns the *active set*: the cells and names that are
//! currently mid-evaluation. Entering a key that is already active means the
//! reference chain has come back to itself, which is reported as
//! [`CircularReference`] instead of recursing forever.
//!
//! Membership is scoped: [`CycleDetector::enter`] returns an [`EvalGuard`]
//! and the key leaves the set when the guard drops, on every exit path
//! including unwinding.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashSet;
use sheetcalc_common::{ExcelError, ExcelErrorKind, SheetCell, SheetIndex};

use crate::token::NameIndex;

/// Identifies a workbook participating in one evaluation (0 = primary).
pub type BookId = u16;

/// One unit of evaluation work. Equality is the only thing cycle detection
/// relies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvalKey {
    Cell {
        book: BookId,
        sheet: SheetIndex,
        row: u32,
        col: u32,
    },
    Name {
        book: BookId,
        index: NameIndex,
    },
}

impl EvalKey {
    #[inline]
    pub const fn cell(book: BookId, cell: SheetCell) -> Self {
        EvalKey::Cell {
            book,
            sheet: cell.sheet,
            row: cell.row,
            col: cell.col,
        }
    }

    #[inline]
    pub const fn name(book: BookId, index: NameIndex) -> Self {
        EvalKey::Name { book, index }
    }
}

impl fmt::Display for EvalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EvalKey::Cell {
                book,
                sheet,
                row,
                col,
            } => write!(f, "[{book}]{}", SheetCell::new(sheet, row, col)),
            EvalKey::Name { book, index } => write!(f, "[{book}]Name#{index}"),
        }
    }
}

/// `key` was entered while already active in the same context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("circular reference: {key} is already being evaluated")]
pub struct CircularReference {
    pub key: EvalKey,
}

impl From<CircularReference> for ExcelError {
    fn from(err: CircularReference) -> Self {
        ExcelError::new(ExcelErrorKind::Circ).with_message(err.to_string())
    }
}

/// The active set of one evaluation context.
///
/// The mutex is never contended: a detector belongs to exactly one context
/// and a context is driven by one thread at a time. It is there so detectors
/// can be handed out from a registry that is shared across threads.
#[derive(Debug, Default)]
pub struct CycleDetector {
    active: Mutex<FxHashSet<EvalKey>>,
}

impl CycleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    fn active(&self) -> MutexGuard<'_, FxHashSet<EvalKey>> {
        // A panic inside a guarded body never holds this lock, so a poisoned
        // set is still consistent.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, key: &EvalKey) -> bool {
        self.active().contains(key)
    }

    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }

    /// Mark `key` active until the returned guard drops.
    pub fn enter(&self, key: EvalKey) -> Result<EvalGuard<'_>, CircularReference> {
        if !self.active().insert(key) {
            tracing::debug!(%key, "circular reference detected");
            return Err(CircularReference { key });
        }
        Ok(EvalGuard {
            detector: self,
            key,
        })
    }

    /// Run `body` with `key` marked active.
    ///
    /// If `key` is already active, `body` is not invoked at all. The key is
    /// unmarked whether `body` returns normally or unwinds.
    pub fn guard_evaluation<T, F>(&self, key: EvalKey, body: F) -> Result<T, CircularReference>
    where
        F: FnOnce() -> T,
    {
        let _guard = self.enter(key)?;
        Ok(body())
    }

    /// Force-clear the active set. Between top-level calls it should already
    /// be empty; this exists for diagnostics and recovery in tests.
    pub fn reset(&self) {
        let mut active = self.active();
        if !active.is_empty() {
            tracing::debug!(leaked = active.len(), "clearing non-empty active set");
        }
        active.clear();
    }
}

/// Scoped membership of one key in a detector's active set.
#[must_use = "the key leaves the active set as soon as the guard is dropped"]
#[derive(Debug)]
pub struct EvalGuard<'d> {
    detector: &'d CycleDetector,
    key: EvalKey,
}

impl Drop for EvalGuard<'_> {
    fn drop(&mut self) {
        self.detector.active().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn key(row: u32) -> EvalKey {
        EvalKey::cell(0, SheetCell::new(0, row, 0))
    }

    #[test]
    fn reentry_is_rejected_without_running_body() {
        let det = CycleDetector::new();
        let _outer = det.enter(key(0)).unwrap();
        let mut ran = false;
        let res = det.guard_evaluation(key(0), || ran = true);
        assert_eq!(res.unwrap_err().key, key(0));
        assert!(!ran);
        assert_eq!(det.len(), 1);
    }

    #[test]
    fn guard_release_restores_set() {
        let det = CycleDetector::new();
        {
            let _a = det.enter(key(0)).unwrap();
            let _b = det.enter(key(1)).unwrap();
            assert!(det.contains(&key(0)) && det.contains(&key(1)));
        }
        assert!(det.is_empty());
        // Released keys can be entered again.
        assert!(det.enter(key(0)).is_ok());
    }

    #[test]
    fn failing_body_keeps_balance() {
        let det = CycleDetector::new();
        let _outer = det.enter(key(9)).unwrap();
        let before = det.len();
        let res: Result<Result<(), &str>, _> = det.guard_evaluation(key(1), || Err("boom"));
        assert!(matches!(res, Ok(Err("boom"))));
        assert_eq!(det.len(), before);
    }

    #[test]
    fn panicking_body_keeps_balance() {
        let det = CycleDetector::new();
        let res = catch_unwind(AssertUnwindSafe(|| {
            det.guard_evaluation::<(), _>(key(3), || panic!("evaluation blew up"))
        }));
        assert!(res.is_err());
        assert!(!det.contains(&key(3)));
        assert!(det.is_empty());
    }

    #[test]
    fn names_and_cells_do_not_collide() {
        let det = CycleDetector::new();
        let _cell = det.enter(EvalKey::cell(0, SheetCell::new(0, 0, 0))).unwrap();
        assert!(det.enter(EvalKey::name(0, 0)).is_ok());
        // Same coordinates in another book are a different target.
        assert!(det.enter(EvalKey::cell(1, SheetCell::new(0, 0, 0))).is_ok());
    }

    #[test]
    fn circular_reference_becomes_circ_value() {
        let err: ExcelError = CircularReference { key: key(2) }.into();
        assert_eq!(err.kind, ExcelErrorKind::Circ);
        assert!(err.message.unwrap().contains("Sheet#0!A3"));
    }
}
