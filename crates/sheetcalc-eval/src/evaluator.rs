//! Top-level entry point: owns the workbooks, the detector registry and the
//! result cache, and drives one [`Session`] per `evaluate` call.

use std::sync::Arc;

use dashmap::DashMap;
use sheetcalc_common::{LiteralValue, SheetCell};

use crate::cycle::{BookId, CycleDetector, EvalKey};
use crate::interpreter::Session;
use crate::lookup::{EvaluationWorkbook, LookupError};
use crate::registry::{DetectorRegistry, EvalContext};

/// Configuration for the evaluator
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Keep formula results across `evaluate` calls (and across contexts).
    /// Results whose computation ran into a cycle or the depth bound are
    /// never kept.
    pub cache_results: bool,
    /// Deepest chain of formula cells and defined names followed before
    /// giving up with `#CALC!`. Only a runaway workbook gets near the default.
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cache_results: true,
            max_depth: 32_768,
        }
    }
}

pub struct WorkbookEvaluator {
    /// Index is the `BookId`; 0 is the primary workbook.
    books: Vec<(String, Arc<dyn EvaluationWorkbook>)>,
    config: EvalConfig,
    registry: DetectorRegistry,
    cache: DashMap<EvalKey, LiteralValue>,
}

impl WorkbookEvaluator {
    pub fn new<S: Into<String>>(name: S, workbook: Arc<dyn EvaluationWorkbook>) -> Self {
        Self::with_config(name, workbook, EvalConfig::default())
    }

    pub fn with_config<S: Into<String>>(
        name: S,
        workbook: Arc<dyn EvaluationWorkbook>,
        config: EvalConfig,
    ) -> Self {
        Self {
            books: vec![(name.into(), workbook)],
            config,
            registry: DetectorRegistry::new(),
            cache: DashMap::new(),
        }
    }

    /// Attach a workbook that references from the primary one (or from each
    /// other) may point into, addressed by `name`.
    pub fn with_external_workbook<S: Into<String>>(
        mut self,
        name: S,
        workbook: Arc<dyn EvaluationWorkbook>,
    ) -> Self {
        self.books.push((name.into(), workbook));
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Case-insensitive.
    pub fn book_id(&self, name: &str) -> Option<BookId> {
        self.books
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|i| BookId::try_from(i).ok())
    }

    pub fn book(&self, id: BookId) -> Option<&dyn EvaluationWorkbook> {
        self.books.get(usize::from(id)).map(|(_, wb)| wb.as_ref())
    }

    /* ─────────────── contexts ─────────────── */

    pub fn open_context(&self) -> EvalContext {
        self.registry.open_context()
    }

    pub fn detector_for(&self, ctx: &EvalContext) -> Arc<CycleDetector> {
        self.registry.detector_for(ctx)
    }

    /// Force-clear the context's active set.
    pub fn reset_cycle_state(&self, ctx: &EvalContext) {
        self.registry.reset(ctx);
    }

    /* ─────────────── evaluation ─────────────── */

    /// Value of `cell` in the primary workbook.
    ///
    /// Never panics on bad input: lookup failures, cycles and malformed
    /// formulas all come back as error values.
    pub fn evaluate(&self, ctx: &EvalContext, cell: SheetCell) -> LiteralValue {
        self.evaluate_book(ctx, 0, cell)
    }

    /// Value of `cell` in the workbook registered as `book`.
    pub fn evaluate_in(&self, ctx: &EvalContext, book: &str, cell: SheetCell) -> LiteralValue {
        match self.book_id(book) {
            Some(id) => self.evaluate_book(ctx, id, cell),
            None => LiteralValue::Error(LookupError::UnknownWorkbook(book.to_string()).into()),
        }
    }

    fn evaluate_book(&self, ctx: &EvalContext, book: BookId, cell: SheetCell) -> LiteralValue {
        let _span = tracing::info_span!(
            "evaluate",
            context = ctx.id().as_u64(),
            book,
            cell = %cell
        )
        .entered();

        let detector = self.registry.detector_for(ctx);
        let active_before = detector.len();
        let session = Session::new(self, &detector);
        let value = session.evaluate_cell(book, cell);
        debug_assert_eq!(detector.len(), active_before, "active set leaked past evaluate");
        value
    }

    /* ─────────────── cache ─────────────── */

    /// Drop every cached formula result. Call after the workbook's cell
    /// contents change.
    pub fn clear_cached_results(&self) {
        tracing::debug!(entries = self.cache.len(), "clearing result cache");
        self.cache.clear();
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    pub(crate) fn cached(&self, key: &EvalKey) -> Option<LiteralValue> {
        self.cache.get(key).map(|v| v.value().clone())
    }

    pub(crate) fn store(&self, key: EvalKey, value: LiteralValue) {
        self.cache.insert(key, value);
    }
}
