use std::sync::Arc;

use sheetcalc_common::{ExcelErrorKind, LiteralValue, RefCoord};

use crate::evaluator::{EvalConfig, WorkbookEvaluator};
use crate::test_workbook::{TestWorkbook, cell};
use crate::token::{ExternSheetIndex, Reference, Token};

/// Route evaluator logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn evaluator(wb: TestWorkbook) -> WorkbookEvaluator {
    WorkbookEvaluator::new("Book1", Arc::new(wb))
}

pub fn evaluator_with(wb: TestWorkbook, config: EvalConfig) -> WorkbookEvaluator {
    WorkbookEvaluator::with_config("Book1", Arc::new(wb), config)
}

/// Evaluate `a1` on the first sheet in a fresh context.
pub fn run(wb: TestWorkbook, a1: &str) -> LiteralValue {
    let ev = evaluator(wb);
    let ctx = ev.open_context();
    ev.evaluate(&ctx, cell(0, a1))
}

fn coord(a1: &str) -> RefCoord {
    let c = cell(0, a1);
    RefCoord::absolute(c.row, c.col)
}

/// `$A$1` on the formula's own sheet.
pub fn r(a1: &str) -> Token {
    Token::Ref(Reference::Cell(coord(a1)))
}

/// `$A$1:$B$2` on the formula's own sheet.
pub fn rng(first: &str, last: &str) -> Token {
    Token::Ref(Reference::Area {
        first: coord(first),
        last: coord(last),
    })
}

/// `Sheet!$A$1` through extern-sheet entry `extern_sheet`.
pub fn r3d(extern_sheet: ExternSheetIndex, a1: &str) -> Token {
    Token::Ref(Reference::Cell3d {
        extern_sheet,
        coord: coord(a1),
    })
}

pub fn rng3d(extern_sheet: ExternSheetIndex, first: &str, last: &str) -> Token {
    Token::Ref(Reference::Area3d {
        extern_sheet,
        first: coord(first),
        last: coord(last),
    })
}

pub fn n(x: f64) -> Token {
    Token::Number(x)
}

#[track_caller]
pub fn assert_number(v: &LiteralValue, expected: f64) {
    match v {
        LiteralValue::Number(n) => assert!(
            (n - expected).abs() < 1e-9,
            "expected {expected}, got {n}"
        ),
        other => panic!("expected number {expected}, got {other:?}"),
    }
}

#[track_caller]
pub fn assert_error(v: &LiteralValue, kind: ExcelErrorKind) {
    match v {
        LiteralValue::Error(e) => assert_eq!(e.kind, kind, "unexpected error {e}"),
        other => panic!("expected {kind}, got {other:?}"),
    }
}
