//! On-demand evaluation of parsed spreadsheet formulas.
//!
//! A [`WorkbookEvaluator`] walks postfix token sequences supplied by a
//! record layer, resolving references lazily and guarding every formula
//! cell and defined name against circular evaluation. Each caller evaluates
//! inside its own [`EvalContext`], so concurrent evaluations never share
//! cycle state.

pub mod builtins;
pub mod cycle;
pub mod evaluator;
pub mod function_registry;
pub mod interpreter;
pub mod lazy;
pub mod lookup;
pub mod registry;
pub mod token;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_workbook;

pub use cycle::{BookId, CircularReference, CycleDetector, EvalGuard, EvalKey};
pub use evaluator::{EvalConfig, WorkbookEvaluator};
pub use lookup::{
    CellSource, EvaluationLookup, EvaluationWorkbook, ExternalSheet, LookupError, NameDefinition,
};
pub use registry::{ContextId, DetectorRegistry, EvalContext};
pub use token::{BinaryOp, Reference, Token, UnaryOp};
pub use traits::{ArgumentHandle, Function, FunctionContext};

pub use sheetcalc_common::{ExcelError, ExcelErrorKind, LiteralValue, RefCoord, SheetCell};

#[cfg(test)]
mod tests;
