use sheetcalc_common::{ExcelError, LiteralValue, SheetCell};

use crate::cycle::BookId;
use crate::interpreter::{Operand, ValueIter};

/* ───────────────────────────── Arguments ───────────────────────────── */

/// A function argument as the stack machine produced it.
///
/// Reference arguments are still lazy: nothing behind them has been
/// evaluated until `value()`, `values()` or `iter_values()` is called.
pub struct ArgumentHandle<'a, 's> {
    operand: &'a Operand<'s>,
}

impl<'a, 's> ArgumentHandle<'a, 's> {
    pub(crate) fn new(operand: &'a Operand<'s>) -> Self {
        Self { operand }
    }

    /// Scalar view (implicit intersection for references).
    pub fn value(&self) -> LiteralValue {
        self.operand.single_value()
    }

    /// Every value covered, flattened in reference order. A scalar argument
    /// yields itself; an omitted one yields nothing.
    pub fn values(&self) -> Result<&'a [LiteralValue], ExcelError> {
        let operand: &'a Operand<'s> = self.operand;
        operand.values()
    }

    /// Every value covered, evaluated lazily as the iterator advances.
    pub fn iter_values(&self) -> Result<ValueIter<'a>, ExcelError> {
        let operand: &'a Operand<'s> = self.operand;
        operand.iter_values()
    }

    /// `(sheets, rows, cols)`. Resolves a reference without evaluating the
    /// cells behind it; a scalar is `(1, 1, 1)`.
    pub fn shape(&self) -> Result<(usize, usize, usize), ExcelError> {
        match self.operand {
            Operand::Ref(r) => r.shape(),
            _ => Ok((1, 1, 1)),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.operand.is_reference()
    }

    pub fn is_missing(&self) -> bool {
        matches!(self.operand, Operand::Missing)
    }
}

/// Where the calling formula lives.
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext {
    pub book: BookId,
    pub cell: SheetCell,
}

/* ───────────────────────────── Functions ───────────────────────────── */

/// Spreadsheet-callable function. **Object-safe**.
///
/// Returning `Err(e)` is the same as returning `Ok(LiteralValue::Error(e))`.
pub trait Function: Send + Sync + 'static {
    /// Upper-case name the function is registered under.
    fn name(&self) -> &'static str;
    fn min_args(&self) -> usize {
        0
    }
    fn variadic(&self) -> bool {
        false
    }
    fn max_args(&self) -> usize {
        if self.variadic() {
            usize::MAX
        } else {
            self.min_args()
        }
    }

    fn eval(
        &self,
        args: &[ArgumentHandle<'_, '_>],
        ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError>;
}
