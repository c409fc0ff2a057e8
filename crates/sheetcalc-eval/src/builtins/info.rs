use std::sync::Arc;

use sheetcalc_common::{ExcelError, LiteralValue};

use crate::traits::{ArgumentHandle, Function, FunctionContext};

/// IS* predicates never fail: an error argument is just another value to
/// classify.
macro_rules! is_fn {
    ($ty:ident, $name:literal, $pred:expr) => {
        #[derive(Debug)]
        pub struct $ty;

        impl Function for $ty {
            fn name(&self) -> &'static str {
                $name
            }
            fn min_args(&self) -> usize {
                1
            }
            fn eval(
                &self,
                args: &[ArgumentHandle<'_, '_>],
                _ctx: &FunctionContext,
            ) -> Result<LiteralValue, ExcelError> {
                let pred: fn(&LiteralValue) -> bool = $pred;
                Ok(LiteralValue::Boolean(pred(&args[0].value())))
            }
        }
    };
}

is_fn!(IsBlankFn, "ISBLANK", |v| v.is_blank());
is_fn!(IsErrorFn, "ISERROR", |v| v.is_error());
is_fn!(IsNumberFn, "ISNUMBER", |v| matches!(v, LiteralValue::Number(_)));
is_fn!(IsTextFn, "ISTEXT", |v| matches!(v, LiteralValue::Text(_)));

pub(crate) fn builtins() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(IsBlankFn),
        Arc::new(IsErrorFn),
        Arc::new(IsNumberFn),
        Arc::new(IsTextFn),
    ]
}
