use sheetcalc_common::{ExcelError, ExcelErrorKind, LiteralValue};

use crate::traits::ArgumentHandle;

/// Walk the numbers an aggregate (SUM, AVERAGE, MIN, …) should see.
///
/// - Inside references only numbers count; text, booleans and blanks are
///   skipped.
/// - Arguments given directly are coerced: `"3"` and `TRUE` count, `"abc"`
///   is `#VALUE!`.
/// - Omitted arguments are skipped.
/// - The first error value, wherever it sits, is returned as the error.
pub fn for_each_number<F>(args: &[ArgumentHandle<'_, '_>], mut f: F) -> Result<(), ExcelError>
where
    F: FnMut(f64),
{
    for arg in args {
        if arg.is_missing() {
            continue;
        }
        if arg.is_reference() {
            for v in arg.iter_values()? {
                match v {
                    LiteralValue::Number(n) => f(n),
                    LiteralValue::Error(e) => return Err(e),
                    _ => {}
                }
            }
        } else {
            f(arg.value().to_number()?);
        }
    }
    Ok(())
}

pub fn value_error<S: Into<String>>(msg: S) -> ExcelError {
    ExcelError::new(ExcelErrorKind::Value).with_message(msg)
}
