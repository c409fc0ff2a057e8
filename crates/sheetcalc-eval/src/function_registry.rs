use crate::traits::Function;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Process-wide function table, keyed by upper-case name. Builtins are
/// loaded the first time the table is touched.
static REG: Lazy<DashMap<String, Arc<dyn Function>>> = Lazy::new(|| {
    let reg = DashMap::new();
    for f in crate::builtins::all() {
        reg.insert(f.name().to_ascii_uppercase(), f);
    }
    reg
});

/// Add (or replace) a function.
pub fn register(f: Arc<dyn Function>) {
    REG.insert(f.name().to_ascii_uppercase(), f);
}

/// Case-insensitive lookup.
pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    REG.get(name.to_ascii_uppercase().as_str())
        .map(|v| Arc::clone(v.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ArgumentHandle, FunctionContext};
    use sheetcalc_common::{ExcelError, LiteralValue};

    struct Answer;

    impl Function for Answer {
        fn name(&self) -> &'static str {
            "ANSWER"
        }
        fn eval(
            &self,
            _args: &[ArgumentHandle<'_, '_>],
            _ctx: &FunctionContext,
        ) -> Result<LiteralValue, ExcelError> {
            Ok(LiteralValue::Number(42.0))
        }
    }

    #[test]
    fn builtins_are_preloaded() {
        assert!(get("sum").is_some());
        assert!(get("IfError").is_some());
        assert!(get("NO_SUCH_FN").is_none());
    }

    #[test]
    fn custom_registration() {
        register(Arc::new(Answer));
        assert_eq!(get("answer").map(|f| f.name()), Some("ANSWER"));
    }
}
