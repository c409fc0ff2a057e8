//! Builtin spreadsheet functions, loaded into the function registry on first
//! use.

use std::sync::Arc;

use crate::traits::Function;

pub mod info;
pub mod logical;
pub mod math;
pub mod utils;

pub(crate) fn all() -> Vec<Arc<dyn Function>> {
    let mut out = Vec::new();
    out.extend(math::builtins());
    out.extend(logical::builtins());
    out.extend(info::builtins());
    out
}
