use std::sync::Arc;

use sheetcalc_common::{ExcelError, LiteralValue};

use super::utils::value_error;
use crate::traits::{ArgumentHandle, Function, FunctionContext};

/// Shared by AND/OR: feed every logical value the arguments carry to `f`.
///
/// Text and blanks inside references are ignored; text given directly must
/// read as TRUE/FALSE. Errors propagate. No logical value at all is
/// `#VALUE!`.
fn for_each_logical<F>(args: &[ArgumentHandle<'_, '_>], mut f: F) -> Result<(), ExcelError>
where
    F: FnMut(bool),
{
    let mut seen = false;
    for arg in args {
        if arg.is_missing() {
            continue;
        }
        if arg.is_reference() {
            for v in arg.iter_values()? {
                match v {
                    LiteralValue::Boolean(b) => f(b),
                    LiteralValue::Number(n) => f(n != 0.0),
                    LiteralValue::Error(e) => return Err(e),
                    _ => continue,
                }
                seen = true;
            }
        } else {
            f(arg.value().to_bool()?);
            seen = true;
        }
    }
    if !seen {
        return Err(value_error("no logical values"));
    }
    Ok(())
}

/* ─────────────────────────── TRUE() / FALSE() ───────────────────── */

#[derive(Debug)]
pub struct TrueFn;

impl Function for TrueFn {
    fn name(&self) -> &'static str {
        "TRUE"
    }
    fn eval(
        &self,
        _args: &[ArgumentHandle<'_, '_>],
        _ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(true))
    }
}

#[derive(Debug)]
pub struct FalseFn;

impl Function for FalseFn {
    fn name(&self) -> &'static str {
        "FALSE"
    }
    fn eval(
        &self,
        _args: &[ArgumentHandle<'_, '_>],
        _ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(false))
    }
}

/* ─────────────────────────── AND() / OR() ───────────────────────── */

#[derive(Debug)]
pub struct AndFn;

impl Function for AndFn {
    fn name(&self) -> &'static str {
        "AND"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_, '_>],
        _ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let mut all = true;
        for_each_logical(args, |b| all &= b)?;
        Ok(LiteralValue::Boolean(all))
    }
}

#[derive(Debug)]
pub struct OrFn;

impl Function for OrFn {
    fn name(&self) -> &'static str {
        "OR"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_, '_>],
        _ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        let mut any = false;
        for_each_logical(args, |b| any |= b)?;
        Ok(LiteralValue::Boolean(any))
    }
}

/* ─────────────────────────── NOT() ──────────────────────────────── */

#[derive(Debug)]
pub struct NotFn;

impl Function for NotFn {
    fn name(&self) -> &'static str {
        "NOT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_, '_>],
        _ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        Ok(LiteralValue::Boolean(!args[0].value().to_bool()?))
    }
}

/* ─────────────────────────── IF() ───────────────────────────────── */

/// Only the chosen branch is looked at, so a reference in the other branch
/// is never evaluated.
#[derive(Debug)]
pub struct IfFn;

impl Function for IfFn {
    fn name(&self) -> &'static str {
        "IF"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn max_args(&self) -> usize {
        3
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_, '_>],
        _ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        if args[0].value().to_bool()? {
            Ok(args[1].value())
        } else if let Some(otherwise) = args.get(2) {
            Ok(otherwise.value())
        } else {
            Ok(LiteralValue::Boolean(false))
        }
    }
}

/* ─────────────────────────── IFERROR() ──────────────────────────── */

#[derive(Debug)]
pub struct IfErrorFn;

impl Function for IfErrorFn {
    fn name(&self) -> &'static str {
        "IFERROR"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn eval(
        &self,
        args: &[ArgumentHandle<'_, '_>],
        _ctx: &FunctionContext,
    ) -> Result<LiteralValue, ExcelError> {
        match args[0].value() {
            LiteralValue::Error(_) => Ok(args[1].value()),
            v => Ok(v),
        }
    }
}

pub(crate) fn builtins() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(TrueFn),
        Arc::new(FalseFn),
        Arc::new(AndFn),
        Arc::new(OrFn),
        Arc::new(NotFn),
        Arc::new(IfFn),
        Arc::new(IfErrorFn),
    ]
}
