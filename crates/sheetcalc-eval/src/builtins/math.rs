use std::sync::Arc;

use sheetcalc_common::{ExcelError, ExcelErrorKind, LiteralValue};

use super::utils::for_each_number;
use crate::traits::{ArgumentHandle, Function, FunctionContext};

/* ─────────────────────────── SUM() ──────────────────────────────── */

#[derive(Debug)]
pub struct SumFn;

impl Function for SumFn {
    fn name(&self) -> &'static str {
        "SUM"
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
        let mut total = 0.0;
        for_each_number(args, |n| total += n)?;
        Ok(LiteralValue::Number(total))
    }
}

/* ─────────────────────────── PRODUCT() ──────────────────────────── */

#[derive(Debug)]
pub struct ProductFn;

impl Function for ProductFn {
    fn name(&self) -> &'static str {
        "PRODUCT"
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
        let mut product = 1.0;
        let mut seen = false;
        for_each_number(args, |n| {
            product *= n;
            seen = true;
        })?;
        // No numbers at all gives 0, not the empty product.
        Ok(LiteralValue::Number(if seen { product } else { 0.0 }))
    }
}

/* ─────────────────────────── AVERAGE() ──────────────────────────── */

#[derive(Debug)]
pub struct AverageFn;

impl Function for AverageFn {
    fn name(&self) -> &'static str {
        "AVERAGE"
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
        let (mut sum, mut count) = (0.0, 0usize);
        for_each_number(args, |n| {
            sum += n;
            count += 1;
        })?;
        if count == 0 {
            return Err(ExcelError::new(ExcelErrorKind::Div)
                .with_message("AVERAGE of no numbers"));
        }
        Ok(LiteralValue::Number(sum / count as f64))
    }
}

/* ─────────────────────────── MIN() / MAX() ──────────────────────── */

#[derive(Debug)]
pub struct MinFn;

impl Function for MinFn {
    fn name(&self) -> &'static str {
        "MIN"
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
        let mut best: Option<f64> = None;
        for_each_number(args, |n| best = Some(best.map_or(n, |b| b.min(n))))?;
        Ok(LiteralValue::Number(best.unwrap_or(0.0)))
    }
}

#[derive(Debug)]
pub struct MaxFn;

impl Function for MaxFn {
    fn name(&self) -> &'static str {
        "MAX"
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
        let mut best: Option<f64> = None;
        for_each_number(args, |n| best = Some(best.map_or(n, |b| b.max(n))))?;
        Ok(LiteralValue::Number(best.unwrap_or(0.0)))
    }
}

/* ─────────────────────────── COUNT() ────────────────────────────── */

/// Counts numbers. Errors are counted out, not propagated.
#[derive(Debug)]
pub struct CountFn;

impl Function for CountFn {
    fn name(&self) -> &'static str {
        "COUNT"
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
        let mut count = 0usize;
        for arg in args {
            if arg.is_missing() {
                continue;
            }
            if arg.is_reference() {
                // An unresolvable reference contributes nothing.
                let Ok(values) = arg.iter_values() else { continue };
                count += values
                    .filter(|v| matches!(v, LiteralValue::Number(_)))
                    .count();
            } else if arg.value().to_number().is_ok() {
                count += 1;
            }
        }
        Ok(LiteralValue::Number(count as f64))
    }
}

/* ─────────────────────────── COUNTA() ───────────────────────────── */

#[derive(Debug)]
pub struct CountAFn;

impl Function for CountAFn {
    fn name(&self) -> &'static str {
        "COUNTA"
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
        let mut count = 0usize;
        for arg in args {
            if arg.is_missing() {
                continue;
            }
            match arg.iter_values() {
                Ok(values) => count += values.filter(|v| !v.is_blank()).count(),
                // The #REF! itself is a value.
                Err(_) => count += 1,
            }
        }
        Ok(LiteralValue::Number(count as f64))
    }
}

pub(crate) fn builtins() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(SumFn),
        Arc::new(ProductFn),
        Arc::new(AverageFn),
        Arc::new(MinFn),
        Arc::new(MaxFn),
        Arc::new(CountFn),
        Arc::new(CountAFn),
    ]
}
