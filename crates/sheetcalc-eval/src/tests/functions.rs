use sheetcalc_common::{ExcelErrorKind, LiteralValue};

use super::common::*;
use crate::test_workbook::{TestWorkbook, cell};
use crate::token::Token;

/// A1:A5 = 1, "two", TRUE, <blank>, 4
fn data() -> TestWorkbook {
    TestWorkbook::new()
        .with_value("Sheet1", "A1", 1.0)
        .with_value("Sheet1", "A2", "two")
        .with_value("Sheet1", "A3", true)
        .with_value("Sheet1", "A5", 4.0)
}

fn call(wb: TestWorkbook, mut args: Vec<Token>, name: &str) -> LiteralValue {
    let argc = args.len();
    args.push(Token::func(name, argc));
    run(wb.with_formula("Sheet1", "C1", args), "C1")
}

fn data_range() -> Token {
    rng("A1", "A5")
}

#[test]
fn aggregates_skip_non_numbers_in_references() {
    assert_number(&call(data(), vec![data_range()], "SUM"), 5.0);
    assert_number(&call(data(), vec![data_range()], "PRODUCT"), 4.0);
    assert_number(&call(data(), vec![data_range()], "AVERAGE"), 2.5);
    assert_number(&call(data(), vec![data_range()], "MIN"), 1.0);
    assert_number(&call(data(), vec![data_range()], "MAX"), 4.0);
    assert_number(&call(data(), vec![data_range()], "COUNT"), 2.0);
    assert_number(&call(data(), vec![data_range()], "COUNTA"), 4.0);
}

#[test]
fn direct_arguments_are_coerced() {
    assert_number(
        &call(data(), vec![n(1.0), Token::text("2"), Token::Bool(true)], "SUM"),
        4.0,
    );
    assert_error(
        &call(data(), vec![n(1.0), Token::text("abc")], "SUM"),
        ExcelErrorKind::Value,
    );
    assert_number(
        &call(data(), vec![n(1.0), Token::text("abc"), Token::text("3")], "COUNT"),
        2.0,
    );
}

#[test]
fn first_error_in_range_propagates() {
    let wb = data()
        .with_value("Sheet1", "A4", LiteralValue::from(ExcelErrorKind::Na))
        .with_value("Sheet1", "A6", LiteralValue::from(ExcelErrorKind::Div));
    assert_error(
        &call(wb.clone(), vec![rng("A1", "A6")], "SUM"),
        ExcelErrorKind::Na,
    );
    // COUNT skips errors instead.
    assert_number(&call(wb, vec![rng("A1", "A6")], "COUNT"), 2.0);
}

#[test]
fn empty_aggregates() {
    let empty = || TestWorkbook::new().with_sheet("Sheet1");
    assert_number(&call(empty(), vec![rng("A1", "A3")], "SUM"), 0.0);
    assert_number(&call(empty(), vec![rng("A1", "A3")], "MAX"), 0.0);
    assert_number(&call(empty(), vec![rng("A1", "A3")], "PRODUCT"), 0.0);
    assert_error(
        &call(empty(), vec![rng("A1", "A3")], "AVERAGE"),
        ExcelErrorKind::Div,
    );
}

#[test]
fn logical_functions() {
    assert_eq!(
        call(data(), vec![Token::Bool(true), n(1.0)], "AND"),
        LiteralValue::Boolean(true)
    );
    assert_eq!(
        call(data(), vec![Token::Bool(true), n(0.0)], "AND"),
        LiteralValue::Boolean(false)
    );
    assert_eq!(
        call(data(), vec![n(0.0), Token::text("TRUE")], "OR"),
        LiteralValue::Boolean(true)
    );
    // Text in references is ignored; A1 = 1 and A3 = TRUE remain.
    assert_eq!(
        call(data(), vec![data_range()], "AND"),
        LiteralValue::Boolean(true)
    );
    assert_error(&call(data(), vec![rng("A2", "A2")], "OR"), ExcelErrorKind::Value);
    assert_eq!(
        call(data(), vec![Token::Bool(false)], "NOT"),
        LiteralValue::Boolean(true)
    );
    assert_eq!(call(data(), vec![], "TRUE"), LiteralValue::Boolean(true));
    assert_eq!(call(data(), vec![], "FALSE"), LiteralValue::Boolean(false));
}

#[test]
fn if_and_iferror() {
    assert_number(&call(data(), vec![Token::Bool(false), n(1.0), n(2.0)], "IF"), 2.0);
    assert_eq!(
        call(data(), vec![n(0.0), n(1.0)], "IF"),
        LiteralValue::Boolean(false)
    );
    // =IF(TRUE,,2): omitted branch reads as 0 in the cell.
    assert_number(
        &call(data(), vec![Token::Bool(true), Token::Missing, n(2.0)], "IF"),
        0.0,
    );
    assert_error(
        &call(data(), vec![Token::text("maybe"), n(1.0), n(2.0)], "IF"),
        ExcelErrorKind::Value,
    );
    assert_number(
        &call(data(), vec![Token::Error(ExcelErrorKind::Ref), n(9.0)], "IFERROR"),
        9.0,
    );
    assert_eq!(
        call(data(), vec![r("A2"), n(9.0)], "IFERROR"),
        LiteralValue::from("two")
    );
}

#[test]
fn info_functions() {
    let is = |args: Vec<Token>, name: &str| call(data(), args, name);
    assert_eq!(is(vec![r("A4")], "ISBLANK"), LiteralValue::Boolean(true));
    assert_eq!(is(vec![r("A1")], "ISBLANK"), LiteralValue::Boolean(false));
    assert_eq!(is(vec![r("A1")], "ISNUMBER"), LiteralValue::Boolean(true));
    assert_eq!(is(vec![r("A2")], "ISTEXT"), LiteralValue::Boolean(true));
    assert_eq!(is(vec![r("A3")], "ISTEXT"), LiteralValue::Boolean(false));
    assert_eq!(
        is(vec![n(1.0), n(0.0), Token::Binary(crate::token::BinaryOp::Div)], "ISERROR"),
        LiteralValue::Boolean(true)
    );
}

#[test]
fn function_names_are_case_insensitive() {
    let wb = data().with_formula("Sheet1", "C1", vec![data_range(), Token::func("sum", 1)]);
    let ev = evaluator(wb);
    let ctx = ev.open_context();
    assert_number(&ev.evaluate(&ctx, cell(0, "C1")), 5.0);
}
