use sheetcalc_common::{ExcelErrorKind, LiteralValue};

use super::common::*;
use crate::test_workbook::{TestWorkbook, cell};
use crate::token::{BinaryOp, Token};

fn add() -> Token {
    Token::Binary(BinaryOp::Add)
}

#[test]
fn two_cell_cycle_is_circular_and_leaves_no_residue() {
    init_tracing();
    let wb = TestWorkbook::new()
        .with_formula("Sheet1", "A1", vec![r("B1")])
        .with_formula("Sheet1", "B1", vec![r("A1")]);
    let ev = evaluator(wb);
    let ctx = ev.open_context();

    let a1 = ev.evaluate(&ctx, cell(0, "A1"));
    assert_error(&a1, ExcelErrorKind::Circ);
    assert!(ev.detector_for(&ctx).is_empty());

    // Entering from the other side gives the same answer.
    assert_error(&ev.evaluate(&ctx, cell(0, "B1")), ExcelErrorKind::Circ);
    assert!(ev.detector_for(&ctx).is_empty());
}

#[test]
fn self_reference() {
    let wb = TestWorkbook::new().with_formula("Sheet1", "A1", vec![r("A1"), n(1.0), add()]);
    assert_error(&run(wb, "A1"), ExcelErrorKind::Circ);
}

#[test]
fn acyclic_chain_is_not_flagged() {
    let wb = TestWorkbook::new()
        .with_formula("Sheet1", "A1", vec![r("B1")])
        .with_value("Sheet1", "B1", 5.0);
    assert_eq!(run(wb, "A1"), LiteralValue::Number(5.0));
}

#[test]
fn diamond_visits_shared_cell_twice_without_cycle() {
    // A1 = B1 + C1, B1 = D1, C1 = D1, D1 = 2*3
    let wb = TestWorkbook::new()
        .with_formula("Sheet1", "A1", vec![r("B1"), r("C1"), add()])
        .with_formula("Sheet1", "B1", vec![r("D1")])
        .with_formula("Sheet1", "C1", vec![r("D1")])
        .with_formula(
            "Sheet1",
            "D1",
            vec![n(2.0), n(3.0), Token::Binary(BinaryOp::Mul)],
        );
    assert_number(&run(wb, "A1"), 12.0);
}

#[test]
fn circular_results_are_not_cached() {
    let wb = TestWorkbook::new()
        .with_formula("Sheet1", "A1", vec![r("B1")])
        .with_formula("Sheet1", "B1", vec![r("A1")])
        .with_formula("Sheet1", "C1", vec![n(7.0)]);
    let ev = evaluator(wb);
    let ctx = ev.open_context();
    assert_error(&ev.evaluate(&ctx, cell(0, "A1")), ExcelErrorKind::Circ);
    assert_eq!(ev.cached_results(), 0);
    assert_number(&ev.evaluate(&ctx, cell(0, "C1")), 7.0);
    assert_eq!(ev.cached_results(), 1);
}

#[test]
fn iferror_absorbs_the_cycle_once() {
    // A1 = IFERROR(B1, -1), B1 = A1
    let wb = TestWorkbook::new()
        .with_formula(
            "Sheet1",
            "A1",
            vec![r("B1"), n(-1.0), Token::func("IFERROR", 2)],
        )
        .with_formula("Sheet1", "B1", vec![r("A1")]);
    assert_number(&run(wb, "A1"), -1.0);
}

#[test]
fn only_the_reentered_cell_of_a_range_is_tagged() {
    // A2 = B1, B1 = COUNTA(A1:A3), C1 = SUM(A1:A3)
    let wb = TestWorkbook::new()
        .with_value("Sheet1", "A1", 1.0)
        .with_formula("Sheet1", "A2", vec![r("B1")])
        .with_value("Sheet1", "A3", 3.0)
        .with_formula("Sheet1", "B1", vec![rng("A1", "A3"), Token::func("COUNTA", 1)])
        .with_formula("Sheet1", "C1", vec![rng("A1", "A3"), Token::func("SUM", 1)]);
    let ev = evaluator(wb);
    let ctx = ev.open_context();

    // Entered at B1: A2 re-enters B1 and is the one tagged #CIRC!. COUNTA
    // counts the error value, so B1 still sees three non-blank cells.
    assert_number(&ev.evaluate(&ctx, cell(0, "B1")), 3.0);
    // Entered at A2: this time A2 is the re-entered cell inside B1's range,
    // B1 is 3 and A2 copies it.
    assert_number(&ev.evaluate(&ctx, cell(0, "A2")), 3.0);
    // Entered at C1: A2 -> B1 -> A2 again, so SUM sees 1 + 3 + 3.
    assert_number(&ev.evaluate(&ctx, cell(0, "C1")), 7.0);
    // None of it is cached, so the answers don't depend on call order.
    assert_eq!(ev.cached_results(), 0);
}

#[test]
fn name_to_name_cycle() {
    // X = Y, Y = X, A1 = X
    let wb = TestWorkbook::new()
        .with_sheet("Sheet1")
        .with_name("X", vec![Token::name(1)])
        .with_name("Y", vec![Token::name(0)])
        .with_formula("Sheet1", "A1", vec![Token::name(0)]);
    assert_error(&run(wb, "A1"), ExcelErrorKind::Circ);
}

#[test]
fn cycle_through_name_and_cell() {
    // Total = A1, A1 = Total + 1
    let wb = TestWorkbook::new()
        .with_name("Total", vec![r("A1")])
        .with_formula("Sheet1", "A1", vec![Token::name(0), n(1.0), add()]);
    assert_error(&run(wb, "A1"), ExcelErrorKind::Circ);
}

#[test]
fn unused_if_branch_does_not_trip_detector() {
    // A1 = IF(TRUE, 1, A1)
    let wb = TestWorkbook::new().with_formula(
        "Sheet1",
        "A1",
        vec![Token::Bool(true), n(1.0), r("A1"), Token::func("IF", 3)],
    );
    assert_number(&run(wb, "A1"), 1.0);
}
