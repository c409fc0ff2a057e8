//! The postfix stack machine and the per-call evaluation session.

use std::cell::Cell;
use std::cmp::Ordering;

use smallvec::SmallVec;
use sheetcalc_common::{ExcelError, ExcelErrorKind, LiteralValue, SheetCell};

use crate::cycle::{BookId, CycleDetector, EvalKey};
use crate::evaluator::WorkbookEvaluator;
use crate::function_registry;
use crate::lazy::LazyReference;
use crate::lookup::{EvaluationWorkbook, LookupError};
use crate::token::{BinaryOp, Token, UnaryOp};
use crate::traits::{ArgumentHandle, FunctionContext};

/// Headroom left on the native stack before a nested evaluation switches to
/// a freshly allocated segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 2 * 1024 * 1024;

/// Where a token sequence is being evaluated: relative references and
/// implicit intersection are taken against `cell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub book: BookId,
    pub cell: SheetCell,
}

/// Values produced on demand, in reference order.
pub type ValueIter<'a> = Box<dyn Iterator<Item = LiteralValue> + 'a>;

/// One entry on the evaluation stack.
#[derive(Debug)]
pub enum Operand<'s> {
    Value(LiteralValue),
    Ref(LazyReference<'s>),
    /// An omitted function argument.
    Missing,
}

impl Operand<'_> {
    /// Scalar view. References go through implicit intersection; a missing
    /// argument reads as blank.
    pub fn single_value(&self) -> LiteralValue {
        match self {
            Operand::Value(v) => v.clone(),
            Operand::Ref(r) => r.single_value(),
            Operand::Missing => LiteralValue::Empty,
        }
    }

    /// Every value the operand covers, in reference order.
    pub fn values(&self) -> Result<&[LiteralValue], ExcelError> {
        match self {
            Operand::Value(v) => Ok(std::slice::from_ref(v)),
            Operand::Ref(r) => r.values(),
            Operand::Missing => Ok(&[]),
        }
    }

    /// Like [`values`](Self::values), but cells behind a reference are
    /// evaluated one at a time as the iterator is advanced and nothing is
    /// collected.
    pub fn iter_values(&self) -> Result<ValueIter<'_>, ExcelError> {
        match self {
            Operand::Value(v) => Ok(Box::new(std::iter::once(v.clone()))),
            Operand::Ref(r) => r.iter_values(),
            Operand::Missing => Ok(Box::new(std::iter::empty())),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Operand::Ref(_))
    }
}

/// State for one top-level `evaluate` call inside one context.
pub(crate) struct Session<'s> {
    evaluator: &'s WorkbookEvaluator,
    detector: &'s CycleDetector,
    depth: Cell<usize>,
    /// Bumped whenever a result below the current cell was cut short by a
    /// cycle or the depth bound. Results computed while it moved are not
    /// cached.
    incomplete: Cell<u64>,
}

impl<'s> Session<'s> {
    pub(crate) fn new(evaluator: &'s WorkbookEvaluator, detector: &'s CycleDetector) -> Self {
        Self {
            evaluator,
            detector,
            depth: Cell::new(0),
            incomplete: Cell::new(0),
        }
    }

    pub(crate) fn book(&self, book: BookId) -> Result<&'s dyn EvaluationWorkbook, ExcelError> {
        self.evaluator.book(book).ok_or_else(|| {
            ExcelError::new(ExcelErrorKind::Ref).with_message(format!("no workbook #{book}"))
        })
    }

    pub(crate) fn book_id(&self, name: &str) -> Result<BookId, ExcelError> {
        self.evaluator
            .book_id(name)
            .ok_or_else(|| LookupError::UnknownWorkbook(name.to_string()).into())
    }

    pub(crate) fn mark_incomplete(&self) {
        self.incomplete.set(self.incomplete.get() + 1);
    }

    /// Value of one cell: the raw value for plain cells, the guarded
    /// evaluation of its tokens for formula cells.
    pub(crate) fn evaluate_cell(&'s self, book: BookId, cell: SheetCell) -> LiteralValue {
        let wb = match self.book(book) {
            Ok(wb) => wb,
            Err(e) => return LiteralValue::Error(e),
        };
        let Some(tokens) = wb.tokens_for(cell) else {
            return wb.raw_value_for(cell);
        };

        let key = EvalKey::cell(book, cell);
        let config = self.evaluator.config();
        if config.cache_results {
            if let Some(hit) = self.evaluator.cached(&key) {
                return hit;
            }
        }

        tracing::trace!(%key, depth = self.depth.get(), "evaluating cell");
        let before = self.incomplete.get();
        let frame = Frame { book, cell };
        let value = match self.descend(key, || self.evaluate_formula(frame, tokens)) {
            Ok(value) => value,
            Err(e) => return LiteralValue::Error(e),
        };
        if config.cache_results && self.incomplete.get() == before {
            self.evaluator.store(key, value.clone());
        }
        value
    }

    /// Run `body` one nesting level deeper with `key` active.
    ///
    /// Fails with `#CALC!` past `max_depth` and with `#CIRC!` if `key` is
    /// already active; either way the session is marked incomplete. The
    /// native stack is grown on demand, so the depth bound is the only limit
    /// on chain length.
    pub(crate) fn descend<T>(
        &self,
        key: EvalKey,
        body: impl FnOnce() -> T,
    ) -> Result<T, ExcelError> {
        let depth = self.depth.get();
        let max_depth = self.evaluator.config().max_depth;
        if depth >= max_depth {
            tracing::debug!(%key, depth, "evaluation depth limit reached");
            self.mark_incomplete();
            return Err(ExcelError::new(ExcelErrorKind::Calc)
                .with_message(format!("nesting deeper than {max_depth} levels")));
        }

        self.depth.set(depth + 1);
        let outcome = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.detector.guard_evaluation(key, body)
        });
        self.depth.set(depth);

        outcome.map_err(|cycle| {
            self.mark_incomplete();
            cycle.into()
        })
    }

    fn evaluate_formula(&'s self, frame: Frame, tokens: &'s [Token]) -> LiteralValue {
        let value = match self.run_tokens(frame, tokens) {
            Ok(op) => op.single_value(),
            Err(e) => LiteralValue::Error(e),
        };
        match value {
            // A formula cell never reads as blank.
            LiteralValue::Empty => LiteralValue::Number(0.0),
            LiteralValue::Error(e) => {
                let sheet = self
                    .book(frame.book)
                    .ok()
                    .and_then(|wb| wb.sheet_name(frame.cell.sheet))
                    .map(str::to_string);
                LiteralValue::Error(e.with_origin(sheet, frame.cell.row, frame.cell.col))
            }
            other => other,
        }
    }

    /// Run a postfix token sequence to a single operand.
    pub(crate) fn run_tokens(
        &'s self,
        frame: Frame,
        tokens: &'s [Token],
    ) -> Result<Operand<'s>, ExcelError> {
        let mut stack: Vec<Operand<'s>> = Vec::with_capacity(tokens.len());
        for token in tokens {
            let operand = match token {
                Token::Number(n) => Operand::Value(LiteralValue::Number(*n)),
                Token::Text(s) => Operand::Value(LiteralValue::Text(s.clone())),
                Token::Bool(b) => Operand::Value(LiteralValue::Boolean(*b)),
                Token::Error(kind) => Operand::Value(LiteralValue::Error(ExcelError::new(*kind))),
                Token::Missing => Operand::Missing,
                Token::Ref(reference) => Operand::Ref(LazyReference::new(reference, frame, self)),
                Token::Paren => continue,
                Token::Unary(op) => {
                    let arg = pop(&mut stack, token)?;
                    Operand::Value(unary(*op, arg.single_value()))
                }
                Token::Binary(op) => {
                    let rhs = pop(&mut stack, token)?;
                    let lhs = pop(&mut stack, token)?;
                    Operand::Value(binary(*op, lhs.single_value(), rhs.single_value()))
                }
                Token::Func { name, argc } => {
                    if stack.len() < *argc {
                        return Err(malformed(format!(
                            "{name} expects {argc} operands, stack holds {}",
                            stack.len()
                        )));
                    }
                    let args: SmallVec<[Operand<'s>; 4]> =
                        stack.drain(stack.len() - argc..).collect();
                    Operand::Value(self.call_function(frame, name, &args))
                }
            };
            stack.push(operand);
        }
        match (stack.pop(), stack.is_empty()) {
            (Some(result), true) => Ok(result),
            (None, _) => Err(malformed("empty formula".to_string())),
            (Some(_), false) => Err(malformed(format!(
                "{} operands left on the stack",
                stack.len() + 1
            ))),
        }
    }

    fn call_function(&'s self, frame: Frame, name: &str, args: &[Operand<'s>]) -> LiteralValue {
        let Some(fun) = function_registry::get(name) else {
            return LiteralValue::Error(
                ExcelError::new(ExcelErrorKind::Name)
                    .with_message(format!("unknown function {name}")),
            );
        };
        if args.len() < fun.min_args() || args.len() > fun.max_args() {
            return LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value).with_message(
                format!("{} does not take {} arguments", fun.name(), args.len()),
            ));
        }
        let handles: SmallVec<[ArgumentHandle<'_, 's>; 4]> =
            args.iter().map(ArgumentHandle::new).collect();
        let ctx = FunctionContext {
            book: frame.book,
            cell: frame.cell,
        };
        fun.eval(&handles, &ctx).unwrap_or_else(LiteralValue::Error)
    }
}

fn malformed(msg: String) -> ExcelError {
    ExcelError::new(ExcelErrorKind::Value).with_message(format!("malformed formula: {msg}"))
}

fn pop<'s>(stack: &mut Vec<Operand<'s>>, token: &Token) -> Result<Operand<'s>, ExcelError> {
    stack
        .pop()
        .ok_or_else(|| malformed(format!("stack underflow at {token:?}")))
}

/* ─────────────────────────── operators ──────────────────────────── */

fn number_result(n: f64) -> LiteralValue {
    if n.is_finite() {
        LiteralValue::Number(n)
    } else {
        LiteralValue::Error(ExcelError::new(ExcelErrorKind::Num))
    }
}

pub(crate) fn unary(op: UnaryOp, v: LiteralValue) -> LiteralValue {
    if op == UnaryOp::Plus {
        // Unary plus leaves its operand untouched.
        return match v {
            LiteralValue::Empty => LiteralValue::Number(0.0),
            other => other,
        };
    }
    let n = match v.to_number() {
        Ok(n) => n,
        Err(e) => return LiteralValue::Error(e),
    };
    match op {
        UnaryOp::Percent => number_result(n / 100.0),
        _ => number_result(-n),
    }
}

pub(crate) fn binary(op: BinaryOp, lhs: LiteralValue, rhs: LiteralValue) -> LiteralValue {
    if let LiteralValue::Error(e) = lhs {
        return LiteralValue::Error(e);
    }
    if let LiteralValue::Error(e) = rhs {
        return LiteralValue::Error(e);
    }

    if op.is_comparison() {
        let ord = compare(&lhs, &rhs);
        return LiteralValue::Boolean(match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::Ne => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        });
    }

    if op == BinaryOp::Concat {
        return match (lhs.to_text(), rhs.to_text()) {
            (Ok(a), Ok(b)) => LiteralValue::Text(a + &b),
            (Err(e), _) | (_, Err(e)) => LiteralValue::Error(e),
        };
    }

    let (a, b) = match (lhs.to_number(), rhs.to_number()) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return LiteralValue::Error(e),
    };
    match op {
        BinaryOp::Add => number_result(a + b),
        BinaryOp::Sub => number_result(a - b),
        BinaryOp::Mul => number_result(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                LiteralValue::Error(ExcelError::new(ExcelErrorKind::Div))
            } else {
                number_result(a / b)
            }
        }
        BinaryOp::Pow => {
            if a < 0.0 && b.fract() != 0.0 {
                LiteralValue::Error(ExcelError::new(ExcelErrorKind::Num))
            } else {
                number_result(a.powf(b))
            }
        }
        _ => LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value)),
    }
}

/// Spreadsheet ordering: numbers < text < booleans. Text compares
/// case-insensitively. Blank takes on the type of the other side.
fn compare(lhs: &LiteralValue, rhs: &LiteralValue) -> Ordering {
    use LiteralValue::*;

    fn rank(v: &LiteralValue) -> u8 {
        match v {
            Number(_) | Empty => 0,
            Text(_) => 1,
            Boolean(_) => 2,
            Error(_) => 3,
        }
    }

    match (lhs, rhs) {
        (Empty, Empty) => Ordering::Equal,
        (Number(a), Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Number(a), Empty) => a.partial_cmp(&0.0).unwrap_or(Ordering::Equal),
        (Empty, Number(b)) => 0.0f64.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Text(a), Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Text(a), Empty) => a.as_str().cmp(""),
        (Empty, Text(b)) => "".cmp(b.as_str()),
        (Boolean(a), Boolean(b)) => a.cmp(b),
        (Boolean(a), Empty) => a.cmp(&false),
        (Empty, Boolean(b)) => false.cmp(b),
        (a, b) => rank(a).cmp(&rank(b)),
    }
}
