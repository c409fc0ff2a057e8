//! Parsed formula tokens, in postfix (RPN) order.
//!
//! The record layer hands these over already parsed; nothing in this crate
//! turns formula text into tokens. `=SUM(Sheet1:Sheet3!A1)+1` arrives as
//!
//! ```text
//! Ref(Cell3d { extern_sheet, coord }) Func { "SUM", 1 } Number(1) Binary(Add)
//! ```

use std::fmt;

use sheetcalc_common::{ExcelErrorKind, RefCoord};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index into the workbook's external-sheet table (3D references, external names).
pub type ExternSheetIndex = u16;
/// Index into the workbook's defined-name table.
pub type NameIndex = u16;

/// Every shape a reference operand can take.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// `A1` on the formula's own sheet.
    Cell(RefCoord),
    /// `Sheet2!A1` or `Sheet1:Sheet3!A1`, sheets resolved through the extern-sheet table.
    Cell3d {
        extern_sheet: ExternSheetIndex,
        coord: RefCoord,
    },
    /// `A1:B3` on the formula's own sheet.
    Area { first: RefCoord, last: RefCoord },
    /// `Sheet1:Sheet3!A1:B3`.
    Area3d {
        extern_sheet: ExternSheetIndex,
        first: RefCoord,
        last: RefCoord,
    },
    /// A defined name of this workbook.
    Name { index: NameIndex },
    /// A name defined in another workbook (or addressed through the extern table).
    ExternalName {
        sheet_ref_index: ExternSheetIndex,
        name_index: NameIndex,
    },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Percent,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        })
    }
}

/// One unit of a formula.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ExcelErrorKind),
    /// An omitted argument, as in `IF(A1,,2)`.
    Missing,
    Ref(Reference),
    Unary(UnaryOp),
    Binary(BinaryOp),
    Func { name: String, argc: usize },
    /// Grouping marker kept by some record formats; a no-op in RPN.
    Paren,
}

impl Token {
    pub fn func<S: Into<String>>(name: S, argc: usize) -> Self {
        Token::Func {
            name: name.into(),
            argc,
        }
    }

    pub fn text<S: Into<String>>(s: S) -> Self {
        Token::Text(s.into())
    }

    /// Absolute single-cell reference on the formula's own sheet.
    pub fn cell(row: u32, col: u32) -> Self {
        Token::Ref(Reference::Cell(RefCoord::absolute(row, col)))
    }

    /// Absolute area on the formula's own sheet.
    pub fn area(first: (u32, u32), last: (u32, u32)) -> Self {
        Token::Ref(Reference::Area {
            first: RefCoord::absolute(first.0, first.1),
            last: RefCoord::absolute(last.0, last.1),
        })
    }

    pub fn name(index: NameIndex) -> Self {
        Token::Ref(Reference::Name { index })
    }
}
