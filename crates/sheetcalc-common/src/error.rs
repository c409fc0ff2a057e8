//! Spreadsheet error values.
//!
//! - **`ExcelErrorKind`** : the canonical set of error codes a cell can hold
//! - **`ErrorOrigin`**    : where the error was first produced (sheet/row/col)
//! - **`ExcelError`**     : kind + optional message + optional origin
//!
//! Errors here are *values*: a circular reference or a stale sheet index does
//! not abort evaluation, it becomes the result of the offending cell and then
//! propagates through whatever consumes it.

use std::{error::Error, fmt};

use crate::LiteralValue;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// All recognised error codes.
///
/// **Note:** names are CamelCase (idiomatic Rust) while `Display`
/// renders them exactly as a spreadsheet shows them (`#DIV/0!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExcelErrorKind {
    Null,
    Ref,
    Name,
    Value,
    Div,
    Na,
    Num,
    NImpl,
    Calc,
    Circ,
}

impl fmt::Display for ExcelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "#NULL!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Value => "#VALUE!",
            Self::Div => "#DIV/0!",
            Self::Na => "#N/A",
            Self::Num => "#NUM!",
            Self::NImpl => "#N/IMPL!",
            Self::Calc => "#CALC!",
            Self::Circ => "#CIRC!",
        })
    }
}

impl ExcelErrorKind {
    /// Parse the display form back into a kind. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "#null!" => Self::Null,
            "#ref!" => Self::Ref,
            "#name?" => Self::Name,
            "#value!" => Self::Value,
            "#div/0!" => Self::Div,
            "#n/a" => Self::Na,
            "#num!" => Self::Num,
            "#n/impl!" => Self::NImpl,
            "#calc!" => Self::Calc,
            "#circ!" => Self::Circ,
            _ => return None,
        })
    }
}

/// Location where an error first occurred.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorOrigin {
    pub sheet: Option<String>,
    pub row: u32,
    pub col: u32,
}

/// The single error struct the evaluator passes around.
///
/// * **kind**    – the mandatory error code
/// * **message** – optional human explanation (never part of equality with `&str`)
/// * **origin**  – optional location of the cell that produced it
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExcelError {
    pub kind: ExcelErrorKind,
    pub message: Option<String>,
    pub origin: Option<ErrorOrigin>,
}

impl From<ExcelErrorKind> for ExcelError {
    fn from(kind: ExcelErrorKind) -> Self {
        Self {
            kind,
            message: None,
            origin: None,
        }
    }
}

impl ExcelError {
    /// Basic constructor (no message, no origin).
    pub fn new(kind: ExcelErrorKind) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Attach the origin location. An existing origin is kept: the first
    /// cell to produce the error wins as it propagates outward.
    pub fn with_origin(mut self, sheet: Option<String>, row: u32, col: u32) -> Self {
        if self.origin.is_none() {
            self.origin = Some(ErrorOrigin { sheet, row, col });
        }
        self
    }

    pub fn is_circular(&self) -> bool {
        self.kind == ExcelErrorKind::Circ
    }
}

impl fmt::Display for ExcelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }

        if let Some(ref origin) = self.origin {
            match origin.sheet {
                Some(ref sheet) => write!(f, " [origin: {sheet}!R{}C{}]", origin.row, origin.col)?,
                None => write!(f, " [origin: R{}C{}]", origin.row, origin.col)?,
            }
        }
        Ok(())
    }
}

impl Error for ExcelError {}

impl From<ExcelError> for LiteralValue {
    fn from(error: ExcelError) -> Self {
        LiteralValue::Error(error)
    }
}

impl From<ExcelErrorKind> for LiteralValue {
    fn from(kind: ExcelErrorKind) -> Self {
        LiteralValue::Error(ExcelError::new(kind))
    }
}

impl PartialEq<str> for ExcelErrorKind {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl PartialEq<&str> for ExcelError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.to_string() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_spreadsheet_codes() {
        assert_eq!(ExcelErrorKind::Div.to_string(), "#DIV/0!");
        assert_eq!(ExcelErrorKind::Circ.to_string(), "#CIRC!");
        assert_eq!(ExcelErrorKind::parse("#ref!"), Some(ExcelErrorKind::Ref));
        assert_eq!(ExcelErrorKind::parse("#BOGUS"), None);
    }

    #[test]
    fn first_origin_wins() {
        let e = ExcelError::new(ExcelErrorKind::Ref)
            .with_message("sheet index 7 is stale")
            .with_origin(Some("Sheet1".into()), 0, 0)
            .with_origin(Some("Sheet2".into()), 4, 4);
        let origin = e.origin.clone().unwrap();
        assert_eq!(origin.sheet.as_deref(), Some("Sheet1"));
        assert_eq!(e.to_string(), "#REF!: sheet index 7 is stale [origin: Sheet1!R0C0]");
        assert!(e == "#REF!");
    }
}
