use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use crate::{ExcelError, ExcelErrorKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A scalar produced by evaluation or read from a plain cell.
///
/// `Empty` is the blank value: what a reference to an unpopulated cell
/// yields. It is distinct from `Number(0.0)` and from `Text("")` even though
/// arithmetic and concatenation coerce it to those.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Empty,
    Error(ExcelError),
}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LiteralValue::Number(n) => n.to_bits().hash(state),
            LiteralValue::Text(s) => s.hash(state),
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Empty => state.write_u8(0),
            LiteralValue::Error(e) => e.hash(state),
        }
    }
}

impl Eq for LiteralValue {}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::Text(s) => write!(f, "{s}"),
            LiteralValue::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            LiteralValue::Error(e) => write!(f, "{}", e.kind),
            LiteralValue::Empty => Ok(()),
        }
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Number(n)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Boolean(b)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::Text(s.to_string())
    }
}

impl From<String> for LiteralValue {
    fn from(s: String) -> Self {
        LiteralValue::Text(s)
    }
}

impl LiteralValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, LiteralValue::Empty)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LiteralValue::Error(_))
    }

    pub fn as_error(&self) -> Option<&ExcelError> {
        match self {
            LiteralValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Operator-style numeric coercion.
    ///
    /// Blank is 0, booleans are 1/0, text must parse as a number, errors
    /// propagate unchanged.
    pub fn to_number(&self) -> Result<f64, ExcelError> {
        match self {
            LiteralValue::Number(n) => Ok(*n),
            LiteralValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            LiteralValue::Empty => Ok(0.0),
            LiteralValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                ExcelError::new(ExcelErrorKind::Value)
                    .with_message(format!("Cannot convert '{s}' to number"))
            }),
            LiteralValue::Error(e) => Err(e.clone()),
        }
    }

    /// Text coercion used by `&` and text comparison.
    pub fn to_text(&self) -> Result<String, ExcelError> {
        match self {
            LiteralValue::Error(e) => Err(e.clone()),
            other => Ok(other.to_string()),
        }
    }

    /// Condition coercion used by `IF`/`AND`/`OR`/`NOT`.
    pub fn to_bool(&self) -> Result<bool, ExcelError> {
        match self {
            LiteralValue::Boolean(b) => Ok(*b),
            LiteralValue::Number(n) => Ok(*n != 0.0),
            LiteralValue::Empty => Ok(false),
            LiteralValue::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "TRUE" => Ok(true),
                "FALSE" => Ok(false),
                _ => Err(ExcelError::new(ExcelErrorKind::Value)
                    .with_message(format!("Cannot convert '{s}' to boolean"))),
            },
            LiteralValue::Error(e) => Err(e.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_coerces_but_stays_distinct() {
        let blank = LiteralValue::Empty;
        assert_eq!(blank.to_number().unwrap(), 0.0);
        assert_eq!(blank.to_text().unwrap(), "");
        assert_ne!(blank, LiteralValue::Number(0.0));
        assert_ne!(blank, LiteralValue::Text(String::new()));
    }

    #[test]
    fn text_to_number() {
        assert_eq!(LiteralValue::from(" 2.5 ").to_number().unwrap(), 2.5);
        let err = LiteralValue::from("abc").to_number().unwrap_err();
        assert_eq!(err.kind, ExcelErrorKind::Value);
    }

    #[test]
    fn errors_propagate_through_coercion() {
        let v = LiteralValue::from(ExcelErrorKind::Ref);
        assert_eq!(v.to_number().unwrap_err().kind, ExcelErrorKind::Ref);
        assert_eq!(v.to_bool().unwrap_err().kind, ExcelErrorKind::Ref);
        assert_eq!(v.to_string(), "#REF!");
    }
}
