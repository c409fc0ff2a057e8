//! Cell coordinates as they appear inside formula tokens and as evaluation
//! targets.
//!
//! * `RefCoord` is what a reference token carries: a row and a column, each
//!   either *absolute* (`$A$1`, an index) or *relative* (`A1`, an offset from
//!   the cell holding the formula).
//! * `SheetCell` is a fully resolved `(sheet, row, col)` address, zero-based.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rows per sheet (0-based indices run `0..MAX_ROWS`).
pub const MAX_ROWS: u32 = 1 << 20;
/// Columns per sheet (0-based indices run `0..MAX_COLS`).
pub const MAX_COLS: u32 = 1 << 14;

/// Index of a sheet inside one workbook, in tab order.
pub type SheetIndex = u16;

//------------------------------------------------------------------------------
// RefCoord
//------------------------------------------------------------------------------

/// One coordinate inside a reference token, plus absolute/relative flags.
///
/// * absolute components hold a zero-based index,
/// * relative components hold a signed offset from the formula's own cell.
///
/// `flags` is a 2-bit field: `bit0 = row_abs`, `bit1 = col_abs`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RefCoord {
    pub row: i32,
    pub col: i32,
    flags: u8,
}

impl RefCoord {
    #[inline]
    pub const fn new(row: i32, col: i32, row_abs: bool, col_abs: bool) -> Self {
        let flags = (row_abs as u8) | ((col_abs as u8) << 1);
        Self { row, col, flags }
    }

    /// `$C$5` style: both components are indices.
    #[inline]
    pub const fn absolute(row: u32, col: u32) -> Self {
        Self::new(row as i32, col as i32, true, true)
    }

    /// `R[drow]C[dcol]` style: both components are offsets.
    #[inline]
    pub const fn relative(drow: i32, dcol: i32) -> Self {
        Self::new(drow, dcol, false, false)
    }

    #[inline]
    pub const fn row_abs(self) -> bool {
        self.flags & 0b01 != 0
    }
    #[inline]
    pub const fn col_abs(self) -> bool {
        self.flags & 0b10 != 0
    }

    /// Resolve against the cell that holds the formula.
    ///
    /// Returns `None` when the result falls outside the grid, which the
    /// evaluator reports as `#REF!`.
    pub fn resolve(self, origin_row: u32, origin_col: u32) -> Option<(u32, u32)> {
        let row = if self.row_abs() {
            i64::from(self.row)
        } else {
            i64::from(origin_row) + i64::from(self.row)
        };
        let col = if self.col_abs() {
            i64::from(self.col)
        } else {
            i64::from(origin_col) + i64::from(self.col)
        };
        if !(0..i64::from(MAX_ROWS)).contains(&row) || !(0..i64::from(MAX_COLS)).contains(&col) {
            return None;
        }
        Some((row as u32, col as u32))
    }

    /// A1 rendering relative to `origin`, e.g. `$B3`.
    pub fn to_a1(self, origin_row: u32, origin_col: u32) -> String {
        match self.resolve(origin_row, origin_col) {
            Some((row, col)) => {
                let mut out = String::new();
                if self.col_abs() {
                    out.push('$');
                }
                out.push_str(&col_to_letters(col));
                if self.row_abs() {
                    out.push('$');
                }
                out.push_str(&(row + 1).to_string());
                out
            }
            None => "#REF!".to_string(),
        }
    }
}

//------------------------------------------------------------------------------
// SheetCell
//------------------------------------------------------------------------------

/// A resolved cell address inside one workbook.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SheetCell {
    pub sheet: SheetIndex,
    pub row: u32,
    pub col: u32,
}

impl SheetCell {
    #[inline]
    pub const fn new(sheet: SheetIndex, row: u32, col: u32) -> Self {
        Self { sheet, row, col }
    }

    /// Parse a plain `A1`-style address (no `$`, no sheet prefix).
    pub fn from_a1(sheet: SheetIndex, a1: &str) -> Option<Self> {
        let split = a1.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = a1.split_at(split);
        let col = letters_to_col(&letters.to_ascii_uppercase())?;
        let row: u32 = digits.parse().ok()?;
        if row == 0 || row > MAX_ROWS || col >= MAX_COLS {
            return None;
        }
        Some(Self::new(sheet, row - 1, col))
    }
}

impl fmt::Display for SheetCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // caller can map index->name if needed
        write!(f, "Sheet#{}!{}{}", self.sheet, col_to_letters(self.col), self.row + 1)
    }
}

// ---- helpers for column letter <-> index -------------------------------------

/// Convert `col` into spreadsheet letters (0-based => A, B, …, AA…).
pub fn col_to_letters(mut col: u32) -> String {
    let mut buf = Vec::with_capacity(3);
    loop {
        buf.push(b'A' + (col % 26) as u8);
        col /= 26;
        if col == 0 {
            break;
        }
        col -= 1; // letters are 1-based internally
    }
    buf.iter().rev().map(|&b| b as char).collect()
}

/// Convert letters (e.g. `"AA"`) back to a 0-based column index.
pub fn letters_to_col(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in s.bytes() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add((ch - b'A') as u32 + 1)?;
    }
    Some(col - 1)
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------
