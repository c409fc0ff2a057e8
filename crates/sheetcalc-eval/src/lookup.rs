//! The read-only view of a workbook that the evaluator consumes.
//!
//! Two layers, composed into one super-trait:
//!
//! * [`CellSource`] – cell contents: token sequences for formula cells, raw
//!   values for everything else, sheet names and order.
//! * [`EvaluationLookup`] – the identifier facade: turns the integer indices
//!   stored inside tokens (extern-sheet, name, external-name) into semantic
//!   sheets and names.
//!
//! Implementations must not be structurally mutated (sheets added, removed or
//! renamed) while an evaluation is in flight. Nothing here can check that.

use sheetcalc_common::{ExcelError, ExcelErrorKind, LiteralValue, SheetCell, SheetIndex};

use crate::token::{ExternSheetIndex, NameIndex, Token};

/// Why an identifier could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("extern sheet index {0} does not refer to a live sheet")]
    StaleSheet(ExternSheetIndex),
    #[error("sheet '{0}' does not exist")]
    UnknownSheet(String),
    #[error("name index {0} is stale")]
    StaleName(NameIndex),
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("no external name entry for sheet ref {sheet_ref_index}, name {name_index}")]
    MissingExternalName {
        sheet_ref_index: ExternSheetIndex,
        name_index: NameIndex,
    },
    #[error("external workbook '{0}' is not loaded")]
    UnknownWorkbook(String),
}

impl From<LookupError> for ExcelError {
    fn from(err: LookupError) -> Self {
        let kind = match &err {
            LookupError::StaleName(_) | LookupError::UnknownName(_) => ExcelErrorKind::Name,
            _ => ExcelErrorKind::Ref,
        };
        ExcelError::new(kind).with_message(err.to_string())
    }
}

/// One row of the extern-sheet table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalSheet {
    /// Sheets of this workbook, `first..=last` by index. `first > last` is
    /// allowed and normalised by the evaluator.
    Local { first: SheetIndex, last: SheetIndex },
    /// Sheets of another workbook, by name.
    External {
        workbook: String,
        first: String,
        last: String,
    },
}

/// What a defined name stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NameDefinition<'a> {
    /// Formula-like names: `Data = Sheet1!$A$1:$A$9`.
    Tokens(&'a [Token]),
    /// Names with no evaluable body (macro names, literal text).
    Text(&'a str),
}

pub trait CellSource: Send + Sync {
    /// Token sequence of a formula cell, `None` for anything else.
    fn tokens_for(&self, cell: SheetCell) -> Option<&[Token]>;

    /// Value of a non-formula cell. Unpopulated cells are `LiteralValue::Empty`.
    fn raw_value_for(&self, cell: SheetCell) -> LiteralValue;

    fn sheet_count(&self) -> usize;

    fn sheet_name(&self, sheet: SheetIndex) -> Option<&str>;

    /// Case-insensitive.
    fn sheet_index_of(&self, name: &str) -> Option<SheetIndex>;
}

pub trait EvaluationLookup: CellSource {
    fn extern_sheet(&self, index: ExternSheetIndex) -> Result<ExternalSheet, LookupError>;

    fn name_definition(&self, index: NameIndex) -> Result<NameDefinition<'_>, LookupError>;

    /// Literal text of a defined name.
    fn name_text_for(&self, index: NameIndex) -> Result<String, LookupError>;

    /// Sheet-scoped names shadow workbook-scoped ones.
    fn name_index_of(&self, text: &str, scope: Option<SheetIndex>) -> Option<NameIndex>;

    fn external_workbook_name_text_for(
        &self,
        sheet_ref_index: ExternSheetIndex,
        name_index: NameIndex,
    ) -> Result<String, LookupError>;

    /// Display name for an extern-sheet entry: `Sheet1`, `Sheet1:Sheet3`, or
    /// `[Book2]Data`.
    fn sheet_name_for(&self, index: ExternSheetIndex) -> Result<String, LookupError> {
        match self.extern_sheet(index)? {
            ExternalSheet::Local { first, last } => {
                let lo = self
                    .sheet_name(first.min(last))
                    .ok_or(LookupError::StaleSheet(index))?;
                let hi = self
                    .sheet_name(first.max(last))
                    .ok_or(LookupError::StaleSheet(index))?;
                if first == last {
                    Ok(lo.to_string())
                } else {
                    Ok(format!("{lo}:{hi}"))
                }
            }
            ExternalSheet::External {
                workbook,
                first,
                last,
            } => {
                if first.eq_ignore_ascii_case(&last) {
                    Ok(format!("[{workbook}]{first}"))
                } else {
                    Ok(format!("[{workbook}]{first}:{last}"))
                }
            }
        }
    }
}

/// Everything the evaluator needs from one workbook.
pub trait EvaluationWorkbook: EvaluationLookup {}
impl<T> EvaluationWorkbook for T where T: EvaluationLookup + ?Sized {}
