//! Lightweight in-memory workbook for unit and property tests.
//!
//! Sheets are created on first mention, in that order. Extern-sheet entries
//! remember sheet *names*, so removing a sheet leaves every entry that
//! pointed at it stale, which is exactly what a record-layer table looks
//! like after a sheet deletion.

use rustc_hash::FxHashMap;
use sheetcalc_common::{LiteralValue, SheetCell, SheetIndex};

use crate::lookup::{CellSource, EvaluationLookup, ExternalSheet, LookupError, NameDefinition};
use crate::token::{ExternSheetIndex, NameIndex, Token};

type V = LiteralValue;
type CellKey = (u32, u32); // 0-based (row, col)

#[derive(Debug, Clone)]
enum Content {
    Value(V),
    Formula(Vec<Token>),
}

#[derive(Debug, Clone)]
struct Sheet {
    name: String,
    cells: FxHashMap<CellKey, Content>,
}

#[derive(Debug, Clone)]
enum ExternEntry {
    Local { first: String, last: String },
    External { workbook: String, first: String, last: String },
}

#[derive(Debug, Clone)]
enum NameBody {
    Tokens(Vec<Token>),
    Text(String),
}

#[derive(Debug, Clone)]
struct DefinedName {
    text: String,
    scope: Option<String>,
    body: NameBody,
}

#[derive(Debug, Clone, Default)]
pub struct TestWorkbook {
    sheets: Vec<Sheet>,
    extern_sheets: Vec<ExternEntry>,
    names: Vec<Option<DefinedName>>,
    external_names: FxHashMap<(ExternSheetIndex, NameIndex), String>,
}

impl TestWorkbook {
    /* ─────────────── constructors ─────────────── */
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet<S: Into<String>>(mut self, name: S) -> Self {
        let name: String = name.into();
        self.sheet_mut(&name);
        self
    }

    /* ─────────────── cell helpers ─────────────── */
    pub fn with_value<T: Into<V>>(mut self, sheet: &str, a1: &str, v: T) -> Self {
        self.set_value(sheet, a1, v);
        self
    }

    pub fn with_formula(mut self, sheet: &str, a1: &str, tokens: Vec<Token>) -> Self {
        self.set_formula(sheet, a1, tokens);
        self
    }

    pub fn set_value<T: Into<V>>(&mut self, sheet: &str, a1: &str, v: T) {
        let key = parse_a1(a1);
        self.sheet_mut(sheet)
            .cells
            .insert(key, Content::Value(v.into()));
    }

    pub fn set_formula(&mut self, sheet: &str, a1: &str, tokens: Vec<Token>) {
        let key = parse_a1(a1);
        self.sheet_mut(sheet)
            .cells
            .insert(key, Content::Formula(tokens));
    }

    /// Delete a sheet; later sheets move down one index.
    pub fn remove_sheet(&mut self, name: &str) {
        self.sheets.retain(|s| !s.name.eq_ignore_ascii_case(name));
    }

    /* ─────────────── extern-sheet table ─────────────── */

    /// Entry `Sheet1` (first == last) or `Sheet1:Sheet3` in this workbook.
    pub fn with_local_extern(mut self, first: &str, last: &str) -> Self {
        self.extern_sheets.push(ExternEntry::Local {
            first: first.to_string(),
            last: last.to_string(),
        });
        self
    }

    /// Entry `[workbook]first:last`.
    pub fn with_external_extern(mut self, workbook: &str, first: &str, last: &str) -> Self {
        self.extern_sheets.push(ExternEntry::External {
            workbook: workbook.to_string(),
            first: first.to_string(),
            last: last.to_string(),
        });
        self
    }

    /* ─────────────── names ─────────────── */

    /// Workbook-scoped name. Indices are assigned in call order.
    pub fn with_name(self, text: &str, tokens: Vec<Token>) -> Self {
        self.push_name(text, None, NameBody::Tokens(tokens))
    }

    /// Name visible only from `sheet`.
    pub fn with_sheet_name(self, sheet: &str, text: &str, tokens: Vec<Token>) -> Self {
        self.push_name(text, Some(sheet.to_string()), NameBody::Tokens(tokens))
    }

    /// Name with no evaluable body.
    pub fn with_text_name(self, text: &str, literal: &str) -> Self {
        self.push_name(text, None, NameBody::Text(literal.to_string()))
    }

    pub fn remove_name(&mut self, index: NameIndex) {
        if let Some(slot) = self.names.get_mut(usize::from(index)) {
            *slot = None;
        }
    }

    pub fn with_external_name(
        mut self,
        sheet_ref_index: ExternSheetIndex,
        name_index: NameIndex,
        text: &str,
    ) -> Self {
        self.external_names
            .insert((sheet_ref_index, name_index), text.to_string());
        self
    }

    /* ─────────────── internals ─────────────── */

    fn push_name(mut self, text: &str, scope: Option<String>, body: NameBody) -> Self {
        self.names.push(Some(DefinedName {
            text: text.to_string(),
            scope,
            body,
        }));
        self
    }

    fn sheet_mut(&mut self, name: &str) -> &mut Sheet {
        let idx = match self.position(name) {
            Some(i) => i,
            None => {
                self.sheets.push(Sheet {
                    name: name.to_string(),
                    cells: FxHashMap::default(),
                });
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[idx]
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sheets
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    fn content(&self, cell: SheetCell) -> Option<&Content> {
        self.sheets
            .get(usize::from(cell.sheet))?
            .cells
            .get(&(cell.row, cell.col))
    }

    fn name(&self, index: NameIndex) -> Result<&DefinedName, LookupError> {
        self.names
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or(LookupError::StaleName(index))
    }
}

/// `SheetCell` for a plain A1 address. Panics on malformed input.
pub fn cell(sheet: SheetIndex, a1: &str) -> SheetCell {
    SheetCell::from_a1(sheet, a1).expect("bad A1 reference")
}

fn parse_a1(a1: &str) -> CellKey {
    let c = cell(0, a1);
    (c.row, c.col)
}

impl CellSource for TestWorkbook {
    fn tokens_for(&self, cell: SheetCell) -> Option<&[Token]> {
        match self.content(cell)? {
            Content::Formula(tokens) => Some(tokens.as_slice()),
            Content::Value(_) => None,
        }
    }

    fn raw_value_for(&self, cell: SheetCell) -> LiteralValue {
        match self.content(cell) {
            Some(Content::Value(v)) => v.clone(),
            _ => LiteralValue::Empty,
        }
    }

    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn sheet_name(&self, sheet: SheetIndex) -> Option<&str> {
        self.sheets.get(usize::from(sheet)).map(|s| s.name.as_str())
    }

    fn sheet_index_of(&self, name: &str) -> Option<SheetIndex> {
        self.position(name).and_then(|i| SheetIndex::try_from(i).ok())
    }
}

impl EvaluationLookup for TestWorkbook {
    fn extern_sheet(&self, index: ExternSheetIndex) -> Result<ExternalSheet, LookupError> {
        match self.extern_sheets.get(usize::from(index)) {
            Some(ExternEntry::Local { first, last }) => {
                let stale = || LookupError::StaleSheet(index);
                Ok(ExternalSheet::Local {
                    first: self.sheet_index_of(first).ok_or_else(stale)?,
                    last: self.sheet_index_of(last).ok_or_else(stale)?,
                })
            }
            Some(ExternEntry::External {
                workbook,
                first,
                last,
            }) => Ok(ExternalSheet::External {
                workbook: workbook.clone(),
                first: first.clone(),
                last: last.clone(),
            }),
            None => Err(LookupError::StaleSheet(index)),
        }
    }

    fn name_definition(&self, index: NameIndex) -> Result<NameDefinition<'_>, LookupError> {
        Ok(match &self.name(index)?.body {
            NameBody::Tokens(tokens) => NameDefinition::Tokens(tokens),
            NameBody::Text(text) => NameDefinition::Text(text),
        })
    }

    fn name_text_for(&self, index: NameIndex) -> Result<String, LookupError> {
        Ok(self.name(index)?.text.clone())
    }

    fn name_index_of(&self, text: &str, scope: Option<SheetIndex>) -> Option<NameIndex> {
        let scope_name = scope.and_then(|s| self.sheet_name(s));
        let find = |want: Option<&str>| {
            self.names.iter().position(|n| {
                n.as_ref().is_some_and(|n| {
                    n.text.eq_ignore_ascii_case(text)
                        && match (n.scope.as_deref(), want) {
                            (None, None) => true,
                            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                            _ => false,
                        }
                })
            })
        };
        scope_name
            .and_then(|s| find(Some(s)))
            .or_else(|| find(None))
            .and_then(|i| NameIndex::try_from(i).ok())
    }

    fn external_workbook_name_text_for(
        &self,
        sheet_ref_index: ExternSheetIndex,
        name_index: NameIndex,
    ) -> Result<String, LookupError> {
        self.external_names
            .get(&(sheet_ref_index, name_index))
            .cloned()
            .ok_or(LookupError::MissingExternalName {
                sheet_ref_index,
                name_index,
            })
    }
}
