//! Deferred resolution of reference operands.
//!
//! A reference token becomes a [`LazyReference`] when the stack machine
//! reaches it. Nothing is looked up at that point. The first consumer that
//! asks for a scalar, the full value list, or the shape triggers resolution;
//! the outcome is kept for the rest of the frame, so `SUM(A1:A9)+A1:A9` style
//! formulas never resolve the same token twice.

use once_cell::unsync::OnceCell;
use sheetcalc_common::{ExcelError, ExcelErrorKind, LiteralValue, RefCoord, SheetCell, SheetIndex};

use crate::cycle::{BookId, EvalKey};
use crate::interpreter::{Frame, Operand, Session, ValueIter};
use crate::lookup::{ExternalSheet, LookupError, NameDefinition};
use crate::token::{ExternSheetIndex, NameIndex, Reference};

/// A normalised rectangular block of cells, possibly spanning several sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    pub book: BookId,
    pub first_sheet: SheetIndex,
    pub last_sheet: SheetIndex,
    pub first_row: u32,
    pub last_row: u32,
    pub first_col: u32,
    pub last_col: u32,
}

impl Area {
    fn new(
        book: BookId,
        sheets: (SheetIndex, SheetIndex),
        a: (u32, u32),
        b: (u32, u32),
    ) -> Self {
        Self {
            book,
            first_sheet: sheets.0.min(sheets.1),
            last_sheet: sheets.0.max(sheets.1),
            first_row: a.0.min(b.0),
            last_row: a.0.max(b.0),
            first_col: a.1.min(b.1),
            last_col: a.1.max(b.1),
        }
    }

    pub fn sheets(&self) -> usize {
        usize::from(self.last_sheet - self.first_sheet) + 1
    }

    pub fn rows(&self) -> usize {
        (self.last_row - self.first_row) as usize + 1
    }

    pub fn cols(&self) -> usize {
        (self.last_col - self.first_col) as usize + 1
    }

    pub fn is_single_cell(&self) -> bool {
        self.sheets() == 1 && self.rows() == 1 && self.cols() == 1
    }

    /// Every cell, sheet-major then row-major.
    pub fn cells(&self) -> impl Iterator<Item = SheetCell> + '_ {
        (self.first_sheet..=self.last_sheet).flat_map(move |sheet| {
            (self.first_row..=self.last_row).flat_map(move |row| {
                (self.first_col..=self.last_col).map(move |col| SheetCell::new(sheet, row, col))
            })
        })
    }
}

/// What a reference turned out to point at.
#[derive(Debug)]
pub enum Target<'s> {
    Area(Area),
    /// The operand a defined name evaluated to. If that operand is itself a
    /// reference, its own target is already resolved and is never another
    /// name.
    Name(Box<Operand<'s>>),
}

pub struct LazyReference<'s> {
    reference: &'s Reference,
    frame: Frame,
    session: &'s Session<'s>,
    target: OnceCell<Result<Target<'s>, ExcelError>>,
    values: OnceCell<Vec<LiteralValue>>,
    single: OnceCell<LiteralValue>,
}

impl std::fmt::Debug for LazyReference<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyReference")
            .field("reference", self.reference)
            .field("frame", &self.frame)
            .field("resolved", &self.target.get().is_some())
            .finish()
    }
}

impl<'s> LazyReference<'s> {
    pub(crate) fn new(reference: &'s Reference, frame: Frame, session: &'s Session<'s>) -> Self {
        Self {
            reference,
            frame,
            session,
            target: OnceCell::new(),
            values: OnceCell::new(),
            single: OnceCell::new(),
        }
    }

    pub fn reference(&self) -> &Reference {
        self.reference
    }

    /// Resolve the reference (once) without evaluating any cell.
    pub fn target(&self) -> Result<&Target<'s>, ExcelError> {
        self.target
            .get_or_init(|| self.resolve())
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Scalar view with implicit intersection against the formula's cell.
    ///
    /// Only the intersected cell is evaluated.
    pub fn single_value(&self) -> LiteralValue {
        self.single
            .get_or_init(|| match self.target() {
                Ok(Target::Area(area)) => self.intersect(area),
                Ok(Target::Name(op)) => op.single_value(),
                Err(e) => LiteralValue::Error(e),
            })
            .clone()
    }

    /// All values in reference order: sheet ascending, then row, then column.
    pub fn values(&self) -> Result<&[LiteralValue], ExcelError> {
        match self.target()? {
            Target::Name(op) => op.values(),
            Target::Area(area) => Ok(self.values.get_or_init(|| {
                area.cells()
                    .map(|cell| self.session.evaluate_cell(area.book, cell))
                    .collect()
            })),
        }
    }

    /// Values in the same order as [`values`](Self::values), evaluated as
    /// the iterator advances. Reuses the collected list if one exists.
    ///
    /// Consumers that only fold over a range (SUM, COUNT, AND, …) use this so
    /// a whole-sheet reference never has to be held in memory at once.
    pub fn iter_values(&self) -> Result<ValueIter<'_>, ExcelError> {
        if let Some(values) = self.values.get() {
            return Ok(Box::new(values.iter().cloned()));
        }
        match self.target()? {
            Target::Name(op) => op.iter_values(),
            Target::Area(area) => {
                let session = self.session;
                Ok(Box::new(
                    area.cells()
                        .map(move |cell| session.evaluate_cell(area.book, cell)),
                ))
            }
        }
    }

    /// `(sheets, rows, cols)` after lookup.
    pub fn shape(&self) -> Result<(usize, usize, usize), ExcelError> {
        match self.target()? {
            Target::Area(area) => Ok((area.sheets(), area.rows(), area.cols())),
            Target::Name(op) => match op.as_ref() {
                Operand::Ref(inner) => inner.shape(),
                _ => Ok((1, 1, 1)),
            },
        }
    }

    fn intersect(&self, area: &Area) -> LiteralValue {
        let origin = self.frame.cell;
        let pick = if area.is_single_cell() {
            Some((area.first_row, area.first_col))
        } else if area.sheets() > 1 {
            None
        } else if area.rows() == 1 {
            (area.first_col..=area.last_col)
                .contains(&origin.col)
                .then_some((area.first_row, origin.col))
        } else if area.cols() == 1 {
            (area.first_row..=area.last_row)
                .contains(&origin.row)
                .then_some((origin.row, area.first_col))
        } else {
            None
        };
        match pick {
            Some((row, col)) => self
                .session
                .evaluate_cell(area.book, SheetCell::new(area.first_sheet, row, col)),
            None => LiteralValue::Error(
                ExcelError::new(ExcelErrorKind::Value)
                    .with_message("range does not intersect the formula's cell"),
            ),
        }
    }

    fn resolve(&self) -> Result<Target<'s>, ExcelError> {
        let frame = self.frame;
        let here = (frame.cell.sheet, frame.cell.sheet);
        let target = match *self.reference {
            Reference::Cell(coord) => {
                let at = self.coord(coord)?;
                Target::Area(Area::new(frame.book, here, at, at))
            }
            Reference::Area { first, last } => Target::Area(Area::new(
                frame.book,
                here,
                self.coord(first)?,
                self.coord(last)?,
            )),
            Reference::Cell3d {
                extern_sheet,
                coord,
            } => {
                let (book, sheets) = self.sheet_span(extern_sheet)?;
                let at = self.coord(coord)?;
                Target::Area(Area::new(book, sheets, at, at))
            }
            Reference::Area3d {
                extern_sheet,
                first,
                last,
            } => {
                let (book, sheets) = self.sheet_span(extern_sheet)?;
                Target::Area(Area::new(
                    book,
                    sheets,
                    self.coord(first)?,
                    self.coord(last)?,
                ))
            }
            Reference::Name { index } => self.evaluate_name(frame.book, index)?,
            Reference::ExternalName {
                sheet_ref_index,
                name_index,
            } => {
                let (book, index) = self.external_name(sheet_ref_index, name_index)?;
                self.evaluate_name(book, index)?
            }
        };
        Ok(target)
    }

    fn coord(&self, coord: RefCoord) -> Result<(u32, u32), ExcelError> {
        coord
            .resolve(self.frame.cell.row, self.frame.cell.col)
            .ok_or_else(|| {
                ExcelError::new(ExcelErrorKind::Ref).with_message("reference is off the grid")
            })
    }

    /// Sheets an extern-sheet entry covers, in the book that owns them.
    fn sheet_span(
        &self,
        index: ExternSheetIndex,
    ) -> Result<(BookId, (SheetIndex, SheetIndex)), ExcelError> {
        let wb = self.session.book(self.frame.book)?;
        let entry = wb.extern_sheet(index).inspect_err(log_lookup)?;
        match entry {
            ExternalSheet::Local { first, last } => {
                let count = wb.sheet_count();
                if usize::from(first) >= count || usize::from(last) >= count {
                    return Err(LookupError::StaleSheet(index).into());
                }
                Ok((self.frame.book, (first, last)))
            }
            ExternalSheet::External {
                workbook,
                first,
                last,
            } => {
                let book = self.session.book_id(&workbook)?;
                let other = self.session.book(book)?;
                let locate = |name: &str| {
                    other
                        .sheet_index_of(name)
                        .ok_or_else(|| LookupError::UnknownSheet(format!("[{workbook}]{name}")))
                };
                let span = (locate(&first)?, locate(&last)?);
                Ok((book, span))
            }
        }
    }

    /// Which book and name index an external-name token denotes.
    fn external_name(
        &self,
        sheet_ref_index: ExternSheetIndex,
        name_index: NameIndex,
    ) -> Result<(BookId, NameIndex), ExcelError> {
        let wb = self.session.book(self.frame.book)?;
        let text = wb
            .external_workbook_name_text_for(sheet_ref_index, name_index)
            .inspect_err(log_lookup)?;
        match wb.extern_sheet(sheet_ref_index).inspect_err(log_lookup)? {
            // Entry points back at this workbook.
            ExternalSheet::Local { first, .. } => {
                let index = wb
                    .name_index_of(&text, Some(first))
                    .ok_or(LookupError::UnknownName(text))?;
                Ok((self.frame.book, index))
            }
            ExternalSheet::External { workbook, .. } => {
                let book = self.session.book_id(&workbook)?;
                let index = self
                    .session
                    .book(book)?
                    .name_index_of(&text, None)
                    .ok_or_else(|| LookupError::UnknownName(format!("[{workbook}]{text}")))?;
                Ok((book, index))
            }
        }
    }

    /// Evaluate a defined name under its own guard.
    ///
    /// When the name evaluates to another reference, that reference is
    /// resolved before the guard is released, so `A = B`, `B = A` is caught
    /// here instead of bouncing between the two forever.
    fn evaluate_name(&self, book: BookId, index: NameIndex) -> Result<Target<'s>, ExcelError> {
        let session = self.session;
        let wb = session.book(book)?;
        let frame = Frame {
            book,
            cell: self.frame.cell,
        };
        let guarded = session.descend(
            EvalKey::name(book, index),
            || -> Result<Operand<'s>, ExcelError> {
                let tokens = match wb.name_definition(index).inspect_err(log_lookup)? {
                    NameDefinition::Tokens(tokens) if !tokens.is_empty() => tokens,
                    _ => {
                        let text = wb.name_text_for(index).unwrap_or_default();
                        return Err(ExcelError::new(ExcelErrorKind::Name)
                            .with_message(format!("name '{text}' has no formula")));
                    }
                };
                match session.run_tokens(frame, tokens)? {
                    Operand::Ref(inner) => {
                        inner.target()?;
                        Ok(inner.collapse())
                    }
                    other => Ok(other),
                }
            },
        );
        guarded?.map(|op| Target::Name(Box::new(op)))
    }

    /// A reference that resolved to a name is replaced by the operand that
    /// name produced, so chains of names stay one level deep.
    fn collapse(self) -> Operand<'s> {
        let LazyReference {
            reference,
            frame,
            session,
            target,
            values,
            single,
        } = self;
        match target.into_inner() {
            Some(Ok(Target::Name(op))) => *op,
            resolved => Operand::Ref(LazyReference {
                reference,
                frame,
                session,
                target: resolved.map(OnceCell::from).unwrap_or_default(),
                values,
                single,
            }),
        }
    }
}

fn log_lookup(err: &LookupError) {
    tracing::debug!(error = %err, "lookup failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_normalises_and_orders_cells() {
        let area = Area::new(0, (2, 0), (1, 1), (0, 0));
        assert_eq!((area.first_sheet, area.last_sheet), (0, 2));
        assert_eq!((area.sheets(), area.rows(), area.cols()), (3, 2, 2));
        let cells: Vec<_> = area.cells().collect();
        assert_eq!(cells.len(), 12);
        assert_eq!(cells[0], SheetCell::new(0, 0, 0));
        assert_eq!(cells[1], SheetCell::new(0, 0, 1));
        assert_eq!(cells[2], SheetCell::new(0, 1, 0));
        assert_eq!(cells[4], SheetCell::new(1, 0, 0));
        assert_eq!(cells[11], SheetCell::new(2, 1, 1));
    }

    #[test]
    fn single_cell_area() {
        let area = Area::new(1, (3, 3), (4, 2), (4, 2));
        assert!(area.is_single_cell());
        assert_eq!(area.cells().next(), Some(SheetCell::new(3, 4, 2)));
    }
}
