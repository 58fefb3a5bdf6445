//! Grid session: selection, keyboard navigation, clipboard, and row
//! add/remove with selection repair.
//!
//! One session per edited entry, owned by the caller — no global
//! state, so multiple grids (and tests) coexist.

use paygrid_engine::addressing::HeaderMap;
use paygrid_engine::formula::{evaluate, CellValues, FormulaResult};

use crate::column::{header_map, Column, COLUMN_COUNT};
use crate::ledger::Ledger;
use crate::row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    /// Advance one column, wrapping to column 0 of the next row.
    Tab,
    /// Mirror of Tab: back one column, wrapping to the last column of
    /// the previous row.
    TabReverse,
    /// Down one row, same column (no wrap).
    Enter,
    /// Up one row, same column (no wrap).
    EnterReverse,
}

/// The single active cell, always within grid bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub row: usize,
    pub col: usize,
}

/// Single-cell clipboard. A cut remembers its source so a later paste
/// becomes a move.
#[derive(Debug, Clone, Default)]
struct Clipboard {
    value: Option<String>,
    cut_from: Option<(usize, usize)>,
}

pub struct GridSession {
    pub ledger: Ledger,
    selection: Selection,
    clipboard: Clipboard,
    headers: HeaderMap,
}

impl Default for GridSession {
    fn default() -> Self {
        GridSession::new()
    }
}

impl GridSession {
    pub fn new() -> GridSession {
        GridSession {
            ledger: Ledger::new(),
            selection: Selection { row: 0, col: 0 },
            clipboard: Clipboard::default(),
            headers: header_map(),
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn row_count(&self) -> usize {
        self.ledger.row_count()
    }

    pub fn col_count(&self) -> usize {
        COLUMN_COUNT
    }

    pub fn has_clipboard(&self) -> bool {
        self.clipboard.value.is_some()
    }

    pub fn cell_text(&self, row: usize, col: usize) -> String {
        match (self.ledger.rows().get(row), Column::from_index(col)) {
            (Some(r), Some(c)) => r.field(c).to_string(),
            _ => String::new(),
        }
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: &str) {
        if let Some(c) = Column::from_index(col) {
            self.ledger.update_cell(row, c, value);
        }
    }

    /// Clamp both coordinates into bounds; out-of-range requests never
    /// fail, they land on the nearest valid cell.
    pub fn select_cell(&mut self, row: usize, col: usize) {
        self.selection = Selection {
            row: row.min(self.ledger.row_count().saturating_sub(1)),
            col: col.min(COLUMN_COUNT - 1),
        };
    }

    pub fn move_selection(&mut self, direction: Direction) {
        let Selection { row, col } = self.selection;
        match direction {
            Direction::Up => self.select_cell(row.saturating_sub(1), col),
            Direction::Down => self.select_cell(row + 1, col),
            Direction::Left => self.select_cell(row, col.saturating_sub(1)),
            Direction::Right => self.select_cell(row, col + 1),
            Direction::Tab => {
                if col < COLUMN_COUNT - 1 {
                    self.select_cell(row, col + 1);
                } else {
                    self.select_cell(row + 1, 0);
                }
            }
            Direction::TabReverse => {
                if col > 0 {
                    self.select_cell(row, col - 1);
                } else if row > 0 {
                    self.select_cell(row - 1, COLUMN_COUNT - 1);
                }
                // At (0, 0) there is nowhere to go
            }
            Direction::Enter => self.select_cell(row + 1, col),
            Direction::EnterReverse => self.select_cell(row.saturating_sub(1), col),
        }
    }

    /// Append an empty row and select its first cell.
    pub fn add_row(&mut self) {
        self.ledger.add_row(None);
        self.select_cell(self.ledger.row_count() - 1, 0);
    }

    /// Insert an empty row before `index`.
    pub fn insert_row_above(&mut self, index: usize) {
        self.ledger.add_row(Some(index));
    }

    /// Remove a row, keeping the grid non-empty and the selection on
    /// the nearest valid row at the same column.
    pub fn delete_row(&mut self, index: usize) {
        self.ledger.remove_row(index);
        if self.ledger.row_count() == 0 {
            self.ledger.add_row(None);
        }
        let row = index.min(self.ledger.row_count() - 1);
        self.select_cell(row, self.selection.col);
    }

    /// Restore the most recently deleted row.
    pub fn undo_delete(&mut self) {
        self.ledger.undo_delete();
        self.select_cell(self.selection.row, self.selection.col);
    }

    pub fn copy(&mut self) {
        let Selection { row, col } = self.selection;
        self.clipboard = Clipboard {
            value: Some(self.cell_text(row, col)),
            cut_from: None,
        };
    }

    pub fn cut(&mut self) {
        let Selection { row, col } = self.selection;
        self.clipboard = Clipboard {
            value: Some(self.cell_text(row, col)),
            cut_from: Some((row, col)),
        };
    }

    /// Paste into the selected cell. After a cut, the source cell is
    /// cleared and the clipboard consumed (a move); after a copy, the
    /// clipboard stays for repeated pastes.
    pub fn paste(&mut self) {
        let Some(value) = self.clipboard.value.clone() else {
            return;
        };
        let Selection { row, col } = self.selection;
        self.set_cell(row, col, &value);
        if let Some((src_row, src_col)) = self.clipboard.cut_from.take() {
            if (src_row, src_col) != (row, col) {
                self.set_cell(src_row, src_col, "");
            }
            self.clipboard = Clipboard::default();
        }
    }

    pub fn clear_cell(&mut self) {
        let Selection { row, col } = self.selection;
        self.set_cell(row, col, "");
    }

    /// Grow the grid by typing: when the selection sits on the last
    /// row, append an empty row so Enter navigation has somewhere to
    /// land.
    pub fn ensure_row_for_enter(&mut self) {
        if self.selection.row + 1 == self.ledger.row_count() {
            self.ledger.add_row(None);
        }
    }

    /// Evaluate cell content against the grid. Row-less header refs
    /// resolve to the selected row.
    pub fn evaluate(&self, text: &str) -> FormulaResult {
        let cells = RowCells(self.ledger.rows());
        evaluate(text, &cells, &self.headers, self.selection.row)
    }
}

/// Cell accessor over the ledger rows for the formula evaluator.
struct RowCells<'a>(&'a [Row]);

impl CellValues for RowCells<'_> {
    fn cell_text(&self, row: usize, col: usize) -> Option<String> {
        let r = self.0.get(row)?;
        let c = Column::from_index(col)?;
        Some(r.field(c).to_string())
    }
}
