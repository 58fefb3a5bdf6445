pub mod addressing;
pub mod formula;

pub use addressing::{col_to_letters, letters_to_col, parse_cell_ref, CellRef};
pub use formula::{evaluate, CellValues, FormulaResult};
