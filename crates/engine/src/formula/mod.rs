//! Constrained formula language: cell refs, single-range SUM, and
//! `+ - * /` arithmetic. Parsed to an AST and tree-walked — there is
//! no string-substitution or dynamic-evaluation path, so user-typed
//! cell content can never execute anything beyond arithmetic.

pub mod eval;
pub mod parser;

pub use eval::{evaluate, CellValues, FormulaResult};
pub use parser::{parse, Expr, Op};
