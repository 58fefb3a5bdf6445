// Formula evaluator - tree-walks parsed expressions against cell data

use serde::Serialize;

use super::parser::{parse, Expr, Op};
use crate::addressing::{CellRef, HeaderMap};

/// Read access to grid cells during evaluation. Out-of-range
/// coordinates return `None` and count as zero.
pub trait CellValues {
    fn cell_text(&self, row: usize, col: usize) -> Option<String>;

    /// Numeric view of a cell: blank, missing, or unparseable is 0.
    fn cell_number(&self, row: usize, col: usize) -> f64 {
        self.cell_text(row, col)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

/// Result of evaluating cell content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FormulaResult {
    Number(f64),
    /// Non-formula content, or a formula that failed to parse or
    /// evaluate — always the original text, never partial output.
    Text(String),
}

impl FormulaResult {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaResult::Number(n) => Some(*n),
            FormulaResult::Text(_) => None,
        }
    }
}

impl std::fmt::Display for FormulaResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormulaResult::Number(n) => write!(f, "{}", n),
            FormulaResult::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Evaluate cell content against grid values.
///
/// Text not starting with `=` comes back unchanged. Formulas that do
/// not fit the constrained grammar, or that produce a non-finite
/// number, come back as their original text — evaluation never panics
/// and never propagates an error to the caller.
///
/// `current_row` resolves row-less header references (e.g.
/// `=SUM(Amount:Total)` sums the current row across those columns).
pub fn evaluate(
    text: &str,
    values: &impl CellValues,
    headers: &HeaderMap,
    current_row: usize,
) -> FormulaResult {
    if !text.trim().starts_with('=') {
        return FormulaResult::Text(text.to_string());
    }

    let expr = match parse(text, headers) {
        Ok(expr) => expr,
        Err(_) => return FormulaResult::Text(text.to_string()),
    };

    let n = eval_expr(&expr, values, current_row);
    if n.is_finite() {
        FormulaResult::Number(n)
    } else {
        FormulaResult::Text(text.to_string())
    }
}

fn eval_expr(expr: &Expr, values: &impl CellValues, current_row: usize) -> f64 {
    match expr {
        Expr::Number(n) => *n,
        Expr::Ref(r) => values.cell_number(resolve_row(r, current_row), r.col),
        Expr::Sum(start, end) => {
            let (r1, r2) = (resolve_row(start, current_row), resolve_row(end, current_row));
            let (min_r, max_r) = (r1.min(r2), r1.max(r2));
            let (min_c, max_c) = (start.col.min(end.col), start.col.max(end.col));
            let mut sum = 0.0;
            for row in min_r..=max_r {
                for col in min_c..=max_c {
                    sum += values.cell_number(row, col);
                }
            }
            sum
        }
        Expr::BinaryOp { op, left, right } => {
            let l = eval_expr(left, values, current_row);
            let r = eval_expr(right, values, current_row);
            match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => l / r,
            }
        }
    }
}

fn resolve_row(r: &CellRef, current_row: usize) -> usize {
    r.row.unwrap_or(current_row)
}
