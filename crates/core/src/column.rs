//! The fixed grid column set.

use paygrid_engine::addressing::HeaderMap;
use serde::{Deserialize, Serialize};

/// The five grid columns, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    InvoiceNumber,
    Amount,
    Tax,
    Reference,
    Total,
}

pub const COLUMN_COUNT: usize = 5;

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::InvoiceNumber,
        Column::Amount,
        Column::Tax,
        Column::Reference,
        Column::Total,
    ];

    pub fn index(self) -> usize {
        match self {
            Column::InvoiceNumber => 0,
            Column::Amount => 1,
            Column::Tax => 2,
            Column::Reference => 3,
            Column::Total => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Column> {
        Column::ALL.get(index).copied()
    }

    /// Display label, also a formula header name.
    pub fn label(self) -> &'static str {
        match self {
            Column::InvoiceNumber => "Invoice Number",
            Column::Amount => "Amount",
            Column::Tax => "Tax",
            Column::Reference => "Reference",
            Column::Total => "Total",
        }
    }

    /// Snake-case field key, also accepted as a formula header name.
    pub fn key(self) -> &'static str {
        match self {
            Column::InvoiceNumber => "invoice_number",
            Column::Amount => "amount",
            Column::Tax => "tax",
            Column::Reference => "reference",
            Column::Total => "total",
        }
    }
}

/// Header map for the formula evaluator: both the display label and
/// the snake-case key of every column resolve to its index.
pub fn header_map() -> HeaderMap {
    let mut map = HeaderMap::new();
    for col in Column::ALL {
        map.insert(col.label().to_string(), col.index());
        map.insert(col.key().to_string(), col.index());
    }
    map
}
