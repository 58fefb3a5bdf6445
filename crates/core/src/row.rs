//! One ledger line item and its local edit state.

use serde::{Deserialize, Serialize};

use crate::column::Column;

/// Local identity of a row within the editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocalId {
    /// Never persisted this session (a "new" row).
    #[default]
    Unsaved,
    /// Loaded from the remote store at position `n` of the fetch.
    Loaded(usize),
    /// Created by the sync protocol during this session.
    Synced(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
}

/// One invoice line item. All grid fields are kept as entered text;
/// numeric interpretation happens at the edges (totals, persistence).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub local_id: LocalId,
    /// Remote record id once persisted; drives update-vs-create.
    pub remote_id: Option<String>,
    pub invoice_number: String,
    pub amount: String,
    pub tax: String,
    /// Server-calculated tax amount shown in the Reference column.
    pub reference: String,
    pub total: String,
    pub status: RowStatus,
    pub invoice_date: String,
    pub due_date: String,
    pub payment_date: String,
    /// Invoice number as last seen on the remote store. The arbiter
    /// for "invoice number changed" checks and cascade updates.
    pub loaded_invoice: Option<String>,
    /// True when any field was edited locally since load/sync.
    pub dirty: bool,
}

/// Parse a grid field as a number, treating blank or unparseable
/// content as 0.
pub fn field_num(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(0.0)
}

impl Row {
    pub fn empty() -> Row {
        Row::default()
    }

    pub fn is_new(&self) -> bool {
        matches!(self.local_id, LocalId::Unsaved)
    }

    /// A blank row carries nothing worth persisting: no invoice
    /// number, and neither amount nor total parse as a number.
    pub fn is_blank(&self) -> bool {
        let has_invoice = !self.invoice_number.trim().is_empty();
        let has_amount = !self.amount.trim().is_empty() && self.amount.trim().parse::<f64>().is_ok();
        let has_total = !self.total.trim().is_empty() && self.total.trim().parse::<f64>().is_ok();
        !has_invoice && !has_amount && !has_total
    }

    /// Did the user change the invoice number since it was loaded?
    /// Always false for rows that were never loaded.
    pub fn invoice_changed(&self) -> bool {
        match &self.loaded_invoice {
            Some(loaded) => loaded.trim() != self.invoice_number.trim(),
            None => false,
        }
    }

    pub fn field(&self, col: Column) -> &str {
        match col {
            Column::InvoiceNumber => &self.invoice_number,
            Column::Amount => &self.amount,
            Column::Tax => &self.tax,
            Column::Reference => &self.reference,
            Column::Total => &self.total,
        }
    }

    pub fn set_field(&mut self, col: Column, value: String) {
        let slot = match col {
            Column::InvoiceNumber => &mut self.invoice_number,
            Column::Amount => &mut self.amount,
            Column::Tax => &mut self.tax,
            Column::Reference => &mut self.reference,
            Column::Total => &mut self.total,
        };
        *slot = value;
    }

    /// Recompute `total = amount + tax` from local field text.
    pub fn recompute_total(&mut self) {
        let total = field_num(&self.amount) + field_num(&self.tax);
        self.total = format_num(total);
    }
}

/// Format a total the way the grid displays numbers: integral values
/// without a trailing ".0".
pub fn format_num(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
