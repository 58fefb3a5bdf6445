//! The row store: canonical row list, dirty tracking, pending deletes,
//! the undo-delete slot, and load-time reconciliation against the
//! remote store.

use serde_json::Value;

use crate::column::Column;
use crate::entry::{ChequeState, EntryHeader, EntryStatus, Vendor};
use crate::row::{field_num, LocalId, Row};
use crate::store::{
    field_f64, field_str, layouts, query, RecordStore, RecordWithId, StoreError,
};

/// Which side currently owns the entry total.
///
/// Local wins while the ledger is dirty or before any remote total has
/// loaded; the remote store's calculated total wins otherwise. The
/// dirty flag is the single arbiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TotalSource {
    Local(f64),
    Remote(f64),
}

impl TotalSource {
    pub fn value(self) -> f64 {
        match self {
            TotalSource::Local(n) | TotalSource::Remote(n) => n,
        }
    }
}

/// In-memory ledger for the current entry. Never holds zero rows.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub(crate) rows: Vec<Row>,
    pub(crate) dirty: bool,
    /// Remote ids to delete on next sync (rows the user removed).
    pub(crate) pending_deletes: Vec<String>,
    /// Single-slot undo buffer: most recently removed row + its index.
    pub(crate) last_deleted: Option<(Row, usize)>,
    pub header: EntryHeader,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new()
    }
}

impl Ledger {
    pub fn new() -> Ledger {
        Ledger {
            rows: vec![Row::empty()],
            dirty: false,
            pending_deletes: Vec::new(),
            last_deleted: None,
            header: EntryHeader::default(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn pending_deletes(&self) -> &[String] {
        &self.pending_deletes
    }

    pub fn has_undo_delete(&self) -> bool {
        self.last_deleted.is_some()
    }

    pub fn has_new_rows(&self) -> bool {
        self.rows.iter().any(|r| r.is_new())
    }

    /// Rows that carry data (excludes blank placeholder rows).
    pub fn filled_row_count(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_blank()).count()
    }

    /// Mutate one cell. Editing Amount or Tax recomputes the row total
    /// locally, discarding any server-calculated total until the next
    /// sync.
    pub fn update_cell(&mut self, row: usize, col: Column, value: &str) {
        let Some(r) = self.rows.get_mut(row) else {
            return;
        };
        r.set_field(col, value.to_string());
        r.dirty = true;
        if matches!(col, Column::Amount | Column::Tax) {
            r.recompute_total();
        }
        self.dirty = true;
    }

    /// Insert an empty row before `at`, or append when `at` is None or
    /// out of range.
    pub fn add_row(&mut self, at: Option<usize>) {
        self.dirty = true;
        match at {
            Some(i) if i < self.rows.len() => self.rows.insert(i, Row::empty()),
            _ => self.rows.push(Row::empty()),
        }
    }

    /// Remove a row, capturing it for undo. Persisted rows are queued
    /// for remote deletion on the next sync.
    pub fn remove_row(&mut self, index: usize) {
        if index >= self.rows.len() {
            return;
        }
        let row = self.rows.remove(index);
        if let Some(id) = &row.remote_id {
            self.pending_deletes.push(id.clone());
        }
        self.last_deleted = Some((row, index));
        self.dirty = true;
    }

    /// Restore the most recently removed row at its original index and
    /// cancel its pending remote deletion.
    pub fn undo_delete(&mut self) {
        let Some((row, index)) = self.last_deleted.take() else {
            return;
        };
        if let Some(id) = &row.remote_id {
            self.pending_deletes.retain(|d| d != id);
        }
        let at = index.min(self.rows.len());
        self.rows.insert(at, row);
    }

    /// Wholesale row replacement; resets edit state. An empty list
    /// becomes one blank row (the grid never has zero rows).
    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = if rows.is_empty() { vec![Row::empty()] } else { rows };
        self.dirty = false;
        self.pending_deletes.clear();
        self.last_deleted = None;
    }

    /// Reset everything, including the header. Used when switching
    /// entries.
    pub fn clear(&mut self) {
        self.set_rows(Vec::new());
        self.header = EntryHeader::default();
    }

    pub fn total_source(&self) -> TotalSource {
        match (self.dirty, self.header.remote_total) {
            (false, Some(remote)) => TotalSource::Remote(remote),
            _ => TotalSource::Local(self.local_total()),
        }
    }

    pub fn entry_total(&self) -> f64 {
        self.total_source().value()
    }

    /// Sum of row totals as currently displayed.
    pub(crate) fn local_total(&self) -> f64 {
        self.rows.iter().map(|r| field_num(&r.total)).sum()
    }

    /// Merge freshly fetched rows into the ledger without losing
    /// in-flight edits.
    ///
    /// Fetched rows are matched to local rows by remote id. On a match
    /// the local invoice number and amount survive (the user may be
    /// mid-edit) while the server-calculated fields — tax, reference,
    /// total — come from the fetch. Local rows with no remote id are
    /// appended after the reconciled set. The result is a clean
    /// (non-dirty) ledger.
    pub fn reconcile_fetched(&mut self, fetched: Vec<Row>) {
        let local = std::mem::take(&mut self.rows);

        let mut merged: Vec<Row> = fetched
            .into_iter()
            .map(|mut remote| {
                let existing = local.iter().find(|l| {
                    l.remote_id.is_some() && l.remote_id == remote.remote_id
                });
                if let Some(l) = existing {
                    remote.invoice_number = l.invoice_number.clone();
                    remote.amount = l.amount.clone();
                    remote.dirty = l.dirty;
                }
                remote
            })
            .collect();

        // Unsaved rows ride along; blank placeholders do not
        merged.extend(local.into_iter().filter(|r| {
            r.remote_id.as_deref().map_or(true, |id| id.trim().is_empty()) && !r.is_blank()
        }));

        self.set_rows(merged);
    }

    /// Load the entry identified by `trans_ref` from the remote store,
    /// reconciling its detail rows against in-flight local edits and
    /// refreshing the header state.
    pub fn load_entry(
        &mut self,
        store: &impl RecordStore,
        trans_ref: &str,
    ) -> Result<(), StoreError> {
        let trans_ref = trans_ref.trim();
        if trans_ref.is_empty() {
            self.clear();
            return Ok(());
        }
        if let Err(e) = self.fetch_entry(store, trans_ref) {
            // A failed load must not leave the previous entry's rows
            // or record id under the new reference
            self.clear();
            self.header.trans_ref = Some(trans_ref.to_string());
            return Err(e);
        }
        Ok(())
    }

    fn fetch_entry(
        &mut self,
        store: &impl RecordStore,
        trans_ref: &str,
    ) -> Result<(), StoreError> {
        self.header.trans_ref = Some(trans_ref.to_string());

        let q = query("TransRef", Value::String(trans_ref.to_string()));
        let details = store.find_with_ids(layouts::PAYABLES_DETAILS, &q, 500)?;
        let mains = store.find_with_ids(layouts::PAYABLES_MAIN, &q, 10)?;

        // Defensive exact-match filter: the store's find is exact, but
        // a stale layout can return near-matches.
        let fetched: Vec<Row> = details
            .iter()
            .filter(|d| {
                field_str(&d.fields, &["TransRef"]).as_deref() == Some(trans_ref)
            })
            .enumerate()
            .map(|(i, d)| row_from_detail(i, d))
            .collect();

        self.reconcile_fetched(fetched);

        let main = mains
            .iter()
            .find(|m| field_str(&m.fields, &["TransRef"]).as_deref() == Some(trans_ref));

        match main {
            Some(main) => {
                self.apply_main_record(main);
                // The list response omits calculated fields; read the
                // record back for the authoritative total and cheque
                // state.
                if let Some(fields) = store.get(layouts::PAYABLES_MAIN, &main.record_id)? {
                    self.header.remote_total = field_f64(&fields, &["Total"]);
                    self.header.cheque = ChequeState {
                        issued: field_str(&fields, &["ChequeIssued", "Cheque Issued"]),
                        issued_date: field_str(
                            &fields,
                            &["ChequeIssuedDate", "Cheque Issued Date"],
                        ),
                        bank_name: field_str(&fields, &["BankName", "Bank Name"]),
                        cheque_no: field_str(&fields, &["ChequeNo", "Cheque No"]),
                    };
                }
            }
            None => {
                self.header = EntryHeader {
                    trans_ref: Some(trans_ref.to_string()),
                    ..EntryHeader::default()
                };
            }
        }

        Ok(())
    }

    fn apply_main_record(&mut self, main: &RecordWithId) {
        let fields = &main.fields;
        self.header.record_id = Some(main.record_id.clone());
        self.header.posted =
            field_str(fields, &["Posted"]).as_deref() == Some("Yes");
        self.header.status =
            field_str(fields, &["Status"]).and_then(|s| EntryStatus::parse(&s));
        self.header.reject_reason = field_str(fields, &["RejectReason", "Reject Reason"]);
        self.header.vendor = Vendor {
            vendor_id: field_str(fields, &["VendorID", "Vendor ID"]).unwrap_or_default(),
            vendor_name: field_str(fields, &["VendorName", "Vendor Name"]).unwrap_or_default(),
            contact_email: field_str(fields, &["VendorEmail"]).unwrap_or_default(),
            currency: field_str(fields, &["Currency"]).unwrap_or_default(),
            date: field_str(fields, &["Date"]).unwrap_or_default(),
        };
    }
}

/// Map one fetched detail record to a row. The Reference column shows
/// the store's calculated `Tax Amount`, falling back to `Tax` when the
/// layout omits it.
fn row_from_detail(index: usize, record: &RecordWithId) -> Row {
    let fields = &record.fields;
    let tax = field_str(fields, &["Tax"]).unwrap_or_default();
    let reference = field_str(fields, &["Tax Amount", "TaxAmount"])
        .unwrap_or_else(|| tax.clone());
    let invoice = field_str(fields, &["InvoiceNumber"]).unwrap_or_default();
    Row {
        local_id: LocalId::Loaded(index),
        remote_id: Some(record.record_id.clone()),
        loaded_invoice: Some(invoice.clone()),
        invoice_number: invoice,
        amount: field_str(fields, &["Amount"]).unwrap_or_default(),
        tax,
        reference,
        total: field_str(fields, &["Total"]).unwrap_or_default(),
        ..Row::default()
    }
}
