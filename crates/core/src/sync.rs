//! The persistence pipeline: push the ledger's edits to the remote
//! store in one ordered pass.
//!
//! Validation comes first and costs no remote calls when it fails.
//! Writes are ordered so that a failure partway leaves the store in a
//! state the next sync can repair: deletes, then creates, then
//! updates. Nothing is rolled back; the report carries the counts of
//! what completed alongside the error.

use std::collections::HashMap;

use serde_json::Value;

use crate::dates::{to_store_date, today_store_date};
use crate::ledger::Ledger;
use crate::row::LocalId;
use crate::store::{
    invoice_value, layouts, query, FieldData, RecordStore, StoreError, UpdateOptions,
};

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Stamp the header `Posted = "Yes"` with today's date.
    pub mark_posted: bool,
    /// Also clear a rejection (blank out `Rejected` / `RejectReason`).
    pub clear_rejected: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            mark_posted: true,
            clear_rejected: false,
        }
    }
}

/// What a sync accomplished. Counts reflect completed work even when
/// `error` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub marked_posted: bool,
    pub header_updated: bool,
    pub error: Option<String>,
}

impl SyncReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl Ledger {
    /// Persist the ledger to the remote store. Aborts on the first
    /// failure; the report records how far it got.
    pub fn sync(&mut self, store: &impl RecordStore, options: SyncOptions) -> SyncReport {
        let mut report = SyncReport::default();
        if let Err(err) = self.run_sync(store, options, &mut report) {
            report.error = Some(err.to_string());
        }
        report
    }

    fn run_sync(
        &mut self,
        store: &impl RecordStore,
        options: SyncOptions,
        report: &mut SyncReport,
    ) -> Result<(), StoreError> {
        // ── 1. Grid-local uniqueness, before any remote call ──
        let mut seen: HashMap<String, String> = HashMap::new();
        for row in &self.rows {
            if row.is_blank() {
                continue;
            }
            let invoice = row.invoice_number.trim();
            if invoice.is_empty() {
                continue;
            }
            if let Some(first) = seen.insert(invoice.to_lowercase(), invoice.to_string()) {
                return Err(StoreError::Validation(format!(
                    "duplicate invoice number in grid: {}",
                    first
                )));
            }
        }

        // ── 2. Remote uniqueness for changed existing rows ──
        for row in &self.rows {
            let Some(remote_id) = &row.remote_id else {
                continue;
            };
            let invoice = row.invoice_number.trim();
            if invoice.is_empty() || !row.invoice_changed() {
                continue;
            }
            let q = query("InvoiceNumber", invoice_value(invoice));
            let hits = store.find_with_ids(layouts::PAYABLES_DETAILS, &q, 100)?;
            if hits.iter().any(|h| &h.record_id != remote_id) {
                return Err(StoreError::Validation(format!(
                    "invoice number already exists: {}",
                    invoice
                )));
            }
        }

        // ── 3. Remote uniqueness for new rows ──
        for row in &self.rows {
            if !row.is_new() || row.is_blank() {
                continue;
            }
            let invoice = row.invoice_number.trim();
            if invoice.is_empty() {
                continue;
            }
            let q = query("InvoiceNumber", invoice_value(invoice));
            if !store.find(layouts::PAYABLES_DETAILS, &q, 1)?.is_empty() {
                return Err(StoreError::Validation(format!(
                    "invoice number already exists: {}",
                    invoice
                )));
            }
        }

        // ── 4. New-entry preconditions ──
        let has_trans_ref = self
            .header
            .trans_ref
            .as_deref()
            .map_or(false, |t| !t.trim().is_empty());
        if !has_trans_ref {
            if !self.header.vendor.has_identity() {
                return Err(StoreError::Validation(
                    "vendor ID or vendor name is required".to_string(),
                ));
            }
            if self.filled_row_count() == 0 && self.pending_deletes.is_empty() {
                return Err(StoreError::Validation(
                    "nothing to sync; add at least one line item".to_string(),
                ));
            }
        }

        // ── 5. Fast path: post-only, no grid work ──
        let has_new_work = self.rows.iter().any(|r| r.is_new() && !r.is_blank());
        let has_dirty_existing = self.rows.iter().any(|r| r.remote_id.is_some() && r.dirty);
        if !has_new_work
            && !has_dirty_existing
            && self.pending_deletes.is_empty()
            && options.mark_posted
        {
            if let Some(record_id) = self.header.record_id.clone() {
                let fields = posting_fields(options);
                store.update(
                    layouts::PAYABLES_MAIN,
                    &record_id,
                    &fields,
                    UpdateOptions {
                        allow_empty_strings: options.clear_rejected,
                    },
                )?;
                self.header.posted = true;
                self.dirty = false;
                report.marked_posted = true;
                report.header_updated = true;
                return Ok(());
            }
        }

        // ── 6. Deletes ──
        while let Some(id) = self.pending_deletes.first().cloned() {
            store.delete(layouts::PAYABLES_DETAILS, &id)?;
            self.pending_deletes.remove(0);
            report.deleted += 1;
        }
        self.last_deleted = None;

        // ── 7. Header create-or-reuse ──
        let trans_ref = match self.header.trans_ref.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => {
                let mut fields = FieldData::new();
                let vendor = &self.header.vendor;
                if !vendor.vendor_id.trim().is_empty() {
                    fields.insert(
                        "VendorID".to_string(),
                        Value::String(vendor.vendor_id.trim().to_string()),
                    );
                } else {
                    fields.insert(
                        "VendorName".to_string(),
                        Value::String(vendor.vendor_name.trim().to_string()),
                    );
                }
                let record_id = store.create(layouts::PAYABLES_MAIN, &fields)?;
                // TransRef is server-assigned; read it back
                let trans = store
                    .get(layouts::PAYABLES_MAIN, &record_id)?
                    .and_then(|f| crate::store::field_str(&f, &["TransRef"]))
                    .ok_or_else(|| {
                        StoreError::Parse("created header has no TransRef".to_string())
                    })?;
                self.header.record_id = Some(record_id);
                self.header.trans_ref = Some(trans.clone());
                trans
            }
        };

        // Rows persisted before this sync; the ones step 10 updates.
        let preexisting: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.remote_id.is_some())
            .map(|(i, _)| i)
            .collect();

        // ── 8. Child creates ──
        for i in 0..self.rows.len() {
            if !self.rows[i].is_new() || self.rows[i].is_blank() {
                continue;
            }
            let fields = detail_fields(&trans_ref, &self.rows[i].invoice_number, &self.rows[i].amount);
            let record_id = store.create(layouts::PAYABLES_DETAILS, &fields)?;
            let row = &mut self.rows[i];
            row.local_id = LocalId::Synced(report.created as u64);
            row.remote_id = Some(record_id);
            row.loaded_invoice = Some(row.invoice_number.trim().to_string());
            row.dirty = false;
            report.created += 1;
        }

        // ── 9. Header update ──
        if let Some(record_id) = self.header.record_id.clone() {
            let mut fields = header_fields(self);
            if options.mark_posted {
                fields.extend(posting_fields(options));
            }
            store.update(
                layouts::PAYABLES_MAIN,
                &record_id,
                &fields,
                UpdateOptions {
                    allow_empty_strings: options.mark_posted && options.clear_rejected,
                },
            )?;
            report.header_updated = true;
            if options.mark_posted {
                self.header.posted = true;
                report.marked_posted = true;
            }
        }

        // ── 10. Child updates + invoice-number cascade ──
        for i in preexisting {
            let (remote_id, old_invoice, changed) = {
                let row = &self.rows[i];
                let Some(id) = row.remote_id.clone() else {
                    continue;
                };
                (id, row.loaded_invoice.clone(), row.invoice_changed())
            };
            let fields = detail_fields(&trans_ref, &self.rows[i].invoice_number, &self.rows[i].amount);
            store.update(
                layouts::PAYABLES_DETAILS,
                &remote_id,
                &fields,
                UpdateOptions::default(),
            )?;
            report.updated += 1;

            if changed {
                if let Some(old) = old_invoice {
                    cascade_invoice_number(store, &old, &self.rows[i].invoice_number).map_err(
                        |e| {
                            StoreError::Validation(format!(
                                "updated details but failed to renumber linked invoices: {}",
                                e
                            ))
                        },
                    )?;
                }
            }
            let row = &mut self.rows[i];
            row.loaded_invoice = Some(row.invoice_number.trim().to_string());
            row.dirty = false;
        }

        // ── 11. Success ──
        self.dirty = false;
        self.header.remote_total = Some(self.local_total());
        Ok(())
    }
}

/// Posted / rejection-clear fields for the header write.
fn posting_fields(options: SyncOptions) -> FieldData {
    let mut fields = FieldData::new();
    fields.insert("Posted".to_string(), Value::String("Yes".to_string()));
    fields.insert(
        "PostedDate".to_string(),
        Value::String(today_store_date()),
    );
    if options.clear_rejected {
        fields.insert("Rejected".to_string(), Value::String(String::new()));
        fields.insert("RejectReason".to_string(), Value::String(String::new()));
    }
    fields
}

/// Vendor and date fields for the header update. Blank values are
/// dropped by the store's sanitization.
fn header_fields(ledger: &Ledger) -> FieldData {
    let vendor = &ledger.header.vendor;
    let mut fields = FieldData::new();
    fields.insert(
        "VendorID".to_string(),
        Value::String(vendor.vendor_id.trim().to_string()),
    );
    fields.insert(
        "VendorName".to_string(),
        Value::String(vendor.vendor_name.trim().to_string()),
    );
    fields.insert(
        "VendorEmail".to_string(),
        Value::String(vendor.contact_email.trim().to_string()),
    );
    fields.insert(
        "Currency".to_string(),
        Value::String(vendor.currency.trim().to_string()),
    );
    if let Some(date) = to_store_date(&vendor.date) {
        fields.insert("Date".to_string(), Value::String(date));
    }
    fields
}

/// Writable fields of a detail record. Tax, Tax Amount, and Total are
/// store-calculated and never sent. Amount always goes over the wire:
/// a blank or unparseable cell writes as 0, so clearing an amount
/// clears the stored value too.
fn detail_fields(trans_ref: &str, invoice: &str, amount: &str) -> FieldData {
    let mut fields = FieldData::new();
    fields.insert(
        "TransRef".to_string(),
        Value::String(trans_ref.to_string()),
    );
    if !invoice.trim().is_empty() {
        fields.insert("InvoiceNumber".to_string(), invoice_value(invoice));
    }
    let amount = amount.trim().parse::<f64>().unwrap_or(0.0);
    fields.insert("Amount".to_string(), serde_json::json!(amount));
    fields
}

/// Renumber invoice records still pointing at the old invoice number.
fn cascade_invoice_number(
    store: &impl RecordStore,
    old: &str,
    new: &str,
) -> Result<(), StoreError> {
    if old.trim().is_empty() {
        return Ok(());
    }
    let q = query("InvoiceNumber", invoice_value(old));
    let linked = store.find_with_ids(layouts::PAYABLE_INVOICE, &q, 500)?;
    for record in linked {
        let mut fields = FieldData::new();
        fields.insert("InvoiceNumber".to_string(), invoice_value(new));
        store.update(
            layouts::PAYABLE_INVOICE,
            &record.record_id,
            &fields,
            UpdateOptions::default(),
        )?;
    }
    Ok(())
}
