//! The entry header — the parent record grouping the grid rows.

use serde::{Deserialize, Serialize};

/// Vendor identity and terms attached to the entry header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub vendor_id: String,
    pub vendor_name: String,
    pub contact_email: String,
    pub currency: String,
    /// Entry date as entered (ISO `YYYY-MM-DD` or store `MM/DD/YYYY`).
    pub date: String,
}

impl Vendor {
    /// A vendor identity exists when either id or name is non-blank.
    pub fn has_identity(&self) -> bool {
        !self.vendor_id.trim().is_empty() || !self.vendor_name.trim().is_empty()
    }
}

/// Workflow status reported by the remote store's calculated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Draft,
    Approved,
    Rejected,
    Posted,
}

impl EntryStatus {
    pub fn parse(s: &str) -> Option<EntryStatus> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(EntryStatus::Draft),
            "approved" => Some(EntryStatus::Approved),
            "rejected" => Some(EntryStatus::Rejected),
            "posted" => Some(EntryStatus::Posted),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStatus::Draft => write!(f, "Draft"),
            EntryStatus::Approved => write!(f, "Approved"),
            EntryStatus::Rejected => write!(f, "Rejected"),
            EntryStatus::Posted => write!(f, "Posted"),
        }
    }
}

/// Cheque-issue sub-state carried on the header once a cheque is cut.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChequeState {
    pub issued: Option<String>,
    pub issued_date: Option<String>,
    pub bank_name: Option<String>,
    pub cheque_no: Option<String>,
}

/// The current entry's header record.
///
/// `trans_ref` is assigned by the remote store on first creation and
/// never generated locally. `remote_total` is the store's calculated
/// total; it is authoritative only while the ledger is clean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryHeader {
    pub trans_ref: Option<String>,
    pub record_id: Option<String>,
    pub posted: bool,
    pub status: Option<EntryStatus>,
    pub reject_reason: Option<String>,
    pub remote_total: Option<f64>,
    pub cheque: ChequeState,
    pub vendor: Vendor,
}
