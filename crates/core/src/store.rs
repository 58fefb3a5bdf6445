//! Capability contract for the remote record store.
//!
//! The remote is a layout-oriented data API (find / create / update /
//! delete against named layouts). The core only ever talks to it
//! through [`RecordStore`], so sync and load logic is testable against
//! an in-memory implementation.

use serde_json::Value;

/// Field payload for one record. Values are JSON because the store
/// mixes text and numeric fields on the same layout.
pub type FieldData = serde_json::Map<String, Value>;

/// A record plus the stable id used for subsequent update/delete.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordWithId {
    pub record_id: String,
    pub fields: FieldData,
}

/// Options for partial updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// By default empty-string fields are dropped from the write
    /// ("no change"). Set this to send them ("clear this field").
    pub allow_empty_strings: bool,
}

/// Layout names on the remote store.
pub mod layouts {
    pub const PAYABLES_MAIN: &str = "Payables_Main";
    pub const PAYABLES_DETAILS: &str = "Payables_Details";
    pub const PAYABLE_INVOICE: &str = "Payable_Invoice";
    pub const TAX_VALUE: &str = "Tax_Value | TBL";
}

/// Error type for record-store operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No session token / not logged in
    NotAuthenticated,
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// Response parsing error
    Parse(String),
    /// Server-side validation rejection
    Validation(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotAuthenticated => write!(f, "Not connected to the record store"),
            StoreError::Network(msg) => write!(f, "Network error: {}", msg),
            StoreError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            StoreError::Parse(msg) => write!(f, "Parse error: {}", msg),
            StoreError::Validation(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Blocking access to the remote record store.
///
/// "No records match" is a success with an empty result, never an
/// error — implementations must translate the store's no-match
/// response code accordingly.
pub trait RecordStore {
    /// Exact-match find. Empty result is Ok.
    fn find(
        &self,
        layout: &str,
        query: &FieldData,
        limit: usize,
    ) -> Result<Vec<FieldData>, StoreError>;

    /// Like [`RecordStore::find`], but returns each record's stable id.
    fn find_with_ids(
        &self,
        layout: &str,
        query: &FieldData,
        limit: usize,
    ) -> Result<Vec<RecordWithId>, StoreError>;

    /// Read back a single record by id (e.g. for server-assigned
    /// fields like the transaction reference).
    fn get(&self, layout: &str, record_id: &str) -> Result<Option<FieldData>, StoreError>;

    /// Create a record; returns the newly assigned id.
    fn create(&self, layout: &str, fields: &FieldData) -> Result<String, StoreError>;

    /// Partial-field update.
    fn update(
        &self,
        layout: &str,
        record_id: &str,
        fields: &FieldData,
        options: UpdateOptions,
    ) -> Result<(), StoreError>;

    fn delete(&self, layout: &str, record_id: &str) -> Result<(), StoreError>;
}

/// Read a field as a trimmed non-empty string, trying several key
/// spellings (the store is inconsistent about spaces vs underscores).
pub fn field_str(fields: &FieldData, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(v) = fields.get(*key) {
            let s = match v {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !s.is_empty() {
                return Some(s);
            }
        }
    }
    None
}

/// Read a field as f64, accepting numbers and numeric strings.
pub fn field_f64(fields: &FieldData, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match fields.get(*key) {
            Some(Value::Number(n)) => return n.as_f64(),
            Some(Value::String(s)) => {
                if let Ok(n) = s.trim().parse::<f64>() {
                    return Some(n);
                }
            }
            _ => {}
        }
    }
    None
}

/// Build a one-field query map.
pub fn query(key: &str, value: Value) -> FieldData {
    let mut q = FieldData::new();
    q.insert(key.to_string(), value);
    q
}

/// Invoice numbers are written as numbers when they parse as one,
/// otherwise as text ("INV-001").
pub fn invoice_value(invoice: &str) -> Value {
    let trimmed = invoice.trim();
    match trimmed.parse::<f64>() {
        Ok(n) => serde_json::json!(n),
        Err(_) => Value::String(trimmed.to_string()),
    }
}
