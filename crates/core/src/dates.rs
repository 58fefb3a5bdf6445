//! Date conversions for the remote store, which wants `MM/DD/YYYY`.

use chrono::Local;

/// Today's date in store format.
pub fn today_store_date() -> String {
    Local::now().date_naive().format("%m/%d/%Y").to_string()
}

/// Convert a date string to store format.
///
/// `YYYY-MM-DD` (date-input format) is converted; `MM/DD/YYYY` passes
/// through; anything else passes through trimmed and lets the store
/// validate. Blank input yields `None` so callers can omit the field.
pub fn to_store_date(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() == 3 && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return Some(format!("{}/{}/{}", parts[1], parts[2], parts[0]));
    }
    Some(s.to_string())
}
