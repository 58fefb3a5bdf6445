//! Cell addressing — column letters, header names, and A1-style tokens.
//!
//! Columns use spreadsheet base-26: A=1..Z=26 with no zero digit, so
//! index 0 is "A", 25 is "Z", 26 is "AA". Header-name lookups let grid
//! columns be addressed by their label ("Amount") as well as by letter.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Map from header label (or key) to zero-based column index.
pub type HeaderMap = HashMap<String, usize>;

/// A parsed cell reference.
///
/// `row: None` means "the current row" — produced by a bare header-name
/// token, which names a column but no row. The caller resolves it
/// against whichever row is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: Option<usize>,
    pub col: usize,
}

/// Convert a zero-based column index to letters: 0=A, 25=Z, 26=AA.
pub fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

/// Convert column letters to a zero-based index. Returns `None` for
/// empty or non-alphabetic input, and for tokens long enough to
/// overflow the index (user-typed formulas can contain anything).
pub fn letters_to_col(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut idx: usize = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let d = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        idx = idx.checked_mul(26)?.checked_add(d)?;
    }
    Some(idx - 1)
}

/// Parse a cell-reference token.
///
/// Accepts classic `LETTERS+DIGITS` tokens (row is 1-based in the
/// token) or, when a header map is supplied, a bare header name which
/// resolves to a column with no row component.
pub fn parse_cell_ref(token: &str, headers: Option<&HeaderMap>) -> Option<CellRef> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if let Some((letters, digits)) = split_letters_digits(token) {
        if let Some(col) = letters_to_col(letters) {
            let row: usize = digits.parse().ok()?;
            if row >= 1 {
                return Some(CellRef { row: Some(row - 1), col });
            }
            return None;
        }
    }
    if let Some(map) = headers {
        if let Some(&col) = map.get(token) {
            return Some(CellRef { row: None, col });
        }
    }
    None
}

/// Parse a header-named reference with a 1-based row suffix, e.g.
/// `invoice_number2`. Used for SUM range endpoints whose column is a
/// header label rather than letters.
pub fn parse_named_ref(token: &str, headers: &HeaderMap) -> Option<CellRef> {
    let token = token.trim();
    let digits_at = token.find(|c: char| c.is_ascii_digit())?;
    let (name, digits) = token.split_at(digits_at);
    if name.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let col = *headers.get(name)?;
    let row: usize = digits.parse().ok()?;
    if row >= 1 {
        Some(CellRef { row: Some(row - 1), col })
    } else {
        None
    }
}

/// Split a token into a leading ASCII-letter run and a trailing digit
/// run. Returns `None` unless the token is exactly LETTERS then DIGITS.
fn split_letters_digits(token: &str) -> Option<(&str, &str)> {
    let first_digit = token.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = token.split_at(first_digit);
    if letters.is_empty()
        || !letters.chars().all(|c| c.is_ascii_alphabetic())
        || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    Some((letters, digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn headers() -> HeaderMap {
        let mut m = HashMap::new();
        m.insert("Amount".to_string(), 1);
        m.insert("invoice_number".to_string(), 0);
        m
    }

    #[test]
    fn test_col_to_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(1), "B");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(27), "AB");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
    }

    #[test]
    fn test_letters_to_col() {
        assert_eq!(letters_to_col("A"), Some(0));
        assert_eq!(letters_to_col("z"), Some(25));
        assert_eq!(letters_to_col("AA"), Some(26));
        assert_eq!(letters_to_col(""), None);
        assert_eq!(letters_to_col("A1"), None);
        assert_eq!(letters_to_col("$"), None);
    }

    #[test]
    fn test_letters_to_col_overflow_is_none() {
        // A letter run long enough to exceed usize must not panic
        assert_eq!(letters_to_col("AAAAAAAAAAAAAAAA"), None);
        assert_eq!(letters_to_col(&"Z".repeat(200)), None);
    }

    #[test]
    fn test_parse_cell_ref_classic() {
        assert_eq!(
            parse_cell_ref("A1", None),
            Some(CellRef { row: Some(0), col: 0 })
        );
        assert_eq!(
            parse_cell_ref("b10", None),
            Some(CellRef { row: Some(9), col: 1 })
        );
        // Token rows are 1-based; row 0 is invalid
        assert_eq!(parse_cell_ref("A0", None), None);
        assert_eq!(parse_cell_ref("1A", None), None);
        assert_eq!(parse_cell_ref("", None), None);
    }

    #[test]
    fn test_parse_cell_ref_header_name() {
        let h = headers();
        assert_eq!(
            parse_cell_ref("Amount", Some(&h)),
            Some(CellRef { row: None, col: 1 })
        );
        assert_eq!(parse_cell_ref("Amount", None), None);
        assert_eq!(parse_cell_ref("NoSuchHeader", Some(&h)), None);
    }

    #[test]
    fn test_parse_named_ref() {
        let h = headers();
        assert_eq!(
            parse_named_ref("invoice_number2", &h),
            Some(CellRef { row: Some(1), col: 0 })
        );
        assert_eq!(parse_named_ref("invoice_number", &h), None);
        assert_eq!(parse_named_ref("invoice_number0", &h), None);
    }

    proptest! {
        #[test]
        fn prop_letters_roundtrip(col in 0usize..20_000) {
            let letters = col_to_letters(col);
            prop_assert_eq!(letters_to_col(&letters), Some(col));
        }
    }
}
