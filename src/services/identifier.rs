//! Human-typable identifiers for cards, keys, stores and invoices.
//!
//! Codes are drawn from an alphabet without visually ambiguous symbols
//! (no `0`/`O`/`1`/`I`). They are printed in plain QR payloads and are not
//! secrets, so the thread-local RNG is sufficient.
//!
//! No uniqueness check happens here. The database UNIQUE constraints are the
//! only arbiter; a collision surfaces as a conflict at insert time.

use chrono::NaiveDate;
use rand::Rng;

/// Unambiguous uppercase alphanumerics.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const CARD_CODE_LEN: usize = 8;
pub const STORE_CODE_LEN: usize = 6;
const INVOICE_SUFFIX_LEN: usize = 6;

/// Random string of `len` symbols from [`ALPHABET`].
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// 8-character card (and card key) identifier.
pub fn generate_card_code() -> String {
    generate_code(CARD_CODE_LEN)
}

/// 6-character store code.
pub fn generate_store_code() -> String {
    generate_code(STORE_CODE_LEN)
}

/// Invoice number of the form `INV-YYYYMMDD-XXXXXX`.
pub fn generate_invoice_number(date: NaiveDate) -> String {
    format!(
        "INV-{}-{}",
        date.format("%Y%m%d"),
        generate_code(INVOICE_SUFFIX_LEN)
    )
}

/// Canonical form of a card code typed or scanned by a user.
///
/// Returns `None` when the input cannot be a card code at all.
pub fn normalize_card_code(input: &str) -> Option<String> {
    let code = input.trim().to_ascii_uppercase();
    let valid = code.len() == CARD_CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b));
    valid.then_some(code)
}
