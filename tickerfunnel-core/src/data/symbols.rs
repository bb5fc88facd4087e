//! Symbol validation and security-name screening.
//!
//! Both listing feeds pass through the same two checks before a symbol enters
//! the universe: the security name must not describe a derivative-like
//! instrument, and the symbol itself must look like a common-stock ticker.

use regex::Regex;
use std::sync::OnceLock;

/// Sentinel symbols exchanges publish for testing.
const DENYLIST: [&str; 3] = ["TEST", "ZZZZ", "XXXX"];

/// Fifth-letter suffixes marking warrants, rights, units, preferreds,
/// deficient issuers and foreign ADRs.
const DERIVATIVE_SUFFIXES: [char; 6] = ['W', 'R', 'U', 'P', 'Q', 'F'];

const MAX_SYMBOL_LEN: usize = 5;

/// Whole-word terms in a security name that mark a non-common-stock issue.
const DERIVATIVE_KEYWORDS: [&str; 12] = [
    r"Unit",
    r"Units",
    r"Warrant",
    r"Warrants",
    r"Preferred Stock",
    r"Series [A-Z]",
    r"Depositary Shares",
    r"American Depositary Shares",
    r"Right",
    r"Rights",
    r"Trust Preferred",
    r"Cumulative Preferred",
];

/// Returns true if `raw` looks like a plain common-stock ticker.
///
/// Surrounding whitespace is ignored. Never panics.
pub fn is_valid_symbol(raw: &str) -> bool {
    let symbol = raw.trim();
    let len = symbol.len();
    if len == 0 || len > MAX_SYMBOL_LEN {
        return false;
    }
    if !symbol.bytes().all(|b| b.is_ascii_uppercase()) {
        return false;
    }
    if DENYLIST.contains(&symbol) {
        return false;
    }
    if len == MAX_SYMBOL_LEN {
        if let Some(last) = symbol.chars().last() {
            if DERIVATIVE_SUFFIXES.contains(&last) {
                return false;
            }
        }
    }
    true
}

fn derivative_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternation = DERIVATIVE_KEYWORDS
            .iter()
            .map(|k| format!(r"\b{k}\b"))
            .collect::<Vec<_>>()
            .join("|");
        Regex::new(&format!("(?i){alternation}")).expect("derivative keyword pattern is valid")
    })
}

/// Returns true if the security name describes a unit, warrant, right,
/// preferred or depositary issue.
pub fn is_derivative_name(name: &str) -> bool {
    derivative_pattern().is_match(name)
}

/// Returns true if the security name marks an exchange-traded note.
pub fn is_etn_name(name: &str) -> bool {
    name.to_ascii_uppercase().contains("ETN")
}
