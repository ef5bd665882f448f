//! Pull ProtonVPN server codes (`CH#12`, `US#3`) out of a pasted text dump.

use std::sync::OnceLock;

use regex::Regex;

fn server_code() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[A-Z]{2}#\d+").expect("server code pattern is valid"))
}

/// Every `XX#N` code in `text`, sorted lexically. Duplicates are kept.
pub fn extract_server_codes(text: &str) -> Vec<String> {
    let mut codes: Vec<String> = server_code()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    codes.sort();
    codes
}
