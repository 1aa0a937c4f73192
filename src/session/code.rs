use crate::config::SESSION_CODE_LEN;

/// Trims surrounding whitespace and accepts exactly six ASCII digits.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.len() == SESSION_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
        Some(code.to_string())
    } else {
        None
    }
}
