/// Trimmed address, or `None` when nothing but whitespace was entered.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// File-name stem for an address: every non-alphanumeric character becomes `_`.
pub fn sanitize_for_filename(address: &str) -> String {
    let sanitized: String = address
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "property".to_string()
    } else {
        sanitized
    }
}
