use sha2::{Digest, Sha256};

/// Truncates a string to max_chars characters, appending "..." if truncated.
/// Safe for UTF-8 multi-byte characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncate_at = max_chars.saturating_sub(3);
        let byte_index = s
            .char_indices()
            .nth(truncate_at)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        format!("{}...", &s[..byte_index])
    }
}

/// Deterministic 8-char hex hash of a board id, used to name its
/// preference file.
pub fn compute_board_hash(board_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(board_id.as_bytes());
    let result = hasher.finalize();

    hex::encode(&result[..4])
}
