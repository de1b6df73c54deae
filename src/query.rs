use crate::error::{AnimeSearchError, Result};

/// Validate and trim the raw `q` parameter. The error message is the
/// client-facing text returned with a 400.
pub fn validate_query(raw: Option<&str>, max_length: usize) -> Result<String> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            return Err(AnimeSearchError::InvalidQuery(
                "Query parameter 'q' is required".to_string(),
            ))
        }
    };

    let query = raw.trim();
    if query.is_empty() {
        return Err(AnimeSearchError::InvalidQuery(
            "Query cannot be empty".to_string(),
        ));
    }
    if query.chars().count() > max_length {
        return Err(AnimeSearchError::InvalidQuery(format!(
            "Query too long (max {max_length} characters)"
        )));
    }

    Ok(query.to_string())
}

/// Parse the comma-separated `exclude` parameter into trimmed, lower-cased
/// tokens. Empty tokens are dropped; no error conditions.
pub fn parse_exclude_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Clamp a requested page size into [1, max_limit].
pub fn clamp_limit(limit: i64, max_limit: usize) -> usize {
    limit.clamp(1, max_limit as i64) as usize
}

/// Floor a requested offset at 0.
pub fn clamp_offset(offset: i64) -> usize {
    offset.max(0) as usize
}
