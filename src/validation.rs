//! # Configuration Validation
//!
//! `validate_level` / `validate_rotation` / `validate_size_limit`, each
//! returning this crate's [`EngineError`] on a bad configuration value.

use crate::error::EngineError;

/// Parses size strings like `"5KB"`, `"10MB"`, `"1GB"` into bytes.
///
/// Supports case-insensitive `B`/`KB`/`MB`/`GB`/`TB` units, short forms
/// (`K`, `M`, `G`, `T`), and bare numbers (bytes).
pub fn parse_size(size_str: &str) -> Option<u64> {
    let s = size_str.trim();
    if s.is_empty() {
        return None;
    }
    let mut num_end = 0;
    for (i, c) in s.char_indices() {
        if !c.is_ascii_digit() {
            break;
        }
        num_end = i + c.len_utf8();
    }
    if num_end == 0 {
        return None;
    }
    let num_str = &s[..num_end];
    let unit = s[num_end..].trim().to_uppercase();
    let multiplier: u64 = match unit.as_str() {
        "B" | "" => 1,
        "KB" | "K" => 1024,
        "MB" | "M" => 1024 * 1024,
        "GB" | "G" => 1024 * 1024 * 1024,
        "TB" | "T" => 1024u64 * 1024 * 1024 * 1024,
        _ => return None,
    };
    num_str.parse::<u64>().ok().map(|n| n * multiplier)
}

pub fn validate_size(size_str: &str) -> Result<u64, EngineError> {
    parse_size(size_str).ok_or_else(|| {
        EngineError::invalid_config(format!(
            "invalid size '{size_str}', expected e.g. '500B', '5KB', '10MB', '1GB'"
        ))
    })
}

/// Validates a sampling rate / probability, must be within `[0.0, 1.0]`.
pub fn validate_probability(p: f64) -> Result<f64, EngineError> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(EngineError::invalid_config(format!(
            "probability {p} out of range [0.0, 1.0]"
        )))
    }
}

/// Validates that `max_files` and `compress_min_age` are in a sane order:
/// compressing shouldn't be delayed past the retention window.
pub fn validate_retention(max_files: usize, compress_min_age: usize) -> Result<(), EngineError> {
    if max_files > 0 && compress_min_age > max_files {
        return Err(EngineError::invalid_config(format!(
            "compress_min_age ({compress_min_age}) exceeds max_files ({max_files}); files would be deleted before compression runs"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_units() {
        assert_eq!(parse_size("1024"), Some(1024));
        assert_eq!(parse_size("1KB"), Some(1024));
        assert_eq!(parse_size("1mb"), Some(1024 * 1024));
        assert_eq!(parse_size("2G"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("invalid"), None);
        assert_eq!(parse_size(""), None);
    }

    #[test]
    fn rejects_out_of_range_probability() {
        assert!(validate_probability(0.5).is_ok());
        assert!(validate_probability(-0.1).is_err());
        assert!(validate_probability(1.1).is_err());
    }

    #[test]
    fn rejects_incoherent_retention() {
        assert!(validate_retention(5, 3).is_ok());
        assert!(validate_retention(3, 5).is_err());
        assert!(validate_retention(0, 5).is_ok());
    }
}
