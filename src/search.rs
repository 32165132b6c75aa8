//! # Historical Search
//!
//! Ad-hoc search over a destination's on-disk files — the active file plus
//! every rotated (and still-plain) sibling, rather than a single fixed file.

use crate::rotation;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Search configuration: line-range, level, and invert-match filters plus
/// result-count and context-window controls.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub first_only: bool,
    pub use_regex: bool,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub max_results: Option<usize>,
    pub context_before: Option<usize>,
    pub context_after: Option<usize>,
    pub level_filter: Option<String>,
    pub invert_match: bool,
}

/// One match, tagged with the file it came from so a multi-file search
/// result can be attributed back to a specific rotation.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub file: PathBuf,
    pub line_number: usize,
    pub content: String,
    pub matched_text: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

/// Searches one file for `pattern`: line-range, level, and invert-match
/// filters compose, and `first_only`/`max_results` cap the match count
/// without reading the rest
/// of a very large file more than once (all lines are buffered up front
/// only to support context windows).
pub fn search_file<P: AsRef<Path>>(
    file_path: P,
    pattern: &str,
    options: &SearchOptions,
) -> std::io::Result<Vec<SearchResult>> {
    let path = file_path.as_ref().to_path_buf();
    let file = File::open(&path)?;
    let reader = BufReader::new(file);
    let mut results = Vec::new();
    let mut all_lines: Vec<String> = Vec::new();

    for line in reader.lines() {
        all_lines.push(line?);
    }

    let regex_matcher = if options.use_regex {
        match regex::Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(_) => return Ok(results),
        }
    } else {
        None
    };

    let start = options.start_line.unwrap_or(1);
    let end = options.end_line.unwrap_or(all_lines.len());

    for (idx, line) in all_lines.iter().enumerate() {
        let line_num = idx + 1;
        if line_num < start || line_num > end {
            continue;
        }

        if let Some(ref level) = options.level_filter {
            let line_upper = line.to_uppercase();
            if !line_upper.contains(&level.to_uppercase()) {
                continue;
            }
        }

        let matches = if let Some(ref re) = regex_matcher {
            re.is_match(line)
        } else if options.case_sensitive {
            line.contains(pattern)
        } else {
            line.to_lowercase().contains(&pattern.to_lowercase())
        };

        let should_include = if options.invert_match {
            !matches
        } else {
            matches
        };

        if !should_include {
            continue;
        }

        let matched_text = if let Some(ref re) = regex_matcher {
            re.find(line)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| pattern.to_string())
        } else if options.case_sensitive {
            line.find(pattern)
                .map(|pos| line[pos..pos + pattern.len()].to_string())
                .unwrap_or_else(|| pattern.to_string())
        } else {
            let pattern_lower = pattern.to_lowercase();
            let line_lower = line.to_lowercase();
            line_lower
                .find(&pattern_lower)
                .map(|pos| line[pos..pos + pattern.len()].to_string())
                .unwrap_or_else(|| pattern.to_string())
        };

        let context_before = if let Some(n) = options.context_before {
            let start_idx = idx.saturating_sub(n);
            all_lines[start_idx..idx].to_vec()
        } else {
            Vec::new()
        };
        let context_after = if let Some(n) = options.context_after {
            let end_idx = std::cmp::min(idx + 1 + n, all_lines.len());
            all_lines[idx + 1..end_idx].to_vec()
        } else {
            Vec::new()
        };

        results.push(SearchResult {
            file: path.clone(),
            line_number: line_num,
            content: line.clone(),
            matched_text,
            context_before,
            context_after,
        });

        if options.first_only {
            break;
        }
        if let Some(max) = options.max_results {
            if results.len() >= max {
                break;
            }
        }
    }

    Ok(results)
}

/// Searches a destination's full rotation set: the active file plus every
/// sibling (rotated, not-yet-compressed), newest first. `max_results`
/// applies across the whole set, not per file.
pub fn search_destination(
    base_path: &Path,
    pattern: &str,
    options: &SearchOptions,
) -> std::io::Result<Vec<SearchResult>> {
    let mut files = vec![base_path.to_path_buf()];
    if let Ok(siblings) = rotation::list_siblings(base_path) {
        files.extend(siblings.into_iter().filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e != "gz" && e != "zst")
                .unwrap_or(true)
        }));
    }

    let mut results = Vec::new();
    for file in files {
        if !file.exists() {
            continue;
        }
        let mut matches = search_file(&file, pattern, options)?;
        if let Some(max) = options.max_results {
            let remaining = max.saturating_sub(results.len());
            matches.truncate(remaining);
        }
        let done = options.first_only && !matches.is_empty();
        results.extend(matches);
        if done || options.max_results.is_some_and(|max| results.len() >= max) {
            break;
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(path: &Path, lines: &[&str]) {
        let mut file = File::create(path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    #[test]
    fn searches_single_file_with_case_insensitivity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        write_file(&path, &["error occurred", "info message", "another ERROR"]);
        let results = search_file(&path, "error", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn searches_across_rotation_set() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app.log");
        write_file(&base, &["current error"]);
        write_file(&dir.path().join("app.log.1"), &["old error"]);
        write_file(&dir.path().join("app.log.2.gz"), &["compressed, skip"]);
        let results = search_destination(&base, "error", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.file == base));
    }

    #[test]
    fn honors_max_results_across_files() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("app.log");
        write_file(&base, &["match a", "match b"]);
        write_file(&dir.path().join("app.log.1"), &["match c", "match d"]);
        let options = SearchOptions {
            max_results: Some(3),
            ..Default::default()
        };
        let results = search_destination(&base, "match", &options).unwrap();
        assert_eq!(results.len(), 3);
    }
}
