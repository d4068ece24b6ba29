//! Glob pattern handling for multi-file datasets.
//!
//! A dataset source containing `*`, `?`, or `[` is a glob dataset: the
//! source splits into a literal prefix (listed from storage) and a pattern
//! (matched against each listed name). No I/O here; backends call
//! [`glob_to_regex`] to filter their listings.

use crate::error::{CatalogError, Result};
use regex::Regex;

/// Characters that mark a source as a glob pattern.
const GLOB_METACHARACTERS: &[char] = &['*', '?', '['];

/// Whether `source` contains glob metacharacters.
pub fn is_glob_pattern(source: &str) -> bool {
    source.contains(GLOB_METACHARACTERS)
}

/// Split a glob source into `(prefix, pattern)` at the last separator
/// preceding the first metacharacter. The prefix keeps its trailing `/`.
///
/// ```
/// # use cachalog::glob::split_glob_pattern;
/// let (prefix, pattern) = split_glob_pattern("s3://bucket/data/*.parquet").unwrap();
/// assert_eq!(prefix, "s3://bucket/data/");
/// assert_eq!(pattern, "*.parquet");
/// ```
pub fn split_glob_pattern(source: &str) -> Result<(String, String)> {
    let first_meta = source
        .find(GLOB_METACHARACTERS)
        .ok_or_else(|| CatalogError::validation(format!("Source is not a glob pattern: {source}")))?;

    match source[..first_meta].rfind('/') {
        Some(last_slash) => Ok((
            source[..=last_slash].to_string(),
            source[last_slash + 1..].to_string(),
        )),
        // No separator before the metacharacter: the whole source is the pattern.
        None => Ok((String::new(), source.to_string())),
    }
}

/// Derive the hierarchical cache key for one matched file:
/// `<dataset_name>/<path relative to prefix>`, preserving nesting.
pub fn derive_cache_key(dataset_name: &str, prefix: &str, matched_uri: &str) -> String {
    let normalized = if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix.trim_end_matches('/'))
    };

    let relative = if !normalized.is_empty() && matched_uri.starts_with(&normalized) {
        &matched_uri[normalized.len()..]
    } else if !prefix.is_empty() && matched_uri.starts_with(prefix) {
        matched_uri[prefix.len()..].trim_start_matches('/')
    } else {
        matched_uri.rsplit('/').next().unwrap_or(matched_uri)
    };

    format!("{dataset_name}/{relative}")
}

/// Compile a glob pattern into an anchored regex over `/`-separated
/// relative paths.
///
/// `*` and `?` never cross a separator; a `**` segment matches any number
/// of directories (including none), so `**/*.csv` matches by filename at
/// any depth. Character classes pass through, with `[!...]` negation.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut segments = pattern.split('/').peekable();

    while let Some(segment) = segments.next() {
        if segment == "**" {
            if segments.peek().is_none() {
                re.push_str(".*");
            } else {
                // Trailing separator folds into the group so zero
                // directories also match.
                re.push_str("(?:[^/]+/)*");
            }
            continue;
        }
        translate_segment(segment, &mut re);
        if segments.peek().is_some() {
            re.push('/');
        }
    }
    re.push('$');

    Regex::new(&re).map_err(|e| {
        CatalogError::validation(format!("Invalid glob pattern '{pattern}': {e}"))
    })
}

fn translate_segment(segment: &str, out: &mut String) {
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                    if inner == '\\' {
                        out.push_str("\\\\");
                    } else {
                        out.push(inner);
                    }
                }
                out.push(']');
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
}
