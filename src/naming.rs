//! Output filename templating.
//!
//! Every name shrinkray writes — single downloads and ZIP entries alike —
//! goes through [`generate_filename`] with a token pattern:
//!
//! - `{name}` → source filename stem (text before the last `.`)
//! - `{ext}` → effective extension (override, else the source's, else `png`)
//! - `{timestamp}` → Unix time in milliseconds
//! - `{date}` → current date as `YYYY-MM-DD`
//!
//! Each token is substituted at most once. Built-in patterns are trusted;
//! user-supplied ones must pass [`validate_pattern`] first.

use chrono::{DateTime, Local};
use thiserror::Error;

/// Pattern used when the caller does not supply one: `photo.jpg` → `photo-min.webp`.
pub const DEFAULT_PATTERN: &str = "{name}-min.{ext}";

/// Characters that are illegal in filenames on at least one mainstream
/// filesystem. Checked against the pattern's literal text only — token
/// braces are fine.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

const TOKENS: &[&str] = &["{name}", "{ext}", "{timestamp}", "{date}"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PatternError {
    #[error("Pattern is empty")]
    Empty,
    #[error("Pattern must contain {{ext}}")]
    MissingExtensionToken,
    #[error("Pattern contains illegal character '{0}'")]
    IllegalCharacter(char),
}

/// Split a filename into stem and extension at the last `.`.
///
/// No dot (or nothing after the final dot) means no extension.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Render `pattern` for a source file, using the given instant for the
/// `{timestamp}` and `{date}` tokens.
///
/// The stem is taken verbatim from `original_name` (case preserved); an
/// empty name or empty stem falls back to `image`.
pub fn generate_filename_at(
    original_name: &str,
    pattern: &str,
    extension_override: Option<&str>,
    now: DateTime<Local>,
) -> String {
    let (stem, original_ext) = split_name(original_name);
    let stem = if stem.is_empty() { "image" } else { stem };
    let ext = extension_override.or(original_ext).unwrap_or("png");

    pattern
        .replacen("{name}", stem, 1)
        .replacen("{ext}", ext, 1)
        .replacen("{timestamp}", &now.timestamp_millis().to_string(), 1)
        .replacen("{date}", &now.format("%Y-%m-%d").to_string(), 1)
}

/// [`generate_filename_at`] with the current wall clock.
pub fn generate_filename(
    original_name: &str,
    pattern: &str,
    extension_override: Option<&str>,
) -> String {
    generate_filename_at(original_name, pattern, extension_override, Local::now())
}

/// Validate a user-supplied pattern before it is used for any export.
///
/// Rejects empty patterns, patterns without `{ext}` (the output would have
/// no extension), and patterns whose literal text contains characters that
/// cannot appear in filenames.
pub fn validate_pattern(pattern: &str) -> Result<(), PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    if !pattern.contains("{ext}") {
        return Err(PatternError::MissingExtensionToken);
    }

    let mut literal = pattern.to_string();
    for token in TOKENS {
        literal = literal.replacen(token, "", 1);
    }
    if let Some(bad) = literal.chars().find(|c| ILLEGAL_CHARS.contains(c)) {
        return Err(PatternError::IllegalCharacter(bad));
    }
    Ok(())
}
