//! ZIP export: bundle processed images (and optionally their originals)
//! into one in-memory archive.
//!
//! Entries are written in input-list order, processed entry first and the
//! original (when requested) second, which makes collision resolution
//! deterministic: the same input list always yields the same entry names.
//! Entries are individually deflate-compressed at a fixed moderate level.
//!
//! The build is atomic — any entry failure aborts the whole archive and
//! nothing is returned. Inputs are never mutated.

use crate::formats::ImageFormat;
use crate::naming;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// The original payload carried alongside a processed image when the
/// caller wants "include originals" packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPayload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub size: u64,
}

/// Read-only projection of one completed queue item, prepared for
/// packaging. Constructed fresh for every export; the archiver only reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportItem {
    pub payload: Vec<u8>,
    pub format: ImageFormat,
    /// Entry name for the processed payload. Assumed pre-disambiguated by
    /// the caller; the archiver never rewrites it.
    pub filename: String,
    /// Source filename, fed through the naming pattern for the original's
    /// entry name.
    pub original_name: String,
    pub size: u64,
    pub original: Option<OriginalPayload>,
}

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Also write each item's original payload, when it carries one.
    pub include_originals: bool,
    /// `processed/` and `originals/` subfolders instead of a flat root.
    pub create_subfolders: bool,
    /// Naming pattern applied to the original's filename (whether or not
    /// subfolders are used).
    pub name_pattern: String,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            include_originals: false,
            create_subfolders: false,
            name_pattern: "{name}.{ext}".to_string(),
        }
    }
}

/// Pick a free entry name for an original: the computed name as-is when
/// free, otherwise `-original` before the extension, then `-original-1`,
/// `-original-2`, ... until free.
fn disambiguate(base: &str, prefix: &str, used: &HashSet<String>) -> String {
    let candidate = format!("{prefix}{base}");
    if !used.contains(&candidate) {
        return candidate;
    }

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (base, None),
    };
    let rejoin = |marked: String| match ext {
        Some(ext) => format!("{prefix}{marked}.{ext}"),
        None => format!("{prefix}{marked}"),
    };

    let plain = rejoin(format!("{stem}-original"));
    if !used.contains(&plain) {
        return plain;
    }
    let mut n = 1u32;
    loop {
        let numbered = rejoin(format!("{stem}-original-{n}"));
        if !used.contains(&numbered) {
            return numbered;
        }
        n += 1;
    }
}

/// Build one deflate-compressed ZIP blob from the given items.
///
/// `on_progress` receives a non-decreasing percentage in [0, 100] as
/// entries are added; the final invocation reports 100 before the blob is
/// returned.
pub fn build_archive(
    items: &[ExportItem],
    options: &ArchiveOptions,
    mut on_progress: impl FnMut(u32),
) -> Result<Vec<u8>, ArchiveError> {
    let total_entries = items
        .iter()
        .map(|i| {
            if options.include_originals && i.original.is_some() {
                2
            } else {
                1
            }
        })
        .sum::<usize>()
        .max(1);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let entry_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(6));

    let (processed_prefix, originals_prefix) = if options.create_subfolders {
        ("processed/", "originals/")
    } else {
        ("", "")
    };

    let mut used: HashSet<String> = HashSet::new();
    let mut written = 0usize;

    for item in items {
        let processed_name = format!("{processed_prefix}{}", item.filename);
        writer.start_file(&*processed_name, entry_options)?;
        writer.write_all(&item.payload)?;
        used.insert(processed_name);
        written += 1;
        on_progress((written * 100 / total_entries) as u32);

        if !options.include_originals {
            continue;
        }
        let Some(original) = &item.original else {
            continue;
        };

        let base = naming::generate_filename(&item.original_name, &options.name_pattern, None);
        let original_name = disambiguate(&base, originals_prefix, &used);
        writer.start_file(&*original_name, entry_options)?;
        writer.write_all(&original.bytes)?;
        used.insert(original_name);
        written += 1;
        on_progress((written * 100 / total_entries) as u32);
    }

    let blob = writer.finish()?.into_inner();
    on_progress(100);
    Ok(blob)
}
