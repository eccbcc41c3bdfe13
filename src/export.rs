//! Export orchestration: turn completed queue items into deliverables.
//!
//! Completed items are projected into [`ExportItem`]s — a fresh, read-only
//! list each time an export is requested — with the naming pattern applied
//! to every processed filename. From there they either get written to an
//! output directory one file at a time, or handed to
//! [`crate::archive::build_archive`] for ZIP packaging.
//!
//! Also home to the CLI-side input collection (paths and directories →
//! [`SourceImage`]s) and the JSON-serializable run report.

use crate::archive::{ExportItem, OriginalPayload};
use crate::codec::SourceImage;
use crate::formats::ImageFormat;
use crate::naming;
use crate::queue::{ItemStatus, QueueItem};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Project the completed subset of the queue into export items.
///
/// The naming pattern is applied to each processed filename with the target
/// format's extension; distinct sources therefore produce distinct names
/// (identically named sources are the archiver's collision problem, not
/// ours). Items still queued, in flight, or failed are skipped.
pub fn export_items(
    items: &[QueueItem],
    pattern: &str,
    include_originals: bool,
) -> Vec<ExportItem> {
    items
        .iter()
        .filter(|item| item.status == ItemStatus::Completed)
        .filter_map(|item| {
            let result = item.result.as_ref()?;
            Some(ExportItem {
                payload: result.bytes.clone(),
                format: result.format,
                filename: naming::generate_filename(
                    &item.source.name,
                    pattern,
                    Some(result.format.extension()),
                ),
                original_name: item.source.name.clone(),
                size: result.size(),
                original: include_originals.then(|| OriginalPayload {
                    bytes: item.source.bytes.clone(),
                    mime: item.source.mime.clone(),
                    size: item.source.size(),
                }),
            })
        })
        .collect()
}

/// Write each export item's processed payload to `dir`, creating it as
/// needed. Returns the written paths in item order.
pub fn write_outputs(items: &[ExportItem], dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(items.len());
    for item in items {
        let path = dir.join(&item.filename);
        fs::write(&path, &item.payload)?;
        written.push(path);
    }
    Ok(written)
}

/// MIME type declared for a path, from its extension. Unknown extensions
/// map to `application/octet-stream` so the queue's submit filter rejects
/// them with a report instead of this function guessing.
fn declared_mime(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ImageFormat::from_extension)
        .map(|f| f.mime().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Read CLI input paths into sources. Directories are walked recursively;
/// files are taken as-is. Order is deterministic: arguments in the order
/// given, directory contents sorted by filename.
pub fn collect_sources(paths: &[PathBuf]) -> io::Result<Vec<SourceImage>> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                sources.push(read_source(entry.path())?);
            }
        } else {
            sources.push(read_source(path)?);
        }
    }
    Ok(sources)
}

fn read_source(path: &Path) -> io::Result<SourceImage> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(SourceImage::new(name, declared_mime(path), fs::read(path)?))
}

/// JSON-serializable summary of one run, for `--json` output.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub items: Vec<ReportEntry>,
    pub rejected_extensions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub source_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_percent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn from_queue(items: &[QueueItem], rejected_extensions: Vec<String>) -> Self {
        let entries = items
            .iter()
            .map(|item| {
                let compressed = item.result.as_ref().map(|r| r.size());
                ReportEntry {
                    name: item.source.name.clone(),
                    status: item.status,
                    output: item.result.as_ref().map(|r| r.filename.clone()),
                    source_bytes: item.source.size(),
                    compressed_bytes: compressed,
                    saved_percent: compressed.map(|c| saved_percent(item.source.size(), c)),
                    error: item.error.clone(),
                }
            })
            .collect();
        Self {
            items: entries,
            rejected_extensions,
        }
    }
}

/// Percentage saved relative to the source; negative when output grew.
pub fn saved_percent(source: u64, compressed: u64) -> i64 {
    if source == 0 {
        return 0;
    }
    (100.0 - compressed as f64 / source as f64 * 100.0).round() as i64
}
