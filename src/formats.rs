//! Image format identification and the supported-input set.
//!
//! The queue's submit filter and the codec both key off [`ImageFormat`].
//! Only formats with a working in-process decoder *and* encoder are listed;
//! anything else is rejected at submission time, never deeper in the
//! pipeline.

use serde::Serialize;
use std::fmt;

/// The four formats shrinkray accepts as input and produces as output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

/// MIME type / extension pairs for every supported format. The first
/// extension listed per format is the canonical one used for output names.
const FORMAT_TABLE: &[(ImageFormat, &str, &[&str])] = &[
    (ImageFormat::Jpeg, "image/jpeg", &["jpg", "jpeg"]),
    (ImageFormat::Png, "image/png", &["png"]),
    (ImageFormat::Webp, "image/webp", &["webp"]),
    (ImageFormat::Avif, "image/avif", &["avif"]),
];

impl ImageFormat {
    /// Resolve a declared MIME type to a format. Returns `None` for anything
    /// outside the supported set (`text/plain`, `image/gif`, ...).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        FORMAT_TABLE
            .iter()
            .find(|(_, m, _)| *m == mime)
            .map(|(f, _, _)| *f)
    }

    /// Resolve a file extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        FORMAT_TABLE
            .iter()
            .find(|(_, _, exts)| exts.contains(&ext.as_str()))
            .map(|(f, _, _)| *f)
    }

    pub fn mime(self) -> &'static str {
        FORMAT_TABLE
            .iter()
            .find(|(f, _, _)| *f == self)
            .map(|(_, m, _)| *m)
            .unwrap_or("application/octet-stream")
    }

    /// Canonical output extension (`jpg`, not `jpeg`).
    pub fn extension(self) -> &'static str {
        FORMAT_TABLE
            .iter()
            .find(|(f, _, _)| *f == self)
            .map(|(_, _, exts)| exts[0])
            .unwrap_or("bin")
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// True when the declared MIME type belongs to the supported input set.
pub fn is_supported_mime(mime: &str) -> bool {
    ImageFormat::from_mime(mime).is_some()
}
