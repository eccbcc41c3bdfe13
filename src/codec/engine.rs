//! Compression engine trait and shared types.
//!
//! The [`Compressor`] trait is the seam between the queue and the codec:
//! given an in-memory source image and [`CompressOptions`], produce a
//! compressed payload. The production implementation is
//! [`RustCompressor`](super::rust_engine::RustCompressor) — pure Rust,
//! statically linked. Tests use the recording [`MockCompressor`].
//!
//! Contract every implementation must honor: deterministic for equal
//! input + options, never mutates the source, safe to invoke repeatedly.

use super::params::CompressOptions;
use crate::formats::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
    #[error("Failed to decode {0}: {1}")]
    Decode(String, String),
    #[error("{0} encode failed: {1}")]
    Encode(ImageFormat, String),
}

/// One user-supplied image: its declared name and MIME type plus the raw
/// bytes. Owned by exactly one queue item and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Result of a successful compression: the encoded payload, its format and
/// pixel dimensions, and a suggested output filename (source stem + target
/// extension).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub filename: String,
}

impl CompressedImage {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Trait for compression engines.
pub trait Compressor {
    /// Decode, optionally resize, and re-encode one image.
    fn compress(
        &self,
        source: &SourceImage,
        options: &CompressOptions,
    ) -> Result<CompressedImage, CompressError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// Mock engine that records requests without touching any codec.
    ///
    /// Output bytes are the source bytes truncated to half length, so tests
    /// can assert a plausible size reduction without real encoding.
    #[derive(Default)]
    pub struct MockCompressor {
        pub operations: RefCell<Vec<RecordedCompress>>,
        pub fail_names: RefCell<HashSet<String>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCompress {
        pub name: String,
        pub options: CompressOptions,
    }

    impl MockCompressor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every source whose name is listed here fails with a decode error.
        pub fn failing_on(names: &[&str]) -> Self {
            Self {
                operations: RefCell::new(Vec::new()),
                fail_names: RefCell::new(names.iter().map(|n| n.to_string()).collect()),
            }
        }

        pub fn recorded(&self) -> Vec<RecordedCompress> {
            self.operations.borrow().clone()
        }
    }

    impl Compressor for MockCompressor {
        fn compress(
            &self,
            source: &SourceImage,
            options: &CompressOptions,
        ) -> Result<CompressedImage, CompressError> {
            self.operations.borrow_mut().push(RecordedCompress {
                name: source.name.clone(),
                options: options.clone(),
            });

            if self.fail_names.borrow().contains(&source.name) {
                return Err(CompressError::Decode(
                    source.name.clone(),
                    "mock decode failure".into(),
                ));
            }

            let stem = source.name.rsplit_once('.').map_or(source.name.as_str(), |(s, _)| s);
            Ok(CompressedImage {
                bytes: source.bytes[..source.bytes.len() / 2].to_vec(),
                format: options.format,
                width: 100,
                height: 100,
                filename: format!("{}.{}", stem, options.format.extension()),
            })
        }
    }

    #[test]
    fn mock_records_each_request() {
        let engine = MockCompressor::new();
        let source = SourceImage::new("a.png", "image/png", vec![0; 10]);
        let opts = CompressOptions::default();

        engine.compress(&source, &opts).unwrap();
        engine.compress(&source, &opts).unwrap();

        let ops = engine.recorded();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].name, "a.png");
    }

    #[test]
    fn mock_halves_payload_and_renames() {
        let engine = MockCompressor::new();
        let source = SourceImage::new("photo.jpg", "image/jpeg", vec![7; 8]);
        let out = engine
            .compress(&source, &CompressOptions::default())
            .unwrap();
        assert_eq!(out.bytes.len(), 4);
        assert_eq!(out.filename, "photo.webp");
    }

    #[test]
    fn mock_fails_on_listed_names() {
        let engine = MockCompressor::failing_on(&["bad.png"]);
        let source = SourceImage::new("bad.png", "image/png", vec![0; 4]);
        let result = engine.compress(&source, &CompressOptions::default());
        assert!(matches!(result, Err(CompressError::Decode(..))));
    }
}
