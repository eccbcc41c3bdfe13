//! Compression — pure Rust, zero external dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image` crate; AVIF via `avif-parse` + `rav1d` |
//! | **Resize** | Lanczos3, bounded, downscale only |
//! | **Encode** | JPEG/PNG/WebP/AVIF encoders from the `image` crate |
//!
//! The module is split into:
//! - **Parameters**: [`Quality`] and [`CompressOptions`] — what to produce
//! - **Engine**: [`Compressor`] trait + source/result types
//! - **Rust engine**: [`RustCompressor`], the production implementation
//! - **AVIF**: in-memory AVIF decoding (the `image` crate only encodes it)

mod avif;
pub mod engine;
mod params;
pub mod rust_engine;

pub use engine::{CompressError, CompressedImage, Compressor, SourceImage};
pub use params::{CompressOptions, Quality};
pub use rust_engine::RustCompressor;
