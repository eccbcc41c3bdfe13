//! # shrinkray
//!
//! A batch image compressor. Point it at images (or directories of them)
//! and it converts and compresses everything to JPEG, PNG, WebP, or AVIF —
//! written out one file at a time or bundled into a single ZIP, with
//! originals optionally packed alongside.
//!
//! # Architecture: Queue → Codec → Export
//!
//! Work flows through three stages around one central piece of state:
//!
//! ```text
//! 1. Submit    files        →  queue items     (MIME filter + rejection report)
//! 2. Drive     queue        →  compressed      (serial, one item in flight)
//! 3. Export    completed    →  files / ZIP     (naming pattern + collision rules)
//! ```
//!
//! The queue is the only mutable shared state; everything downstream reads
//! snapshots. Three properties fall out of this shape:
//!
//! - **Bounded memory**: one decoded bitmap in flight at a time, by design.
//!   Serial driving is not a missing optimization — it keeps peak memory
//!   flat and progress reporting monotone.
//! - **Testability**: the queue is an explicit state machine driven by
//!   method calls, not framework lifecycle. Every transition is exercised
//!   against a mock engine with zero I/O.
//! - **Settings epochs**: changing format or quality invalidates completed
//!   work (back to `Queued`) without touching anything in flight.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`queue`] | Item lifecycle state machine: submit, drive, options epochs, retry |
//! | [`codec`] | Compression engine behind a trait: decode, bounded resize, encode |
//! | [`archive`] | In-memory ZIP packaging with deterministic collision resolution |
//! | [`export`] | Completed items → export projections, output files, run reports |
//! | [`naming`] | `{name}`/`{ext}`/`{timestamp}`/`{date}` filename templating |
//! | [`formats`] | Supported format set and MIME/extension mapping |
//!
//! # Design Decisions
//!
//! ## Pure-Rust Codecs (No ImageMagick, No FFmpeg)
//!
//! Decoding and encoding use the `image` crate, with AVIF decode via
//! `avif-parse` + `rav1d` — all pure Rust, all statically linked. No
//! system dependencies, no version conflicts: the binary is fully
//! self-contained.
//!
//! ## Explicit `drive()` Over Implicit Reactivity
//!
//! The queue never processes anything on its own. Callers submit, then
//! drive; a boolean guard makes the drive pass non-reentrant. This keeps
//! the state machine inspectable at every step and trivially testable.
//!
//! ## Everything In Memory
//!
//! Sources are read once into memory and results stay there until exported.
//! There is no cache, no temp directory, no persisted state of any kind —
//! a run starts from its inputs and ends at its outputs.

pub mod archive;
pub mod codec;
pub mod export;
pub mod formats;
pub mod naming;
pub mod queue;
