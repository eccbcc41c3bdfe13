use clap::{Parser, Subcommand, ValueEnum};
use shrinkray::archive::{self, ArchiveOptions};
use shrinkray::codec::{CompressOptions, Quality, RustCompressor};
use shrinkray::export::{self, RunReport};
use shrinkray::formats::ImageFormat;
use shrinkray::naming;
use shrinkray::queue::{ItemStatus, ProcessingQueue, SubmitReport};
use std::io::Write;
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
enum TargetFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl From<TargetFormat> for ImageFormat {
    fn from(value: TargetFormat) -> Self {
        match value {
            TargetFormat::Jpeg => ImageFormat::Jpeg,
            TargetFormat::Png => ImageFormat::Png,
            TargetFormat::Webp => ImageFormat::Webp,
            TargetFormat::Avif => ImageFormat::Avif,
        }
    }
}

/// Shared flags for commands that compress images.
#[derive(clap::Args, Clone)]
struct EncodeArgs {
    /// Images or directories of images (directories are walked recursively)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Target format
    #[arg(long, short, value_enum, default_value = "webp")]
    format: TargetFormat,

    /// Encoding quality, 0.0–1.0 (JPEG and AVIF; PNG and WebP are lossless)
    #[arg(long, short, default_value_t = 0.8)]
    quality: f32,

    /// Bound output width in pixels (aspect ratio preserved, never upscales)
    #[arg(long)]
    max_width: Option<u32>,

    /// Bound output height in pixels
    #[arg(long)]
    max_height: Option<u32>,

    /// Step quality down until each output fits this size (best effort)
    #[arg(long)]
    target_size_kb: Option<u32>,

    /// Output naming pattern; tokens: {name} {ext} {timestamp} {date}
    #[arg(long, default_value = naming::DEFAULT_PATTERN)]
    pattern: String,
}

impl EncodeArgs {
    fn compress_options(&self) -> CompressOptions {
        CompressOptions {
            format: self.format.into(),
            quality: Quality::new(self.quality),
            max_width: self.max_width,
            max_height: self.max_height,
            target_size_kb: self.target_size_kb,
        }
    }
}

#[derive(Parser)]
#[command(name = "shrinkray")]
#[command(about = "Batch image compressor with ZIP export")]
#[command(long_about = "\
Batch image compressor with ZIP export

Converts and compresses images to JPEG, PNG, WebP, or AVIF. Inputs outside
the supported set are skipped and reported; one bad image never aborts a
run. Output names come from a token pattern:

  {name}       source filename stem
  {ext}        target extension
  {timestamp}  Unix time in milliseconds
  {date}       current date, YYYY-MM-DD

Examples:

  shrinkray compress photos/ --format webp --out minified
      photos/dawn.jpg → minified/dawn-min.webp

  shrinkray compress scan.png -f avif -q 0.6 --max-width 1600
      bound to 1600px wide, AVIF at quality 0.6

  shrinkray zip photos/ --include-originals --subfolders --out photos.zip
      processed/ and originals/ inside one archive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress images and write each result to the output directory
    Compress {
        #[command(flatten)]
        encode: EncodeArgs,

        /// Output directory
        #[arg(long, short, default_value = "compressed")]
        out: PathBuf,

        /// Print a JSON run report instead of the summary
        #[arg(long)]
        json: bool,
    },
    /// Compress images and bundle the results into one ZIP archive
    Zip {
        #[command(flatten)]
        encode: EncodeArgs,

        /// Output archive path
        #[arg(long, short, default_value = "images.zip")]
        out: PathBuf,

        /// Also pack each source image, under its patterned name
        #[arg(long)]
        include_originals: bool,

        /// Use processed/ and originals/ subfolders instead of a flat root
        #[arg(long)]
        subfolders: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compress { encode, out, json } => {
            naming::validate_pattern(&encode.pattern)?;
            let (queue, submit) = run_pipeline(&encode)?;

            if json {
                let report = RunReport::from_queue(queue.items(), submit.rejected_extensions);
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            print_summary(&queue, &submit);
            let items = export::export_items(queue.items(), &encode.pattern, false);
            let written = export::write_outputs(&items, &out)?;
            println!("==> Wrote {} file(s) to {}", written.len(), out.display());
        }
        Command::Zip {
            encode,
            out,
            include_originals,
            subfolders,
        } => {
            naming::validate_pattern(&encode.pattern)?;
            let (queue, submit) = run_pipeline(&encode)?;
            print_summary(&queue, &submit);

            let items = export::export_items(queue.items(), &encode.pattern, include_originals);
            if items.is_empty() {
                println!("==> Nothing to archive");
                return Ok(());
            }

            let options = ArchiveOptions {
                include_originals,
                create_subfolders: subfolders,
                name_pattern: encode.pattern.clone(),
            };
            let mut last = 0u32;
            let blob = archive::build_archive(&items, &options, |percent| {
                if percent != last {
                    last = percent;
                    print!("\r==> Archiving {percent:>3}%");
                    let _ = std::io::stdout().flush();
                }
            })?;
            println!();

            std::fs::write(&out, &blob)?;
            let entries = items.len() * if include_originals { 2 } else { 1 };
            println!(
                "==> {}: {} entries, {} KB",
                out.display(),
                entries,
                blob.len() / 1024
            );
        }
    }

    Ok(())
}

/// Collect sources, submit, and drive the queue to completion.
fn run_pipeline(
    encode: &EncodeArgs,
) -> Result<(ProcessingQueue, SubmitReport), Box<dyn std::error::Error>> {
    let sources = export::collect_sources(&encode.paths)?;
    let mut queue = ProcessingQueue::new(encode.compress_options());
    let submit = queue.submit(sources);

    if submit.is_noop() {
        println!("==> No files found");
    } else if submit.accepted > 0 {
        println!("==> Compressing {} image(s)", submit.accepted);
        queue.drive(&RustCompressor::new());
    }
    Ok((queue, submit))
}

/// Per-item lines plus the rejection summary, oldest first.
fn print_summary(queue: &ProcessingQueue, submit: &SubmitReport) {
    for item in queue.items().iter().rev() {
        match item.status {
            ItemStatus::Completed => {
                let result = item.result.as_ref().expect("completed item has result");
                println!(
                    "  {} → {} ({}%, {} KB)",
                    item.source.name,
                    result.filename,
                    export::saved_percent(item.source.size(), result.size()),
                    result.size() / 1024,
                );
            }
            ItemStatus::Failed => {
                let reason = item.error.as_deref().unwrap_or("unknown error");
                println!("  {} FAILED: {}", item.source.name, reason);
            }
            ItemStatus::Queued | ItemStatus::Processing => {}
        }
    }
    if !submit.rejected_extensions.is_empty() {
        println!(
            "  Skipped unsupported file type(s): {}",
            submit.rejected_extensions.join(", ")
        );
    }
}
