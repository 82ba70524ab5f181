//! # txt2pdf
//!
//! Turn lightly marked-up plain-text manuscripts into typeset PDFs by way of
//! a LaTeX template and an external TeX engine.
//!
//! ## Why this crate?
//!
//! Writers keep drafts as plain text with a handful of conventions: `#` for a
//! writing prompt, `**bold**`, `~~asides~~`, `***` between scenes. This crate
//! reads those conventions, rewrites them as TeX, pours the result into a
//! template, and compiles it twice so overlays and cross-references settle.
//! One bad manuscript never stops the rest of the batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! manuscript.txt
//!  │
//!  ├─ 1. Parse    classify lines, rewrite inline markup as TeX
//!  ├─ 2. Render   one shared template + blocks + parameters → .tex
//!  ├─ 3. Compile  engine pass 1, engine pass 2 (in a staging directory)
//!  ├─ 4. Place    move the PDF (and optionally the .tex) to the output dir
//!  └─ 5. Clean    delete .aux/.log/… whatever happened above
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use txt2pdf::{run_batch, BatchRequest, BuildConfig, RenderParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BuildConfig::builder().output_dir("out").build()?;
//!     let request = BatchRequest::new(["ch1.txt", "ch2.txt"])
//!         .params(RenderParams::new().with("body_font", "EB Garamond"));
//!     let report = run_batch(&request, &config).await?;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `txt2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! txt2pdf = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchRequest, BuildConfig, BuildConfigBuilder, RenderParams};
pub use convert::{
    convert_batch, convert_batch_sync, inspect, load_template, render_to_file, run_batch,
    run_batch_sync,
};
pub use error::{BuildError, TemplateError, TexError, Txt2PdfError};
pub use output::{BatchReport, BuildRecord, BuildResult, BuildStage};
pub use pipeline::markup::{parse, Block, BlockStyle};
pub use pipeline::template::Template;
pub use progress::{BuildProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::BatchSummary;
pub use stream::{convert_stream, BuildStream};
