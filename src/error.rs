//! Error types for the txt2pdf library.
//!
//! Two distinct error families reflect two distinct failure scopes:
//!
//! * [`Txt2PdfError`]: **Batch-level**: the batch cannot start at all
//!   (unknown watermark, template that does not compile, missing TeX engine,
//!   unwritable output directory). Returned as `Err(Txt2PdfError)` from the
//!   top-level `run_batch` / `convert_batch` functions before any manuscript
//!   is read.
//!
//! * [`BuildError`]: **Per manuscript**: one manuscript failed to render,
//!   compile or relocate, but the rest of the batch is unaffected. Stored in
//!   [`crate::output::BuildResult::Failure`] and never propagated.
//!
//! [`TemplateError`] and [`TexError`] are the two causes the pipeline names
//! explicitly; both can appear inside a [`BuildError`], and a template that
//! fails to compile surfaces as [`Txt2PdfError::Template`].

use std::error::Error as _;
use std::path::PathBuf;
use thiserror::Error;

/// All batch-level errors returned by the txt2pdf library.
///
/// Manuscript-level failures use [`BuildError`] and are stored in
/// [`crate::output::BuildResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Txt2PdfError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// Watermark identifier is neither an existing absolute path nor a file
    /// in the watermark directory.
    #[error("Watermark '{identifier}' not found (looked in '{searched}')\nPass an absolute path or a file name from the watermark directory.")]
    WatermarkNotFound { identifier: String, searched: PathBuf },

    /// Template identifier did not resolve to a file.
    #[error("Template '{identifier}' not found (looked in '{searched}')")]
    TemplateNotFound { identifier: String, searched: PathBuf },

    /// The shared template failed to load or compile.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The TeX engine could not be located.
    #[error("TeX engine unavailable: {0}")]
    EngineNotFound(#[from] tex_locate::LocateError),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory.
    #[error("Output directory '{path}' is unavailable: {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the staging directory.
    #[error("Staging directory '{path}' is unavailable: {source}")]
    StagingDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the batch log.
    #[error("Failed to write batch log '{path}': {source}")]
    LogWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Template load, compile or render failure.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template source could not be read.
    #[error("Failed to read template '{name}': {source}")]
    Load {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The template source is not valid template syntax.
    #[error("Template '{name}' does not compile")]
    Compile {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    /// Rendering failed for one manuscript (missing binding, template-side error).
    #[error("Template rendering failed for '{manuscript}'")]
    Render {
        manuscript: PathBuf,
        #[source]
        source: minijinja::Error,
    },
}

/// The external TeX engine failed.
#[derive(Debug, Error)]
pub enum TexError {
    /// The engine process could not be started.
    #[error("Failed to start TeX engine '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine exited unsuccessfully on one of the two passes.
    #[error("TeX engine failed on pass {pass} for '{staging}' (exit {exit_code:?})")]
    Failed {
        staging: PathBuf,
        pass: u8,
        exit_code: Option<i32>,
        /// Last lines of the engine transcript (stdout + stderr).
        output_tail: String,
    },
}

/// A non-fatal error for a single manuscript.
///
/// Stored in [`crate::output::BuildResult::Failure`]. The batch continues
/// with the next manuscript.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The manuscript could not be read as UTF-8 text.
    #[error("Failed to read manuscript '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rendering against the shared template failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The rendered source could not be written.
    #[error("Failed to write rendered source '{path}': {source}")]
    StagingWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TeX engine failed on either pass.
    #[error(transparent)]
    Tex(#[from] TexError),

    /// The compiled document (or kept source) could not be moved to the
    /// output directory.
    #[error("Failed to move '{from}' to '{to}': {source}")]
    RelocateFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Full diagnostic for the persisted log: the message, every `source()`
    /// in the chain, and the engine transcript tail when there is one.
    ///
    /// Never shown to end users; see [`crate::report::BatchSummary`].
    pub fn diagnostic(&self) -> String {
        let mut out = self.to_string();
        let mut cause = self.source();
        while let Some(err) = cause {
            out.push_str("\n  caused by: ");
            out.push_str(&err.to_string());
            cause = err.source();
        }
        match self {
            BuildError::Tex(TexError::Failed { output_tail, .. }) if !output_tail.is_empty() => {
                out.push_str("\n  engine output:\n");
                for line in output_tail.lines() {
                    out.push_str("    | ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            BuildError::Template(TemplateError::Render { source, .. }) => {
                let info = source.display_debug_info().to_string();
                if !info.trim().is_empty() {
                    out.push('\n');
                    out.push_str(info.trim_end());
                }
            }
            _ => {}
        }
        out
    }
}
