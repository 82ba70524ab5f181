//! Batch log and end-user summary.
//!
//! Two files live in the log directory:
//!
//! * `last-run.log` is overwritten at the start of every batch with the
//!   resolved configuration, so it always describes the most recent run.
//! * `history.log` is only ever appended to. Each batch adds a header line
//!   followed by the full diagnostic of every failed manuscript, or a single
//!   `completed without errors` line.
//!
//! The log is the only place diagnostics appear. [`BatchSummary`] is what
//! end users see: success, or the list of manuscripts that failed.

use crate::config::RenderParams;
use crate::error::Txt2PdfError;
use crate::output::BuildResult;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

pub const RUN_LOG_FILE: &str = "last-run.log";
pub const HISTORY_LOG_FILE: &str = "history.log";

const SUCCESS_MARKER: &str = "completed without errors";

/// The resolved configuration of one batch, as recorded in `last-run.log`.
#[derive(Debug, Serialize)]
pub struct RunHeader<'a> {
    pub template: &'a str,
    pub output_dir: &'a Path,
    pub keep_source: bool,
    pub engine: &'a Path,
    pub params: &'a RenderParams,
    pub manuscripts: &'a [PathBuf],
}

/// Writes the two batch log files.
#[derive(Debug, Clone)]
pub struct Reporter {
    run_log: PathBuf,
    history_log: PathBuf,
}

impl Reporter {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            run_log: log_dir.join(RUN_LOG_FILE),
            history_log: log_dir.join(HISTORY_LOG_FILE),
        }
    }

    pub fn run_log(&self) -> &Path {
        &self.run_log
    }

    pub fn history_log(&self) -> &Path {
        &self.history_log
    }

    /// Overwrite `last-run.log` with the batch header.
    pub fn begin(&self, header: &RunHeader<'_>) -> Result<(), Txt2PdfError> {
        let fail = |source: std::io::Error| Txt2PdfError::LogWriteFailed {
            path: self.run_log.clone(),
            source,
        };
        if let Some(dir) = self.run_log.parent() {
            std::fs::create_dir_all(dir).map_err(fail)?;
        }
        std::fs::write(&self.run_log, format_header(header)).map_err(fail)?;
        debug!("Wrote {}", self.run_log.display());
        Ok(())
    }

    /// Append this batch's outcome to `history.log`.
    pub fn finish(&self, results: &[BuildResult]) -> std::io::Result<()> {
        if let Some(dir) = self.history_log.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_log)?;
        file.write_all(format_history(results).as_bytes())?;
        debug!("Appended to {}", self.history_log.display());
        Ok(())
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown time".to_string())
}

fn format_header(h: &RunHeader<'_>) -> String {
    let params =
        serde_json::to_string_pretty(h.params).unwrap_or_else(|e| format!("<unprintable: {e}>"));
    let mut out = String::new();
    let _ = writeln!(out, "=== txt2pdf run {} ===", timestamp());
    let _ = writeln!(out, "template:    {}", h.template);
    let _ = writeln!(out, "output dir:  {}", h.output_dir.display());
    let _ = writeln!(out, "keep source: {}", h.keep_source);
    let _ = writeln!(out, "engine:      {}", h.engine.display());
    let _ = writeln!(out, "params:\n{params}");
    let _ = writeln!(out, "manuscripts ({}):", h.manuscripts.len());
    for (i, m) in h.manuscripts.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, m.display());
    }
    out
}

fn format_history(results: &[BuildResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== {} | {} manuscript(s) ===",
        timestamp(),
        results.len()
    );
    let mut failed = 0;
    for r in results {
        if let BuildResult::Failure {
            manuscript,
            stage,
            error,
        } = r
        {
            failed += 1;
            let _ = writeln!(out, "FAILED {} (reached: {})", manuscript.display(), stage);
            for line in error.diagnostic().lines() {
                let _ = writeln!(out, "  {line}");
            }
        }
    }
    if failed == 0 {
        let _ = writeln!(out, "{SUCCESS_MARKER}");
    }
    out
}

// ── Summary ──────────────────────────────────────────────────────────────

/// The terse end-of-batch message shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchSummary {
    AllSucceeded { total: usize },
    SomeFailed { failed: Vec<PathBuf>, total: usize },
}

impl BatchSummary {
    pub fn from_results(results: &[BuildResult]) -> Self {
        let failed: Vec<PathBuf> = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.manuscript().to_path_buf())
            .collect();
        if failed.is_empty() {
            BatchSummary::AllSucceeded {
                total: results.len(),
            }
        } else {
            BatchSummary::SomeFailed {
                failed,
                total: results.len(),
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BatchSummary::AllSucceeded { .. })
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSummary::AllSucceeded { total } => {
                write!(f, "All {total} manuscript(s) built successfully.")
            }
            BatchSummary::SomeFailed { failed, total } => {
                write!(f, "{} of {} manuscript(s) failed:", failed.len(), total)?;
                for m in failed {
                    write!(f, "\n  - {}", m.display())?;
                }
                write!(f, "\nSee the batch log for details.")
            }
        }
    }
}
