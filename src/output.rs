//! Result types produced by a batch.

use crate::error::BuildError;
use crate::report::BatchSummary;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// How far a manuscript got through the build.
///
/// A manuscript moves `Parsed → Rendered → CompiledPass1 → CompiledPass2 →
/// Finalized`. A failure records the last stage that was reached, so
/// `Pending` means the manuscript could not even be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Pending,
    Parsed,
    Rendered,
    CompiledPass1,
    CompiledPass2,
    Finalized,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStage::Pending => "pending",
            BuildStage::Parsed => "parsed",
            BuildStage::Rendered => "rendered",
            BuildStage::CompiledPass1 => "compiled (pass 1)",
            BuildStage::CompiledPass2 => "compiled (pass 2)",
            BuildStage::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Outcome of one manuscript. A batch yields one per input, in input order.
#[derive(Debug)]
pub enum BuildResult {
    Success {
        manuscript: PathBuf,
        /// The compiled document, inside the output directory.
        output: PathBuf,
        /// The relocated `.tex`, when the batch keeps sources.
        source: Option<PathBuf>,
    },
    Failure {
        manuscript: PathBuf,
        /// Last stage reached before the error.
        stage: BuildStage,
        error: BuildError,
    },
}

impl BuildResult {
    pub fn manuscript(&self) -> &Path {
        match self {
            BuildResult::Success { manuscript, .. } | BuildResult::Failure { manuscript, .. } => {
                manuscript
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success { .. })
    }

    pub fn output(&self) -> Option<&Path> {
        match self {
            BuildResult::Success { output, .. } => Some(output),
            BuildResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&BuildError> {
        match self {
            BuildResult::Success { .. } => None,
            BuildResult::Failure { error, .. } => Some(error),
        }
    }
}

/// Serialisable view of a [`BuildResult`] for JSON output.
///
/// Errors are flattened to their one-line message.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRecord {
    pub manuscript: PathBuf,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<BuildStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&BuildResult> for BuildRecord {
    fn from(r: &BuildResult) -> Self {
        match r {
            BuildResult::Success {
                manuscript,
                output,
                source,
            } => BuildRecord {
                manuscript: manuscript.clone(),
                success: true,
                output: Some(output.clone()),
                source: source.clone(),
                stage: None,
                error: None,
            },
            BuildResult::Failure {
                manuscript,
                stage,
                error,
            } => BuildRecord {
                manuscript: manuscript.clone(),
                success: false,
                output: None,
                source: None,
                stage: Some(*stage),
                error: Some(error.to_string()),
            },
        }
    }
}

/// Everything a completed batch hands back to its caller.
#[derive(Debug)]
pub struct BatchReport {
    /// One entry per manuscript, in input order.
    pub results: Vec<BuildResult>,
    pub summary: BatchSummary,
    /// Wall-clock time of the whole batch.
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn records(&self) -> Vec<BuildRecord> {
        self.results.iter().map(BuildRecord::from).collect()
    }
}
