//! TeX engine invocation and byproduct cleanup.
//!
//! The engine runs as a child process with the staging directory as its
//! working directory, so everything it writes (`.pdf`, `.aux`, `.log`, …)
//! lands next to the staging source under the same stem. The calling task
//! waits for the process to exit; there is no timeout and no cancellation.
//!
//! [`StagingGuard`] owns the ephemeral files of one manuscript and removes
//! them when dropped, on success and failure alike.

use crate::error::TexError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// A resolved TeX engine and the arguments it is run with.
#[derive(Debug, Clone)]
pub struct Engine {
    program: PathBuf,
    args: Vec<String>,
    tail_lines: usize,
}

impl Engine {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, tail_lines: usize) -> Self {
        Self {
            program: program.into(),
            args,
            tail_lines,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run one pass over `staging_source`.
    ///
    /// Any non-zero exit is [`TexError::Failed`], carrying the last lines of
    /// the engine's combined output.
    pub async fn run_pass(&self, staging_source: &Path, pass: u8) -> Result<(), TexError> {
        let started = Instant::now();
        let dir = staging_source.parent().unwrap_or_else(|| Path::new("."));
        let file_name = staging_source.file_name().unwrap_or(staging_source.as_os_str());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(file_name)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TexError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut transcript = String::from_utf8_lossy(&output.stdout).into_owned();
            transcript.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(TexError::Failed {
                staging: staging_source.to_path_buf(),
                pass,
                exit_code: output.status.code(),
                output_tail: tail(&transcript, self.tail_lines),
            });
        }

        debug!(
            "Pass {} over {} finished in {}ms",
            pass,
            staging_source.display(),
            started.elapsed().as_millis()
        );
        Ok(())
    }
}

fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

/// Deletes the tracked files when dropped. Missing files are fine.
#[derive(Debug)]
pub struct StagingGuard {
    paths: Vec<PathBuf>,
}

impl StagingGuard {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
        }
    }

    /// Stop tracking `path`; it survives the guard.
    pub fn keep(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Move `from` to `to`, falling back to copy + delete when a plain rename
/// crosses filesystems.
pub async fn relocate(from: &Path, to: &Path) -> std::io::Result<()> {
    if from == to {
        return Ok(());
    }
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!("rename {} failed ({}); copying instead", from.display(), e);
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}
