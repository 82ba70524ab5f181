//! Per-manuscript build state machine.
//!
//! ```text
//! Pending ─read/parse─▶ Parsed ─render─▶ Rendered ─pass 1─▶ CompiledPass1
//!         ─pass 2─▶ CompiledPass2 ─relocate─▶ Finalized
//! ```
//!
//! Any step may fail; the manuscript's [`BuildResult::Failure`] records the
//! last stage it reached. The staging source, the staging document and every
//! byproduct are held by a [`StagingGuard`] for the whole build, so they are
//! removed on every exit path. Relocated files are released from the guard
//! once they have left the staging directory.

use crate::config::RenderParams;
use crate::error::BuildError;
use crate::output::{BuildResult, BuildStage};
use crate::pipeline::compile::{self, Engine, StagingGuard};
use crate::pipeline::input::ManuscriptPaths;
use crate::pipeline::markup;
use crate::pipeline::template::Template;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything shared by the manuscripts of one batch.
#[derive(Debug, Clone)]
pub struct BatchContext {
    pub template: Template,
    pub params: RenderParams,
    pub engine: Engine,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub keep_source: bool,
    pub byproduct_extensions: Vec<String>,
}

/// Build one manuscript to completion. Never returns early with an error;
/// every failure becomes a [`BuildResult::Failure`].
pub async fn build_manuscript(ctx: &BatchContext, manuscript: &Path) -> BuildResult {
    let paths = ManuscriptPaths::derive(
        manuscript,
        &ctx.staging_dir,
        &ctx.output_dir,
        &ctx.byproduct_extensions,
    );
    let mut build = ManuscriptBuild::new(paths);

    let outcome = build.run(ctx).await;
    let stage = build.stage;
    // Drop the guard before reporting so the staging directory is already
    // clean when the caller sees the result.
    drop(build);

    match outcome {
        Ok((output, source)) => BuildResult::Success {
            manuscript: manuscript.to_path_buf(),
            output,
            source,
        },
        Err(error) => {
            warn!(
                "{} failed after stage '{}': {}",
                manuscript.display(),
                stage,
                error
            );
            BuildResult::Failure {
                manuscript: manuscript.to_path_buf(),
                stage,
                error,
            }
        }
    }
}

struct ManuscriptBuild {
    paths: ManuscriptPaths,
    stage: BuildStage,
    guard: StagingGuard,
}

impl ManuscriptBuild {
    fn new(paths: ManuscriptPaths) -> Self {
        let mut tracked = vec![paths.staging_source.clone(), paths.staging_output.clone()];
        tracked.extend(paths.byproducts.iter().cloned());
        Self {
            paths,
            stage: BuildStage::Pending,
            guard: StagingGuard::new(tracked),
        }
    }

    fn advance(&mut self, stage: BuildStage) {
        debug!("{}: {}", self.paths.manuscript.display(), stage);
        self.stage = stage;
    }

    async fn run(&mut self, ctx: &BatchContext) -> Result<(PathBuf, Option<PathBuf>), BuildError> {
        let p = &self.paths;

        let text = tokio::fs::read_to_string(&p.manuscript)
            .await
            .map_err(|source| BuildError::ReadFailed {
                path: p.manuscript.clone(),
                source,
            })?;
        let blocks = markup::parse(&text);
        self.advance(BuildStage::Parsed);

        let p = &self.paths;
        let rendered = ctx.template.render(&p.manuscript, &blocks, &ctx.params)?;
        tokio::fs::write(&p.staging_source, rendered)
            .await
            .map_err(|source| BuildError::StagingWriteFailed {
                path: p.staging_source.clone(),
                source,
            })?;
        self.advance(BuildStage::Rendered);

        ctx.engine.run_pass(&self.paths.staging_source, 1).await?;
        self.advance(BuildStage::CompiledPass1);

        ctx.engine.run_pass(&self.paths.staging_source, 2).await?;
        self.advance(BuildStage::CompiledPass2);

        let output = self.paths.output.clone();
        compile::relocate(&self.paths.staging_output, &output)
            .await
            .map_err(|source| BuildError::RelocateFailed {
                from: self.paths.staging_output.clone(),
                to: output.clone(),
                source,
            })?;
        self.guard.keep(&output);

        let source = if ctx.keep_source {
            self.keep_source().await
        } else {
            None
        };

        self.advance(BuildStage::Finalized);
        Ok((output, source))
    }

    /// Move the staging source next to the output. The document is already
    /// in place, so a failure here only costs the source.
    async fn keep_source(&mut self) -> Option<PathBuf> {
        let from = &self.paths.staging_source;
        let to = self.paths.kept_source.clone();
        match compile::relocate(from, &to).await {
            Ok(()) => {
                self.guard.keep(&to);
                Some(to)
            }
            Err(e) => {
                warn!("Could not keep source {}: {}", from.display(), e);
                None
            }
        }
    }
}
