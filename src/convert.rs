//! Eager (whole-batch) entry points.
//!
//! [`run_batch`] is what a front end calls: it resolves the watermark and
//! template named in a [`BatchRequest`], writes the batch log, builds every
//! manuscript and hands back a [`BatchReport`]. [`convert_batch`] is the
//! lower-level loop for callers that already hold a compiled [`Template`]
//! and a finished [`RenderParams`].
//!
//! Manuscripts are built strictly one after another. A manuscript that fails
//! is recorded and the loop moves on; only configuration problems detected
//! before the first manuscript is read return `Err`.
//!
//! Use [`crate::stream::convert_stream`] instead to receive results as each
//! manuscript finishes.

use crate::config::{BatchRequest, BuildConfig, RenderParams};
use crate::error::{BuildError, Txt2PdfError};
use crate::output::{BatchReport, BuildResult};
use crate::pipeline::build::{build_manuscript, BatchContext};
use crate::pipeline::compile::Engine;
use crate::pipeline::input::{self, TemplateSource};
use crate::pipeline::markup::{self, Block};
use crate::pipeline::template::{Template, DEFAULT_TEMPLATE_NAME};
use crate::progress::ProgressCallback;
use crate::report::{BatchSummary, Reporter, RunHeader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Run a complete batch described by `request`.
///
/// Order of operations:
/// 1. Resolve the watermark (absolute path or file under
///    [`BuildConfig::watermark_dir`]) and bind it as the `watermark`
///    parameter, or `""` when there is none.
/// 2. Resolve and compile the template.
/// 3. Locate the engine, prepare output and staging directories.
/// 4. Overwrite `last-run.log` with the resolved configuration.
/// 5. Build every manuscript, in order, duplicates removed.
/// 6. Append the outcome to `history.log`.
///
/// # Errors
/// Returns `Err(Txt2PdfError)` only when the batch cannot start. Every
/// manuscript-level failure is inside [`BatchReport::results`].
pub async fn run_batch(
    request: &BatchRequest,
    config: &BuildConfig,
) -> Result<BatchReport, Txt2PdfError> {
    let started = Instant::now();

    // ── Step 1: Watermark ────────────────────────────────────────────────
    let watermark = input::resolve_watermark(request.watermark.as_deref(), &config.watermark_dir)?;
    let mut params = request.params.clone();
    params.insert(
        "watermark",
        watermark.as_deref().map(input::tex_path).unwrap_or_default(),
    );

    // ── Step 2: Template ─────────────────────────────────────────────────
    let template = load_template(request.template.as_deref(), &config.template_dir)?;

    // ── Step 3: Engine and directories ───────────────────────────────────
    let batch = PreparedBatch::new(template, params, config).await?;

    // ── Step 4: Run log ──────────────────────────────────────────────────
    let manuscripts = input::dedup_manuscripts(request.manuscripts.iter().cloned());
    if manuscripts.len() < request.manuscripts.len() {
        debug!(
            "Dropped {} duplicate manuscript path(s)",
            request.manuscripts.len() - manuscripts.len()
        );
    }
    let reporter = config.log_dir.as_deref().map(Reporter::new);
    if let Some(ref reporter) = reporter {
        reporter.begin(&RunHeader {
            template: request.template.as_deref().unwrap_or(DEFAULT_TEMPLATE_NAME),
            output_dir: &config.output_dir,
            keep_source: config.keep_source,
            engine: batch.ctx.engine.program(),
            params: &batch.ctx.params,
            manuscripts: &manuscripts,
        })?;
    }

    // ── Step 5: Build ────────────────────────────────────────────────────
    let results = batch
        .run(&manuscripts, config.progress_callback.as_ref())
        .await;

    // ── Step 6: History ──────────────────────────────────────────────────
    if let Some(ref reporter) = reporter {
        if let Err(e) = reporter.finish(&results) {
            warn!(
                "Could not append to {}: {}",
                reporter.history_log().display(),
                e
            );
        }
    }

    let summary = BatchSummary::from_results(&results);
    let duration_ms = started.elapsed().as_millis() as u64;
    info!("{} ({}ms)", summary, duration_ms);

    Ok(BatchReport {
        results,
        summary,
        duration_ms,
    })
}

/// Build `manuscripts` against an already compiled template.
///
/// Returns one [`BuildResult`] per manuscript, in input order. `params` are
/// handed to the template as given; no watermark resolution happens here.
///
/// # Errors
/// Only for batch-level problems: the engine cannot be found, or the output
/// or staging directory cannot be created.
pub async fn convert_batch(
    template: &Template,
    manuscripts: &[PathBuf],
    params: &RenderParams,
    config: &BuildConfig,
) -> Result<Vec<BuildResult>, Txt2PdfError> {
    let batch = PreparedBatch::new(template.clone(), params.clone(), config).await?;
    Ok(batch
        .run(manuscripts, config.progress_callback.as_ref())
        .await)
}

/// Synchronous wrapper around [`run_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_batch_sync(
    request: &BatchRequest,
    config: &BuildConfig,
) -> Result<BatchReport, Txt2PdfError> {
    runtime()?.block_on(run_batch(request, config))
}

/// Synchronous wrapper around [`convert_batch`].
pub fn convert_batch_sync(
    template: &Template,
    manuscripts: &[PathBuf],
    params: &RenderParams,
    config: &BuildConfig,
) -> Result<Vec<BuildResult>, Txt2PdfError> {
    runtime()?.block_on(convert_batch(template, manuscripts, params, config))
}

/// Parse and render one manuscript to `target` without compiling it.
pub async fn render_to_file(
    template: &Template,
    manuscript: &Path,
    params: &RenderParams,
    target: &Path,
) -> Result<(), BuildError> {
    let blocks = inspect(manuscript).await?;
    let text = template.render(manuscript, &blocks, params)?;
    tokio::fs::write(target, text)
        .await
        .map_err(|source| BuildError::StagingWriteFailed {
            path: target.to_path_buf(),
            source,
        })?;
    info!("Rendered {} → {}", manuscript.display(), target.display());
    Ok(())
}

/// Parse a manuscript into blocks without rendering or compiling.
///
/// Needs neither a template nor a TeX engine.
pub async fn inspect(manuscript: &Path) -> Result<Vec<Block>, BuildError> {
    let text = tokio::fs::read_to_string(manuscript)
        .await
        .map_err(|source| BuildError::ReadFailed {
            path: manuscript.to_path_buf(),
            source,
        })?;
    Ok(markup::parse(&text))
}

/// Load the template named by `identifier`.
pub fn load_template(identifier: Option<&str>, template_dir: &Path) -> Result<Template, Txt2PdfError> {
    let template = match input::resolve_template(identifier, template_dir)? {
        TemplateSource::Builtin => Template::builtin()?,
        TemplateSource::File(path) => Template::load(&path)?,
    };
    debug!("Using template '{}'", template.name());
    Ok(template)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A batch whose engine and directories are ready.
///
/// Holds the temporary staging directory, when one was created, for as long
/// as the batch lives.
pub(crate) struct PreparedBatch {
    pub(crate) ctx: BatchContext,
    _staging: Option<TempDir>,
}

impl PreparedBatch {
    pub(crate) async fn new(
        template: Template,
        params: RenderParams,
        config: &BuildConfig,
    ) -> Result<Self, Txt2PdfError> {
        let program = tex_locate::locate_engine(&config.engine)?;
        debug!("Engine: {}", program.display());

        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|source| Txt2PdfError::OutputDirUnavailable {
                path: config.output_dir.clone(),
                source,
            })?;

        let (staging_dir, staging) = match config.staging_dir {
            Some(ref dir) => {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|source| Txt2PdfError::StagingDirUnavailable {
                        path: dir.clone(),
                        source,
                    })?;
                (dir.clone(), None)
            }
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix("txt2pdf-")
                    .tempdir()
                    .map_err(|source| Txt2PdfError::StagingDirUnavailable {
                        path: std::env::temp_dir(),
                        source,
                    })?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };
        debug!("Staging in {}", staging_dir.display());

        Ok(Self {
            ctx: BatchContext {
                template,
                params,
                engine: Engine::new(
                    program,
                    config.engine_args.clone(),
                    config.engine_output_tail_lines,
                ),
                staging_dir,
                output_dir: config.output_dir.clone(),
                keep_source: config.keep_source,
                byproduct_extensions: config.byproduct_extensions.clone(),
            },
            _staging: staging,
        })
    }

    async fn run(&self, manuscripts: &[PathBuf], cb: Option<&ProgressCallback>) -> Vec<BuildResult> {
        let total = manuscripts.len();
        info!("Starting batch: {} manuscript(s)", total);
        warn_on_collisions(manuscripts);
        if let Some(cb) = cb {
            cb.on_batch_start(total);
        }

        let mut results = Vec::with_capacity(total);
        for (i, manuscript) in manuscripts.iter().enumerate() {
            results.push(self.build_one(i + 1, total, manuscript, cb).await);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        if let Some(cb) = cb {
            cb.on_batch_complete(total, succeeded);
        }
        results
    }

    pub(crate) async fn build_one(
        &self,
        index: usize,
        total: usize,
        manuscript: &Path,
        cb: Option<&ProgressCallback>,
    ) -> BuildResult {
        info!("[{}/{}] {}", index, total, manuscript.display());
        if let Some(cb) = cb {
            cb.on_manuscript_start(index, total, manuscript);
        }
        let result = build_manuscript(&self.ctx, manuscript).await;
        if let Some(cb) = cb {
            match &result {
                BuildResult::Success { output, .. } => {
                    cb.on_manuscript_complete(index, total, output)
                }
                BuildResult::Failure { error, .. } => {
                    cb.on_manuscript_error(index, total, manuscript, &error.to_string())
                }
            }
        }
        result
    }
}

/// Outputs are keyed by file stem; say so when two manuscripts share one.
pub(crate) fn warn_on_collisions(manuscripts: &[PathBuf]) {
    for (first, later) in input::stem_collisions(manuscripts) {
        warn!(
            "{} and {} share a file name; the output of the first will be overwritten",
            first.display(),
            later.display()
        );
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, Txt2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Txt2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))
}
