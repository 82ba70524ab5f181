//! Streaming batch API: yield each manuscript's result as soon as it is built.
//!
//! Unlike the eager [`crate::convert::convert_batch`], which returns only
//! after the last manuscript, [`convert_stream`] hands back a `Stream` of
//! [`BuildResult`]s. Manuscripts are still built one at a time and results
//! arrive in input order; the stream only changes *when* the caller sees
//! them.
//!
//! Per-manuscript progress events fire as usual. The batch-level
//! `on_batch_start` / `on_batch_complete` events do not, since the stream
//! may be dropped before it is exhausted.

use crate::config::{BuildConfig, RenderParams};
use crate::convert::{warn_on_collisions, PreparedBatch};
use crate::error::Txt2PdfError;
use crate::output::BuildResult;
use crate::pipeline::template::Template;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-manuscript results.
pub type BuildStream = Pin<Box<dyn Stream<Item = BuildResult> + Send>>;

/// Build `manuscripts`, streaming results in input order.
///
/// The engine is located and the output and staging directories are created
/// before this returns, so configuration problems still surface as `Err`.
/// A temporary staging directory lives until the stream is dropped.
pub async fn convert_stream(
    template: &Template,
    manuscripts: Vec<PathBuf>,
    params: &RenderParams,
    config: &BuildConfig,
) -> Result<BuildStream, Txt2PdfError> {
    let batch = Arc::new(PreparedBatch::new(template.clone(), params.clone(), config).await?);
    let cb = config.progress_callback.clone();
    let total = manuscripts.len();
    info!("Starting streaming batch: {} manuscript(s)", total);
    warn_on_collisions(&manuscripts);

    let s = stream::iter(manuscripts.into_iter().enumerate()).then(move |(i, manuscript)| {
        let batch = Arc::clone(&batch);
        let cb = cb.clone();
        async move {
            batch
                .build_one(i + 1, total, &manuscript, cb.as_ref())
                .await
        }
    });

    Ok(Box::pin(s))
}
