//! Progress-callback trait for per-manuscript build events.
//!
//! Inject an [`Arc<dyn BuildProgressCallback>`] via
//! [`crate::config::BuildConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a batch.
//!
//! Manuscripts are built strictly one after another, so events for one
//! manuscript never interleave with another's. The trait is still
//! `Send + Sync` because the batch future may be driven from any runtime
//! worker thread.
//!
//! # Example
//!
//! ```rust
//! use txt2pdf::{BuildProgressCallback, BuildConfig};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     built: AtomicUsize,
//! }
//!
//! impl BuildProgressCallback for CountingCallback {
//!     fn on_manuscript_complete(&self, index: usize, total: usize, output: &Path) {
//!         self.built.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} → {}", index, total, output.display());
//!     }
//! }
//!
//! let config = BuildConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { built: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the build pipeline as it processes each manuscript.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait BuildProgressCallback: Send + Sync {
    /// Called once before the first manuscript is read.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a manuscript is parsed.
    fn on_manuscript_start(&self, index: usize, total: usize, manuscript: &Path) {
        let _ = (index, total, manuscript);
    }

    /// Called when a manuscript's document has been moved to the output
    /// directory.
    fn on_manuscript_complete(&self, index: usize, total: usize, output: &Path) {
        let _ = (index, total, output);
    }

    /// Called when a manuscript fails at any stage.
    ///
    /// `error` is the one-line message, not the full diagnostic.
    fn on_manuscript_error(&self, index: usize, total: usize, manuscript: &Path, error: &str) {
        let _ = (index, total, manuscript, error);
    }

    /// Called once after every manuscript has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BuildProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BuildConfig`].
pub type ProgressCallback = Arc<dyn BuildProgressCallback>;
