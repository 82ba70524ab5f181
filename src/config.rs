//! Configuration types for manuscript batches.
//!
//! [`BuildConfig`] holds everything about *where* and *how* a batch runs:
//! output and staging directories, the TeX engine, lookup roots for named
//! templates and watermarks, and where the batch log goes. It replaces
//! process-wide path constants, so the pipeline can be pointed at a
//! throwaway directory tree in tests.
//!
//! [`BatchRequest`] holds *what* to build: the ordered manuscript list, the
//! template and watermark identifiers, and the [`RenderParams`] handed to the
//! template.

use crate::error::Txt2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Directory name used under the platform data directories.
pub const APP_DIR: &str = "txt2pdf";

/// Compiler byproducts removed after every manuscript.
pub const DEFAULT_BYPRODUCTS: [&str; 4] = ["aux", "log", "out", "synctex.gz"];

/// Configuration for a manuscript batch.
///
/// Built via [`BuildConfig::builder()`] or using [`BuildConfig::default()`].
///
/// # Example
/// ```rust
/// use txt2pdf::BuildConfig;
///
/// let config = BuildConfig::builder()
///     .output_dir("out")
///     .keep_source(true)
///     .engine("xelatex")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BuildConfig {
    /// Where compiled documents end up. Created if missing. Default: `.`.
    pub output_dir: PathBuf,

    /// Also move the rendered `.tex` to `output_dir`. Default: false.
    pub keep_source: bool,

    /// Engine program name or path. Default: `lualatex`.
    ///
    /// Resolved once per batch by [`tex_locate::locate_engine`]; an engine
    /// that cannot be found aborts the batch before any manuscript is read.
    pub engine: String,

    /// Arguments placed before the staging file name on both passes.
    /// Default: `--interaction=nonstopmode`.
    pub engine_args: Vec<String>,

    /// Directory for staging sources and engine byproducts.
    ///
    /// `None` (default) creates a fresh temporary directory per batch that is
    /// removed when the batch ends.
    pub staging_dir: Option<PathBuf>,

    /// Lookup root for template identifiers that are not paths.
    pub template_dir: PathBuf,

    /// Lookup root for watermark identifiers that are not absolute paths.
    pub watermark_dir: PathBuf,

    /// Where `last-run.log` and `history.log` are written.
    /// `None` disables the persisted batch log.
    pub log_dir: Option<PathBuf>,

    /// File extensions (without the dot) of byproducts deleted after every
    /// manuscript, success or failure.
    pub byproduct_extensions: Vec<String>,

    /// How many trailing lines of engine output a [`crate::TexError`] keeps.
    /// Default: 40.
    pub engine_output_tail_lines: usize,

    /// Optional progress callback for per-manuscript events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);
        let log_dir = dirs::data_local_dir()
            .map(|d| d.join(APP_DIR))
            .unwrap_or_else(|| data_dir.clone());

        Self {
            output_dir: PathBuf::from("."),
            keep_source: false,
            engine: tex_locate::DEFAULT_ENGINE.to_string(),
            engine_args: vec!["--interaction=nonstopmode".to_string()],
            staging_dir: None,
            template_dir: data_dir.join("templates"),
            watermark_dir: data_dir.join("watermarks"),
            log_dir: Some(log_dir),
            byproduct_extensions: DEFAULT_BYPRODUCTS.iter().map(|s| s.to_string()).collect(),
            engine_output_tail_lines: 40,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("output_dir", &self.output_dir)
            .field("keep_source", &self.keep_source)
            .field("engine", &self.engine)
            .field("engine_args", &self.engine_args)
            .field("staging_dir", &self.staging_dir)
            .field("template_dir", &self.template_dir)
            .field("watermark_dir", &self.watermark_dir)
            .field("log_dir", &self.log_dir)
            .field("byproduct_extensions", &self.byproduct_extensions)
            .field("engine_output_tail_lines", &self.engine_output_tail_lines)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BuildProgressCallback>"),
            )
            .finish()
    }
}

impl BuildConfig {
    /// Create a new builder for `BuildConfig`.
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BuildConfig`].
#[derive(Debug)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn keep_source(mut self, v: bool) -> Self {
        self.config.keep_source = v;
        self
    }

    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.config.engine = engine.into();
        self
    }

    pub fn engine_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.engine_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.staging_dir = Some(dir.into());
        self
    }

    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.template_dir = dir.into();
        self
    }

    pub fn watermark_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.watermark_dir = dir.into();
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = Some(dir.into());
        self
    }

    /// Do not persist a batch log.
    pub fn no_log(mut self) -> Self {
        self.config.log_dir = None;
        self
    }

    pub fn byproduct_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.byproduct_extensions = exts.into_iter().map(Into::into).collect();
        self
    }

    pub fn engine_output_tail_lines(mut self, n: usize) -> Self {
        self.config.engine_output_tail_lines = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BuildConfig, Txt2PdfError> {
        let c = &self.config;
        if c.engine.trim().is_empty() {
            return Err(Txt2PdfError::InvalidConfig(
                "Engine name must not be empty".into(),
            ));
        }
        for ext in &c.byproduct_extensions {
            let ext = ext.trim_start_matches('.');
            if ext.is_empty() {
                return Err(Txt2PdfError::InvalidConfig(
                    "Byproduct extensions must not be empty".into(),
                ));
            }
            if ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("tex") {
                return Err(Txt2PdfError::InvalidConfig(format!(
                    "'{ext}' cannot be a byproduct extension: it would delete the build output"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Render parameters ────────────────────────────────────────────────────

/// Named values handed to the template alongside the blocks.
///
/// Font family and size per role, `watermark` (absolute path or empty), and
/// whatever extra keys the caller supplies. Values are passed through
/// untouched: no validation, no escaping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderParams(BTreeMap<String, serde_json::Value>);

impl RenderParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font and size values the bundled template expects, with `watermark`
    /// empty.
    pub fn builtin_defaults() -> Self {
        Self::new()
            .with("body_font", "Noto Serif")
            .with("title_font", "Noto Sans")
            .with("prompt_font", "Noto Sans")
            .with("cjk_font", "Noto Serif CJK SC")
            .with("body_size", "11pt")
            .with("title_size", "18pt")
            .with("prompt_size", "12pt")
            .with("watermark", "")
    }

    /// Set `key`, returning the previous value.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style [`RenderParams::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge the entries of a JSON object; later keys overwrite earlier ones.
    pub fn merge_json(&mut self, value: serde_json::Value) -> Result<(), Txt2PdfError> {
        match value {
            serde_json::Value::Object(map) => {
                self.0.extend(map);
                Ok(())
            }
            other => Err(Txt2PdfError::InvalidConfig(format!(
                "Render parameters must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for RenderParams {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

// ── Batch request ────────────────────────────────────────────────────────

/// The upstream collaborator's half of a batch: which manuscripts, which
/// template and watermark, and which parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Manuscripts in processing order.
    pub manuscripts: Vec<PathBuf>,

    /// Template path or name under [`BuildConfig::template_dir`].
    /// `None` or `"default"` selects the bundled template.
    pub template: Option<String>,

    /// Watermark absolute path or file name under
    /// [`BuildConfig::watermark_dir`]. `None` or empty: no watermark.
    pub watermark: Option<String>,

    pub params: RenderParams,
}

impl BatchRequest {
    pub fn new<I, P>(manuscripts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            manuscripts: manuscripts.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn template(mut self, id: impl Into<String>) -> Self {
        self.template = Some(id.into());
        self
    }

    pub fn watermark(mut self, id: impl Into<String>) -> Self {
        self.watermark = Some(id.into());
        self
    }

    pub fn params(mut self, params: RenderParams) -> Self {
        self.params = params;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BuildConfig::default();
        assert_eq!(c.engine, "lualatex");
        assert_eq!(c.engine_args, ["--interaction=nonstopmode"]);
        assert!(!c.keep_source);
        assert!(c.staging_dir.is_none());
        assert_eq!(c.byproduct_extensions, ["aux", "log", "out", "synctex.gz"]);
        assert!(c.template_dir.ends_with("txt2pdf/templates"));
        assert!(c.watermark_dir.ends_with("txt2pdf/watermarks"));
    }

    #[test]
    fn builder_sets_fields() {
        let c = BuildConfig::builder()
            .output_dir("/out")
            .keep_source(true)
            .engine("xelatex")
            .engine_args(["-halt-on-error"])
            .staging_dir("/stage")
            .no_log()
            .build()
            .unwrap();
        assert_eq!(c.output_dir, PathBuf::from("/out"));
        assert!(c.keep_source);
        assert_eq!(c.engine, "xelatex");
        assert_eq!(c.engine_args, ["-halt-on-error"]);
        assert_eq!(c.staging_dir, Some(PathBuf::from("/stage")));
        assert!(c.log_dir.is_none());
    }

    #[test]
    fn empty_engine_rejected() {
        let err = BuildConfig::builder().engine(" ").build().unwrap_err();
        assert!(matches!(err, Txt2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn output_extensions_cannot_be_byproducts() {
        let err = BuildConfig::builder()
            .byproduct_extensions(["aux", ".PDF"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("PDF"), "got: {err}");
        assert!(BuildConfig::builder()
            .byproduct_extensions(["tex"])
            .build()
            .is_err());
        assert!(BuildConfig::builder()
            .byproduct_extensions([""])
            .build()
            .is_err());
    }

    #[test]
    fn render_params_merge_json_object() {
        let mut p = RenderParams::new().with("body_font", "A");
        p.merge_json(serde_json::json!({"body_font": "B", "margin": 18}))
            .unwrap();
        assert_eq!(p.get("body_font"), Some(&serde_json::json!("B")));
        assert_eq!(p.get("margin"), Some(&serde_json::json!(18)));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn builtin_defaults_cover_every_font_role() {
        let p = RenderParams::builtin_defaults();
        for key in ["body_font", "title_font", "prompt_font", "cjk_font"] {
            assert!(p.get(key).is_some(), "missing {key}");
        }
        assert_eq!(p.get("watermark"), Some(&serde_json::json!("")));
    }

    #[test]
    fn render_params_reject_non_object() {
        let err = RenderParams::new()
            .merge_json(serde_json::json!(["a"]))
            .unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn render_params_serialise_as_plain_map() {
        let p: RenderParams = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn debug_lists_tail_lines_and_hides_callback() {
        let config = BuildConfig::builder()
            .engine_output_tail_lines(7)
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("engine_output_tail_lines: 7"), "got: {dbg}");
        assert!(dbg.contains("progress_callback: None"), "got: {dbg}");
    }
}
