//! Input resolution: turn the caller's identifiers into concrete paths.
//!
//! Everything here runs before the first manuscript is read. A watermark or
//! template that does not resolve is a configuration error and aborts the
//! whole batch; nothing in this module ever produces a per-manuscript
//! failure.
//!
//! [`ManuscriptPaths`] fixes every path a manuscript's build touches up
//! front. The staging source, compiled document and byproducts all share
//! the manuscript's file stem, so they can be found again for relocation
//! and cleanup without asking the engine.

use crate::error::Txt2PdfError;
use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of the rendered staging source.
pub const SOURCE_EXT: &str = "tex";

/// Extension of the compiled document.
pub const OUTPUT_EXT: &str = "pdf";

// ── Watermark ────────────────────────────────────────────────────────────

/// Resolve a watermark identifier to an absolute file path.
///
/// * `None` or blank → no watermark.
/// * An absolute path to an existing file → that path.
/// * A file name present in `watermark_dir` → its absolute path.
///
/// Anything else is [`Txt2PdfError::WatermarkNotFound`].
pub fn resolve_watermark(
    identifier: Option<&str>,
    watermark_dir: &Path,
) -> Result<Option<PathBuf>, Txt2PdfError> {
    let Some(id) = identifier.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    let direct = Path::new(id);
    if direct.is_absolute() && direct.is_file() {
        debug!("Watermark '{}' is an absolute path", id);
        return Ok(Some(direct.to_path_buf()));
    }

    let candidate = watermark_dir.join(id);
    if !direct.is_absolute() && candidate.is_file() {
        let abs = absolute(&candidate)?;
        debug!("Watermark '{}' resolved to {}", id, abs.display());
        return Ok(Some(abs));
    }

    Err(Txt2PdfError::WatermarkNotFound {
        identifier: id.to_string(),
        searched: watermark_dir.to_path_buf(),
    })
}

/// Render a path the way TeX wants it inside `\includegraphics{...}`:
/// forward slashes only.
pub fn tex_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ── Template ─────────────────────────────────────────────────────────────

/// Where the batch template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// The bundled template.
    Builtin,
    File(PathBuf),
}

/// Resolve a template identifier.
///
/// * `None`, blank, or `default` → [`TemplateSource::Builtin`].
/// * An existing file path → that file.
/// * `<template_dir>/<id>` or `<template_dir>/<id>.tex.j2` → that file.
pub fn resolve_template(
    identifier: Option<&str>,
    template_dir: &Path,
) -> Result<TemplateSource, Txt2PdfError> {
    let id = match identifier.map(str::trim) {
        None | Some("") => return Ok(TemplateSource::Builtin),
        Some(id) if id == crate::pipeline::template::DEFAULT_TEMPLATE_NAME => {
            return Ok(TemplateSource::Builtin)
        }
        Some(id) => id,
    };

    let direct = PathBuf::from(id);
    if direct.is_file() {
        return Ok(TemplateSource::File(direct));
    }

    let named = template_dir.join(id);
    if named.is_file() {
        return Ok(TemplateSource::File(named));
    }

    let with_ext = template_dir.join(format!("{id}.tex.j2"));
    if with_ext.is_file() {
        return Ok(TemplateSource::File(with_ext));
    }

    Err(Txt2PdfError::TemplateNotFound {
        identifier: id.to_string(),
        searched: template_dir.to_path_buf(),
    })
}

// ── Manuscripts ──────────────────────────────────────────────────────────

/// Drop repeated manuscript paths, keeping the first occurrence and the
/// original order.
pub fn dedup_manuscripts<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .map(Into::into)
        .filter(|p: &PathBuf| seen.insert(p.clone()))
        .collect()
}

/// Pairs of manuscripts whose outputs would land on the same file.
///
/// Outputs are named after the file stem alone, so `a/ch1.txt` and
/// `b/ch1.txt` both produce `ch1.pdf`. Each pair is `(first, later)`; the
/// later build overwrites the earlier one.
pub fn stem_collisions(manuscripts: &[PathBuf]) -> Vec<(&Path, &Path)> {
    let mut first: HashMap<&OsStr, &Path> = HashMap::new();
    let mut clashes = Vec::new();
    for m in manuscripts {
        let stem = m.file_stem().unwrap_or_else(|| OsStr::new("untitled"));
        match first.get(stem) {
            Some(earlier) => clashes.push((*earlier, m.as_path())),
            None => {
                first.insert(stem, m.as_path());
            }
        }
    }
    clashes
}

/// Every path one manuscript's build reads, writes or deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManuscriptPaths {
    pub manuscript: PathBuf,
    /// Rendered source in the staging directory.
    pub staging_source: PathBuf,
    /// Document the engine writes next to the staging source.
    pub staging_output: PathBuf,
    /// Final document location.
    pub output: PathBuf,
    /// Final source location, used only when sources are kept.
    pub kept_source: PathBuf,
    /// Engine byproducts to delete.
    pub byproducts: Vec<PathBuf>,
}

impl ManuscriptPaths {
    pub fn derive(
        manuscript: &Path,
        staging_dir: &Path,
        output_dir: &Path,
        byproduct_extensions: &[String],
    ) -> Self {
        let stem = manuscript
            .file_stem()
            .unwrap_or_else(|| OsStr::new("untitled"));

        Self {
            manuscript: manuscript.to_path_buf(),
            staging_source: staging_dir.join(swap_ext(stem, SOURCE_EXT)),
            staging_output: staging_dir.join(swap_ext(stem, OUTPUT_EXT)),
            output: output_dir.join(swap_ext(stem, OUTPUT_EXT)),
            kept_source: output_dir.join(swap_ext(stem, SOURCE_EXT)),
            byproducts: byproduct_extensions
                .iter()
                .map(|ext| staging_dir.join(swap_ext(stem, ext.trim_start_matches('.'))))
                .collect(),
        }
    }
}

/// `stem` + `.` + `ext`, without `Path::with_extension`'s habit of eating
/// dotted stems like `v1.2`.
fn swap_ext(stem: &OsStr, ext: &str) -> OsString {
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(ext);
    name
}

fn absolute(path: &Path) -> Result<PathBuf, Txt2PdfError> {
    std::path::absolute(path)
        .map_err(|e| Txt2PdfError::Internal(format!("cannot absolutise '{}': {e}", path.display())))
}
