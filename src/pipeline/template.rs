//! Template rendering: blocks + parameters → complete LaTeX source.
//!
//! A [`Template`] is compiled once per batch and shared by every manuscript
//! in it. Compilation parses the source eagerly, so syntax errors surface as
//! a [`TemplateError::Compile`] at batch start rather than once per file.
//!
//! The environment mirrors the classic Jinja settings used for LaTeX
//! skeletons: a block tag swallows its trailing newline, whitespace in front
//! of a block tag is stripped, and the template's final newline is kept.
//! Undefined names are errors, so a template asking for a parameter the
//! caller did not supply fails that manuscript instead of silently printing
//! nothing.
//!
//! Nothing is escaped. Block text is already LaTeX (see
//! [`crate::pipeline::markup`]) and parameter values are inserted verbatim;
//! callers sanitise anything that needs it.

use crate::config::RenderParams;
use crate::error::TemplateError;
use crate::pipeline::markup::Block;
use minijinja::{AutoEscape, Environment, UndefinedBehavior, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Identifier of the bundled template.
pub const DEFAULT_TEMPLATE_NAME: &str = "default";

/// Source of the bundled template.
pub const DEFAULT_TEMPLATE_SOURCE: &str = include_str!("../../templates/manuscript.tex.j2");

/// A compiled, reusable document skeleton.
///
/// Cheap to clone; clones share the compiled form.
#[derive(Clone)]
pub struct Template {
    name: String,
    env: Arc<Environment<'static>>,
}

impl Template {
    /// Compile `source`, naming it `name` in diagnostics.
    pub fn compile(name: impl Into<String>, source: impl Into<String>) -> Result<Self, TemplateError> {
        let name: String = name.into();
        let source: String = source.into();
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        env.add_template_owned(name.clone(), source)
            .map_err(|err| TemplateError::Compile {
                name: name.clone(),
                source: err,
            })?;
        debug!("Compiled template '{}'", name);

        Ok(Self {
            name,
            env: Arc::new(env),
        })
    }

    /// Read and compile a template file. The path becomes its name.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let name = path.display().to_string();
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Load {
            name: name.clone(),
            source,
        })?;
        Self::compile(name, source)
    }

    /// The bundled manuscript template.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::compile(DEFAULT_TEMPLATE_NAME, DEFAULT_TEMPLATE_SOURCE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render `blocks` for the manuscript at `manuscript`.
    ///
    /// Every entry of `params` is visible by its key; `blocks` is a sequence
    /// of `{style, text}` maps and shadows a parameter of the same name.
    pub fn render(
        &self,
        manuscript: &Path,
        blocks: &[Block],
        params: &RenderParams,
    ) -> Result<String, TemplateError> {
        let render_err = |source: minijinja::Error| TemplateError::Render {
            manuscript: manuscript.to_path_buf(),
            source,
        };

        let mut ctx: BTreeMap<&str, Value> = params
            .iter()
            .map(|(k, v)| (k.as_str(), Value::from_serialize(v)))
            .collect();
        ctx.insert("blocks", Value::from_serialize(blocks));

        let tmpl = self.env.get_template(&self.name).map_err(render_err)?;
        tmpl.render(&ctx).map_err(render_err)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template").field("name", &self.name).finish()
    }
}
