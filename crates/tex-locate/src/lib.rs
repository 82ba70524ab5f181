//! # tex-locate
//!
//! Find the TeX engine executable that a typesetting pipeline should drive,
//! so callers can fail fast with an actionable message instead of a bare
//! "No such file or directory" from the first `Command::spawn`.
//!
//! ## How it works
//!
//! [`locate_engine`] resolves an engine reference in this order:
//!
//! 1. If the reference looks like a path (contains a separator), it must
//!    point at an existing file. No further lookup happens.
//! 2. Otherwise `TXT2PDF_TEX_ENGINE`, when set and pointing at an existing
//!    file, wins over `PATH`.
//! 3. Otherwise every directory of `PATH` is searched for the bare name
//!    (plus `.exe` / `.cmd` / `.bat` on Windows).
//!
//! The returned path is always absolute. Relative references are resolved
//! against the current directory at lookup time, so the engine can later be
//! spawned from any working directory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tex_locate::locate_engine;
//!
//! let lualatex = locate_engine("lualatex").expect("install TeX Live or MiKTeX");
//! println!("using {}", lualatex.display());
//! ```
//!
//! ## Environment variable overrides
//!
//! - `TXT2PDF_TEX_ENGINE`: path to an engine binary; skips the `PATH` search.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Engine used when the caller does not name one.
pub const DEFAULT_ENGINE: &str = "lualatex";

/// Environment variable that overrides the `PATH` search.
pub const ENGINE_ENV_VAR: &str = "TXT2PDF_TEX_ENGINE";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by engine discovery.
#[derive(Error, Debug)]
pub enum LocateError {
    /// The caller gave an explicit path and nothing is there.
    #[error("TeX engine '{path}' does not exist")]
    MissingPath { path: PathBuf },

    /// The engine reference was empty.
    #[error("TeX engine name is empty")]
    EmptyName,

    /// The bare name was not found in any `PATH` directory.
    #[error(
        "TeX engine '{name}' was not found on PATH.\n\
Install a TeX distribution (TeX Live, MiKTeX) or point {ENGINE_ENV_VAR} at the binary."
    )]
    NotOnPath { name: String },
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolves `engine` to an executable path using the process environment.
pub fn locate_engine(engine: &str) -> Result<PathBuf, LocateError> {
    resolve_with(
        engine,
        std::env::var_os(ENGINE_ENV_VAR),
        std::env::var_os("PATH"),
    )
}

/// Returns `true` if [`locate_engine`] would succeed for `engine`.
pub fn is_engine_available(engine: &str) -> bool {
    locate_engine(engine).is_ok()
}

/// Resolves `engine` against explicit override and `PATH` values.
///
/// The result is absolute, whatever form the reference took.
///
/// [`locate_engine`] is a thin wrapper that reads both from the environment;
/// this form exists so the lookup order can be exercised without mutating
/// process-wide state.
pub fn resolve_with(
    engine: &str,
    env_override: Option<OsString>,
    path_var: Option<OsString>,
) -> Result<PathBuf, LocateError> {
    resolve_relative(engine, env_override, path_var).map(absolutize)
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn resolve_relative(
    engine: &str,
    env_override: Option<OsString>,
    path_var: Option<OsString>,
) -> Result<PathBuf, LocateError> {
    let engine = engine.trim();
    if engine.is_empty() {
        return Err(LocateError::EmptyName);
    }

    // 1. Explicit path.
    if looks_like_path(engine) {
        let p = PathBuf::from(engine);
        return if p.is_file() {
            Ok(p)
        } else {
            Err(LocateError::MissingPath { path: p })
        };
    }

    // 2. Environment override.
    if let Some(env_path) = env_override.filter(|v| !v.is_empty()) {
        let p = PathBuf::from(env_path);
        if p.is_file() {
            return Ok(p);
        }
        // Fall through: override set but file missing → still search PATH.
        eprintln!(
            "tex-locate: {ENGINE_ENV_VAR} '{}' not found; searching PATH …",
            p.display()
        );
    }

    // 3. PATH search.
    path_var
        .as_deref()
        .and_then(|paths| search_path(engine, paths))
        .ok_or_else(|| LocateError::NotOnPath {
            name: engine.to_string(),
        })
}

/// Anchor `path` at the current directory. Left as is if that is unknown.
fn absolutize(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

fn looks_like_path(engine: &str) -> bool {
    engine.contains('/') || engine.contains(std::path::MAIN_SEPARATOR)
}

fn search_path(name: &str, paths: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| candidates(&dir, name))
        .find(|candidate| is_executable(candidate))
}

fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    let mut out = vec![dir.join(name)];
    if cfg!(windows) {
        for ext in ["exe", "cmd", "bat"] {
            out.push(dir.join(format!("{name}.{ext}")));
        }
    }
    out
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[cfg(unix)]
    fn make_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = resolve_with("  ", None, None).unwrap_err();
        assert!(matches!(err, LocateError::EmptyName));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = resolve_with("/definitely/not/here/lualatex", None, None).unwrap_err();
        assert!(matches!(err, LocateError::MissingPath { .. }));
        assert!(err.to_string().contains("/definitely/not/here/lualatex"));
    }

    #[test]
    fn explicit_path_wins_over_override() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("engine");
        fs::write(&engine, "").unwrap();
        let found = resolve_with(
            engine.to_str().unwrap(),
            Some(OsString::from("/nope/other")),
            None,
        )
        .unwrap();
        assert_eq!(found, engine);
    }

    #[test]
    fn env_override_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("my-lualatex");
        fs::write(&engine, "").unwrap();
        let found = resolve_with("lualatex", Some(engine.clone().into_os_string()), None).unwrap();
        assert_eq!(found, engine);
    }

    #[cfg(unix)]
    #[test]
    fn path_search_finds_executable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("lualatex");
        make_executable(&engine);
        let path_var = std::env::join_paths([PathBuf::from("/nonexistent"), dir.path().into()])
            .unwrap();
        let found = resolve_with("lualatex", None, Some(path_var)).unwrap();
        assert_eq!(found, engine);
    }

    #[cfg(unix)]
    #[test]
    fn path_search_skips_non_executable_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lualatex"), "").unwrap();
        let err = resolve_with("lualatex", None, Some(dir.path().into())).unwrap_err();
        assert!(matches!(err, LocateError::NotOnPath { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn missing_override_falls_back_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("xelatex");
        make_executable(&engine);
        let found = resolve_with(
            "xelatex",
            Some(OsString::from("/gone/xelatex")),
            Some(dir.path().into()),
        )
        .unwrap();
        assert_eq!(found, engine);
    }

    // The crate directory is the working directory under `cargo test`.
    #[test]
    fn relative_explicit_path_is_made_absolute() {
        let found = resolve_with("./Cargo.toml", None, None).unwrap();
        assert!(found.is_absolute(), "got: {}", found.display());
        assert!(found.is_file());
        assert!(found.ends_with("Cargo.toml"));
    }

    #[test]
    fn relative_env_override_is_made_absolute() {
        let found = resolve_with("lualatex", Some(OsString::from("./Cargo.toml")), None).unwrap();
        assert!(found.is_absolute(), "got: {}", found.display());
        assert_eq!(found, std::env::current_dir().unwrap().join("Cargo.toml"));
    }

    #[test]
    fn not_on_path_message_names_override() {
        let err = resolve_with("lualatex", None, Some(OsString::new())).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("lualatex"), "got: {msg}");
        assert!(msg.contains(ENGINE_ENV_VAR), "got: {msg}");
    }
}
