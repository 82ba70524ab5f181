//! CLI binary for txt2pdf.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `BuildConfig` and a `BatchRequest`, and prints the batch summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use txt2pdf::{
    inspect, run_batch, BatchRequest, BuildConfig, BuildProgressCallback, ProgressCallback,
    RenderParams,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the batch, one log line per
/// manuscript printed above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} manuscripts  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Building");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl BuildProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Building {total} manuscript(s)…"))
        ));
    }

    fn on_manuscript_start(&self, _index: usize, _total: usize, manuscript: &Path) {
        self.bar.set_message(file_name(manuscript));
    }

    fn on_manuscript_complete(&self, index: usize, total: usize, output: &Path) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            dim(&output.display().to_string()),
        ));
        self.bar.inc(1);
    }

    fn on_manuscript_error(&self, index: usize, total: usize, manuscript: &Path, error: &str) {
        // Keep to one line; the full diagnostic is in the batch log.
        let first = error.lines().next().unwrap_or_default();
        let msg = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            file_name(manuscript),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Build two manuscripts into ./out with the bundled template
  txt2pdf ch1.txt ch2.txt -o out

  # Custom template from the template directory, keep the .tex
  txt2pdf --template novel --keep-tex book/*.txt -o out

  # Watermark by file name (looked up in the watermark directory)
  txt2pdf --watermark draft.png ch1.txt

  # Fonts and extra template parameters
  txt2pdf --body-font "EB Garamond" --param margin=20mm ch1.txt

  # See how a manuscript is parsed (no TeX needed)
  txt2pdf --inspect-only --json ch1.txt

MANUSCRIPT MARKUP:
  # line          writing prompt
  ## line         title
  ### line        addendum
  ***             scene separator
  **bold**  *italic*  ~~aside~~  <<footnote>>  [label](url)
  ---  --  ...    em dash, en dash, ellipsis
  \\ or \par      at line end joins the next line

ENVIRONMENT VARIABLES:
  TXT2PDF_TEX_ENGINE   Path to the TeX engine binary (overrides PATH lookup)
  RUST_LOG             Tracing filter, e.g. txt2pdf=debug
  Every option also reads TXT2PDF_<OPTION>, e.g. TXT2PDF_OUTPUT_DIR.
"#;

/// Typeset plain-text manuscripts as PDFs through a LaTeX template.
#[derive(Parser, Debug)]
#[command(
    name = "txt2pdf",
    version,
    about = "Typeset plain-text manuscripts as PDFs through a LaTeX template",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Manuscripts to build, in order. Repeated paths are built once.
    #[arg(required = true)]
    manuscripts: Vec<PathBuf>,

    /// Directory for the compiled PDFs.
    #[arg(short, long = "output-dir", env = "TXT2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Template path, or name under the template directory. Default: bundled.
    #[arg(short, long, env = "TXT2PDF_TEMPLATE")]
    template: Option<String>,

    /// Lookup directory for named templates.
    #[arg(long, env = "TXT2PDF_TEMPLATE_DIR")]
    template_dir: Option<PathBuf>,

    /// Watermark image: absolute path, or file name under the watermark directory.
    #[arg(short, long, env = "TXT2PDF_WATERMARK")]
    watermark: Option<String>,

    /// Lookup directory for named watermarks.
    #[arg(long, env = "TXT2PDF_WATERMARK_DIR")]
    watermark_dir: Option<PathBuf>,

    /// Also keep the rendered .tex next to each PDF.
    #[arg(long, env = "TXT2PDF_KEEP_TEX")]
    keep_tex: bool,

    #[arg(long, env = "TXT2PDF_BODY_FONT")]
    body_font: Option<String>,

    #[arg(long, env = "TXT2PDF_TITLE_FONT")]
    title_font: Option<String>,

    #[arg(long, env = "TXT2PDF_PROMPT_FONT")]
    prompt_font: Option<String>,

    /// Font for CJK text.
    #[arg(long, env = "TXT2PDF_CJK_FONT")]
    cjk_font: Option<String>,

    /// Body size, e.g. 11pt.
    #[arg(long, env = "TXT2PDF_BODY_SIZE")]
    body_size: Option<String>,

    #[arg(long, env = "TXT2PDF_TITLE_SIZE")]
    title_size: Option<String>,

    #[arg(long, env = "TXT2PDF_PROMPT_SIZE")]
    prompt_size: Option<String>,

    /// Extra template parameter (repeatable).
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    params: Vec<(String, String)>,

    /// JSON object of extra template parameters. --param and font flags win.
    #[arg(long, env = "TXT2PDF_PARAMS_FILE")]
    params_file: Option<PathBuf>,

    /// TeX engine name or path.
    #[arg(long, default_value = "lualatex")]
    engine: String,

    /// Argument passed to the engine before the file name (repeatable).
    /// Replaces the default --interaction=nonstopmode.
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Staging directory for .tex and byproducts. Default: a fresh temp dir.
    #[arg(long, env = "TXT2PDF_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Directory for last-run.log and history.log.
    #[arg(long, env = "TXT2PDF_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Do not write the batch log.
    #[arg(long, env = "TXT2PDF_NO_LOG", conflicts_with = "log_dir")]
    no_log: bool,

    /// Print the parsed blocks of each manuscript, no rendering or compiling.
    #[arg(long)]
    inspect_only: bool,

    /// Emit JSON on stdout instead of the human summary.
    #[arg(long, env = "TXT2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TXT2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TXT2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TXT2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already reports each manuscript; keep library INFO
    // lines out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        return inspect_manuscripts(&cli).await;
    }

    // ── Build config and request ─────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BuildProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let request = build_request(&cli).await?;

    // ── Run batch ────────────────────────────────────────────────────────
    let report = run_batch(&request, &config)
        .await
        .context("Batch could not start")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "summary": &report.summary,
            "duration_ms": report.duration_ms,
            "results": report.records(),
        }))
        .context("Failed to serialise results")?;
        println!("{json}");
    } else if !cli.quiet {
        let mark = if report.summary.is_success() {
            green("✔")
        } else {
            red("✘")
        };
        eprintln!("{mark} {}  {}", report.summary, dim(&format!("{}ms", report.duration_ms)));
        if let Some(ref dir) = config.log_dir {
            if !report.summary.is_success() {
                eprintln!("   {}", dim(&format!("log: {}", dir.display())));
            }
        }
    }

    Ok(if report.summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn inspect_manuscripts(cli: &Cli) -> Result<ExitCode> {
    let mut all = Vec::with_capacity(cli.manuscripts.len());
    for path in &cli.manuscripts {
        let blocks = inspect(path)
            .await
            .with_context(|| format!("Failed to inspect {}", path.display()))?;
        all.push((path, blocks));
    }

    if cli.json {
        let value: Vec<_> = all
            .iter()
            .map(|(path, blocks)| serde_json::json!({ "manuscript": path, "blocks": blocks }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise blocks")?
        );
    } else {
        for (path, blocks) in &all {
            println!("{}", bold(&path.display().to_string()));
            for block in blocks {
                println!("  {:<9} {}", block.style.as_str(), block.text);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Map CLI args to `BuildConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BuildConfig> {
    let mut builder = BuildConfig::builder()
        .output_dir(&cli.output_dir)
        .keep_source(cli.keep_tex)
        .engine(&cli.engine);

    if !cli.engine_args.is_empty() {
        builder = builder.engine_args(cli.engine_args.iter().cloned());
    }
    if let Some(ref dir) = cli.staging_dir {
        builder = builder.staging_dir(dir);
    }
    if let Some(ref dir) = cli.template_dir {
        builder = builder.template_dir(dir);
    }
    if let Some(ref dir) = cli.watermark_dir {
        builder = builder.watermark_dir(dir);
    }
    if let Some(ref dir) = cli.log_dir {
        builder = builder.log_dir(dir);
    }
    if cli.no_log {
        builder = builder.no_log();
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to `BatchRequest`.
///
/// Parameters are layered: bundled-template defaults, then `--params-file`,
/// then `--param`, then the dedicated font flags.
async fn build_request(cli: &Cli) -> Result<BatchRequest> {
    let mut params = RenderParams::builtin_defaults();

    if let Some(ref path) = cli.params_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read parameters from {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        params.merge_json(value)?;
    }

    for (key, value) in &cli.params {
        params.insert(key.as_str(), value.as_str());
    }

    let flags = [
        ("body_font", &cli.body_font),
        ("title_font", &cli.title_font),
        ("prompt_font", &cli.prompt_font),
        ("cjk_font", &cli.cjk_font),
        ("body_size", &cli.body_size),
        ("title_size", &cli.title_size),
        ("prompt_size", &cli.prompt_size),
    ];
    for (key, value) in flags {
        if let Some(v) = value {
            params.insert(key, v.as_str());
        }
    }

    let mut request = BatchRequest::new(cli.manuscripts.iter().cloned()).params(params);
    if let Some(ref t) = cli.template {
        request = request.template(t);
    }
    if let Some(ref w) = cli.watermark {
        request = request.watermark(w);
    }
    Ok(request)
}

/// Parse `--param KEY=VALUE`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
