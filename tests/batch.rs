//! Batch integration tests against a stand-in TeX engine.
//!
//! The engine is a small POSIX shell script run through `/bin/sh`. It is
//! invoked exactly like a real engine (working directory = staging
//! directory, staging file name last) and:
//!
//! * fails pass 1 when the file stem contains `bad`,
//! * fails pass 2 when the stem contains `late` (pass 1 leaves an `.aux`),
//! * otherwise writes `<stem>.pdf` plus `.aux`, `.log` and `.out` files,
//! * appends the staging file name to `<script>.calls` on every run.

#![cfg(unix)]

use futures::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use txt2pdf::{
    convert_stream, run_batch, BatchRequest, BuildConfig, BuildError, BuildProgressCallback,
    BuildResult, BuildStage, RenderParams, Template, TexError, Txt2PdfError,
};

const FAKE_ENGINE: &str = r#"
for last; do :; done
echo "$last" >> "$0.calls"
stem="${last%.tex}"
case "$stem" in
  *bad*)
    echo "This is a stand-in engine"
    echo "! Undefined control sequence."
    exit 1
    ;;
esac
case "$stem" in
  *late*)
    if [ -f "$stem.aux" ]; then
      echo "! Emergency stop on pass 2."
      exit 2
    fi
    ;;
esac
printf '%%PDF-1.4 stand-in\n' > "$stem.pdf"
: > "$stem.aux"
: > "$stem.log"
: > "$stem.out"
exit 0
"#;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Fixture {
    root: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("fake-tex.sh"), FAKE_ENGINE).unwrap();
        fs::create_dir(root.path().join("marks")).unwrap();
        Self { root }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    fn manuscript(&self, name: &str, text: &str) -> PathBuf {
        let p = self.path(name);
        fs::write(&p, text).unwrap();
        p
    }

    fn config(&self) -> txt2pdf::BuildConfigBuilder {
        BuildConfig::builder()
            .engine("/bin/sh")
            .engine_args([self.path("fake-tex.sh").display().to_string()])
            .output_dir(self.path("out"))
            .staging_dir(self.path("stage"))
            .template_dir(self.path("templates"))
            .watermark_dir(self.path("marks"))
            .log_dir(self.path("logs"))
    }

    fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.path("fake-tex.sh.calls"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn staging_files(&self) -> Vec<String> {
        match fs::read_dir(self.path("stage")) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn request(manuscripts: &[PathBuf]) -> BatchRequest {
    BatchRequest::new(manuscripts.iter().cloned()).params(RenderParams::builtin_defaults())
}

// ── Batch behaviour ──────────────────────────────────────────────────────────

#[tokio::test]
async fn middle_failure_does_not_stop_the_batch() {
    let fx = Fixture::new();
    let ms = [
        fx.manuscript("one.txt", "## One\nFirst *story*."),
        fx.manuscript("bad.txt", "Broken."),
        fx.manuscript("three.txt", "# Prompt\nThird."),
    ];
    let config = fx.config().build().unwrap();

    let report = run_batch(&request(&ms), &config).await.unwrap();

    assert_eq!(report.results.len(), 3);
    assert!(report.results[0].is_success());
    assert!(!report.results[1].is_success());
    assert!(report.results[2].is_success());
    for (r, m) in report.results.iter().zip(&ms) {
        assert_eq!(r.manuscript(), m.as_path());
    }

    assert!(fx.path("out/one.pdf").is_file());
    assert!(fx.path("out/three.pdf").is_file());
    assert!(!fx.path("out/bad.pdf").exists());

    match &report.results[1] {
        BuildResult::Failure { stage, error, .. } => {
            assert_eq!(*stage, BuildStage::Rendered);
            match error {
                BuildError::Tex(TexError::Failed {
                    pass, output_tail, ..
                }) => {
                    assert_eq!(*pass, 1);
                    assert!(output_tail.contains("Undefined control sequence"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(!report.summary.is_success());
    assert!(report.summary.to_string().contains("bad.txt"));
}

#[tokio::test]
async fn engine_runs_twice_per_successful_manuscript() {
    let fx = Fixture::new();
    let ms = [
        fx.manuscript("one.txt", "a"),
        fx.manuscript("bad.txt", "b"),
        fx.manuscript("two.txt", "c"),
    ];
    let config = fx.config().build().unwrap();

    run_batch(&request(&ms), &config).await.unwrap();

    assert_eq!(
        fx.calls(),
        ["one.tex", "one.tex", "bad.tex", "two.tex", "two.tex"]
    );
}

#[tokio::test]
async fn second_pass_failure_is_a_failure() {
    let fx = Fixture::new();
    let ms = [fx.manuscript("late.txt", "text")];
    let config = fx.config().build().unwrap();

    let report = run_batch(&request(&ms), &config).await.unwrap();

    match &report.results[0] {
        BuildResult::Failure { stage, error, .. } => {
            assert_eq!(*stage, BuildStage::CompiledPass1);
            assert!(matches!(
                error,
                BuildError::Tex(TexError::Failed { pass: 2, .. })
            ));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!fx.path("out/late.pdf").exists());
}

#[tokio::test]
async fn staging_directory_is_clean_after_every_outcome() {
    let fx = Fixture::new();
    let ms = [
        fx.manuscript("good.txt", "a"),
        fx.manuscript("bad.txt", "b"),
        fx.manuscript("late.txt", "c"),
    ];
    let config = fx.config().build().unwrap();

    run_batch(&request(&ms), &config).await.unwrap();

    assert_eq!(fx.staging_files(), Vec::<String>::new());
    assert!(!fx.path("out/good.aux").exists());
    assert!(!fx.path("out/good.tex").exists());
}

#[tokio::test]
async fn keep_source_moves_tex_next_to_pdf() {
    let fx = Fixture::new();
    let ms = [fx.manuscript("kept.txt", "Fish & chips")];
    let config = fx.config().keep_source(true).build().unwrap();

    let report = run_batch(&request(&ms), &config).await.unwrap();

    match &report.results[0] {
        BuildResult::Success { output, source, .. } => {
            assert_eq!(output, &fx.path("out/kept.pdf"));
            assert_eq!(source.as_deref(), Some(fx.path("out/kept.tex").as_path()));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    let tex = fs::read_to_string(fx.path("out/kept.tex")).unwrap();
    assert!(tex.contains(r"Fish \& chips"));
    assert!(tex.contains(r"\begin{document}"));
}

#[tokio::test]
async fn unreadable_manuscript_is_recorded_and_batch_continues() {
    let fx = Fixture::new();
    let ms = [fx.path("missing.txt"), fx.manuscript("ok.txt", "fine")];
    let config = fx.config().build().unwrap();

    let report = run_batch(&request(&ms), &config).await.unwrap();

    match &report.results[0] {
        BuildResult::Failure { stage, error, .. } => {
            assert_eq!(*stage, BuildStage::Pending);
            assert!(matches!(error, BuildError::ReadFailed { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(report.results[1].is_success());
}

#[tokio::test]
async fn duplicate_manuscripts_are_built_once() {
    let fx = Fixture::new();
    let a = fx.manuscript("a.txt", "x");
    let config = fx.config().build().unwrap();

    let report = run_batch(&request(&[a.clone(), a.clone(), a]), &config)
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(fx.calls().len(), 2);
}

// ── Watermarks ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_watermark_aborts_before_any_manuscript() {
    let fx = Fixture::new();
    let ms = [fx.manuscript("a.txt", "x")];
    let config = fx.config().build().unwrap();

    let err = run_batch(&request(&ms).watermark("nope.png"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Txt2PdfError::WatermarkNotFound { .. }));
    assert!(fx.calls().is_empty());
    assert!(!fx.path("out").exists());
    assert!(!fx.path("logs").exists());
}

#[tokio::test]
async fn named_watermark_is_bound_as_absolute_path() {
    let fx = Fixture::new();
    fs::write(fx.path("marks/draft.png"), b"png").unwrap();
    let ms = [fx.manuscript("a.txt", "x")];
    let config = fx.config().keep_source(true).build().unwrap();

    let report = run_batch(&request(&ms).watermark("draft.png"), &config)
        .await
        .unwrap();
    assert!(report.summary.is_success());

    let tex = fs::read_to_string(fx.path("out/a.tex")).unwrap();
    let expected = format!("{{{}}}", fx.path("marks/draft.png").display());
    assert!(tex.contains(r"\includegraphics"), "got: {tex}");
    assert!(tex.contains(&expected), "got: {tex}");
}

// ── Templates ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn named_template_from_template_dir() {
    let fx = Fixture::new();
    fs::create_dir(fx.path("templates")).unwrap();
    fs::write(
        fx.path("templates/plain.tex.j2"),
        "{% for b in blocks %}[{{ b.style }}] {{ b.text }}\n{% endfor %}",
    )
    .unwrap();
    let ms = [fx.manuscript("a.txt", "# Rain\n**Wet**")];
    let config = fx.config().keep_source(true).build().unwrap();

    run_batch(&request(&ms).template("plain"), &config)
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(fx.path("out/a.tex")).unwrap(),
        "[prompt] Rain\n[body] \\textbf{Wet}\n"
    );
}

#[tokio::test]
async fn broken_template_aborts_batch() {
    let fx = Fixture::new();
    fs::create_dir(fx.path("templates")).unwrap();
    fs::write(fx.path("templates/broken.tex.j2"), "{% if %}").unwrap();
    let ms = [fx.manuscript("a.txt", "x")];
    let config = fx.config().build().unwrap();

    let err = run_batch(&request(&ms).template("broken"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, Txt2PdfError::Template(_)));
    assert!(fx.calls().is_empty());
}

// ── Batch log ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_log_records_configuration_and_failures() {
    let fx = Fixture::new();
    let ms = [fx.manuscript("good.txt", "x"), fx.manuscript("bad.txt", "y")];
    let config = fx.config().build().unwrap();

    run_batch(&request(&ms), &config).await.unwrap();

    let run = fs::read_to_string(fx.path("logs/last-run.log")).unwrap();
    assert!(run.contains("template:    default"));
    assert!(run.contains("\"body_font\": \"Noto Serif\""));
    assert!(run.contains("good.txt") && run.contains("bad.txt"));

    let history = fs::read_to_string(fx.path("logs/history.log")).unwrap();
    assert!(history.contains("FAILED"));
    assert!(history.contains("bad.txt"));
    assert!(history.contains("| ! Undefined control sequence."));
    assert!(!history.contains("completed without errors"));

    // A clean second run replaces last-run.log and appends to history.log.
    run_batch(&request(&ms[..1]), &config).await.unwrap();
    let run = fs::read_to_string(fx.path("logs/last-run.log")).unwrap();
    assert!(!run.contains("bad.txt"));
    let history = fs::read_to_string(fx.path("logs/history.log")).unwrap();
    assert!(history.contains("FAILED"));
    assert!(history.ends_with("completed without errors\n"));
}

#[tokio::test]
async fn no_log_writes_nothing() {
    let fx = Fixture::new();
    let ms = [fx.manuscript("a.txt", "x")];
    let config = fx.config().no_log().build().unwrap();

    run_batch(&request(&ms), &config).await.unwrap();

    assert!(!fx.path("logs").exists());
}

// ── Progress and streaming ───────────────────────────────────────────────────

#[derive(Default)]
struct Counter {
    starts: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
    batch_success: AtomicUsize,
}

impl BuildProgressCallback for Counter {
    fn on_manuscript_start(&self, _i: usize, _t: usize, _m: &Path) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_manuscript_complete(&self, _i: usize, _t: usize, _o: &Path) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_manuscript_error(&self, _i: usize, _t: usize, _m: &Path, _e: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_complete(&self, _total: usize, success_count: usize) {
        self.batch_success.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_manuscript() {
    let fx = Fixture::new();
    let ms = [
        fx.manuscript("a.txt", "x"),
        fx.manuscript("bad.txt", "y"),
        fx.manuscript("c.txt", "z"),
    ];
    let counter = Arc::new(Counter::default());
    let config = fx
        .config()
        .progress_callback(counter.clone())
        .build()
        .unwrap();

    run_batch(&request(&ms), &config).await.unwrap();

    assert_eq!(counter.starts.load(Ordering::SeqCst), 3);
    assert_eq!(counter.completes.load(Ordering::SeqCst), 2);
    assert_eq!(counter.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counter.batch_success.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stream_yields_results_in_input_order() {
    let fx = Fixture::new();
    let ms = vec![
        fx.manuscript("z.txt", "x"),
        fx.manuscript("bad.txt", "y"),
        fx.manuscript("a.txt", "z"),
    ];
    let config = fx.config().no_log().build().unwrap();
    let template = Template::compile("t", "{% for b in blocks %}{{ b.text }}{% endfor %}").unwrap();

    let stream = convert_stream(&template, ms.clone(), &RenderParams::new(), &config)
        .await
        .unwrap();
    let results: Vec<BuildResult> = stream.collect().await;

    let order: Vec<&Path> = results.iter().map(|r| r.manuscript()).collect();
    assert_eq!(order, ms.iter().map(PathBuf::as_path).collect::<Vec<_>>());
    assert_eq!(
        results.iter().map(|r| r.is_success()).collect::<Vec<_>>(),
        [true, false, true]
    );
    assert!(fx.path("out/z.pdf").is_file());
}

#[test]
fn sync_wrapper_runs_outside_a_runtime() {
    let fx = Fixture::new();
    let ms = [fx.manuscript("a.txt", "x")];
    let config = fx.config().build().unwrap();

    let report = txt2pdf::run_batch_sync(&request(&ms), &config).unwrap();

    assert!(report.summary.is_success());
    assert!(fx.path("out/a.pdf").is_file());
}

// ── Engine reference ─────────────────────────────────────────────────────────

/// `/bin/sh` spelled relative to the test's working directory.
fn relative_shell() -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut rel = PathBuf::from(".");
    for _ in cwd.components().skip(1) {
        rel.push("..");
    }
    rel.join("bin/sh")
}

#[tokio::test]
async fn relative_engine_path_survives_staging_cwd() {
    let fx = Fixture::new();
    let ms = [fx.manuscript("a.txt", "Plain prose.")];
    let engine = relative_shell();
    assert!(engine.is_relative());
    let config = fx
        .config()
        .engine(engine.display().to_string())
        .build()
        .unwrap();

    let report = run_batch(&request(&ms), &config).await.unwrap();

    assert!(report.results[0].is_success(), "{:?}", report.results[0]);
    assert!(fx.path("out/a.pdf").is_file());
}
