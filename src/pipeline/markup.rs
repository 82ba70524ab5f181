//! Markup parsing: manuscript plain text → ordered, classified [`Block`]s.
//!
//! Authors write manuscripts in a small inline dialect (`#` style markers,
//! `***` separators, `**bold**`, `*italic*`, `~~note text~~`, `<<note>>`,
//! `[label](url)`, straight quotes, dashes, ellipses). [`parse`] turns each
//! logical line into one block whose text is ready to drop into a LaTeX
//! template verbatim.
//!
//! ## Rule Order
//!
//! Steps run in a fixed order and each inline rule sees the output of the
//! previous one. Escaping comes first so later rules may insert backslashes
//! freely. Italic runs between two bold passes so that emphasis nested in a
//! bold span is resolved on the second bold pass.
//!
//! Unbalanced markup never matches a rule and is passed through untouched;
//! parsing cannot fail.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Paragraph style of a block, picked from its leading `#` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStyle {
    /// No marker.
    Body,
    /// `#`
    Prompt,
    /// `##`
    Title,
    /// `###` or more.
    Addendum,
    /// A line of three or more `*`.
    Separator,
}

impl BlockStyle {
    /// Lowercase name, as templates see it.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockStyle::Body => "body",
            BlockStyle::Prompt => "prompt",
            BlockStyle::Title => "title",
            BlockStyle::Addendum => "addendum",
            BlockStyle::Separator => "separator",
        }
    }

    fn from_marker_len(hashes: usize) -> Self {
        match hashes {
            0 => BlockStyle::Body,
            1 => BlockStyle::Prompt,
            2 => BlockStyle::Title,
            _ => BlockStyle::Addendum,
        }
    }
}

/// One logical line of a manuscript, styled and transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub style: BlockStyle,
    pub text: String,
}

impl Block {
    pub fn new(style: BlockStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Parse manuscript text into blocks, in source order.
///
/// 1. Merge lines ending in a hard-break marker (`\\` or `\par`) with the next line
/// 2. Split into stripped, non-blank lines
/// 3. Detect style from the leading `#` run and strip it
/// 4. Detect `***` separators
/// 5. Apply the inline rules (see [`transform_inline`])
pub fn parse(text: &str) -> Vec<Block> {
    let merged = merge_hard_breaks(text);
    merged
        .split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

/// Line boundaries: `\n`, `\r` (so `\r\n` and old Mac files both work),
/// plus the vertical tab, form feed, separator controls and Unicode line and
/// paragraph separators.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c'..='\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

fn parse_line(line: &str) -> Block {
    let (style, rest) = split_style_marker(line);
    if RE_SEPARATOR.is_match(rest) {
        return Block::new(BlockStyle::Separator, "");
    }
    Block::new(style, transform_inline(rest))
}

// ── Step 1: Line merge ───────────────────────────────────────────────────────

static RE_HARD_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\\\\|\\par)[ \t]*(?:\r\n|\r|\n)").unwrap());

fn merge_hard_breaks(input: &str) -> String {
    RE_HARD_BREAK.replace_all(input, " ${1} ").into_owned()
}

// ── Steps 3–4: Style and separator detection ─────────────────────────────────

fn split_style_marker(line: &str) -> (BlockStyle, &str) {
    let rest = line.trim_start_matches('#');
    let hashes = line.len() - rest.len();
    (BlockStyle::from_marker_len(hashes), rest)
}

static RE_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*{3,}\s*$").unwrap());

// ── Step 5: Inline rules ─────────────────────────────────────────────────────

static RE_SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([&#%$])").unwrap());
static RE_NOTE_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~((?:[^~]|~[^~])+)~~").unwrap());
static RE_NOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r" *<<((?:[^>]|>[^>])+)>> *").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").unwrap());
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*((?:[^*]|\*[^*])+)\*\*").unwrap());
static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_OPEN_DOUBLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(\s|\(|\{|^)""#).unwrap());
static RE_OPEN_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s|\(|\{|^)'").unwrap());
static RE_MDASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:---|—)\s*|\s+(?:-|–)\s+").unwrap());
static RE_NDASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*--\s*").unwrap());
static RE_ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*(?:\.\.\.|…)\s*").unwrap());
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Apply the inline rules to one block's text.
///
/// a. Escape `&`, `#`, `%`, `$`
/// b. `~~x~~` → `\ntext{x}`; `<<x>>` → `\note{x} ` (surrounding spaces absorbed)
/// c. `[label](url)` → `\href{url}{label}`
/// d. `**x**` → `\textbf{x}`, `*x*` → `\emph{x}`, then bold again for nesting
/// e. Straight and curly quotes → TeX quotes
/// f. `---`, `—`, spaced `-`/`–` → `\mdash `; `--` → `\ndash `
/// g. `...`, `…` → `\ellipsis `
/// h. Collapse whitespace runs and trim
pub fn transform_inline(text: &str) -> String {
    let s = RE_SPECIAL.replace_all(text, r"\${1}");
    let s = RE_NOTE_TEXT.replace_all(&s, r"\ntext{${1}}");
    let s = RE_NOTE.replace_all(&s, r"\note{${1}} ");
    let s = RE_LINK.replace_all(&s, r"\href{${2}}{${1}}");
    let s = RE_BOLD.replace_all(&s, r"\textbf{${1}}");
    let s = RE_ITALIC.replace_all(&s, r"\emph{${1}}");
    let s = RE_BOLD.replace_all(&s, r"\textbf{${1}}");
    let s = convert_quotes(&s);
    let s = RE_MDASH.replace_all(&s, r"\mdash ");
    let s = RE_NDASH.replace_all(&s, r"\ndash ");
    let s = RE_ELLIPSIS.replace_all(&s, r"\ellipsis ");
    RE_WHITESPACE.replace_all(&s, " ").trim().to_string()
}

fn convert_quotes(input: &str) -> String {
    let s = RE_OPEN_DOUBLE.replace_all(input, "${1}``");
    let s = RE_OPEN_SINGLE.replace_all(&s, "${1}`");
    s.replace('"', "''")
        .replace('‘', "`")
        .replace('’', "'")
        .replace('“', "``")
        .replace('”', "''")
}

// ── Tests ────────────────────────────────────────────────────────────────────
