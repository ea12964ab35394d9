//! Markdown cleanup for final answers.
//!
//! The response model is told to answer in plain text, but it still slips
//! markdown in. Answers are read out over voice channels and low-end
//! devices, so formatting is stripped rather than rendered. The cleanup is
//! idempotent: running it a second time changes nothing.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]*)`").unwrap());
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.*?)\*").unwrap());
static BOLD_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"__(.*?)__").unwrap());
static ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(.*?)_").unwrap());
// Header, bullet and numbered-list markers at a line start, indented or
// not. The repetition consumes a whole run of stacked markers ("- - x",
// "# ## x", "1. - x") in one match; a marker revealed by stripping the one
// before it would otherwise survive into a second application.
static LINE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:#{1,6}\s+|[-*+]\s+|\d+\.\s+)+").unwrap());
static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").unwrap());

/// Strip markdown formatting from a model reply.
///
/// Fenced code blocks are dropped wholesale and inline code is unwrapped
/// before emphasis handling so stray backtick content never turns into
/// half-stripped emphasis pairs.
pub fn clean_markdown(text: &str) -> String {
    let text = FENCED_BLOCK.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORE.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "$1");
    let text = LINE_PREFIX.replace_all(&text, "");
    let text = EXTRA_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
