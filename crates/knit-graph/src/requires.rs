//! `require("...")` extraction.
//!
//! Comments are stripped first so commented-out requires don't count. Only
//! calls whose first argument is a single- or double-quoted string literal
//! are recognised.

use std::sync::LazyLock;

use regex::Regex;

static REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*['"]([^"']+)["']\s*\)"#).expect("valid require regex")
});
static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//.+(?:\n|$)").expect("valid line comment regex"));

/// Reference strings in first-occurrence order. Duplicates are kept.
pub fn extract_requires(code: &str) -> Vec<String> {
    let code = BLOCK_COMMENT.replace_all(code, "");
    let code = LINE_COMMENT.replace_all(&code, "");

    REQUIRE
        .captures_iter(&code)
        .map(|c| c[1].to_string())
        .collect()
}
