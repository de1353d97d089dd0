//! Leading doc block parsing.
//!
//! Only a `/** ... */` comment that opens the file (after optional
//! whitespace) counts. Directives are `@name value` pairs, one per line.

use std::sync::LazyLock;

use regex::Regex;

static DOCBLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(/\*\*(?s:.)*?\*/)").expect("valid docblock regex"));

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:/\*\*)?[ \t]*\*?[ \t]*@([\w-]+)[ \t]*([^\r\n]*?)[ \t]*(?:\*/)?$")
        .expect("valid directive regex")
});

/// Directives found in a module's leading doc block, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Docblock {
    directives: Vec<(String, String)>,
}

impl Docblock {
    /// Parse the doc block at the top of `source`. Files without one yield an
    /// empty block.
    pub fn parse(source: &str) -> Self {
        let Some(block) = DOCBLOCK.captures(source).and_then(|c| c.get(1)) else {
            return Self::default();
        };

        let directives = DIRECTIVE
            .captures_iter(block.as_str())
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();

        Self { directives }
    }

    /// Value of the first directive called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Declared module id: `@providesModule`, falling back to `@provides`.
    pub fn provides_module(&self) -> Option<&str> {
        ["providesModule", "provides"]
            .into_iter()
            .filter_map(|name| self.get(name))
            .find(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provides_module() {
        let source = "/**\n * @providesModule index\n */\nrequire(\"b\")";
        assert_eq!(Docblock::parse(source).provides_module(), Some("index"));
    }

    #[test]
    fn falls_back_to_provides() {
        let source = "  /**\n * Copyright\n * @provides lib/thing\n * @flow\n */";
        let block = Docblock::parse(source);
        assert_eq!(block.provides_module(), Some("lib/thing"));
        assert_eq!(block.get("flow"), Some(""));
    }

    #[test]
    fn single_line_block() {
        let block = Docblock::parse("/** @providesModule tiny */ module.exports = 1;");
        assert_eq!(block.provides_module(), Some("tiny"));
    }

    #[test]
    fn ignores_later_comments() {
        let source = "var x = 1;\n/**\n * @providesModule late\n */";
        assert!(Docblock::parse(source).is_empty());
    }

    #[test]
    fn plain_block_comment_is_not_a_docblock() {
        let source = "/*\n * @providesModule nope\n */";
        assert!(Docblock::parse(source).provides_module().is_none());
    }
}
