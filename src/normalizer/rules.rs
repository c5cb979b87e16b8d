// WHY: Each repair is a named rule object so it can be tested alone and reordered on purpose
// Regex rules use the regex-automata meta engine with capture interpolation (`${1}`)

use anyhow::{Context, Result};
use regex_automata::meta::Regex;
use tracing::debug;

use super::split_words::SplitWordTable;

/// Upper bound on passes for rules applied to a fixed point
const MAX_FIXED_POINT_PASSES: usize = 32;

/// Stand-in for escaped `\n` markers while word-level rules run.
/// Private-use, so it is neither a word character nor whitespace.
pub const LINE_BREAK_MARKER: &str = "\u{E000}";

/// Function words the tokenizer tends to fuse into their neighbours
pub const FUSED_FUNCTION_WORDS: &[&str] = &["of", "in", "the", "and", "to", "with", "for", "from"];

/// A single textual rewrite
pub enum Rewrite {
    /// Replace every match of `regex` with `replacement` (supports `${n}` groups)
    Pattern { regex: Regex, replacement: String },
    /// Replace every occurrence of a literal string
    Literal { from: String, to: String },
    /// Arbitrary pure transformation
    Function(fn(&str) -> String),
    /// Trim leading and trailing whitespace
    Trim,
}

impl std::fmt::Debug for Rewrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rewrite::Pattern { replacement, .. } => {
                f.debug_struct("Pattern").field("replacement", replacement).finish()
            }
            Rewrite::Literal { from, to } => {
                f.debug_struct("Literal").field("from", from).field("to", to).finish()
            }
            Rewrite::Function(_) => f.write_str("Function"),
            Rewrite::Trim => f.write_str("Trim"),
        }
    }
}

/// Named rewrite step in the normalization pipeline
#[derive(Debug)]
pub struct RewriteRule {
    name: String,
    rewrite: Rewrite,
    to_fixed_point: bool,
}

impl RewriteRule {
    pub fn pattern(name: impl Into<String>, pattern: &str, replacement: &str) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern)
            .with_context(|| format!("Failed to compile rule '{name}' pattern: {pattern}"))?;
        Ok(Self {
            name,
            rewrite: Rewrite::Pattern { regex, replacement: replacement.to_string() },
            to_fixed_point: false,
        })
    }

    pub fn literal(name: impl Into<String>, from: &str, to: &str) -> Self {
        Self {
            name: name.into(),
            rewrite: Rewrite::Literal { from: from.to_string(), to: to.to_string() },
            to_fixed_point: false,
        }
    }

    pub fn function(name: impl Into<String>, f: fn(&str) -> String) -> Self {
        Self { name: name.into(), rewrite: Rewrite::Function(f), to_fixed_point: false }
    }

    pub fn trim(name: impl Into<String>) -> Self {
        Self { name: name.into(), rewrite: Rewrite::Trim, to_fixed_point: false }
    }

    /// Re-apply the rewrite until the text stops changing
    pub fn repeated(mut self) -> Self {
        self.to_fixed_point = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rewrite(&self) -> &Rewrite {
        &self.rewrite
    }

    /// Apply the rule; `None` means the text is unchanged
    pub fn apply(&self, text: &str) -> Option<String> {
        if !self.to_fixed_point {
            return self.apply_once(text);
        }

        let mut current = self.apply_once(text)?;
        for _ in 1..MAX_FIXED_POINT_PASSES {
            match self.apply_once(&current) {
                Some(next) if next != current => current = next,
                _ => return Some(current),
            }
        }
        debug!(rule = %self.name, "Rule did not settle within {} passes", MAX_FIXED_POINT_PASSES);
        Some(current)
    }

    /// Apply the rule and always return the resulting text
    pub fn apply_to(&self, text: &str) -> String {
        self.apply(text).unwrap_or_else(|| text.to_string())
    }

    fn apply_once(&self, text: &str) -> Option<String> {
        let result = match &self.rewrite {
            Rewrite::Pattern { regex, replacement } => replace_all(regex, text, replacement)?,
            Rewrite::Literal { from, to } => {
                if from.is_empty() || !text.contains(from.as_str()) {
                    return None;
                }
                text.replace(from.as_str(), to)
            }
            Rewrite::Function(f) => f(text),
            Rewrite::Trim => text.trim().to_string(),
        };
        (result != text).then_some(result)
    }
}

/// Replace all non-overlapping matches, interpolating capture groups into `replacement`
fn replace_all(regex: &Regex, haystack: &str, replacement: &str) -> Option<String> {
    let mut out = String::with_capacity(haystack.len());
    let mut last_end = 0;
    let mut matched = false;

    for caps in regex.captures_iter(haystack) {
        let Some(m) = caps.get_match() else { continue };
        out.push_str(&haystack[last_end..m.start()]);
        caps.interpolate_string_into(haystack, replacement, &mut out);
        last_end = m.end();
        matched = true;
    }

    if !matched {
        return None;
    }
    out.push_str(&haystack[last_end..]);
    Some(out)
}

/// Collapse whitespace runs: a run holding a blank line becomes `\n\n`, any other run one space
pub fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if !ch.is_whitespace() {
            result.push(ch);
            continue;
        }

        let mut newlines = usize::from(ch == '\n');
        while let Some(&next) = chars.peek() {
            if !next.is_whitespace() {
                break;
            }
            if next == '\n' {
                newlines += 1;
            }
            chars.next();
        }

        if newlines >= 2 {
            result.push_str("\n\n");
        } else {
            result.push(' ');
        }
    }

    result
}

/// Build the standard ordered rule list
pub fn standard_rules(split_words: &SplitWordTable) -> Result<Vec<RewriteRule>> {
    let mut rules = vec![
        // 1. positional token wrappers: 12:"text" -> text
        RewriteRule::pattern(
            "strip-index-wrappers",
            r#"\d+:"((?:[^"\\]|\\.)+)""#,
            "${1}",
        )?,
        RewriteRule::literal("unescape-quotes", "\\\"", "\""),
        RewriteRule::literal("mark-escaped-newlines", "\\n", LINE_BREAK_MARKER),
        // 2.
        RewriteRule::function("collapse-whitespace", collapse_whitespace),
    ];

    // 3.
    for (split, word) in split_words.iter() {
        rules.push(RewriteRule::literal(format!("split-word:{word}"), split, word));
    }

    // 4. + 5.
    rules.push(RewriteRule::pattern("camel-case-gap", r"([a-z])([A-Z])", "${1} ${2}")?);
    rules.push(RewriteRule::pattern("space-before-punctuation", r"[ \t]+([.!?,;:])", "${1}")?);
    rules.push(RewriteRule::pattern(
        "space-after-punctuation",
        r"([.!?,;:])([A-Za-z])",
        "${1} ${2}",
    )?);

    // 6.
    for word in FUSED_FUNCTION_WORDS {
        rules.push(
            RewriteRule::pattern(
                format!("function-word-gap:{word}"),
                &format!(r"(\w+){word}(\w+)"),
                &format!("${{1}} {word} ${{2}}"),
            )?
            .repeated(),
        );
    }

    // 7. - 9.
    rules.push(RewriteRule::pattern(
        "contraction",
        r"(\w) ?(['\x{2019}]) ?(s|t|re|ve|ll|d|m)\b",
        "${1}${2}${3}",
    )?);
    rules.push(RewriteRule::pattern("hyphen-compound", r"(\w)[ \t]*-[ \t]*(\w)", "${1}-${2}")?.repeated());
    rules.push(RewriteRule::pattern(
        "quote-padding",
        r#""[ \t]*([^"]*?)[ \t]*""#,
        "\"${1}\"",
    )?);
    rules.push(RewriteRule::pattern(
        "curly-quote-padding",
        r"\x{201C}[ \t]*([^\x{201D}]*?)[ \t]*\x{201D}",
        "\u{201C}${1}\u{201D}",
    )?);

    // 10.
    rules.push(RewriteRule::literal("escaped-newline", LINE_BREAK_MARKER, "\n"));
    rules.push(RewriteRule::pattern("line-edges", r"[ \t]*\n[ \t]*", "\n")?);
    rules.push(RewriteRule::pattern("paragraph-after-sentence", r"([.!?])\n+", "${1}\n\n")?);
    // Every remaining line break is a paragraph break, which whitespace collapsing keeps
    rules.push(RewriteRule::pattern("paragraph-line-breaks", r"\n+", "\n\n")?);

    // 11.
    rules.push(RewriteRule::pattern("final-space-before-punctuation", r"[ \t]+([.,!?:;])", "${1}")?);
    rules.push(RewriteRule::pattern("final-space-after-punctuation", r"([.,!?:;])[ \t]+", "${1} ")?);
    rules.push(RewriteRule::pattern("final-collapse-spaces", r"[ \t]{2,}", " ")?);
    rules.push(RewriteRule::trim("trim"));

    Ok(rules)
}
