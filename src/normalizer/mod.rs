// WHY: Turns tokenizer-mangled model output into readable prose
// Pure and total: any input produces some text, never an error

use anyhow::Result;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

pub mod rules;
pub mod split_words;

pub use rules::{collapse_whitespace, Rewrite, RewriteRule, FUSED_FUNCTION_WORDS};
pub use split_words::{SplitWordTable, KNOWN_SPLIT_WORDS};

/// Ordered pipeline of rewrite rules
#[derive(Debug)]
pub struct TextNormalizer {
    rules: Vec<RewriteRule>,
}

impl TextNormalizer {
    /// Standard pipeline with the built-in split-word table
    pub fn standard() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> TextNormalizerBuilder {
        TextNormalizerBuilder::default()
    }

    /// Pipeline made of exactly these rules, applied in order
    pub fn from_rules(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn normalize(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            if let Some(next) = rule.apply(&current) {
                current = next;
            }
        }
        current
    }
}

/// Builder for a normalizer with a customised split-word table or extra rules
#[derive(Debug, Default)]
pub struct TextNormalizerBuilder {
    split_words: SplitWordTable,
    extra_rules: Vec<RewriteRule>,
}

impl TextNormalizerBuilder {
    /// Replace the split-word table
    pub fn split_words(mut self, table: SplitWordTable) -> Self {
        self.split_words = table;
        self
    }

    /// Add one split-word repair on top of the current table
    pub fn split_word(mut self, split: &str, word: &str) -> Self {
        self.split_words.insert(split, word);
        self
    }

    /// Append a rule after the standard pipeline
    pub fn rule(mut self, rule: RewriteRule) -> Self {
        self.extra_rules.push(rule);
        self
    }

    pub fn build(self) -> Result<TextNormalizer> {
        let mut rules = rules::standard_rules(&self.split_words)?;
        rules.extend(self.extra_rules);
        debug!("Built text normalizer with {} rules", rules.len());
        Ok(TextNormalizer { rules })
    }
}

static DEFAULT_NORMALIZER: OnceLock<Arc<TextNormalizer>> = OnceLock::new();

/// Process-wide standard normalizer, shared by every assembler that is not given its own
pub fn default_normalizer() -> &'static Arc<TextNormalizer> {
    DEFAULT_NORMALIZER.get_or_init(|| {
        let normalizer = TextNormalizer::standard().unwrap_or_else(|e| {
            warn!("Standard normalizer failed to build, passing text through: {e:#}");
            TextNormalizer::from_rules(Vec::new())
        });
        Arc::new(normalizer)
    })
}

/// Normalize text with the standard pipeline
pub fn normalize(text: &str) -> String {
    default_normalizer().normalize(text)
}
