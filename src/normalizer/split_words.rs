// WHY: Tokenizer-split word repairs kept apart from the rewrite rules
// The table grows as new split names show up in model output; the pipeline does not change

/// Words the generation service is known to emit with a space inside them.
/// Each entry is `(split form, repaired word)`.
pub const KNOWN_SPLIT_WORDS: &[(&str, &str)] = &[
    ("S arcastic", "Sarcastic"),
    ("M ach", "Mach"),
    ("N ancy", "Nancy"),
];

/// Ordered lookup table of split-word repairs
#[derive(Debug, Clone)]
pub struct SplitWordTable {
    entries: Vec<(String, String)>,
}

impl SplitWordTable {
    /// Create a table holding the built-in entries
    pub fn new() -> Self {
        Self {
            entries: KNOWN_SPLIT_WORDS
                .iter()
                .map(|(split, word)| (split.to_string(), word.to_string()))
                .collect(),
        }
    }

    /// Create a table with no entries
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add a repair. A later entry with the same split form replaces the earlier one.
    pub fn insert(&mut self, split: impl Into<String>, word: impl Into<String>) {
        let split = split.into();
        let word = word.into();
        if let Some(existing) = self.entries.iter_mut().find(|(s, _)| *s == split) {
            existing.1 = word;
        } else {
            self.entries.push((split, word));
        }
    }

    /// Repaired form of a split fragment, if known
    pub fn lookup(&self, split: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(s, _)| s == split)
            .map(|(_, w)| w.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, w)| (s.as_str(), w.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SplitWordTable {
    fn default() -> Self {
        Self::new()
    }
}
