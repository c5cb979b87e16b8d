// WHY: Title abbreviations end in a period and are usually followed by a capitalised name,
// which the boundary heuristic would otherwise read as a sentence end

use std::collections::HashSet;

/// Title abbreviations that precede proper nouns ("Mr. Smith", "Dr. Wily")
pub const TITLE_ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "Sr.", "Jr.", "St.",
];

/// Set lookup over title abbreviations
#[derive(Debug, Clone)]
pub struct AbbreviationChecker {
    title_abbreviations: HashSet<&'static str>,
}

impl AbbreviationChecker {
    pub fn new() -> Self {
        Self {
            title_abbreviations: TITLE_ABBREVIATIONS.iter().copied().collect(),
        }
    }

    pub fn is_title_abbreviation(&self, word: &str) -> bool {
        self.title_abbreviations.contains(word)
    }

    /// Whether the last word of `text` is a title abbreviation.
    /// Leading quotes and brackets on that word are ignored.
    pub fn ends_with_title_abbreviation(&self, text: &str) -> bool {
        match text.split_whitespace().last() {
            Some(last_word) => {
                let clean_word = last_word.trim_start_matches(|c: char| {
                    matches!(c, '"' | '\'' | '(' | '[' | '\u{201C}' | '\u{2018}')
                });
                self.is_title_abbreviation(clean_word)
            }
            None => false,
        }
    }
}

impl Default for AbbreviationChecker {
    fn default() -> Self {
        Self::new()
    }
}
