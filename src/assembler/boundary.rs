// WHY: Decides where the pending text can be cut without waiting for more input
// Uses regex-automata to find `[.!?]\s+` candidates, then checks the following character

use anyhow::{ensure, Context, Result};
use regex_automata::meta::Regex;
use tracing::debug;

use super::abbreviations::AbbreviationChecker;

/// Configuration for sentence boundary detection
#[derive(Debug, Clone)]
pub struct BoundaryRules {
    /// Punctuation that can end a sentence
    pub end_punctuation: Vec<char>,
    /// Characters that open a quotation and so can start a sentence
    pub opening_quotes: Vec<char>,
    /// Accept a boundary when the whitespace after the punctuation holds a blank line
    pub paragraph_breaks: bool,
    /// Reject boundaries that directly follow a title abbreviation such as "Mr."
    pub guard_title_abbreviations: bool,
}

impl Default for BoundaryRules {
    fn default() -> Self {
        Self {
            end_punctuation: vec!['.', '!', '?'],
            opening_quotes: vec!['"', '\u{201C}'],
            paragraph_breaks: true,
            guard_title_abbreviations: true,
        }
    }
}

/// Splits text into complete sentences and an undecided remainder
#[derive(Debug, Clone)]
pub struct BoundaryScanner {
    candidates: Regex,
    rules: BoundaryRules,
    abbreviations: AbbreviationChecker,
}

impl BoundaryScanner {
    pub fn new(rules: BoundaryRules) -> Result<Self> {
        ensure!(
            !rules.end_punctuation.is_empty(),
            "Boundary rules need at least one end punctuation character"
        );

        let class: String = rules
            .end_punctuation
            .iter()
            .map(|c| format!(r"\x{{{:X}}}", u32::from(*c)))
            .collect();
        let pattern = format!(r"[{class}]\s+");
        let candidates = Regex::new(&pattern)
            .with_context(|| format!("Failed to compile boundary pattern: {pattern}"))?;

        debug!("Compiled sentence boundary pattern: {}", pattern);

        Ok(Self {
            candidates,
            rules,
            abbreviations: AbbreviationChecker::new(),
        })
    }

    pub fn with_default_rules() -> Result<Self> {
        Self::new(BoundaryRules::default())
    }

    pub fn rules(&self) -> &BoundaryRules {
        &self.rules
    }

    /// Split `text` into complete sentences (each ending at its punctuation)
    /// and the remainder that may still be continued by later input.
    ///
    /// A candidate is only decided once the character after its whitespace run
    /// is present, so the result never depends on where the input was cut.
    pub fn split_complete<'a>(&self, text: &'a str) -> (Vec<&'a str>, &'a str) {
        let mut sentences = Vec::new();
        let mut start = 0;

        for candidate in self.candidates.find_iter(text) {
            let punct_end = match text[candidate.start()..].chars().next() {
                Some(punct) => candidate.start() + punct.len_utf8(),
                None => break,
            };

            // Whitespace runs to the end of the text: wait for more input
            let Some(next) = text[candidate.end()..].chars().next() else {
                break;
            };

            if !self.is_boundary(&text[start..punct_end], &text[punct_end..candidate.end()], next) {
                continue;
            }

            sentences.push(&text[start..punct_end]);
            start = candidate.end();
        }

        (sentences, &text[start..])
    }

    fn is_boundary(&self, sentence: &str, whitespace: &str, next: char) -> bool {
        let opens_sentence = next.is_uppercase() || self.rules.opening_quotes.contains(&next);
        let paragraph = self.rules.paragraph_breaks && {
            let mut rest = whitespace.chars();
            rest.next();
            rest.as_str().contains("\n\n")
        };

        if !opens_sentence && !paragraph {
            return false;
        }

        !(self.rules.guard_title_abbreviations
            && self.abbreviations.ends_with_title_abbreviation(sentence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> BoundaryScanner {
        BoundaryScanner::with_default_rules().unwrap()
    }

    #[test]
    fn test_split_on_capitalised_continuation() {
        let (sentences, rest) = scanner().split_complete("Hello world. This is a test. How");
        assert_eq!(sentences, vec!["Hello world.", "This is a test."]);
        assert_eq!(rest, "How");
    }

    #[test]
    fn test_lowercase_continuation_is_not_a_boundary() {
        let (sentences, rest) = scanner().split_complete("It cost 3.5 dollars. and more");
        assert!(sentences.is_empty());
        assert_eq!(rest, "It cost 3.5 dollars. and more");
    }

    #[test]
    fn test_title_abbreviation_guard() {
        let text = "Hello world. This is Mr. Smith. He left.";
        let (sentences, rest) = scanner().split_complete(text);
        assert_eq!(sentences, vec!["Hello world.", "This is Mr. Smith."]);
        assert_eq!(rest, "He left.");

        let bare = BoundaryScanner::new(BoundaryRules {
            guard_title_abbreviations: false,
            ..Default::default()
        })
        .unwrap();
        assert!(!bare.rules().guard_title_abbreviations);
        let (sentences, _) = bare.split_complete(text);
        assert_eq!(sentences, vec!["Hello world.", "This is Mr.", "Smith."]);
    }

    #[test]
    fn test_quote_and_paragraph_openers() {
        let (sentences, rest) = scanner().split_complete("He ran! \"Stop,\" she said? no way.\n\n\nthen");
        assert_eq!(sentences, vec!["He ran!", "\"Stop,\" she said? no way."]);
        assert_eq!(rest, "then");
    }

    #[test]
    fn test_single_newline_is_not_a_paragraph() {
        let (sentences, _) = scanner().split_complete("The end.\n\nlower");
        assert!(sentences.is_empty(), "blank line must come after the first whitespace char");

        let (sentences, _) = scanner().split_complete("The end.\nlower");
        assert!(sentences.is_empty());
    }

    #[test]
    fn test_trailing_whitespace_waits_for_more_input() {
        let (sentences, rest) = scanner().split_complete("Done.  ");
        assert!(sentences.is_empty());
        assert_eq!(rest, "Done.  ");

        let (sentences, rest) = scanner().split_complete("Done.");
        assert!(sentences.is_empty());
        assert_eq!(rest, "Done.");
    }

    #[test]
    fn test_unicode_text() {
        let (sentences, rest) = scanner().split_complete("Café ouvert. Émile arrive. ");
        assert_eq!(sentences, vec!["Café ouvert."]);
        assert_eq!(rest, "Émile arrive. ");
    }

    #[test]
    fn test_empty_punctuation_rejected() {
        let result = BoundaryScanner::new(BoundaryRules {
            end_punctuation: Vec::new(),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
