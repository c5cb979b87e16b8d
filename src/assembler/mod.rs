// WHY: Owns the pending buffer for one story and turns arriving fragments into cleaned segments
// Text problems never surface as errors here; the worst case is imperfect prose

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::normalizer::{default_normalizer, TextNormalizer};

pub mod abbreviations;
pub mod boundary;

pub use abbreviations::{AbbreviationChecker, TITLE_ABBREVIATIONS};
pub use boundary::{BoundaryRules, BoundaryScanner};

/// Result of combining one fragment with the pending buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedChunk {
    /// Normalized complete sentences, joined by single spaces (empty if none completed)
    pub emitted: String,
    /// Text that is not yet known to be a complete sentence
    pub remainder: String,
}

/// Incremental stream-to-text assembler for a single story
#[derive(Debug)]
pub struct StreamAssembler {
    scanner: BoundaryScanner,
    normalizer: Arc<TextNormalizer>,
    buffer: String,
    emitted_any: bool,
}

impl StreamAssembler {
    pub fn new(rules: BoundaryRules) -> Result<Self> {
        Ok(Self {
            scanner: BoundaryScanner::new(rules)?,
            normalizer: Arc::clone(default_normalizer()),
            buffer: String::new(),
            emitted_any: false,
        })
    }

    pub fn with_default_rules() -> Result<Self> {
        Self::new(BoundaryRules::default())
    }

    /// Use a custom normalizer instead of the shared standard one
    pub fn with_normalizer(mut self, normalizer: Arc<TextNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Stateless step: combine `buffer` and `chunk`, emit the complete sentences
    /// and hand back the remainder. Each sentence is normalized on its own.
    pub fn process_chunk(&self, chunk: &str, buffer: &str) -> ProcessedChunk {
        let mut working = String::with_capacity(buffer.len() + chunk.len());
        working.push_str(buffer);
        working.push_str(chunk);

        let (sentences, remainder) = self.scanner.split_complete(&working);

        let emitted = sentences
            .iter()
            .map(|sentence| self.normalizer.normalize(sentence))
            .filter(|sentence| !sentence.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        ProcessedChunk {
            emitted,
            remainder: remainder.to_string(),
        }
    }

    /// Feed the next fragment. Returns the text to append to the display
    /// (empty when no sentence was completed).
    pub fn process_fragment(&mut self, fragment: &str) -> String {
        let buffer = std::mem::take(&mut self.buffer);
        let ProcessedChunk { emitted, remainder } = self.process_chunk(fragment, &buffer);
        self.buffer = remainder;

        debug!(
            fragment_len = fragment.len(),
            emitted_len = emitted.len(),
            pending_len = self.buffer.len(),
            "Processed fragment"
        );

        self.separate(emitted)
    }

    /// End of stream: normalize and emit whatever is pending, complete or not
    pub fn flush(&mut self) -> String {
        let remainder = std::mem::take(&mut self.buffer);
        let text = self.normalizer.normalize(&remainder);
        debug!(remainder_len = remainder.len(), flushed_len = text.len(), "Flushed pending buffer");
        self.separate(text)
    }

    /// Text received but not yet emitted
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drop pending text without emitting it (used when a run is abandoned)
    pub fn discard(&mut self) {
        if !self.buffer.is_empty() {
            debug!(pending_len = self.buffer.len(), "Discarding pending buffer");
        }
        self.buffer.clear();
    }

    pub fn has_emitted(&self) -> bool {
        self.emitted_any
    }

    /// Segments after the first are prefixed with one space so that the
    /// concatenation of all segments reads as continuous prose
    fn separate(&mut self, text: String) -> String {
        if text.is_empty() {
            return text;
        }
        if !self.emitted_any {
            self.emitted_any = true;
            return text;
        }
        let mut separated = String::with_capacity(text.len() + 1);
        separated.push(' ');
        separated.push_str(&text);
        separated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn feed(fragments: &[&str]) -> (Vec<String>, String) {
        let mut assembler = StreamAssembler::with_default_rules().unwrap();
        let emitted = fragments
            .iter()
            .map(|f| assembler.process_fragment(f))
            .collect();
        let flushed = assembler.flush();
        (emitted, flushed)
    }

    #[test]
    fn test_end_of_stream_flush_only() {
        let (emitted, flushed) = feed(&["The quick ", "brown fox"]);
        assert!(emitted.iter().all(String::is_empty));
        assert_eq!(flushed, normalize("The quick brown fox"));
    }

    #[test]
    fn test_sentence_boundaries_single_fragment() {
        let mut assembler = StreamAssembler::with_default_rules().unwrap();
        let emitted = assembler.process_fragment("Hello world. This is Mr. Smith. He left.");
        assert_eq!(emitted, "Hello world. This is Mr. Smith.");
        assert_eq!(assembler.pending(), "He left.");
        assert_eq!(assembler.flush(), " He left.");
        assert_eq!(assembler.pending(), "");
    }

    #[test]
    fn test_process_chunk_is_stateless() {
        let assembler = StreamAssembler::with_default_rules().unwrap();
        let chunk = assembler.process_chunk("end. Next one", "This is the ");
        assert_eq!(chunk.emitted, "This is the end.");
        assert_eq!(chunk.remainder, "Next one");

        let empty = assembler.process_chunk("no boundary yet", "");
        assert_eq!(empty.emitted, "");
        assert_eq!(empty.remainder, "no boundary yet");
        assert!(!assembler.has_emitted());
    }

    #[test]
    fn test_boundary_split_across_fragments() {
        let (emitted, flushed) = feed(&["Mario jumped.", " ", "Luigi watched."]);
        assert_eq!(emitted, vec!["", "", "Mario jumped."]);
        assert_eq!(flushed, " Luigi watched.");
    }

    #[test]
    fn test_discard_drops_pending_text() {
        let mut assembler = StreamAssembler::with_default_rules().unwrap();
        assembler.process_fragment("Half a sent");
        assembler.discard();
        assert_eq!(assembler.pending(), "");
        assert_eq!(assembler.flush(), "");
    }

    #[test]
    fn test_custom_normalizer() {
        let normalizer = TextNormalizer::builder()
            .split_word("L uigi", "Luigi")
            .build()
            .unwrap();
        let mut assembler = StreamAssembler::with_default_rules()
            .unwrap()
            .with_normalizer(Arc::new(normalizer));
        assert_eq!(assembler.process_fragment("L uigi ran. Then"), "Luigi ran.");
    }
}
