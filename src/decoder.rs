// WHY: Transport fragments are cut at arbitrary byte offsets, so a multi-byte character
// can arrive in two pieces; incomplete tails are held until the next fragment

/// Streaming UTF-8 decoder that never fails
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much as possible. An incomplete sequence at the end is kept for
    /// the next call; invalid bytes in the middle become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut decoded = String::with_capacity(self.pending.len());
        let mut input: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    input = &[];
                    break;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        decoded.push_str(valid);
                    }
                    match e.error_len() {
                        Some(invalid_len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[invalid_len..];
                        }
                        None => {
                            // Truncated sequence: wait for the rest of it
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }

        let consumed = self.pending.len() - input.len();
        self.pending.drain(..consumed);
        decoded
    }

    /// Decode whatever is left, replacing a dangling partial sequence with U+FFFD
    pub fn finish(&mut self) -> String {
        let decoded = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        decoded
    }

    /// Number of bytes held back waiting for the rest of a character
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"Hello "), "Hello ");
        assert_eq!(decoder.decode(b"world"), "world");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_two_byte_char_split() {
        let bytes = "café".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 1);

        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(head), "caf");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(tail), "é");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_four_byte_char_split_three_ways() {
        let crab = "🦀".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&crab[..1]), "");
        assert_eq!(decoder.decode(&crab[1..3]), "");
        assert_eq!(decoder.decode(&crab[3..]), "🦀");
    }

    #[test]
    fn test_invalid_byte_in_middle() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"ab\xFFcd"), "ab\u{FFFD}cd");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_finish_with_dangling_bytes() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"end\xE2\x82"), "end");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.pending_len(), 0);
        assert_eq!(decoder.finish(), "");
    }
}
