/// Splits a byte stream into complete lines, carrying any unterminated tail
/// over to the next read.
///
/// `\n` never occurs inside a multi-byte UTF-8 sequence, so buffering raw
/// bytes up to the newline keeps every code point whole no matter where the
/// transport cut the chunk.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read cycle and returns the non-blank lines it completed,
    /// in order, without their terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if !is_blank(&line) {
                lines.push(line);
            }
        }
        lines
    }

    /// Returns the unterminated tail left at end of data, if any.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let tail = std::mem::take(&mut self.pending);
        (!is_blank(&tail)).then_some(tail)
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(lines: Vec<Vec<u8>>) -> Vec<String> {
        lines
            .into_iter()
            .map(|l| String::from_utf8(l).unwrap())
            .collect()
    }

    #[test]
    fn splits_complete_lines_and_drops_blank_ones() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.push(b"{\"a\":1}\n\n  \n{\"b\":2}\n");
        assert_eq!(as_strings(lines), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn carries_partial_line_across_reads() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"response\":\"he").is_empty());
        let lines = decoder.push(b"llo\"}\n{\"resp");
        assert_eq!(as_strings(lines), vec!["{\"response\":\"hello\"}"]);
        assert_eq!(decoder.finish().unwrap(), b"{\"resp".to_vec());
    }

    #[test]
    fn keeps_multibyte_sequences_whole() {
        let text = "{\"response\":\"日本\"}\n";
        let bytes = text.as_bytes();
        // Cut inside the first three-byte character.
        let cut = text.find('日').unwrap() + 1;

        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&bytes[..cut]).is_empty());
        let lines = decoder.push(&bytes[cut..]);
        assert_eq!(as_strings(lines), vec!["{\"response\":\"日本\"}"]);
    }
}
