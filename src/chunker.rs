//! Splits document text into overlapping, whitespace-aligned chunks.

/// One contiguous span of a document's text, ready for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub text: String,
}

/// Splits `text` into chunks of at most `size` characters, each overlapping
/// the previous by `overlap` characters. Chunk boundaries snap to the last
/// whitespace before the hard cutoff when one exists within the chunk.
///
/// `overlap` must be strictly less than `size`.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Vec<RawChunk> {
    assert!(overlap < size, "chunk overlap must be smaller than chunk size");

    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|c| c.is_whitespace()) {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let len = chars.len();

    while start < len {
        let hard_end = (start + size).min(len);
        let mut end = hard_end;

        if hard_end < len {
            if let Some(boundary) = last_whitespace(&chars, start, hard_end) {
                if boundary > start {
                    end = boundary;
                }
            }
        }

        let text: String = chars[start..end].iter().collect();
        if !text.trim().is_empty() {
            chunks.push(RawChunk { text });
        }

        if end >= len {
            break;
        }

        let next_start = end.saturating_sub(overlap);
        start = if next_start > start { next_start } else { end };
    }

    chunks
}

fn last_whitespace(chars: &[char], start: usize, end: usize) -> Option<usize> {
    (start..end).rev().find(|&i| chars[i].is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk("   \n\t", 100, 10).is_empty());
        assert!(chunk("", 100, 10).is_empty());
    }

    #[test]
    fn short_text_yields_one_chunk() {
        let chunks = chunk("liberty and justice for all", 1000, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "liberty and justice for all");
    }

    #[test]
    fn long_text_splits_with_overlap() {
        let word = "word ";
        let text: String = word.repeat(500);
        let chunks = chunk(&text, 100, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 100);
        }
    }

    #[test]
    fn boundaries_snap_to_whitespace() {
        let text = "aaaaaaaaaa bbbbbbbbbb cccccccccc dddddddddd";
        let chunks = chunk(text, 15, 3);
        for c in &chunks {
            assert!(!c.text.starts_with(' '));
        }
    }

    #[test]
    #[should_panic]
    fn overlap_must_be_smaller_than_size() {
        chunk("hello world", 10, 10);
    }
}
