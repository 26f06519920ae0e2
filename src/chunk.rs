//! Fixed-size sliding-window text chunker.
//!
//! Splits each page's text into [`Chunk`]s of at most `chunk_size`
//! characters, with consecutive windows overlapping by `chunk_overlap`
//! characters. Each new window starts `chunk_size - chunk_overlap`
//! characters after the previous one. Windowing restarts at offset 0 for
//! every document, so a chunk never spans two pages or two files.
//!
//! Sizes and offsets are counted in `char`s, never bytes, so multi-byte
//! text is never cut inside a code point.

use crate::models::{Chunk, Document};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 500;

/// Split documents with the default 1000/500 window.
pub fn split(documents: &[Document]) -> Vec<Chunk> {
    split_with(documents, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
}

/// Split documents into overlapping windows.
///
/// Blank documents produce no chunks. `chunk_overlap` must be smaller than
/// `chunk_size`; configuration validation enforces this, and a degenerate
/// pair still advances by at least one character.
pub fn split_with(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let size = chunk_size.max(1);
    let step = size.saturating_sub(chunk_overlap).max(1);

    let mut chunks = Vec::new();
    for doc in documents {
        if doc.text.trim().is_empty() {
            continue;
        }

        // Byte offset of every char, so windows can be sliced by char count.
        let offsets: Vec<usize> = doc.text.char_indices().map(|(i, _)| i).collect();
        let total = offsets.len();

        let mut start = 0;
        loop {
            let end = (start + size).min(total);
            let byte_start = offsets[start];
            let byte_end = if end == total {
                doc.text.len()
            } else {
                offsets[end]
            };

            chunks.push(Chunk {
                text: doc.text[byte_start..byte_end].to_string(),
                source: doc.source.clone(),
                page: doc.page,
                start_index: start,
            });

            if end == total {
                break;
            }
            start += step;
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str, text: &str) -> Document {
        Document {
            text: text.to_string(),
            source: source.to_string(),
            page: 0,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(split(&[]).is_empty());
    }

    #[test]
    fn test_blank_document_skipped() {
        let chunks = split(&[doc("a.pdf", ""), doc("b.pdf", "  \n\t ")]);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = split(&[doc("a.pdf", "Hello, world!")]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source, "a.pdf");
    }

    #[test]
    fn test_exact_size_single_chunk() {
        let text = "x".repeat(DEFAULT_CHUNK_SIZE);
        let chunks = split(&[doc("a.pdf", &text)]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.len(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_window_offsets() {
        let text: String = (0..2000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split(&[doc("a.pdf", &text)]);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_index).collect();
        assert_eq!(starts, vec![0, 500, 1000]);
        for c in &chunks {
            assert_eq!(c.text, &text[c.start_index..c.start_index + 1000]);
        }
    }

    #[test]
    fn test_tail_window_shorter() {
        let text = "y".repeat(1200);
        let chunks = split(&[doc("a.pdf", &text)]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].start_index, 500);
        assert_eq!(chunks[1].text.chars().count(), 700);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text: String = (0..3100).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
        let chunks = split(&[doc("a.pdf", &text)]);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(500).collect();
            assert!(pair[1].text.starts_with(&tail));
        }
    }

    #[test]
    fn test_restarts_per_document() {
        let long = "z".repeat(1500);
        let chunks = split(&[doc("a.pdf", &long), doc("b.pdf", &long)]);
        let b_chunks: Vec<&Chunk> = chunks.iter().filter(|c| c.source == "b.pdf").collect();
        assert_eq!(b_chunks[0].start_index, 0);
        for c in &chunks {
            assert!(c.text.chars().count() <= DEFAULT_CHUNK_SIZE);
        }
    }

    #[test]
    fn test_multibyte_counts_chars() {
        let text = "é".repeat(1500);
        let chunks = split(&[doc("a.pdf", &text)]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), 1000);
        assert_eq!(chunks[1].start_index, 500);
        assert_eq!(chunks[1].text.chars().count(), 1000);
    }

    #[test]
    fn test_custom_window() {
        let chunks = split_with(&[doc("a.pdf", "abcdefghij")], 4, 1);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta. ".repeat(120);
        let c1 = split(&[doc("a.pdf", &text)]);
        let c2 = split(&[doc("a.pdf", &text)]);
        assert_eq!(c1, c2);
    }
}
