//! Sliding-window chunking over whitespace-separated tokens, per spec §4.7.1.

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 50;

/// Splits `text` into overlapping chunks of `chunk_size` whitespace tokens,
/// advancing by `chunk_size - overlap` each step. Returns an empty vec only
/// if `text` has no tokens at all.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let stride = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + chunk_size).min(tokens.len());
        chunks.push(tokens[start..end].join(" "));
        if end == tokens.len() {
            break;
        }
        start += stride;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("   ", 500, 50).is_empty());
    }

    #[test]
    fn short_text_yields_one_chunk() {
        let chunks = chunk_text("one two three", 500, 50);
        assert_eq!(chunks, vec!["one two three"]);
    }

    #[test]
    fn long_text_overlaps_windows() {
        let words: Vec<String> = (0..1200).map(|i| i.to_string()).collect();
        let text = words.join(" ");
        let chunks = chunk_text(&text, 500, 50);
        assert!(chunks.len() >= 3);
        // consecutive chunks share the overlap region
        let first_tail: Vec<&str> = chunks[0].split_whitespace().rev().take(50).collect();
        let second_head: Vec<&str> = chunks[1].split_whitespace().take(50).collect();
        let mut first_tail_sorted = first_tail.clone();
        first_tail_sorted.reverse();
        assert_eq!(first_tail_sorted, second_head);
    }

    #[test]
    fn last_chunk_is_not_dropped() {
        let words: Vec<String> = (0..523).map(|i| i.to_string()).collect();
        let text = words.join(" ");
        let chunks = chunk_text(&text, 500, 50);
        let last = chunks.last().unwrap();
        assert!(last.split_whitespace().last().unwrap() == "522");
    }
}
