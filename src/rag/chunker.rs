// Fixed-window document chunker with overlap.
//
// Windows are `size` characters wide and advance by `size - overlap`,
// so consecutive chunks share `overlap` characters of context. The
// final window may be shorter; it is never skipped.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Split text into overlapping windows of `size` characters.
///
/// Each window is trimmed before storage; windows that trim to nothing
/// are dropped without disturbing the advancement of later windows.
/// Counts characters, not bytes, so multibyte text never splits inside
/// a code point.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkerError> {
    if size == 0 {
        return Err(ChunkerError::ZeroSize);
    }
    if overlap >= size {
        return Err(ChunkerError::OverlapTooLarge { size, overlap });
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Ok(Vec::new());
    }

    let step = size - overlap;
    let mut chunks = Vec::with_capacity(len / step + 1);
    let mut start = 0;

    loop {
        let end = (start + size).min(len);
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        // The last window always ends at the text boundary, even when
        // another overlapping window could still start before it.
        if end == len {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text() {
        assert_eq!(chunk("", 1000, 200).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(chunk("   \n\t  ", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk("hello world", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn text_exactly_one_window() {
        let text = "a".repeat(1000);
        let chunks = chunk(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 1000);
    }

    #[test]
    fn consecutive_windows_share_overlap() {
        // 20 chars, size 10, overlap 4: windows start at 0, 6, 12
        let text = "abcdefghijklmnopqrst";
        let chunks = chunk(text, 10, 4).unwrap();
        assert_eq!(chunks, vec!["abcdefghij", "ghijklmnop", "mnopqrst"]);
        assert!(chunks[0].ends_with("ghij"));
        assert!(chunks[1].starts_with("ghij"));
    }

    #[test]
    fn default_params_split_just_over_one_window() {
        let text = "b".repeat(1001);
        let chunks = chunk(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        // Second window starts at 800 and runs to the end
        assert_eq!(chunks[1].chars().count(), 201);
    }

    #[test]
    fn long_input_terminates_with_expected_count() {
        // 25_000 chars, step 800: starts at 0, 800, ..., 24_000
        let text = "word ".repeat(5000);
        let chunks = chunk(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 31);
    }

    #[test]
    fn zero_size_rejected() {
        assert_eq!(chunk("hello", 0, 0).unwrap_err(), ChunkerError::ZeroSize);
    }

    #[test]
    fn overlap_equal_to_size_rejected() {
        assert_eq!(
            chunk("hello", 10, 10).unwrap_err(),
            ChunkerError::OverlapTooLarge {
                size: 10,
                overlap: 10
            }
        );
    }

    #[test]
    fn overlap_greater_than_size_rejected() {
        assert!(matches!(
            chunk("hello", 10, 11).unwrap_err(),
            ChunkerError::OverlapTooLarge { .. }
        ));
    }

    #[test]
    fn zero_overlap_gives_adjacent_windows() {
        let text = "abcdefghij";
        let chunks = chunk(text, 4, 0).unwrap();
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn all_whitespace_window_dropped_without_shifting_others() {
        // Middle window lands entirely inside the space run and vanishes
        let text = format!("aaaa{}bbbb", " ".repeat(16));
        let chunks = chunk(&text, 8, 0).unwrap();
        assert_eq!(chunks, vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn windows_trimmed_of_edge_whitespace() {
        let chunks = chunk("  leading and trailing  ", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["leading and trailing"]);
    }

    #[test]
    fn multibyte_counted_as_single_chars() {
        let text = "日本語のテキスト".repeat(10); // 80 chars
        let chunks = chunk(&text, 30, 10).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 30);
        }
    }
}
