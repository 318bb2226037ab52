//! Paragraph-boundary text chunker.
//!
//! Paragraphs (`\n\n`-separated) are packed into chunks of at most
//! `max_tokens * 4` characters. A paragraph larger than that is hard-split
//! at the last newline or space before the limit.

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Default chunk size in tokens.
pub const DEFAULT_CHUNK_TOKENS: usize = 512;

/// Splits `text` into trimmed, non-empty chunks.
///
/// Returns an empty vector for blank input.
#[must_use]
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            para.len()
        } else {
            current.len() + 2 + para.len()
        };
        if would_be > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if para.len() > max_chars {
            hard_split(para, max_chars, &mut chunks);
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(para);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_split(mut remaining: &str, max_chars: usize, out: &mut Vec<String>) {
    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            let piece = remaining.trim();
            if !piece.is_empty() {
                out.push(piece.to_string());
            }
            break;
        }
        let limit = floor_char_boundary(remaining, max_chars);
        let split = remaining[..limit]
            .rfind(['\n', ' '])
            .map_or(limit, |pos| pos + 1);
        // A leading multi-byte char wider than the limit still has to make progress.
        let split = if split == 0 {
            remaining.chars().next().map_or(remaining.len(), char::len_utf8)
        } else {
            split
        };
        let piece = remaining[..split].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split..];
    }
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        assert_eq!(chunk_text("Hello, world!", 700), vec!["Hello, world!"]);
    }

    #[test]
    fn test_blank_text_no_chunks() {
        assert!(chunk_text("  \n\n  ", 700).is_empty());
    }

    #[test]
    fn test_paragraphs_packed_under_limit() {
        let chunks = chunk_text("First.\n\nSecond.\n\nThird.", 700);
        assert_eq!(chunks, vec!["First.\n\nSecond.\n\nThird."]);
    }

    #[test]
    fn test_paragraphs_split_over_limit() {
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let chunks = chunk_text(text, 6);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], "This is paragraph two.");
    }

    #[test]
    fn test_oversized_paragraph_hard_split() {
        let text = "word ".repeat(50);
        let chunks = chunk_text(&text, 5);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 20));
        assert_eq!(chunks.join(" ").split_whitespace().count(), 50);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐│ Hello world │└──────────────────┘";
        let chunks = chunk_text(text, 1);
        assert!(!chunks.is_empty());
        assert_eq!(chunks.concat().replace(' ', ""), text.replace(' ', ""));
    }
}
