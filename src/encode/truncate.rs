//! Deterministic text truncation for token-budgeted encoders.
//!
//! Models with a fixed token window (CLIP's 77, BEiT-3's 64) cannot tokenize
//! arbitrarily long queries. Before tokenization, over-length text is cut to a
//! byte budget of four bytes per token: keep the first sentence when it fits,
//! else the first and last sentences together, else the leading 60% of the
//! budget plus an ellipsis plus the trailing 40%. Cuts land on grapheme
//! cluster boundaries so the result is always valid UTF-8.

use unicode_segmentation::UnicodeSegmentation;

use crate::constants::BYTES_PER_TOKEN;

/// Sentence-ending characters recognized by the splitter.
const SENTENCE_ENDINGS: [char; 5] = ['.', '!', '?', ':', ';'];

/// Truncate `text` to the byte budget of `max_tokens`. Returns the kept text
/// and whether anything was cut.
#[must_use]
pub fn truncate_for_budget(text: &str, max_tokens: usize) -> (String, bool) {
    let budget = max_tokens * BYTES_PER_TOKEN;
    if text.len() <= budget {
        return (text.to_string(), false);
    }

    let sentences = split_sentences(text);
    if sentences.len() > 1 {
        let first = sentences[0];
        let last = sentences[sentences.len() - 1];
        if first.len() + 1 + last.len() <= budget {
            return (format!("{first} {last}"), true);
        }
        if first.len() <= budget {
            return (first.to_string(), true);
        }
    }

    // Head + ellipsis + tail, 60/40 split of the budget.
    let head_budget = max_tokens * BYTES_PER_TOKEN * 6 / 10;
    let tail_budget = max_tokens * BYTES_PER_TOKEN * 4 / 10;
    let head = head_at_grapheme_boundary(text, head_budget);
    let tail = tail_at_grapheme_boundary(text, tail_budget);
    (format!("{head}...{tail}"), true)
}

/// Split on sentence-ending punctuation, keeping the delimiter with its
/// sentence. Whitespace-only segments are dropped.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (pos, ch) in text.char_indices() {
        if SENTENCE_ENDINGS.contains(&ch) {
            let end = pos + ch.len_utf8();
            let segment = text[start..end].trim();
            if !segment.is_empty() {
                out.push(segment);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

/// Longest prefix of `text` that fits `max_bytes` without splitting a
/// grapheme cluster.
#[must_use]
pub fn head_at_grapheme_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = 0;
    for (offset, grapheme) in text.grapheme_indices(true) {
        if offset + grapheme.len() > max_bytes {
            break;
        }
        end = offset + grapheme.len();
    }
    &text[..end]
}

/// Longest suffix of `text` that fits `max_bytes` without splitting a
/// grapheme cluster.
#[must_use]
pub fn tail_at_grapheme_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let cut = text.len() - max_bytes;
    let mut start = text.len();
    for (offset, _) in text.grapheme_indices(true) {
        if offset >= cut {
            start = offset;
            break;
        }
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through() {
        let (kept, truncated) = truncate_for_budget("a red car at night", 77);
        assert_eq!(kept, "a red car at night");
        assert!(!truncated);
    }

    #[test]
    fn keeps_first_sentence_when_it_fits() {
        let text = format!("First scene here. {}", "pad ".repeat(200));
        let (kept, truncated) = truncate_for_budget(&text, 20);
        assert!(truncated);
        assert_eq!(kept, "First scene here.");
    }

    #[test]
    fn joins_first_and_last_when_both_fit() {
        let filler = "filler sentence that is fairly long and keeps going. ".repeat(10);
        let text = format!("Opening shot. {filler}Closing shot.");
        let (kept, truncated) = truncate_for_budget(&text, 20);
        assert!(truncated);
        assert_eq!(kept, "Opening shot. Closing shot.");
    }

    #[test]
    fn head_tail_fallback_for_one_long_sentence() {
        let text = "x".repeat(1000);
        let (kept, truncated) = truncate_for_budget(&text, 10);
        assert!(truncated);
        // 60% of 40 bytes + "..." + 40% of 40 bytes
        assert_eq!(kept.len(), 24 + 3 + 16);
        assert!(kept.contains("..."));
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        // Multi-byte graphemes all the way through.
        let text = "người đàn ông đi bộ ".repeat(100);
        let (kept, truncated) = truncate_for_budget(&text, 10);
        assert!(truncated);
        assert!(kept.len() <= 10 * BYTES_PER_TOKEN + 3);
        // Would panic on a broken boundary.
        let _ = kept.chars().count();
    }

    #[test]
    fn split_handles_mixed_punctuation() {
        let parts = split_sentences("One! Two? Three: four; five. tail");
        assert_eq!(parts, vec!["One!", "Two?", "Three:", "four;", "five.", "tail"]);
    }

    #[test]
    fn split_drops_empty_segments() {
        let parts = split_sentences("...  One.  ");
        assert_eq!(parts, vec![".", ".", ".", "One."]);
    }

    #[test]
    fn grapheme_head_and_tail() {
        let text = "héllo wörld";
        assert_eq!(head_at_grapheme_boundary(text, 2), "h");
        assert_eq!(head_at_grapheme_boundary(text, 3), "hé");
        assert_eq!(tail_at_grapheme_boundary(text, 3), "ld");
    }
}
