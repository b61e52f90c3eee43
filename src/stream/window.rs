//! Display window shaping for unbounded-length output.
//!
//! Pure text helpers used by the flow controller: a trailing window for
//! mid-stream rendering, and head+tail preservation for the final render.
//! All sizes are in characters and every cut lands on a char boundary.

/// Characters that end a sentence, ASCII and CJK.
pub const SENTENCE_MARKERS: &[char] = &['.', '!', '?', '。', '！', '？', '…'];

/// Characters that mark a natural pause, ASCII and CJK.
pub const PAUSE_MARKERS: &[char] = &[',', ';', ':', '，', '；', '：', '、', '\n'];

/// Marker inserted between the head and tail of a truncated final render.
pub const ELISION_MARKER: &str = "\n[...]\n";

pub fn is_sentence_marker(c: char) -> bool {
    SENTENCE_MARKERS.contains(&c)
}

pub fn contains_sentence_marker(text: &str) -> bool {
    text.chars().any(is_sentence_marker)
}

/// Whether any of the last `lookback` characters is a pause marker.
pub fn tail_has_pause_marker(text: &str, lookback: usize) -> bool {
    text.chars()
        .rev()
        .take(lookback)
        .any(|c| PAUSE_MARKERS.contains(&c))
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `n` characters of `text`.
pub fn take_first_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Last `n` characters of `text`.
pub fn take_last_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let len = char_len(text);
    if len <= n {
        return text;
    }
    match text.char_indices().nth(len - n) {
        Some((byte, _)) => &text[byte..],
        None => text,
    }
}

/// Advances a window to the first sentence start within its first `scan`
/// characters, so the view never opens mid-sentence. Falls back to the
/// unaligned window when no sentence ends that early.
pub fn align_to_sentence_start(window: &str, scan: usize) -> &str {
    let mut boundary = None;
    for (i, (byte, c)) in window.char_indices().enumerate() {
        if i >= scan {
            break;
        }
        if is_sentence_marker(c) {
            boundary = Some(byte + c.len_utf8());
            break;
        }
    }
    match boundary {
        Some(byte) => window[byte..].trim_start(),
        None => window,
    }
}

/// Trims a head slice backward to the last sentence end, marker included.
/// Falls back to the untrimmed slice when it contains no sentence end.
pub fn align_to_sentence_end(head: &str) -> &str {
    let mut boundary = None;
    for (byte, c) in head.char_indices() {
        if is_sentence_marker(c) {
            boundary = Some(byte + c.len_utf8());
        }
    }
    match boundary {
        Some(byte) => &head[..byte],
        None => head,
    }
}

/// Trailing view of `text` for mid-stream rendering.
///
/// Within the budget the whole text shows. Past it, only the last
/// `window` characters show, opened at a sentence start found within the
/// first `scan` characters.
pub fn trailing_window(text: &str, budget: usize, window: usize, scan: usize) -> &str {
    if char_len(text) <= budget {
        return text;
    }
    align_to_sentence_start(take_last_chars(text, window), scan)
}

/// Final display form: head + elision marker + tail once `text` exceeds
/// `budget`, both slices sentence-aligned. The full text is returned
/// untouched when it fits.
pub fn shape_final(text: &str, budget: usize, head_budget: usize, scan: usize) -> String {
    if char_len(text) <= budget {
        return text.to_string();
    }
    let head = align_to_sentence_end(take_first_chars(text, head_budget));
    let tail_budget = budget.saturating_sub(char_len(head) + char_len(ELISION_MARKER));
    let tail = align_to_sentence_start(take_last_chars(text, tail_budget), scan);
    format!("{head}{ELISION_MARKER}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_slicing_respects_multibyte_boundaries() {
        let text = "早上好。今天天气很好！";
        assert_eq!(take_first_chars(text, 4), "早上好。");
        assert_eq!(take_last_chars(text, 7), "今天天气很好！");
        assert_eq!(take_first_chars(text, 100), text);
        assert_eq!(take_last_chars(text, 100), text);
        assert_eq!(take_last_chars(text, 0), "");
    }

    #[test]
    fn window_opens_at_a_sentence_start() {
        let window = "end of one. A new sentence begins";
        assert_eq!(
            align_to_sentence_start(window, 200),
            "A new sentence begins"
        );
        // No sentence end within the scan range: keep the raw window.
        assert_eq!(align_to_sentence_start("no marker here", 200), "no marker here");
        // Marker exists but beyond the scan range.
        assert_eq!(align_to_sentence_start("abcdef. tail", 3), "abcdef. tail");
    }

    #[test]
    fn head_trims_back_to_the_last_sentence_end() {
        assert_eq!(
            align_to_sentence_end("One. Two! Three incomplete"),
            "One. Two!"
        );
        assert_eq!(align_to_sentence_end("no end at all"), "no end at all");
    }

    #[test]
    fn trailing_window_shows_everything_within_budget() {
        let text = "short text.";
        assert_eq!(trailing_window(text, 100, 50, 200), text);
    }

    #[test]
    fn trailing_window_clamps_past_the_budget() {
        let mut text = String::new();
        for i in 0..100 {
            text.push_str(&format!("Sentence number {i}. "));
        }
        let view = trailing_window(&text, 500, 200, 200);
        assert!(char_len(view) <= 200);
        assert!(view.starts_with("Sentence number"));
    }

    #[test]
    fn final_shape_preserves_head_and_tail() {
        let mut text = String::new();
        let mut i = 0;
        while char_len(&text) < 10_000 {
            text.push_str(&format!("Sentence number {i} padding the output. "));
            i += 1;
        }

        let shaped = shape_final(&text, 8_000, 2_000, 200);
        assert!(shaped.contains(ELISION_MARKER));
        assert!(char_len(&shaped) <= 8_000);
        assert!(shaped.starts_with("Sentence number 0"));
        let (head, tail) = shaped.split_once(ELISION_MARKER).unwrap();
        assert!(head.ends_with('.'), "head should be sentence-aligned");
        assert!(char_len(head) <= 2_000);
        assert!(tail.starts_with("Sentence number"));
        assert!(text.ends_with(tail), "tail must be a suffix of the original");
    }

    #[test]
    fn final_shape_is_identity_within_budget() {
        let text = "fits fine.";
        assert_eq!(shape_final(text, 8_000, 2_000, 200), text);
    }
}
