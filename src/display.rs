//! Terminal display-width helpers.
//!
//! Widths are summed per `char` so that measuring, truncating and padding always agree;
//! wide (CJK) characters count as 2 and combining marks as 0.

use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

pub const ELLIPSIS: char = '…';
const ELLIPSIS_WIDTH: usize = 1;

pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Replace control characters (newlines, tabs, escapes) with spaces so a cell stays on
/// one line and its measured width matches what the terminal draws.
pub fn printable(text: &str) -> Cow<'_, str> {
    if text.chars().any(char::is_control) {
        Cow::Owned(
            text.chars()
                .map(|ch| if ch.is_control() { ' ' } else { ch })
                .collect(),
        )
    } else {
        Cow::Borrowed(text)
    }
}

/// Pad with trailing spaces up to `width` columns. Text already that wide is returned as is.
pub fn pad_end(text: &str, width: usize) -> String {
    let w = display_width(text);
    if w >= width {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + (width - w));
    out.push_str(text);
    out.extend(std::iter::repeat_n(' ', width - w));
    out
}

/// Longest prefix that fits in `width` columns.
pub fn take_start(text: &str, width: usize) -> &str {
    let mut used = 0usize;
    for (idx, ch) in text.char_indices() {
        let cw = char_width(ch);
        if used + cw > width {
            return &text[..idx];
        }
        used += cw;
    }
    text
}

/// Longest suffix that fits in `width` columns.
pub fn take_end(text: &str, width: usize) -> &str {
    let mut used = 0usize;
    for (idx, ch) in text.char_indices().rev() {
        let cw = char_width(ch);
        if used + cw > width {
            return &text[idx + ch.len_utf8()..];
        }
        used += cw;
    }
    text
}

/// Cut `text` to `width` columns, replacing the tail with an ellipsis.
pub fn truncate_end(text: &str, width: usize) -> String {
    if display_width(text) <= width {
        return text.to_string();
    }
    let limit = width.saturating_sub(ELLIPSIS_WIDTH).max(1);
    let mut out = take_start(text, limit).to_string();
    out.push(ELLIPSIS);
    out
}

/// Cut `text` to `width` columns, keeping both ends around an ellipsis. Suits paths,
/// where the leaf is as telling as the root.
pub fn truncate_middle(text: &str, width: usize) -> String {
    if display_width(text) <= width {
        return text.to_string();
    }
    let content = width.saturating_sub(ELLIPSIS_WIDTH).max(1);
    let left = content / 2;
    let right = content - left;
    let mut out = take_start(text, left).to_string();
    out.push(ELLIPSIS);
    out.push_str(take_end(text, right));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn widths_account_for_wide_and_combining_chars() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("日本語"), 6);
        assert_eq!(display_width("e\u{301}"), 1);
        assert_eq!(display_width(""), 0);
    }

    #[test]
    fn truncate_end_never_splits_wide_chars() {
        let out = truncate_end("日本語テスト", 5);
        assert_eq!(out, "日本…");
        assert!(display_width(&out) <= 5);

        let out = truncate_end("日本語テスト", 6);
        assert_eq!(out, "日本…");
        assert!(display_width(&out) <= 6);
    }

    #[test]
    fn truncate_end_keeps_fitting_text() {
        assert_eq!(truncate_end("short", 5), "short");
        assert_eq!(truncate_end("fix the bug please", 8), "fix the…");
    }

    #[test]
    fn truncate_middle_keeps_prefix_and_suffix() {
        let out = truncate_middle("/home/user/projects/very-long-name", 10);
        assert_eq!(out, "/hom…-name");
        assert_eq!(display_width(&out), 10);

        assert_eq!(truncate_middle("/tmp", 10), "/tmp");
    }

    #[test]
    fn truncate_middle_with_wide_chars_stays_within_width() {
        let out = truncate_middle("/home/日本語/テスト/プロジェクト", 11);
        assert!(display_width(&out) <= 11);
        assert!(out.starts_with("/home"));
        assert!(out.contains(ELLIPSIS));
    }

    #[test]
    fn printable_replaces_control_chars() {
        assert_eq!(printable("/a\n/b\tc\r"), "/a /b c ");
        assert_eq!(printable("\u{1b}[31mred"), " [31mred");
        assert!(matches!(printable("/plain/日本"), Cow::Borrowed(_)));
    }

    #[test]
    fn pad_end_uses_display_width() {
        assert_eq!(pad_end("日本", 6), "日本  ");
        assert_eq!(pad_end("abc", 2), "abc");
        assert_eq!(display_width(&pad_end("テ", 5)), 5);
    }

    #[test]
    fn take_helpers_respect_width() {
        assert_eq!(take_start("日本語", 3), "日");
        assert_eq!(take_end("日本語", 3), "語");
        assert_eq!(take_end("abc", 0), "");
        assert_eq!(take_start("abc", 10), "abc");
    }
}
