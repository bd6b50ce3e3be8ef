use unicode_width::UnicodeWidthChar;

/// Length in bytes of the escape sequence at the start of `s`, which must
/// begin with ESC. Handles CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL`
/// or `ESC ] ... ESC \`).
fn escape_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    match bytes.get(1) {
        Some(b'[') => bytes[2..]
            .iter()
            .position(u8::is_ascii_alphabetic)
            .map_or(bytes.len(), |end| end + 3),
        Some(b']') => {
            let rest = &bytes[2..];
            match rest.iter().position(|&b| b == 0x07 || b == 0x1b) {
                Some(end) if rest[end] == 0x07 => end + 3,
                Some(end) if rest.get(end + 1) == Some(&b'\\') => end + 4,
                Some(end) => end + 3,
                None => bytes.len(),
            }
        }
        Some(_) => 2,
        None => 1,
    }
}

/// Calculate the visible width of a string in terminal columns,
/// ignoring ANSI escape sequences.
pub fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if c == '\x1b' {
            rest = &rest[escape_len(rest)..];
            continue;
        }
        width += UnicodeWidthChar::width(c).unwrap_or(0);
        rest = &rest[c.len_utf8()..];
    }
    width
}

/// Truncate a string to fit within `max_width` visible columns.
/// Escape sequences are kept and do not count toward the width.
pub fn truncate_to_width(s: &str, max_width: usize) -> String {
    let mut result = String::with_capacity(s.len());
    let mut width = 0;
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if c == '\x1b' {
            let len = escape_len(rest);
            result.push_str(&rest[..len]);
            rest = &rest[len..];
            continue;
        }
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > max_width {
            break;
        }
        result.push(c);
        width += w;
        rest = &rest[c.len_utf8()..];
    }
    result
}

/// Pad a line to exactly `width` visible characters with spaces.
pub fn pad_to_width(line: &str, width: usize) -> String {
    let vis = visible_width(line);
    if vis >= width {
        line.to_owned()
    } else {
        format!("{line}{}", " ".repeat(width - vis))
    }
}

/// Truncate or pad so the line is exactly `width` columns wide. A reset is
/// appended when truncation may have cut a styled run short.
pub fn fit(line: &str, width: usize) -> String {
    if visible_width(line) > width {
        let mut cut = truncate_to_width(line, width);
        cut.push_str(crate::theme::RESET);
        pad_to_width(&cut, width)
    } else {
        pad_to_width(line, width)
    }
}

/// Word-wrap unstyled text into lines of at most `width` columns. Words
/// longer than a line are broken. Embedded newlines start new lines.
pub fn wrap_plain(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0;

        for word in paragraph.split(' ') {
            let word_width = visible_width(word);
            if line_width > 0 && line_width + 1 + word_width > width {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            if line_width > 0 {
                line.push(' ');
                line_width += 1;
            }
            for c in word.chars() {
                let w = UnicodeWidthChar::width(c).unwrap_or(0);
                if line_width + w > width {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                line.push(c);
                line_width += w;
            }
        }
        lines.push(line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_width_plain() {
        assert_eq!(visible_width("hello"), 5);
        assert_eq!(visible_width(""), 0);
        assert_eq!(visible_width("日本"), 4);
    }

    #[test]
    fn visible_width_with_ansi() {
        assert_eq!(visible_width("\x1b[31mhello\x1b[0m"), 5);
        assert_eq!(visible_width("\x1b[38;2;128;128;128mtest\x1b[0m"), 4);
        assert_eq!(visible_width("\x1b]8;;\x07link"), 4);
    }

    #[test]
    fn truncate_keeps_escapes() {
        assert_eq!(truncate_to_width("hello world", 5), "hello");
        let t = truncate_to_width("\x1b[31mhello world\x1b[0m", 5);
        assert_eq!(visible_width(&t), 5);
        assert!(t.starts_with("\x1b[31m"));
    }

    #[test]
    fn fit_is_exact() {
        assert_eq!(visible_width(&fit("abc", 6)), 6);
        assert_eq!(visible_width(&fit("abcdefgh", 4)), 4);
        assert!(fit("\x1b[31mabcdefgh", 4).ends_with("\x1b[0m"));
    }

    #[test]
    fn wrap_breaks_on_words() {
        assert_eq!(wrap_plain("hello world foo", 11), vec!["hello world", "foo"]);
        assert_eq!(wrap_plain("line1\nline2", 80), vec!["line1", "line2"]);
        assert_eq!(wrap_plain("abcdefgh", 3), vec!["abc", "def", "gh"]);
        for line in wrap_plain("the quick brown fox jumps over", 7) {
            assert!(visible_width(&line) <= 7, "{line:?}");
        }
    }
}
