use cellar_core::{LogEntry, Tone};

use crate::engine::{Component, StyledLine};
use crate::theme;
use crate::utils::{visible_width, wrap_plain};

/// Scrollable message log, bottom-anchored.
///
/// Renders exactly `height` rows: the newest entries at the bottom, blank
/// rows on top when the log is short. `scroll` counts rows hidden below.
#[derive(Debug, Default)]
pub struct LogView {
    entries: Vec<LogEntry>,
    height: usize,
    scroll: usize,
}

impl LogView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entries(&mut self, entries: Vec<LogEntry>) {
        self.entries = entries;
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height;
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_add(rows);
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.scroll = self.scroll.saturating_sub(rows);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    fn entry_lines(entry: &LogEntry, width: usize) -> Vec<StyledLine> {
        let stamp = format!("{} ", entry.local_time());
        let color = theme::tone_color(entry.tone);

        let (head, body_color) = match (&entry.sender, entry.tone) {
            (Some(sender), Tone::Highlight) => (format!("<{sender}> "), theme::HIGHLIGHT),
            (Some(sender), _) => (format!("<{sender}> "), theme::TEXT),
            (None, _) => ("-- ".to_owned(), color),
        };

        let indent = visible_width(&stamp) + visible_width(&head);
        let wrapped = wrap_plain(&entry.text, width.saturating_sub(indent).max(8));

        wrapped
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if i == 0 {
                    format!(
                        "{}{}{}",
                        theme::fg(theme::DIM, &stamp),
                        theme::fg(color, &head),
                        theme::fg(body_color, part)
                    )
                } else {
                    format!("{}{}", " ".repeat(indent), theme::fg(body_color, part))
                }
            })
            .collect()
    }
}

impl Component for LogView {
    fn render(&self, width: usize) -> Vec<StyledLine> {
        let mut rows: Vec<StyledLine> = self
            .entries
            .iter()
            .flat_map(|entry| Self::entry_lines(entry, width))
            .collect();

        let max_scroll = rows.len().saturating_sub(self.height);
        let scroll = self.scroll.min(max_scroll);
        rows.truncate(rows.len() - scroll);
        let start = rows.len().saturating_sub(self.height);
        let mut visible: Vec<StyledLine> = rows.split_off(start);

        if visible.len() < self.height {
            let mut padded = vec![String::new(); self.height - visible.len()];
            padded.append(&mut visible);
            visible = padded;
        }
        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(texts: &[&str], height: usize) -> LogView {
        let mut log = LogView::new();
        log.set_height(height);
        log.set_entries(
            texts
                .iter()
                .map(|t| LogEntry::message("bob", *t, Tone::Nick(3)))
                .collect(),
        );
        log
    }

    #[test]
    fn short_log_is_bottom_anchored() {
        let lines = view(&["hi"], 3).render(40);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].is_empty());
        assert!(lines[2].contains("hi"));
        assert!(lines[2].contains("<bob>"));
    }

    #[test]
    fn long_log_shows_newest() {
        let lines = view(&["one", "two", "three"], 2).render(40);
        assert!(lines[0].contains("two"));
        assert!(lines[1].contains("three"));
    }

    #[test]
    fn scrolling_reveals_older_rows_and_clamps() {
        let mut log = view(&["one", "two", "three"], 2);
        log.scroll_up(1);
        let lines = log.render(40);
        assert!(lines[0].contains("one"));
        assert!(lines[1].contains("two"));

        log.scroll_up(50);
        assert!(log.render(40)[0].contains("one"));
        log.scroll_to_bottom();
        assert!(log.render(40)[1].contains("three"));
    }

    #[test]
    fn notices_have_no_sender_column() {
        let entry = LogEntry::notice("Connecting to irc", Tone::Notice);
        let lines = LogView::entry_lines(&entry, 60);
        assert!(lines[0].contains("-- "));
        assert!(!lines[0].contains('<'));
    }

    #[test]
    fn long_messages_wrap_with_indent() {
        let text = "word ".repeat(30);
        let lines = view(&[text.trim()], 10).render(40);
        let used: Vec<_> = lines.iter().filter(|l| !l.is_empty()).collect();
        assert!(used.len() > 1);
        assert!(used[1].starts_with("      "));
        for line in used {
            assert!(visible_width(line) <= 40);
        }
    }
}
