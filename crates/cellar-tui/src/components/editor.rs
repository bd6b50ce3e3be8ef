use crate::engine::{Component, StyledLine};
use crate::theme;
use crate::utils::visible_width;

const HISTORY_LIMIT: usize = 100;

/// Single-line input field with a target label, a bordered top edge, and
/// recall of previously submitted lines.
#[derive(Debug)]
pub struct Editor {
    text: String,
    /// Byte offset into `text`, always on a char boundary.
    cursor: usize,
    label: String,
    border_color: (u8, u8, u8),
    focused: bool,
    history: Vec<String>,
    history_index: Option<usize>,
    /// Text being typed before history recall started.
    draft: String,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            label: String::new(),
            border_color: theme::OWN,
            focused: true,
            history: Vec::new(),
            history_index: None,
            draft: String::new(),
        }
    }

    pub fn set_border_color(&mut self, color: (u8, u8, u8)) {
        self.border_color = color;
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    /// Shown before the text, e.g. the window the line will be sent to.
    pub fn set_label(&mut self, label: &str) {
        label.clone_into(&mut self.label);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
        self.cursor = self.text.len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.history_index = None;
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    pub fn delete_char(&mut self) {
        if let Some(prev) = self.text[..self.cursor].chars().last() {
            self.cursor -= prev.len_utf8();
            self.text.remove(self.cursor);
        }
    }

    pub fn delete_word(&mut self) {
        let before = self.text[..self.cursor].trim_end();
        let start = before.rfind(' ').map_or(0, |i| i + 1);
        self.text.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    pub fn cursor_left(&mut self) {
        if let Some(prev) = self.text[..self.cursor].chars().last() {
            self.cursor -= prev.len_utf8();
        }
    }

    pub fn cursor_right(&mut self) {
        if let Some(next) = self.text[self.cursor..].chars().next() {
            self.cursor += next.len_utf8();
        }
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.text.len();
    }

    /// Take the current text, recording it in history when non-blank.
    pub fn take_text(&mut self) -> String {
        let text = std::mem::take(&mut self.text);
        self.cursor = 0;
        self.history_index = None;
        if !text.trim().is_empty() && self.history.last() != Some(&text) {
            if self.history.len() == HISTORY_LIMIT {
                self.history.remove(0);
            }
            self.history.push(text.clone());
        }
        text
    }

    /// Recall the previous history entry.
    pub fn history_back(&mut self) {
        let index = match self.history_index {
            None if self.history.is_empty() => return,
            None => {
                self.draft = std::mem::take(&mut self.text);
                self.history.len() - 1
            }
            Some(0) => 0,
            Some(i) => i - 1,
        };
        self.history_index = Some(index);
        let recalled = self.history[index].clone();
        self.set_text(&recalled);
    }

    /// Step forward through history, ending at the draft.
    pub fn history_forward(&mut self) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 < self.history.len() {
            self.history_index = Some(index + 1);
            let recalled = self.history[index + 1].clone();
            self.set_text(&recalled);
        } else {
            self.history_index = None;
            let draft = std::mem::take(&mut self.draft);
            self.set_text(&draft);
        }
    }
}

impl Component for Editor {
    fn render(&self, width: usize) -> Vec<StyledLine> {
        let border = theme::fg(self.border_color, &"─".repeat(width));

        let label = if self.label.is_empty() {
            String::new()
        } else {
            format!("{} ", self.label)
        };
        let available = width.saturating_sub(visible_width(&label) + 1).max(1);

        // Scroll horizontally so the cursor stays visible.
        let before = &self.text[..self.cursor];
        let mut start = 0;
        while visible_width(&before[start..]) >= available {
            start += before[start..].chars().next().map_or(1, char::len_utf8);
        }
        let before = &before[start..];
        let after = &self.text[self.cursor..];

        let body = if !self.focused {
            format!("{before}{after}")
        } else if let Some(c) = after.chars().next() {
            format!("{before}\x1b[7m{c}\x1b[0m{}", &after[c.len_utf8()..])
        } else {
            format!("{before}\x1b[7m \x1b[0m")
        };

        let line = format!("{}{body}", theme::fg(theme::ACCENT, &label));
        vec![border, crate::utils::fit(&line, width)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_renders_border_and_input() {
        let editor = Editor::new();
        let lines = editor.render(40);
        assert_eq!(lines.len(), 2);
        assert_eq!(visible_width(&lines[0]), 40);
        assert!(lines[1].contains("\x1b[7m"));
    }

    #[test]
    fn editing_moves_cursor_by_chars() {
        let mut editor = Editor::new();
        for c in "héllo".chars() {
            editor.insert_char(c);
        }
        editor.cursor_left();
        editor.cursor_left();
        editor.cursor_left();
        editor.cursor_left();
        editor.delete_char();
        assert_eq!(editor.text(), "éllo");
        editor.cursor_end();
        editor.insert_char('!');
        assert_eq!(editor.text(), "éllo!");
    }

    #[test]
    fn delete_word_removes_previous_word() {
        let mut editor = Editor::new();
        editor.set_text("/msg bob hello");
        editor.delete_word();
        assert_eq!(editor.text(), "/msg bob ");
        editor.delete_word();
        assert_eq!(editor.text(), "/msg ");
    }

    #[test]
    fn history_recalls_submitted_lines() {
        let mut editor = Editor::new();
        editor.set_text("first");
        editor.take_text();
        editor.set_text("second");
        editor.take_text();
        editor.set_text("draft");

        editor.history_back();
        assert_eq!(editor.text(), "second");
        editor.history_back();
        assert_eq!(editor.text(), "first");
        editor.history_back();
        assert_eq!(editor.text(), "first");
        editor.history_forward();
        assert_eq!(editor.text(), "second");
        editor.history_forward();
        assert_eq!(editor.text(), "draft");
    }

    #[test]
    fn long_input_scrolls_to_cursor() {
        let mut editor = Editor::new();
        editor.set_label("#cellar");
        editor.set_text(&"x".repeat(100));
        let lines = editor.render(30);
        assert_eq!(visible_width(&lines[1]), 30);
        assert!(lines[1].contains("\x1b[7m \x1b[0m"));
    }
}
