use crate::engine::{Component, StyledLine};
use crate::theme;
use crate::utils::{pad_to_width, truncate_to_width, visible_width};

/// Bottom status row: connection state on the left, key help on the right.
#[derive(Debug, Default)]
pub struct Footer {
    connected: bool,
    nick: String,
    server: String,
    wizard_port: Option<u16>,
    open_windows: usize,
    hints: String,
}

impl Footer {
    pub fn new(hints: &str) -> Self {
        Self {
            hints: hints.to_owned(),
            ..Self::default()
        }
    }

    pub fn set_connection(&mut self, connected: bool, nick: &str, server: &str) {
        self.connected = connected;
        nick.clone_into(&mut self.nick);
        server.clone_into(&mut self.server);
    }

    pub fn set_wizard(&mut self, port: Option<u16>, open_windows: usize) {
        self.wizard_port = port;
        self.open_windows = open_windows;
    }

    pub fn set_hints(&mut self, hints: &str) {
        hints.clone_into(&mut self.hints);
    }
}

impl Component for Footer {
    fn render(&self, width: usize) -> Vec<StyledLine> {
        let mut parts = Vec::new();
        if self.connected {
            parts.push(theme::fg(theme::SUCCESS, "●"));
            parts.push(format!("{} @ {}", self.nick, self.server));
        } else if self.server.is_empty() {
            parts.push(theme::fg(theme::DIM, "○ chat off"));
        } else {
            parts.push(theme::fg(theme::ERROR, "○"));
            parts.push(format!("offline ({})", self.server));
        }
        if let Some(port) = self.wizard_port {
            parts.push(format!("wizard :{port}"));
        }
        if self.open_windows > 0 {
            parts.push(theme::fg(
                theme::WARNING,
                &format!("{} window(s)", self.open_windows),
            ));
        }

        let left = parts.join(" ");
        let left_width = visible_width(&left);
        let hints_width = visible_width(&self.hints);

        let line = if left_width + 2 + hints_width <= width {
            let gap = " ".repeat(width - left_width - hints_width);
            format!("{left}{gap}{}", self.hints)
        } else {
            truncate_to_width(&left, width)
        };

        vec![theme::fg(theme::DIM, &pad_to_width(&line, width))]
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_is_one_row() {
        let footer = Footer::new("tab next · ctrl-c quit");
        let lines = footer.render(80);
        assert_eq!(lines.len(), 1);
        assert_eq!(visible_width(&lines[0]), 80);
        assert!(lines[0].contains("chat off"));
        assert!(lines[0].contains("ctrl-c quit"));
    }

    #[test]
    fn footer_shows_connection_and_wizard() {
        let mut footer = Footer::new("");
        footer.set_connection(true, "me", "irc.example.org");
        footer.set_wizard(Some(30001), 2);
        let line = footer.render(100).pop().unwrap();
        assert!(line.contains("me @ irc.example.org"));
        assert!(line.contains("wizard :30001"));
        assert!(line.contains("2 window(s)"));
    }

    #[test]
    fn narrow_footer_drops_hints() {
        let mut footer = Footer::new("a very long list of key hints");
        footer.set_connection(false, "me", "irc.example.org");
        let line = footer.render(30).pop().unwrap();
        assert!(line.contains("offline"));
        assert!(!line.contains("hints"));
    }
}
