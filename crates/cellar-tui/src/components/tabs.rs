use crate::engine::{Component, StyledLine};
use crate::theme;
use crate::utils::{fit, visible_width};

/// One entry in the window bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tab {
    pub name: String,
    pub active: bool,
    /// New entries arrived since the tab was last viewed.
    pub unread: bool,
    /// One of those entries mentioned me.
    pub alert: bool,
}

impl Tab {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: false,
            unread: false,
            alert: false,
        }
    }
}

/// Single-row bar listing the status window, channels, and queries.
#[derive(Debug, Default)]
pub struct ChannelTabs {
    tabs: Vec<Tab>,
}

impl ChannelTabs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tabs(&mut self, tabs: Vec<Tab>) {
        self.tabs = tabs;
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    fn label(tab: &Tab) -> String {
        let text = format!(" {} ", tab.name);
        if tab.active {
            theme::bg(theme::TAB_ACTIVE_BG, &theme::bold(&text))
        } else if tab.alert {
            theme::fg(theme::HIGHLIGHT, &text)
        } else if tab.unread {
            theme::fg(theme::TEXT, &text)
        } else {
            theme::fg(theme::DIM, &text)
        }
    }
}

impl Component for ChannelTabs {
    fn render(&self, width: usize) -> Vec<StyledLine> {
        let mut line = String::new();
        let mut used = 0;

        // Keep the active tab visible by dropping leading tabs if needed.
        let active = self.tabs.iter().position(|t| t.active).unwrap_or(0);
        let widths: Vec<usize> = self.tabs.iter().map(|t| visible_width(&t.name) + 2).collect();
        let mut first = 0;
        while first < active
            && widths[first..=active].iter().sum::<usize>() + usize::from(first > 0) > width
        {
            first += 1;
        }
        if first > 0 {
            line.push_str(&theme::fg(theme::DIM, "‹"));
            used += 1;
        }

        for (tab, tab_width) in self.tabs.iter().zip(&widths).skip(first) {
            if used + tab_width > width {
                break;
            }
            line.push_str(&Self::label(tab));
            used += tab_width;
        }

        vec![fit(&line, width)]
    }
}
