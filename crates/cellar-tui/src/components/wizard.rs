use crate::engine::{Component, StyledLine};
use crate::theme;
use crate::utils::{fit, visible_width, wrap_plain};

/// What the wizard panel shows for the focused window.
///
/// Built by the host from its window registry; the panel itself knows
/// nothing about the protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WizardPanelModel {
    /// Window id, shown in the frame.
    pub window: String,
    pub title: String,
    pub text: String,
    /// Selectable entries for question and menu prompts.
    pub choices: Vec<String>,
    pub selected: usize,
    /// Text input echo for textbox, browse, and login prompts.
    pub input: Option<String>,
    /// Progress in percent; `None` with `busy` set renders an activity bar.
    pub progress: Option<u8>,
    pub busy: bool,
    /// Key help shown on the bottom edge.
    pub hint: String,
    /// Number of other open windows.
    pub others: usize,
}

/// Boxed panel presenting one remotely driven wizard window.
#[derive(Debug, Default)]
pub struct WizardPanel {
    model: Option<WizardPanelModel>,
    focused: bool,
}

impl WizardPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_model(&mut self, model: Option<WizardPanelModel>) {
        self.model = model;
    }

    pub fn model(&self) -> Option<&WizardPanelModel> {
        self.model.as_ref()
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    fn progress_bar(percent: Option<u8>, width: usize) -> String {
        let width = width.max(4);
        match percent {
            Some(p) => {
                let p = usize::from(p.min(100));
                let label = format!(" {p:>3}%");
                let bar_width = width.saturating_sub(label.len());
                let filled = (bar_width * p + 50) / 100;
                format!(
                    "{}{}{label}",
                    theme::fg(theme::SUCCESS, &"█".repeat(filled)),
                    theme::fg(theme::BORDER_MUTED, &"░".repeat(bar_width - filled)),
                )
            }
            None => theme::fg(theme::ACCENT, &"▒".repeat(width)),
        }
    }
}

impl Component for WizardPanel {
    fn render(&self, width: usize) -> Vec<StyledLine> {
        let Some(model) = &self.model else {
            return Vec::new();
        };
        let border = if self.focused {
            theme::BORDER
        } else {
            theme::BORDER_MUTED
        };
        let inner = width.saturating_sub(4).max(1);
        let side = theme::fg(border, "│");
        let row = |content: &str| format!("{side} {} {side}", fit(content, inner));

        let mut heading = format!(" {} ", model.title);
        if model.others > 0 {
            heading.push_str(&format!("(+{}) ", model.others));
        }
        let heading = crate::utils::truncate_to_width(&heading, width.saturating_sub(4));
        let top_fill = width.saturating_sub(3 + visible_width(&heading));
        let mut lines = vec![format!(
            "{}{}{}",
            theme::fg(border, "╭─"),
            theme::bold(&heading),
            theme::fg(border, &format!("{}╮", "─".repeat(top_fill)))
        )];

        for text_line in wrap_plain(&model.text, inner) {
            lines.push(row(&text_line));
        }

        if !model.choices.is_empty() {
            lines.push(row(""));
            for (i, choice) in model.choices.iter().enumerate() {
                let entry = if i == model.selected {
                    theme::inverse(&format!("› {choice}"))
                } else {
                    format!("  {choice}")
                };
                lines.push(row(&entry));
            }
        }

        if let Some(input) = &model.input {
            lines.push(row(""));
            lines.push(row(&theme::fg(theme::ACCENT, &format!("> {input}"))));
        }

        if model.progress.is_some() || model.busy {
            lines.push(row(""));
            lines.push(row(&Self::progress_bar(model.progress, inner)));
        }

        let hint = crate::utils::truncate_to_width(
            &format!(" {} · {} ", model.window, model.hint),
            width.saturating_sub(4),
        );
        let bottom_fill = width.saturating_sub(3 + visible_width(&hint));
        lines.push(format!(
            "{}{}{}",
            theme::fg(border, "╰─"),
            theme::fg(theme::DIM, &hint),
            theme::fg(border, &format!("{}╯", "─".repeat(bottom_fill)))
        ));
        lines
    }
}

/// One-line banner for a `SimpleMessage` awaiting dismissal.
#[derive(Debug, Default)]
pub struct Popup {
    message: Option<String>,
}

impl Popup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_message(&mut self, message: Option<String>) {
        self.message = message;
    }
}

impl Component for Popup {
    fn render(&self, width: usize) -> Vec<StyledLine> {
        let Some(message) = &self.message else {
            return Vec::new();
        };
        let text = format!(" ! {message}  [enter] ");
        vec![theme::bg(theme::PANEL_BG, &fit(&theme::fg(theme::WARNING, &text), width))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> WizardPanelModel {
        WizardPanelModel {
            window: "4242".into(),
            title: "Install".into(),
            text: "Pick a version".into(),
            choices: vec!["1.0".into(), "2.0".into()],
            selected: 1,
            hint: "↑↓ choose, enter confirm".into(),
            ..WizardPanelModel::default()
        }
    }

    #[test]
    fn empty_panel_renders_nothing() {
        assert!(WizardPanel::new().render(40).is_empty());
        assert!(Popup::new().render(40).is_empty());
    }

    #[test]
    fn panel_rows_have_exact_width() {
        let mut panel = WizardPanel::new();
        panel.set_model(Some(model()));
        let lines = panel.render(40);
        for line in &lines {
            assert_eq!(visible_width(line), 40, "{line:?}");
        }
        assert!(lines[0].contains("Install"));
        assert!(lines.last().is_some_and(|l| l.contains("4242")));
    }

    #[test]
    fn selected_choice_is_marked() {
        let mut panel = WizardPanel::new();
        panel.set_model(Some(model()));
        let lines = panel.render(40);
        let selected: Vec<_> = lines.iter().filter(|l| l.contains("› ")).collect();
        assert_eq!(selected.len(), 1);
        assert!(selected[0].contains("2.0"));
    }

    #[test]
    fn progress_bar_reflects_percent() {
        let bar = WizardPanel::progress_bar(Some(50), 24);
        assert_eq!(visible_width(&bar), 24);
        assert!(bar.contains(" 50%"));
        assert_eq!(bar.matches('█').count(), 10);
    }

    #[test]
    fn progress_bar_rounds_to_nearest_cell() {
        // 19 cells left after the label.
        assert_eq!(WizardPanel::progress_bar(Some(0), 24).matches('█').count(), 0);
        assert_eq!(WizardPanel::progress_bar(Some(2), 24).matches('█').count(), 0);
        assert_eq!(WizardPanel::progress_bar(Some(3), 24).matches('█').count(), 1);
        let full = WizardPanel::progress_bar(Some(100), 24);
        assert_eq!(full.matches('█').count(), 19);
        assert_eq!(full.matches('░').count(), 0);
    }

    #[test]
    fn popup_fits_width() {
        let mut popup = Popup::new();
        popup.set_message(Some("Wine prefix created".into()));
        let lines = popup.render(30);
        assert_eq!(lines.len(), 1);
        assert_eq!(visible_width(&lines[0]), 30);
    }
}
