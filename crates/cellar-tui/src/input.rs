use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};

use crate::components::Editor;

/// Which pane receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Chat,
    Wizard,
}

/// Result of handling input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// No action needed.
    None,
    /// User submitted a chat line or slash command.
    Submit(String),
    NextTab,
    PrevTab,
    ScrollUp(usize),
    ScrollDown(usize),
    /// Switch keyboard focus between chat and the wizard panel.
    ToggleFocus,
    WizardUp,
    WizardDown,
    /// Confirm the wizard prompt; carries whatever was typed.
    WizardConfirm(String),
    /// Answer "no" to a question prompt.
    WizardDecline,
    /// Cancel (close) the focused wizard window.
    WizardCancel,
    /// Cycle between open wizard windows.
    WizardNext,
    Quit,
}

/// Handle a key event, updating the editor and returning any action.
pub fn handle_key_event(editor: &mut Editor, focus: Focus, key: KeyEvent) -> InputAction {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => InputAction::Quit,
        (KeyModifiers::CONTROL, KeyCode::Char('d')) if editor.is_empty() => InputAction::Quit,
        (_, KeyCode::F(2)) | (KeyModifiers::CONTROL, KeyCode::Char('o')) => {
            InputAction::ToggleFocus
        }

        (_, KeyCode::Enter) => match focus {
            Focus::Chat => {
                let text = editor.take_text();
                let trimmed = text.trim();
                match trimmed {
                    "" => InputAction::None,
                    "/quit" | "/exit" => InputAction::Quit,
                    _ => InputAction::Submit(trimmed.to_owned()),
                }
            }
            Focus::Wizard => InputAction::WizardConfirm(editor.take_text()),
        },

        // Editing
        (_, KeyCode::Backspace) => {
            editor.delete_char();
            InputAction::None
        }
        (KeyModifiers::CONTROL, KeyCode::Char('u')) => {
            editor.clear();
            InputAction::None
        }
        (KeyModifiers::CONTROL, KeyCode::Char('w')) => {
            editor.delete_word();
            InputAction::None
        }
        (_, KeyCode::Left) => {
            editor.cursor_left();
            InputAction::None
        }
        (_, KeyCode::Right) => {
            editor.cursor_right();
            InputAction::None
        }
        (KeyModifiers::CONTROL, KeyCode::Char('a')) | (_, KeyCode::Home) => {
            editor.cursor_home();
            InputAction::None
        }
        (KeyModifiers::CONTROL, KeyCode::Char('e')) | (_, KeyCode::End) => {
            editor.cursor_end();
            InputAction::None
        }

        (_, KeyCode::PageUp) => InputAction::ScrollUp(10),
        (_, KeyCode::PageDown) => InputAction::ScrollDown(10),

        (_, KeyCode::Up) => match focus {
            Focus::Chat => {
                editor.history_back();
                InputAction::None
            }
            Focus::Wizard => InputAction::WizardUp,
        },
        (_, KeyCode::Down) => match focus {
            Focus::Chat => {
                editor.history_forward();
                InputAction::None
            }
            Focus::Wizard => InputAction::WizardDown,
        },

        (_, KeyCode::Tab) => match focus {
            Focus::Chat => InputAction::NextTab,
            Focus::Wizard => InputAction::WizardNext,
        },
        (_, KeyCode::BackTab) => match focus {
            Focus::Chat => InputAction::PrevTab,
            Focus::Wizard => InputAction::WizardNext,
        },

        (_, KeyCode::Esc) if focus == Focus::Wizard => {
            if editor.is_empty() {
                InputAction::WizardCancel
            } else {
                editor.clear();
                InputAction::None
            }
        }
        (KeyModifiers::CONTROL, KeyCode::Char('n')) if focus == Focus::Wizard => {
            InputAction::WizardDecline
        }

        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(c)) => {
            editor.insert_char(c);
            InputAction::None
        }

        _ => InputAction::None,
    }
}

/// Poll for the next crossterm event with a timeout.
pub fn poll_event(timeout: std::time::Duration) -> Option<Event> {
    if event::poll(timeout).ok()? {
        event::read().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(editor: &mut Editor, focus: Focus, text: &str) {
        for c in text.chars() {
            assert_eq!(
                handle_key_event(editor, focus, key(KeyCode::Char(c))),
                InputAction::None
            );
        }
    }

    #[test]
    fn enter_submits_trimmed_chat_line() {
        let mut editor = Editor::new();
        type_text(&mut editor, Focus::Chat, "  hello  ");
        assert_eq!(
            handle_key_event(&mut editor, Focus::Chat, key(KeyCode::Enter)),
            InputAction::Submit("hello".into())
        );
        assert!(editor.is_empty());
    }

    #[test]
    fn blank_enter_does_nothing() {
        let mut editor = Editor::new();
        assert_eq!(
            handle_key_event(&mut editor, Focus::Chat, key(KeyCode::Enter)),
            InputAction::None
        );
    }

    #[test]
    fn quit_keys() {
        let mut editor = Editor::new();
        assert_eq!(handle_key_event(&mut editor, Focus::Chat, ctrl('c')), InputAction::Quit);
        assert_eq!(handle_key_event(&mut editor, Focus::Chat, ctrl('d')), InputAction::Quit);
        type_text(&mut editor, Focus::Chat, "/quit");
        assert_eq!(
            handle_key_event(&mut editor, Focus::Chat, key(KeyCode::Enter)),
            InputAction::Quit
        );
    }

    #[test]
    fn wizard_focus_routes_navigation() {
        let mut editor = Editor::new();
        let f = Focus::Wizard;
        assert_eq!(handle_key_event(&mut editor, f, key(KeyCode::Up)), InputAction::WizardUp);
        assert_eq!(handle_key_event(&mut editor, f, key(KeyCode::Down)), InputAction::WizardDown);
        assert_eq!(handle_key_event(&mut editor, f, key(KeyCode::Tab)), InputAction::WizardNext);
        assert_eq!(handle_key_event(&mut editor, f, key(KeyCode::Esc)), InputAction::WizardCancel);
        assert_eq!(handle_key_event(&mut editor, f, ctrl('n')), InputAction::WizardDecline);

        type_text(&mut editor, f, "C:\\Games");
        assert_eq!(
            handle_key_event(&mut editor, f, key(KeyCode::Enter)),
            InputAction::WizardConfirm("C:\\Games".into())
        );
    }

    #[test]
    fn escape_clears_typed_text_before_cancelling() {
        let mut editor = Editor::new();
        type_text(&mut editor, Focus::Wizard, "abc");
        assert_eq!(
            handle_key_event(&mut editor, Focus::Wizard, key(KeyCode::Esc)),
            InputAction::None
        );
        assert!(editor.is_empty());
    }

    #[test]
    fn tab_cycles_chat_windows() {
        let mut editor = Editor::new();
        assert_eq!(
            handle_key_event(&mut editor, Focus::Chat, key(KeyCode::Tab)),
            InputAction::NextTab
        );
        assert_eq!(
            handle_key_event(&mut editor, Focus::Chat, key(KeyCode::BackTab)),
            InputAction::PrevTab
        );
        assert_eq!(
            handle_key_event(&mut editor, Focus::Chat, key(KeyCode::F(2))),
            InputAction::ToggleFocus
        );
    }
}
