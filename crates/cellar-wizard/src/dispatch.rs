//! Applies one mailbox delivery to the window registry on the UI loop.

use crate::bridge::{Delivery, Responder};
use crate::protocol::WizardCommand;
use crate::registry::{PromptKind, WindowRegistry, WindowView};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_MENU_SEPARATOR: &str = "~";

/// Work the host must carry out after a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEffect {
    None,
    /// Fetch `url` into `path`, then complete the caller waiting on `win`.
    Download {
        win: String,
        url: String,
        path: PathBuf,
    },
    Quit,
    Restart,
}

/// Dispatch one delivery. The mailbox slot frees when this returns.
pub fn dispatch(registry: &mut WindowRegistry, delivery: Delivery) -> HostEffect {
    let (command, responder, _slot) = delivery.into_parts();
    debug!(verb = command.verb(), window = ?command.window(), "wizard dispatch");

    match command {
        WizardCommand::Init {
            win,
            top_image,
            left_image,
            protect,
        } => {
            registry.init(&win, &top_image, &left_image, &protect);
            responder.answer("");
        }
        WizardCommand::Close { win } => {
            registry.close(&win);
            drop(responder);
        }
        WizardCommand::Message {
            win,
            message,
            title,
        }
        | WizardCommand::FreePresentation {
            win,
            title,
            message,
        } => {
            let view = WindowView::Message {
                title,
                text: message,
            };
            ask(registry, &win, view, PromptKind::Acknowledge, responder);
        }
        WizardCommand::Question {
            win,
            message,
            title,
        } => {
            let view = WindowView::Question {
                title,
                text: message,
            };
            ask(registry, &win, view, PromptKind::Question, responder);
        }
        WizardCommand::Menu {
            win,
            message,
            title,
            items,
            separator,
        } => {
            let items = split_items(&items, &separator);
            let view = WindowView::Menu {
                title,
                text: message,
                items: items.clone(),
            };
            ask(registry, &win, view, PromptKind::Menu(items), responder);
        }
        WizardCommand::MenuNum {
            win,
            message,
            title,
            items,
            separator,
        } => {
            let items = split_items(&items, &separator);
            let view = WindowView::Menu {
                title,
                text: message,
                items: items.clone(),
            };
            ask(registry, &win, view, PromptKind::MenuNum(items), responder);
        }
        WizardCommand::Textbox {
            win,
            message,
            title,
            default,
            max_length,
        } => {
            let view = WindowView::Textbox {
                title,
                text: message,
                default,
                max_length: max_length.trim().parse().ok(),
                multiline: false,
            };
            ask(registry, &win, view, PromptKind::Text, responder);
        }
        WizardCommand::TextboxMultiline {
            win,
            message,
            title,
            default,
            max_length,
        } => {
            let view = WindowView::Textbox {
                title,
                text: message,
                default,
                max_length: max_length.trim().parse().ok(),
                multiline: true,
            };
            ask(registry, &win, view, PromptKind::Text, responder);
        }
        WizardCommand::Browse {
            win,
            message,
            title,
            default,
            directory,
            filter,
        } => {
            let view = WindowView::Browse {
                title,
                text: message,
                default,
                directory,
                filter,
            };
            ask(registry, &win, view, PromptKind::Text, responder);
        }
        WizardCommand::Licence {
            win,
            message,
            title,
            file,
        } => {
            let view = WindowView::Licence {
                title,
                text: message,
                file,
            };
            ask(registry, &win, view, PromptKind::Acknowledge, responder);
        }
        WizardCommand::File {
            win,
            message,
            title,
            file,
        } => {
            let view = WindowView::File {
                title,
                text: message,
                file,
            };
            ask(registry, &win, view, PromptKind::Acknowledge, responder);
        }
        WizardCommand::Login {
            win,
            message,
            title,
            register_url,
        } => {
            let view = WindowView::Login {
                title,
                text: message,
                register_url,
            };
            ask(registry, &win, view, PromptKind::Login, responder);
        }
        WizardCommand::Download {
            win,
            message,
            title,
            url,
            path,
        } => {
            let view = WindowView::Download {
                title,
                text: message,
                url: url.clone(),
                received: 0,
                total: None,
            };
            if ask(registry, &win, view, PromptKind::Download, responder) {
                return HostEffect::Download {
                    win,
                    url,
                    path: PathBuf::from(path),
                };
            }
        }
        WizardCommand::Wait {
            win,
            message,
            title,
        }
        | WizardCommand::WaitBis {
            win,
            message,
            title,
        } => {
            let view = WindowView::Progress {
                title,
                text: message,
                percent: None,
            };
            ack_if(registry.show(&win, view), responder);
        }
        WizardCommand::Pulsebar {
            win,
            message,
            title,
        } => {
            let view = WindowView::Progress {
                title,
                text: message,
                percent: Some(0),
            };
            ack_if(registry.show(&win, view), responder);
        }
        WizardCommand::Pulse { win, percent } => {
            ack_if(registry.set_percent(&win, parse_percent(&percent)), responder);
        }
        WizardCommand::SetText { win, text } => {
            ack_if(registry.set_text(&win, text), responder);
        }
        WizardCommand::SimpleMessage { message } => {
            registry.push_popup(message, responder);
        }
        WizardCommand::Die => {
            responder.answer("");
            return HostEffect::Quit;
        }
        WizardCommand::Restart => {
            responder.answer("");
            return HostEffect::Restart;
        }
        WizardCommand::RegisterPid { pid } => {
            match pid.trim().parse() {
                Ok(pid) => registry.register_pid(pid),
                Err(_) => debug!(%pid, "ignoring unparsable pid"),
            }
            responder.answer("");
        }
    }
    HostEffect::None
}

/// Park the caller on a prompt. A missing window releases it as gone.
fn ask(
    registry: &mut WindowRegistry,
    win: &str,
    view: WindowView,
    kind: PromptKind,
    responder: Responder,
) -> bool {
    match registry.ask(win, view, kind, responder) {
        Ok(()) => true,
        Err(responder) => {
            debug!(window = win, "wizard prompt for unknown window");
            drop(responder);
            false
        }
    }
}

fn ack_if(applied: bool, responder: Responder) {
    if applied {
        responder.answer("");
    }
}

fn split_items(items: &str, separator: &str) -> Vec<String> {
    let separator = if separator.is_empty() {
        DEFAULT_MENU_SEPARATOR
    } else {
        separator
    };
    items
        .split(separator)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Leading integer part, clamped to 100; garbage reads as 0.
fn parse_percent(raw: &str) -> u8 {
    let whole = raw.trim().split('.').next().unwrap_or_default();
    whole
        .parse::<u16>()
        .map_or(0, |value| u8::try_from(value.min(100)).unwrap_or(100))
}
