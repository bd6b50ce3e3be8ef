//! Plain view values pulled from live state each tick. Each one is
//! compared against what was rendered last; only differences redraw.

use std::collections::HashMap;

use cellar_core::{BoundedLog, LogEntry, Tone};
use cellar_irc::{ChannelKind, IrcState, channel_key};
use cellar_tui::{Tab, WizardPanelModel};
use cellar_wizard::{PromptKind, WindowView, WizardWindow};

use crate::download::percent;

/// Name of the always-present status window.
pub(crate) const STATUS: &str = "status";

/// Window names in display order: status first, then channels and queries.
pub(crate) fn window_names(state: &IrcState) -> Vec<String> {
    std::iter::once(STATUS.to_owned())
        .chain(state.window_names())
        .collect()
}

/// Last entry seen per window, keyed by channel key.
#[derive(Debug, Default)]
pub(crate) struct SeenTracker {
    seen: HashMap<String, Option<LogEntry>>,
}

impl SeenTracker {
    pub(crate) fn mark_seen(&mut self, name: &str, log: &BoundedLog) {
        self.seen.insert(channel_key(name), log.last().cloned());
    }

    fn unread(&self, name: &str, log: &BoundedLog) -> bool {
        let last = log.last();
        match self.seen.get(&channel_key(name)) {
            Some(seen) => seen.as_ref() != last,
            None => last.is_some(),
        }
    }

    /// Whether anything after the seen entry asks for attention.
    fn alerted(&self, name: &str, log: &BoundedLog) -> bool {
        let seen = self.seen.get(&channel_key(name)).and_then(Option::as_ref);
        log.iter()
            .rev()
            .take_while(|entry| Some(*entry) != seen)
            .any(|entry| entry.alert)
    }
}

pub(crate) fn tabs(state: &IrcState, active: &str, seen: &SeenTracker) -> Vec<Tab> {
    window_names(state)
        .into_iter()
        .map(|name| {
            let is_active = name.eq_ignore_ascii_case(active);
            let log = if name == STATUS {
                Some(&state.status)
            } else {
                state.channel(&name).map(|c| &c.log)
            };
            let (unread, alert) = match log {
                Some(log) if !is_active => (seen.unread(&name, log), seen.alerted(&name, log)),
                _ => (false, false),
            };
            Tab {
                name,
                active: is_active,
                unread,
                alert,
            }
        })
        .collect()
}

/// Entries shown for `active`. The status window interleaves host notices
/// with the connection log by time.
pub(crate) fn log_entries(state: &IrcState, active: &str, notices: &BoundedLog) -> Vec<LogEntry> {
    if active == STATUS {
        let mut entries: Vec<LogEntry> =
            state.status.iter().chain(notices.iter()).cloned().collect();
        entries.sort_by_key(|entry| entry.timestamp);
        return entries;
    }
    state
        .channel(active)
        .map(|channel| {
            let mut entries: Vec<LogEntry> = channel.log.iter().cloned().collect();
            if channel.kind == ChannelKind::Query && channel.offline {
                let mut note =
                    LogEntry::notice(format!("{} is not online", channel.name), Tone::Notice);
                // Pinned so the view compares equal from tick to tick.
                note.timestamp = channel
                    .log
                    .last()
                    .map_or(chrono::DateTime::<chrono::Utc>::MIN_UTC, |e| e.timestamp);
                entries.push(note);
            }
            entries
        })
        .unwrap_or_default()
}

pub(crate) fn members(state: &IrcState, active: &str) -> Vec<String> {
    state
        .channel(active)
        .filter(|c| c.kind == ChannelKind::Channel)
        .map(|c| c.members.iter().map(cellar_irc::Member::display).collect())
        .unwrap_or_default()
}

/// Topic line for the active channel, if any.
pub(crate) fn topic(state: &IrcState, active: &str) -> Option<String> {
    state.channel(active).and_then(|c| c.topic.clone())
}

/// Choices the panel lists for a prompt.
pub(crate) fn choices(kind: Option<&PromptKind>) -> Vec<String> {
    match kind {
        Some(PromptKind::Question) => vec!["Yes".to_owned(), "No".to_owned()],
        Some(PromptKind::Menu(items) | PromptKind::MenuNum(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn hint(kind: Option<&PromptKind>, protect: bool) -> String {
    let close = if protect { "" } else { ", esc close" };
    let base = match kind {
        Some(PromptKind::Acknowledge) => "enter continue",
        Some(PromptKind::Question) => "↑↓ choose, enter confirm, ctrl-n no",
        Some(PromptKind::Menu(_) | PromptKind::MenuNum(_)) => "↑↓ choose, enter confirm",
        Some(PromptKind::Text) => "type, enter confirm",
        Some(PromptKind::Login) => "type <login> <password>, enter confirm",
        Some(PromptKind::Download) => "downloading",
        None => "working",
    };
    format!("{base}{close}, tab next window")
}

/// Panel model for `window`. `input` is the current editor text, echoed
/// for prompts that take typed input.
pub(crate) fn wizard_model(
    window: &WizardWindow,
    selected: usize,
    input: &str,
    others: usize,
) -> WizardPanelModel {
    let kind = window.prompt();
    let choices = choices(kind);
    let selected = selected.min(choices.len().saturating_sub(1));

    let mut text = window.view.text().to_owned();
    let mut input_echo = None;
    let (mut progress, mut busy) = (None, false);

    match &window.view {
        WindowView::Textbox { default, .. } | WindowView::Browse { default, .. }
            if matches!(kind, Some(PromptKind::Text)) =>
        {
            input_echo = Some(if input.is_empty() {
                default.clone()
            } else {
                input.to_owned()
            });
        }
        WindowView::Licence { file, .. } | WindowView::File { file, .. } => {
            text = format!("{text}\n\n{file}");
        }
        WindowView::Login { register_url, .. } => {
            if !register_url.is_empty() {
                text = format!("{text}\n\nRegister at {register_url}");
            }
            input_echo = Some(mask_password(input));
        }
        WindowView::Progress { percent: p, .. } => {
            progress = *p;
            busy = p.is_none();
        }
        WindowView::Download {
            url,
            received,
            total,
            ..
        } => {
            text = format!("{text}\n{url}");
            progress = percent(*received, *total);
            busy = progress.is_none();
        }
        _ => {}
    }

    WizardPanelModel {
        window: window.id.clone(),
        title: window.view.title().to_owned(),
        text,
        choices,
        selected,
        input: input_echo,
        progress,
        busy,
        hint: hint(kind, window.protect),
        others,
    }
}

/// Show the login, hide the password typed after the first space.
fn mask_password(input: &str) -> String {
    match input.split_once(' ') {
        Some((login, password)) => format!("{login} {}", "*".repeat(password.chars().count())),
        None => input.to_owned(),
    }
}

/// Typed text for a text prompt; an empty line takes the window's default.
pub(crate) fn text_answer(window: &WizardWindow, typed: String) -> String {
    if !typed.trim().is_empty() {
        return typed;
    }
    match &window.view {
        WindowView::Textbox { default, .. } | WindowView::Browse { default, .. } => default.clone(),
        _ => typed,
    }
}
