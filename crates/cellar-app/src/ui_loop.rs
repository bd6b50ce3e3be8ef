//! The full-screen session: support chat on top of the wizard host.
//!
//! One loop owns every window and the terminal. Each tick it applies at most
//! one wizard delivery, folds in downloads and reaped processes, pulls view
//! values out of live state, and redraws only what changed.

use anyhow::{Context, Result};
use cellar_core::{BoundedLog, LogEntry, Tone};
use cellar_irc::{IrcEngine, IrcState};
use cellar_tui::{
    ChannelTabs, Component, Editor, Focus, Footer, InputAction, LogView, MemberList, Popup,
    Reconciled, Screen, StyledLine, Tab, WizardPanel, WizardPanelModel, compose_columns,
    handle_key_event, poll_event, theme,
};
use cellar_wizard::{
    PromptKind, ProcProbe, UserAnswer, WizardInbox, WizardServer, bridge, generate_cookie,
};
use crossterm::event::Event;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::Config;
use crate::host::{Exit, Host, parse_answer};
use crate::publish::{Endpoint, Published};
use crate::views::{self, STATUS, SeenTracker};

const SIDEBAR_WIDTH: usize = 18;
const CHAT_HINTS: &str = "tab window · F2 wizard · ctrl-c quit";
const WIZARD_HINTS: &str = "F2 chat · esc close · ctrl-c quit";

/// Footer inputs compared between ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FooterView {
    connected: bool,
    nick: String,
    server: String,
    port: Option<u16>,
    windows: usize,
    focus: Focus,
}

/// Components plus the last-rendered value behind each of them.
#[derive(Debug)]
struct ChatScreen {
    tabs: ChannelTabs,
    log: LogView,
    members: MemberList,
    wizard: WizardPanel,
    popup: Popup,
    footer: Footer,
    editor: Editor,

    tabs_view: Reconciled<Vec<Tab>>,
    log_view: Reconciled<Vec<LogEntry>>,
    members_view: Reconciled<Vec<String>>,
    topic_view: Reconciled<Option<String>>,
    wizard_view: Reconciled<Option<WizardPanelModel>>,
    popup_view: Reconciled<Option<String>>,
    footer_view: Reconciled<FooterView>,

    focus: Focus,
    active: String,
    seen: SeenTracker,
    /// Wizard window shown in the panel.
    wizard_window: Option<String>,
    selected: usize,
    /// Whether the shown window was waiting on the user last tick.
    prompting: bool,
    popup_open: bool,
}

impl ChatScreen {
    fn new() -> Self {
        let mut editor = Editor::new();
        editor.set_label(STATUS);
        editor.set_focused(true);
        Self {
            tabs: ChannelTabs::new(),
            log: LogView::new(),
            members: MemberList::new(),
            wizard: WizardPanel::new(),
            popup: Popup::new(),
            footer: Footer::new(CHAT_HINTS),
            editor,
            tabs_view: Reconciled::new(),
            log_view: Reconciled::new(),
            members_view: Reconciled::new(),
            topic_view: Reconciled::new(),
            wizard_view: Reconciled::new(),
            popup_view: Reconciled::new(),
            footer_view: Reconciled::new(),
            focus: Focus::Chat,
            active: STATUS.to_owned(),
            seen: SeenTracker::default(),
            wizard_window: None,
            selected: 0,
            prompting: false,
            popup_open: false,
        }
    }

    /// Target for chat input typed into the active window.
    fn target(&self) -> Option<&str> {
        (self.active != STATUS).then_some(self.active.as_str())
    }

    fn set_focus(&mut self, focus: Focus) {
        self.focus = focus;
        self.wizard.set_focused(focus == Focus::Wizard);
        self.editor.set_border_color(match focus {
            Focus::Chat => theme::BORDER,
            Focus::Wizard => theme::ACCENT,
        });
        let label = match focus {
            Focus::Chat => self.active.clone(),
            Focus::Wizard => "wizard".to_owned(),
        };
        self.editor.set_label(&label);
        self.footer.set_hints(match focus {
            Focus::Chat => CHAT_HINTS,
            Focus::Wizard => WIZARD_HINTS,
        });
    }

    fn select_window(&mut self, state: &IrcState, step: isize) {
        let names = views::window_names(state);
        let current = names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(&self.active))
            .unwrap_or(0);
        let len = isize::try_from(names.len()).unwrap_or(1).max(1);
        let next = (isize::try_from(current).unwrap_or(0) + step).rem_euclid(len);
        if let Some(name) = usize::try_from(next).ok().and_then(|i| names.get(i)) {
            self.active.clone_from(name);
        }
        self.log.scroll_to_bottom();
        if self.focus == Focus::Chat {
            self.editor.set_label(&self.active);
        }
    }

    /// Keep the shown wizard window valid and move focus to a fresh prompt.
    fn follow_wizard(&mut self, host: &Host) {
        let registry = host.registry();
        let still_open = self
            .wizard_window
            .as_deref()
            .is_some_and(|id| registry.contains(id));
        if !still_open {
            self.wizard_window = registry
                .windows()
                .find(|w| w.prompt().is_some())
                .or_else(|| registry.windows().next())
                .map(|w| w.id.clone());
            self.selected = 0;
            self.prompting = false;
        }

        let prompting = self
            .wizard_window
            .as_deref()
            .and_then(|id| registry.get(id))
            .is_some_and(|w| w.prompt().is_some());
        if prompting && !self.prompting {
            self.selected = 0;
            if self.focus == Focus::Chat {
                debug!(window = ?self.wizard_window, "wizard prompt takes focus");
                self.set_focus(Focus::Wizard);
            }
        }
        self.prompting = prompting;

        let popup_open = registry.popup().is_some();
        if popup_open && !self.popup_open && self.focus == Focus::Chat {
            self.set_focus(Focus::Wizard);
        }
        self.popup_open = popup_open;

        if !self.wizard_has_content() && self.focus == Focus::Wizard {
            self.set_focus(Focus::Chat);
        }
    }

    fn wizard_has_content(&self) -> bool {
        self.wizard_window.is_some() || self.popup_open
    }

    fn cycle_wizard(&mut self, host: &Host) {
        let ids: Vec<&str> = host.registry().ids().collect();
        if ids.is_empty() {
            return;
        }
        let current = self
            .wizard_window
            .as_deref()
            .and_then(|id| ids.iter().position(|i| *i == id));
        let next = current.map_or(0, |i| (i + 1) % ids.len());
        self.wizard_window = Some(ids[next].to_owned());
        self.selected = 0;
        self.prompting = false;
    }

    /// Pull every view from live state. Returns whether anything changed.
    fn sync(
        &mut self,
        state: &IrcState,
        server: &str,
        host: &Host,
        port: Option<u16>,
        notices: &BoundedLog,
    ) -> bool {
        if !views::window_names(state)
            .iter()
            .any(|n| n.eq_ignore_ascii_case(&self.active))
        {
            self.active = STATUS.to_owned();
            if self.focus == Focus::Chat {
                self.editor.set_label(STATUS);
            }
        }
        let active_log = if self.active == STATUS {
            Some(&state.status)
        } else {
            state.channel(&self.active).map(|c| &c.log)
        };
        if let Some(log) = active_log {
            self.seen.mark_seen(&self.active, log);
        }

        self.follow_wizard(host);

        let mut changed = false;
        let tabs = &mut self.tabs;
        changed |= self.tabs_view.sync(
            || views::tabs(state, &self.active, &self.seen),
            |t| tabs.set_tabs(t.clone()),
        );

        let log = &mut self.log;
        changed |= self.log_view.sync(
            || views::log_entries(state, &self.active, notices),
            |entries| log.set_entries(entries.clone()),
        );

        let members = &mut self.members;
        changed |= self.members_view.sync(
            || views::members(state, &self.active),
            |m| members.set_members(m.clone()),
        );

        changed |= self
            .topic_view
            .sync(|| views::topic(state, &self.active), |_| {});

        let registry = host.registry();
        let others = registry.window_count().saturating_sub(1);
        let input = self.editor.text();
        let model = self
            .wizard_window
            .as_deref()
            .and_then(|id| registry.get(id))
            .map(|w| views::wizard_model(w, self.selected, input, others));
        if let Some(model) = &model {
            self.selected = model.selected;
        }
        let wizard = &mut self.wizard;
        changed |= self
            .wizard_view
            .sync(|| model, |m| wizard.set_model(m.clone()));

        let popup = &mut self.popup;
        changed |= self.popup_view.sync(
            || registry.popup().map(|p| p.message.clone()),
            |m| popup.set_message(m.clone()),
        );

        let footer = &mut self.footer;
        changed |= self.footer_view.sync(
            || FooterView {
                connected: state.connected,
                nick: state.nick.clone(),
                server: server.to_owned(),
                port,
                windows: registry.window_count(),
                focus: self.focus,
            },
            |v| {
                footer.set_connection(v.connected, &v.nick, &v.server);
                footer.set_wizard(v.port, v.windows);
            },
        );
        changed
    }

    /// Lay the components out top to bottom for a `width` by `height` screen.
    fn frame(&mut self, width: usize, height: usize) -> Vec<StyledLine> {
        let mut top = self.tabs.render(width);
        if let Some(Some(topic)) = self.topic_view.rendered() {
            top.push(theme::fg(theme::DIM, &cellar_tui::utils::fit(&format!(" {topic}"), width)));
        }
        top.extend(self.popup.render(width));

        let mut wizard = self.wizard.render(width);
        let bottom: Vec<StyledLine> = self
            .editor
            .render(width)
            .into_iter()
            .chain(self.footer.render(width))
            .collect();

        let fixed = top.len() + bottom.len();
        let wizard_limit = height.saturating_sub(fixed) / 2;
        if wizard.len() > wizard_limit {
            // Keep the bottom edge with its hint visible.
            let tail = wizard.pop();
            wizard.truncate(wizard_limit.saturating_sub(1));
            wizard.extend(tail.filter(|_| wizard_limit > 0));
        }

        let body_height = height.saturating_sub(fixed + wizard.len());
        self.log.set_height(body_height);
        self.members.set_height(body_height);

        let has_members = self
            .members_view
            .rendered()
            .is_some_and(|m| !m.is_empty());
        let body = if width > SIDEBAR_WIDTH * 3 && has_members {
            let left_width = width - SIDEBAR_WIDTH - 1;
            compose_columns(
                &self.log.render(left_width),
                left_width,
                &self.members.render(SIDEBAR_WIDTH),
                SIDEBAR_WIDTH,
            )
        } else {
            self.log.render(width)
        };

        let mut lines = top;
        lines.extend(wizard);
        lines.extend(body.into_iter().take(body_height));
        while lines.len() < height.saturating_sub(bottom.len()) {
            lines.push(String::new());
        }
        lines.extend(bottom);
        lines.truncate(height);
        lines
    }
}

/// Everything the loop talks to besides the screen.
#[derive(Debug)]
struct Session {
    host: Host,
    inbox: WizardInbox,
    engine: Option<IrcEngine>,
    server: String,
    port: u16,
    notices: BoundedLog,
}

impl Session {
    fn notice(&mut self, text: impl Into<String>, tone: Tone) {
        self.notices.push(LogEntry::notice(text, tone));
    }

    fn connect(&mut self) {
        let Some(engine) = self.engine.clone() else {
            self.notice("Support chat is disabled", Tone::Error);
            return;
        };
        if engine.is_connected() {
            self.notice("Already connected", Tone::Notice);
            return;
        }
        tokio::spawn(
            async move {
                engine.connect().await;
            }
            .instrument(info_span!("irc_connect")),
        );
    }

    fn disconnect(&mut self) {
        let connected = self.engine.as_ref().filter(|e| e.is_connected());
        match connected {
            Some(engine) => engine.stop(),
            None => self.notice("Not connected", Tone::Notice),
        }
    }

    fn chat_state(&self) -> IrcState {
        self.engine
            .as_ref()
            .map_or_else(|| IrcState::new(""), IrcEngine::snapshot)
    }
}

/// Run the full-screen session until the user quits or a helper asks for a
/// shutdown or restart.
pub(crate) async fn run(config: &Config, no_irc: bool) -> Result<Exit> {
    let home = config.paths.home_dir();
    let cancel = CancellationToken::new();

    let cookie = generate_cookie();
    let server = WizardServer::bind(config.wizard.port_start, config.wizard.port_span, cookie.as_str())
        .await
        .context("failed to start the wizard server")?;
    let port = server.port();
    let _published = Published::new(&home, &Endpoint { port, cookie })?;
    let _cancel_on_exit = cancel.clone().drop_guard();

    let (bridge, inbox) = bridge();
    let serve_cancel = cancel.clone();
    let server_task = tokio::spawn(async move {
        if let Err(error) = server.serve(bridge, serve_cancel).await {
            warn!(error = %format!("{error:#}"), "wizard server stopped");
        }
    });

    let chat_enabled = config.irc.enabled && !no_irc;
    let engine = chat_enabled.then(|| IrcEngine::new(config.irc.settings()));
    let mut session = Session {
        host: Host::new(cancel.clone()),
        inbox,
        server: if chat_enabled {
            format!("{}:{}", config.irc.host, config.irc.port)
        } else {
            String::new()
        },
        engine,
        port,
        notices: BoundedLog::new(),
    };
    session.notice(format!("Setup Wizard listening on port {port}"), Tone::Notice);
    if chat_enabled {
        session.connect();
    }

    let mut screen = Screen::new();
    screen.start().context("failed to start the terminal UI")?;
    let outcome = drive(&mut screen, &mut session).await;
    if let Err(error) = screen.stop() {
        warn!(%error, "failed to restore the terminal");
    }

    cancel.cancel();
    if let Some(engine) = &session.engine {
        engine.stop();
    }
    session.host.shutdown();
    let _ = server_task.await;
    outcome
}

async fn drive(screen: &mut Screen, session: &mut Session) -> Result<Exit> {
    let mut ui = ChatScreen::new();
    let mut size = Screen::size()?;
    let mut last_alert: Option<LogEntry> = None;
    let mut dirty = true;

    loop {
        let mut needs_render = std::mem::take(&mut dirty);
        needs_render |= session.host.pump(&mut session.inbox);
        needs_render |= session.host.drain_downloads();
        needs_render |= session.host.reap(&ProcProbe);
        for notice in session.host.take_notices() {
            session.notice(notice, Tone::Notice);
        }

        if let Some(exit) = session.host.exit() {
            info!(?exit, "wizard requested exit");
            return Ok(exit);
        }

        let state = session.chat_state();
        let newest_alert = newest_alert(&state);
        if newest_alert.is_some() && newest_alert != last_alert {
            screen.bell()?;
        }
        last_alert = newest_alert;

        needs_render |= ui.sync(
            &state,
            &session.server,
            &session.host,
            Some(session.port),
            &session.notices,
        );
        if needs_render {
            screen.draw(&ui.frame(size.0, size.1))?;
        }

        match poll_event(session.host.tick_period()) {
            Some(Event::Key(key)) => {
                let action = handle_key_event(&mut ui.editor, ui.focus, key);
                if handle_action(action, &mut ui, session, &state) {
                    return Ok(Exit::Quit);
                }
                dirty = true;
            }
            Some(Event::Resize(width, height)) => {
                size = (usize::from(width), usize::from(height));
                screen.force_redraw();
                dirty = true;
            }
            _ => {}
        }
    }
}

fn newest_alert(state: &IrcState) -> Option<LogEntry> {
    state
        .channels
        .values()
        .filter_map(|c| c.log.iter().rev().find(|e| e.alert))
        .chain(state.status.iter().rev().find(|e| e.alert))
        .max_by_key(|e| e.timestamp)
        .cloned()
}

/// Apply one key action. Returns true when the user quits.
fn handle_action(
    action: InputAction,
    ui: &mut ChatScreen,
    session: &mut Session,
    state: &IrcState,
) -> bool {
    match action {
        InputAction::None => {}
        InputAction::Quit => return true,
        InputAction::Submit(text) => submit_chat(&text, ui, session),
        InputAction::NextTab => ui.select_window(state, 1),
        InputAction::PrevTab => ui.select_window(state, -1),
        InputAction::ScrollUp(rows) => ui.log.scroll_up(rows),
        InputAction::ScrollDown(rows) => ui.log.scroll_down(rows),
        InputAction::ToggleFocus => {
            let next = match ui.focus {
                Focus::Chat if ui.wizard_has_content() => Focus::Wizard,
                _ => Focus::Chat,
            };
            ui.set_focus(next);
        }
        InputAction::WizardUp => ui.selected = ui.selected.saturating_sub(1),
        InputAction::WizardDown => ui.selected += 1,
        InputAction::WizardNext => ui.cycle_wizard(&session.host),
        InputAction::WizardConfirm(typed) => confirm_wizard(typed, ui, session),
        InputAction::WizardDecline => {
            if let Some(id) = ui.wizard_window.clone()
                && matches!(
                    session.host.registry().get(&id).and_then(|w| w.prompt()),
                    Some(PromptKind::Question)
                )
            {
                session.host.answer(&id, &UserAnswer::No);
            }
        }
        InputAction::WizardCancel => {
            if let Some(id) = ui.wizard_window.clone() {
                session.host.cancel_window(&id);
            }
        }
    }
    false
}

fn submit_chat(text: &str, ui: &ChatScreen, session: &mut Session) {
    match text.split_whitespace().next() {
        Some("/connect") => session.connect(),
        Some("/disconnect") => session.disconnect(),
        _ => match &session.engine {
            Some(engine) if engine.is_connected() => engine.send(text, ui.target()),
            Some(_) => session.notice("Not connected; type /connect", Tone::Error),
            None => session.notice("Support chat is disabled", Tone::Error),
        },
    }
}

fn confirm_wizard(typed: String, ui: &mut ChatScreen, session: &mut Session) {
    if session.host.dismiss_popup() {
        ui.editor.set_text(&typed);
        return;
    }
    let Some(id) = ui.wizard_window.clone() else {
        return;
    };
    let Some(window) = session.host.registry().get(&id) else {
        return;
    };
    let Some(kind) = window.prompt().cloned() else {
        ui.editor.set_text(&typed);
        return;
    };

    let answer = match &kind {
        PromptKind::Question => Some(if ui.selected == 0 {
            UserAnswer::Yes
        } else {
            UserAnswer::No
        }),
        PromptKind::Menu(_) | PromptKind::MenuNum(_) if typed.trim().is_empty() => {
            Some(UserAnswer::Choose(ui.selected))
        }
        PromptKind::Text => Some(UserAnswer::Text(views::text_answer(window, typed.clone()))),
        _ => parse_answer(&kind, &typed),
    };

    match answer {
        Some(answer) => {
            session.host.answer(&id, &answer);
        }
        None => {
            ui.editor.set_text(&typed);
            let hint = match kind {
                PromptKind::Login => "Type your login and password separated by a space",
                PromptKind::Download => "Wait for the download to finish",
                _ => "That is not one of the choices",
            };
            session.notice(hint, Tone::Error);
        }
    }
}
