//! The IRC session: one TCP connection driven by three tasks.
//!
//! * reader: reads lines, applies them to `IrcState`, carries out effects;
//! * writer: owns the write half and drains the outbound queue;
//! * driver: runs user actions, including the access gate for private sends.
//!
//! All three share one `CancellationToken`. Teardown happens exactly once per
//! session, from `stop()` or from the reader on a fatal condition.

use crate::access::{AccessCache, AccessGate};
use crate::command::UserCommand;
use crate::dispatch::{Effect, dispatch};
use crate::message::IrcMessage;
use crate::state::{IrcState, is_channel_name};
use anyhow::{Context, Result};
use cellar_core::{LineFramed, LineReader, LineWriter, LogEntry, Terminator, Tone};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

const OUTBOUND_QUEUE: usize = 64;
const ACTION_QUEUE: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcSettings {
    pub host: String,
    pub port: u16,
    pub nick: String,
    pub username: String,
    pub realname: String,
    /// Joined on registration; losing it ends the session.
    pub home_channel: String,
    /// Bot that answers `CHECK <nick>` with `ALLOW`/`DENY`.
    pub admin_nick: String,
    pub read_timeout: Duration,
}

impl Default for IrcSettings {
    fn default() -> Self {
        Self {
            host: "chat.freenode.net".to_owned(),
            port: 6667,
            nick: "cellar-user".to_owned(),
            username: "cellar".to_owned(),
            realname: "Cellar user".to_owned(),
            home_channel: "#cellar".to_owned(),
            admin_nick: "CellarBot".to_owned(),
            read_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IrcAction {
    Join(String),
    Leave(String),
    Send {
        text: String,
        target: Option<String>,
    },
    ChangeNick(String),
}

#[derive(Debug)]
struct Session {
    id: u64,
    actions: mpsc::Sender<IrcAction>,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

#[derive(Debug)]
struct Inner {
    settings: IrcSettings,
    state: Arc<Mutex<IrcState>>,
    access: AccessCache,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
}

/// Handle to the chat session. Clones share the same connection and state.
#[derive(Debug, Clone)]
pub struct IrcEngine {
    inner: Arc<Inner>,
}

impl IrcEngine {
    pub fn new(settings: IrcSettings) -> Self {
        let state = IrcState::new(settings.nick.clone());
        Self {
            inner: Arc::new(Inner {
                settings,
                state: Arc::new(Mutex::new(state)),
                access: AccessCache::new(),
                session: Mutex::new(None),
                next_session: AtomicU64::new(1),
            }),
        }
    }

    pub fn settings(&self) -> &IrcSettings {
        &self.inner.settings
    }

    /// Shared live state. Lock briefly; never across an `.await`.
    pub fn state(&self) -> Arc<Mutex<IrcState>> {
        Arc::clone(&self.inner.state)
    }

    pub fn snapshot(&self) -> IrcState {
        self.lock_state().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.lock_state().connected
    }

    /// Open the connection and register. A failure is rendered as a status
    /// notice and leaves the engine disconnected; nothing is retried.
    pub async fn connect(&self) -> bool {
        if self.lock_session().is_some() {
            return true;
        }

        let settings = &self.inner.settings;
        match open_stream(&settings.host, settings.port).await {
            Ok(stream) => {
                self.start(stream);
                true
            }
            Err(error) => {
                warn!(host = %settings.host, port = settings.port, error = %format!("{error:#}"), "irc connect failed");
                self.lock_state().push_status(LogEntry::notice(
                    format!("Unable to connect to {}:{}: {error:#}", settings.host, settings.port),
                    Tone::Error,
                ));
                false
            }
        }
    }

    /// Run a session over an already-open stream.
    pub fn start<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let settings = self.inner.settings.clone();
        let (reader, writer) = LineFramed::new(stream, Terminator::CrLf).split();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (actions, actions_rx) = mpsc::channel(ACTION_QUEUE);
        let cancel = CancellationToken::new();
        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);

        {
            let mut state = self.lock_state();
            *state = IrcState::new(settings.nick.clone());
            state.connected = true;
            state.push_status(LogEntry::notice(
                format!("Connecting to {}:{}", settings.host, settings.port),
                Tone::Notice,
            ));
        }

        // Registration goes first on the queue, so it is first on the wire.
        let _ = outbound.try_send(format!("NICK {}", settings.nick));
        let _ = outbound.try_send(format!(
            "USER {} 0 * :{}",
            settings.username, settings.realname
        ));

        *self.lock_session() = Some(Session {
            id,
            actions,
            outbound: outbound.clone(),
            cancel: cancel.clone(),
        });

        let span = info_span!("irc_session", host = %settings.host, nick = %settings.nick, session = id);
        info!(parent: &span, "irc session started");

        tokio::spawn(write_loop(writer, outbound_rx, cancel.clone()).instrument(span.clone()));
        tokio::spawn(
            read_loop(self.clone(), reader, outbound.clone(), cancel.clone(), id)
                .instrument(span.clone()),
        );
        tokio::spawn(drive_actions(self.clone(), actions_rx, outbound, cancel).instrument(span));
    }

    pub fn join(&self, channel: &str) {
        self.queue(IrcAction::Join(channel.to_owned()));
    }

    pub fn leave(&self, channel: &str) {
        self.queue(IrcAction::Leave(channel.to_owned()));
    }

    /// Send input typed into `target`'s window. Slash commands are parsed;
    /// anything else is a message to `target`.
    pub fn send(&self, text: &str, target: Option<&str>) {
        self.queue(IrcAction::Send {
            text: text.to_owned(),
            target: target.map(str::to_owned),
        });
    }

    pub fn change_nick(&self, nick: &str) {
        self.queue(IrcAction::ChangeNick(nick.to_owned()));
    }

    /// Open (or focus) a private conversation window. Local only.
    pub fn open_query(&self, nick: &str) {
        self.lock_state().open_query(nick);
    }

    /// End the session and clear all chat state.
    pub fn stop(&self) {
        let session = self.lock_session().take();
        if let Some(session) = session {
            let _ = session.outbound.try_send("QUIT :Leaving".to_owned());
            self.end_session(session, "Disconnected");
        }
    }

    fn stop_if_current(&self, id: u64, reason: &str) {
        let session = {
            let mut slot = self.lock_session();
            if slot.as_ref().is_some_and(|s| s.id == id) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(session) = session {
            self.end_session(session, reason);
        }
    }

    fn end_session(&self, session: Session, reason: &str) {
        session.cancel.cancel();
        info!(session = session.id, reason, "irc session ended");
        let mut state = self.lock_state();
        state.teardown(reason);
        state.push_status(LogEntry::notice(reason, Tone::Error));
    }

    fn queue(&self, action: IrcAction) {
        let sent = match self.lock_session().as_ref() {
            Some(session) => session.actions.try_send(action).map_err(|e| e.to_string()),
            None => Err("not connected".to_owned()),
        };
        if let Err(reason) = sent {
            debug!(%reason, "irc action dropped");
            self.lock_state()
                .push_status(LogEntry::notice(format!("Cannot send: {reason}"), Tone::Error));
        }
    }

    /// Apply one inbound message unless its session has ended. The check
    /// happens under the state lock, so nothing lands after `end_session`.
    fn apply(&self, msg: &IrcMessage, cancel: &CancellationToken) -> Vec<Effect> {
        let mut state = self.lock_state();
        if cancel.is_cancelled() {
            return Vec::new();
        }
        dispatch(&mut state, &self.inner.access, &self.inner.settings, msg)
    }

    fn lock_state(&self) -> MutexGuard<'_, IrcState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn open_stream(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("failed to connect to {host}:{port}"))?;
    stream.set_nodelay(true).context("failed to set TCP_NODELAY")?;
    Ok(stream)
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: LineWriter<W>,
    mut outbound: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            biased;
            line = outbound.recv() => line,
            () = cancel.cancelled() => None,
        };
        let Some(line) = line else { break };
        debug!(line = %line, "irc send");
        if let Err(error) = writer.write_line(&line).await {
            warn!(error = %format!("{error:#}"), "irc write failed");
            cancel.cancel();
            break;
        }
    }

    // Flush what was queued before cancellation, e.g. a QUIT.
    while let Ok(line) = outbound.try_recv() {
        if writer.write_line(&line).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop<R: AsyncRead + Unpin>(
    engine: IrcEngine,
    mut reader: LineReader<R>,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
    session: u64,
) {
    let timeout = engine.settings().read_timeout;
    let host = engine.settings().host.clone();
    let mut pinged = false;

    let reason = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            next = tokio::time::timeout(timeout, reader.read_line()) => next,
        };

        let line = match next {
            Err(_) if pinged => break "Ping timeout".to_owned(),
            Err(_) => {
                pinged = true;
                let _ = outbound.send(format!("PING :{host}")).await;
                continue;
            }
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => break "Connection closed by server".to_owned(),
            Ok(Err(error)) => break format!("Connection lost: {error:#}"),
        };
        pinged = false;

        let Some(msg) = IrcMessage::parse(&line) else {
            continue;
        };

        let mut fatal = None;
        for effect in engine.apply(&msg, &cancel) {
            match effect {
                Effect::Send(line) => {
                    let _ = outbound.send(line).await;
                }
                Effect::Fatal(reason) => {
                    fatal = Some(reason);
                    break;
                }
            }
        }
        if let Some(reason) = fatal {
            break reason;
        }
    };

    warn!(%reason, "irc session lost");
    engine.stop_if_current(session, &reason);
}

async fn drive_actions(
    engine: IrcEngine,
    mut actions: mpsc::Receiver<IrcAction>,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let gate = AccessGate::new(engine.inner.access.clone(), engine.settings().admin_nick.clone());
    let driver = Driver {
        engine,
        gate,
        outbound,
        cancel: cancel.clone(),
    };

    loop {
        let action = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            action = actions.recv() => action,
        };
        let Some(action) = action else { break };
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = driver.run(action) => {}
        }
    }
}

#[derive(Debug)]
struct Driver {
    engine: IrcEngine,
    gate: AccessGate,
    outbound: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(&self, action: IrcAction) {
        debug!(?action, "irc action");
        match action {
            IrcAction::Join(channel) => self.raw(format!("JOIN {channel}")).await,
            IrcAction::Leave(channel) => self.leave(&channel, None).await,
            IrcAction::ChangeNick(nick) => self.raw(format!("NICK {nick}")).await,
            IrcAction::Send { text, target } => self.user_input(&text, target.as_deref()).await,
        }
    }

    async fn user_input(&self, text: &str, target: Option<&str>) {
        let command = match UserCommand::parse(text) {
            Ok(command) => command,
            Err(error) => {
                self.status(error.to_string(), Tone::Error);
                return;
            }
        };

        match command {
            UserCommand::Say(text) => match target {
                Some(target) => self.message(target, &text, false).await,
                None => self.status("No window to send to", Tone::Error),
            },
            UserCommand::Join(channel) => self.raw(format!("JOIN {channel}")).await,
            UserCommand::Part { channel, reason } => {
                match channel.as_deref().or(target) {
                    Some(channel) => self.leave(channel, reason.as_deref()).await,
                    None => self.status("usage: /part #channel", Tone::Error),
                }
            }
            UserCommand::Query(nick) => {
                if let Some(mut state) = self.live_state() {
                    state.open_query(&nick);
                }
            }
            UserCommand::Kick { nick, reason } => match target.filter(|t| is_channel_name(t)) {
                Some(channel) => {
                    let reason = reason.unwrap_or_default();
                    self.raw(format!("KICK {channel} {nick} :{reason}")).await;
                }
                None => self.status("/kick only works in a channel", Tone::Error),
            },
            UserCommand::Nick(nick) => self.raw(format!("NICK {nick}")).await,
            UserCommand::Me(action) => match target {
                Some(target) => self.message(target, &action, true).await,
                None => self.status("No window to send to", Tone::Error),
            },
            UserCommand::Msg { target, text } => self.message(&target, &text, false).await,
        }
    }

    async fn leave(&self, name: &str, reason: Option<&str>) {
        if is_channel_name(name) {
            match reason {
                Some(reason) => self.raw(format!("PART {name} :{reason}")).await,
                None => self.raw(format!("PART {name}")).await,
            }
        } else if let Some(mut state) = self.live_state() {
            state.remove(name);
        }
    }

    /// Send a message or action, gating private targets, then echo it.
    async fn message(&self, target: &str, text: &str, action: bool) {
        let text = text.replace(['\r', '\n'], " ");
        let private = !is_channel_name(target);

        if private && !self.gate.check_access(target, &self.outbound).await {
            let notice = format!("{target} has not accepted private messages");
            let Some(mut state) = self.live_state() else {
                return;
            };
            if state.channel(target).is_some() {
                state.push_to(target, LogEntry::notice(notice, Tone::Error));
            } else {
                state.push_status(LogEntry::notice(notice, Tone::Error));
            }
            return;
        }

        let payload = if action {
            format!("\u{1}ACTION {text}\u{1}")
        } else {
            text.clone()
        };
        self.raw(format!("PRIVMSG {target} :{payload}")).await;

        let Some(mut state) = self.live_state() else {
            return;
        };
        let me = state.nick.clone();
        if private {
            state.open_query(target);
        }
        let entry = if action {
            LogEntry::notice(format!("* {me} {text}"), Tone::Own)
        } else {
            LogEntry::message(me, text, Tone::Own)
        };
        state.push_to(target, entry);
    }

    /// State lock for a session that is still running.
    fn live_state(&self) -> Option<MutexGuard<'_, IrcState>> {
        let state = self.engine.lock_state();
        (!self.cancel.is_cancelled()).then_some(state)
    }

    async fn raw(&self, line: String) {
        if self.outbound.send(line).await.is_err() {
            debug!("irc writer gone");
        }
    }

    fn status(&self, text: impl Into<String>, tone: Tone) {
        if let Some(mut state) = self.live_state() {
            state.push_status(LogEntry::notice(text, tone));
        }
    }
}
