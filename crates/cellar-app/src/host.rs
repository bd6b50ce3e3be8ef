//! The wizard host: owns the window registry on the UI loop, applies
//! mailbox deliveries, and carries out the effects they ask for.

use std::time::Duration;

use cellar_wizard::{
    HostEffect, ProcessProbe, PromptKind, UserAnswer, WindowRegistry, WizardInbox, dispatch,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::download::{DownloadEvent, spawn_download};

/// Tick while any wizard window or popup is open.
pub(crate) const BUSY_TICK: Duration = Duration::from_millis(10);
/// Tick while idle.
pub(crate) const IDLE_TICK: Duration = Duration::from_millis(100);

/// How the UI loop should end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    Quit,
    Restart,
}

#[derive(Debug)]
pub(crate) struct Host {
    registry: WindowRegistry,
    client: reqwest::Client,
    download_tx: mpsc::UnboundedSender<DownloadEvent>,
    download_rx: mpsc::UnboundedReceiver<DownloadEvent>,
    cancel: CancellationToken,
    exit: Option<Exit>,
    notices: Vec<String>,
}

impl Host {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        let (download_tx, download_rx) = mpsc::unbounded_channel();
        Self {
            registry: WindowRegistry::new(),
            client: reqwest::Client::new(),
            download_tx,
            download_rx,
            cancel,
            exit: None,
            notices: Vec::new(),
        }
    }

    pub(crate) fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub(crate) fn exit(&self) -> Option<Exit> {
        self.exit
    }

    pub(crate) fn tick_period(&self) -> Duration {
        if self.registry.is_idle() {
            IDLE_TICK
        } else {
            BUSY_TICK
        }
    }

    /// Messages for the user produced since the last call.
    pub(crate) fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Take at most one delivery from the mailbox and apply it.
    pub(crate) fn pump(&mut self, inbox: &mut WizardInbox) -> bool {
        let Some(delivery) = inbox.try_next() else {
            return false;
        };
        let effect = dispatch(&mut self.registry, delivery);
        self.apply(effect);
        true
    }

    fn apply(&mut self, effect: HostEffect) {
        match effect {
            HostEffect::None => {}
            HostEffect::Download { win, url, path } => {
                info!(window = %win, %url, path = %path.display(), "starting download");
                spawn_download(
                    self.client.clone(),
                    win,
                    url,
                    path,
                    self.download_tx.clone(),
                    self.cancel.child_token(),
                );
            }
            HostEffect::Quit => self.exit = Some(Exit::Quit),
            HostEffect::Restart => self.exit = Some(Exit::Restart),
        }
    }

    /// Fold finished and in-flight download reports into the windows.
    pub(crate) fn drain_downloads(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.download_rx.try_recv() {
            changed = true;
            match event {
                DownloadEvent::Progress {
                    win,
                    received,
                    total,
                } => self.registry.update_download(&win, received, total),
                DownloadEvent::Finished { win } => {
                    self.registry.finish_download(&win);
                }
                DownloadEvent::Failed { win, error } => {
                    self.registry.fail_download(&win, &error);
                    self.notices.push(format!("Download failed: {error}"));
                }
            }
        }
        changed
    }

    /// Close windows whose owning process exited.
    pub(crate) fn reap(&mut self, probe: &dyn ProcessProbe) -> bool {
        let removed = self.registry.reap(probe);
        for id in &removed {
            self.notices
                .push(format!("Wizard window {id} closed: its process exited"));
        }
        !removed.is_empty()
    }

    /// Answer the prompt in window `id`.
    pub(crate) fn answer(&mut self, id: &str, answer: &UserAnswer) -> bool {
        let answered = self.registry.answer(id, answer);
        debug!(window = id, answered, "wizard answer");
        answered
    }

    /// User-initiated close.
    pub(crate) fn cancel_window(&mut self, id: &str) -> bool {
        let closed = self.registry.cancel(id);
        if !closed && self.registry.contains(id) {
            self.notices
                .push(format!("Wizard window {id} cannot be closed"));
        }
        closed
    }

    pub(crate) fn dismiss_popup(&mut self) -> bool {
        self.registry.dismiss_popup()
    }

    /// Release every waiting caller.
    pub(crate) fn shutdown(&mut self) {
        self.registry.clear();
    }
}

/// Interpret typed text as an answer to `kind`. Menus accept a 1-based
/// number or the item text; questions accept yes/no words.
pub(crate) fn parse_answer(kind: &PromptKind, input: &str) -> Option<UserAnswer> {
    let input = input.trim();
    match kind {
        PromptKind::Acknowledge => Some(UserAnswer::Acknowledge),
        PromptKind::Question => match input.to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" | "1" => Some(UserAnswer::Yes),
            "n" | "no" | "false" | "0" => Some(UserAnswer::No),
            _ => None,
        },
        PromptKind::Menu(items) | PromptKind::MenuNum(items) => {
            let by_number = input
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .filter(|i| *i < items.len());
            by_number
                .or_else(|| items.iter().position(|item| item == input))
                .map(UserAnswer::Choose)
        }
        PromptKind::Text => Some(UserAnswer::Text(input.to_owned())),
        PromptKind::Login => {
            let (login, password) = input.split_once(char::is_whitespace)?;
            Some(UserAnswer::Login {
                login: login.to_owned(),
                password: password.trim().to_owned(),
            })
        }
        PromptKind::Download => None,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use cellar_wizard::{WizardCommand, bridge};
    use std::collections::HashSet;

    struct DeadPids(HashSet<u32>);

    impl ProcessProbe for DeadPids {
        fn is_alive(&self, pid: u32) -> bool {
            !self.0.contains(&pid)
        }
    }

    fn init(win: &str) -> WizardCommand {
        WizardCommand::Init {
            win: win.into(),
            top_image: "None".into(),
            left_image: "None".into(),
            protect: "noprotect".into(),
        }
    }

    #[tokio::test]
    async fn pump_applies_one_delivery_per_call() {
        let (bridge, mut inbox) = bridge();
        let mut host = Host::new(CancellationToken::new());
        assert_eq!(host.tick_period(), IDLE_TICK);

        let caller = tokio::spawn(async move { bridge.submit(init("7")).await });
        while !host.pump(&mut inbox) {
            tokio::task::yield_now().await;
        }
        assert!(host.registry().contains("7"));
        assert_eq!(host.tick_period(), BUSY_TICK);
        assert_eq!(caller.await.unwrap().into_response(), "");
        assert!(!host.pump(&mut inbox));
    }

    #[tokio::test]
    async fn die_and_restart_set_exit() {
        let (bridge, mut inbox) = bridge();
        let mut host = Host::new(CancellationToken::new());
        let caller = tokio::spawn(async move { bridge.submit(WizardCommand::Restart).await });
        while !host.pump(&mut inbox) {
            tokio::task::yield_now().await;
        }
        caller.await.unwrap();
        assert_eq!(host.exit(), Some(Exit::Restart));
    }

    #[tokio::test]
    async fn reaping_reports_closed_windows() {
        let (bridge, mut inbox) = bridge();
        let mut host = Host::new(CancellationToken::new());
        for win in ["100", "200"] {
            let bridge = bridge.clone();
            let caller = tokio::spawn(async move { bridge.submit(init(win)).await });
            while !host.pump(&mut inbox) {
                tokio::task::yield_now().await;
            }
            caller.await.unwrap();
        }

        assert!(host.reap(&DeadPids(HashSet::from([200]))));
        assert!(host.registry().contains("100"));
        assert!(!host.registry().contains("200"));
        let notices = host.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("200"));
        assert!(!host.reap(&DeadPids(HashSet::new())));
    }

    #[tokio::test]
    async fn failed_download_releases_caller_with_notice() {
        let (bridge, mut inbox) = bridge();
        let mut host = Host::new(CancellationToken::new());
        let submit = |command| {
            let bridge = bridge.clone();
            tokio::spawn(async move { bridge.submit(command).await })
        };

        let caller = submit(init("9"));
        while !host.pump(&mut inbox) {
            tokio::task::yield_now().await;
        }
        caller.await.unwrap();

        // Nothing listens on port 9 of the loopback, so the fetch fails.
        let dir = tempfile::tempdir().unwrap();
        let caller = submit(WizardCommand::Download {
            win: "9".into(),
            message: "Fetching".into(),
            title: "Setup".into(),
            url: "http://127.0.0.1:9/setup.exe".into(),
            path: dir.path().join("setup.exe").display().to_string(),
        });
        while !host.pump(&mut inbox) {
            tokio::task::yield_now().await;
        }
        while !host.drain_downloads() || host.registry().get("9").unwrap().prompt().is_some() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(caller.await.unwrap().into_response(), "");
        assert!(host.take_notices()[0].starts_with("Download failed"));
    }

    #[test]
    fn typed_answers_follow_prompt_kind() {
        let menu = PromptKind::Menu(vec!["Wine 8".into(), "Wine 9".into()]);
        assert_eq!(parse_answer(&menu, "2"), Some(UserAnswer::Choose(1)));
        assert_eq!(parse_answer(&menu, "Wine 8"), Some(UserAnswer::Choose(0)));
        assert_eq!(parse_answer(&menu, "3"), None);
        assert_eq!(parse_answer(&PromptKind::Question, "Yes"), Some(UserAnswer::Yes));
        assert_eq!(parse_answer(&PromptKind::Question, "maybe"), None);
        assert_eq!(
            parse_answer(&PromptKind::Login, "bob  hunter2"),
            Some(UserAnswer::Login {
                login: "bob".into(),
                password: "hunter2".into()
            })
        );
        assert_eq!(parse_answer(&PromptKind::Login, "bob"), None);
        assert_eq!(
            parse_answer(&PromptKind::Text, " C:\\Games "),
            Some(UserAnswer::Text("C:\\Games".into()))
        );
        assert_eq!(parse_answer(&PromptKind::Download, "x"), None);
    }
}
