//! Wizard windows presented by the UI loop.
//!
//! Each window holds its current view and at most one waiting caller.
//! Removing a window drops that caller's responder, which resolves it to
//! window-gone.

use crate::bridge::Responder;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use tracing::{debug, info};

/// What the window currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowView {
    Blank,
    Message {
        title: String,
        text: String,
    },
    Question {
        title: String,
        text: String,
    },
    Menu {
        title: String,
        text: String,
        items: Vec<String>,
    },
    Textbox {
        title: String,
        text: String,
        default: String,
        max_length: Option<usize>,
        multiline: bool,
    },
    Browse {
        title: String,
        text: String,
        default: String,
        directory: String,
        filter: String,
    },
    Licence {
        title: String,
        text: String,
        file: String,
    },
    File {
        title: String,
        text: String,
        file: String,
    },
    Login {
        title: String,
        text: String,
        register_url: String,
    },
    /// Busy indicator; `percent` is `None` for an indeterminate wait.
    Progress {
        title: String,
        text: String,
        percent: Option<u8>,
    },
    Download {
        title: String,
        text: String,
        url: String,
        received: u64,
        total: Option<u64>,
    },
}

impl WindowView {
    pub fn title(&self) -> &str {
        match self {
            Self::Blank => "",
            Self::Message { title, .. }
            | Self::Question { title, .. }
            | Self::Menu { title, .. }
            | Self::Textbox { title, .. }
            | Self::Browse { title, .. }
            | Self::Licence { title, .. }
            | Self::File { title, .. }
            | Self::Login { title, .. }
            | Self::Progress { title, .. }
            | Self::Download { title, .. } => title,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Blank => "",
            Self::Message { text, .. }
            | Self::Question { text, .. }
            | Self::Menu { text, .. }
            | Self::Textbox { text, .. }
            | Self::Browse { text, .. }
            | Self::Licence { text, .. }
            | Self::File { text, .. }
            | Self::Login { text, .. }
            | Self::Progress { text, .. }
            | Self::Download { text, .. } => text,
        }
    }

    fn set_text(&mut self, value: String) {
        match self {
            Self::Blank => {
                *self = Self::Progress {
                    title: String::new(),
                    text: value,
                    percent: None,
                };
            }
            Self::Message { text, .. }
            | Self::Question { text, .. }
            | Self::Menu { text, .. }
            | Self::Textbox { text, .. }
            | Self::Browse { text, .. }
            | Self::Licence { text, .. }
            | Self::File { text, .. }
            | Self::Login { text, .. }
            | Self::Progress { text, .. }
            | Self::Download { text, .. } => *text = value,
        }
    }
}

/// How a waiting caller's answer is formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    /// Answered with the empty string once dismissed.
    Acknowledge,
    /// `TRUE` / `FALSE`.
    Question,
    /// The chosen item text.
    Menu(Vec<String>),
    /// The chosen item index.
    MenuNum(Vec<String>),
    /// Free text, e.g. a textbox or a browsed path.
    Text,
    /// `login~password`.
    Login,
    /// Completed by the host when the transfer finishes.
    Download,
}

/// What the user did in a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAnswer {
    Acknowledge,
    Yes,
    No,
    Choose(usize),
    Text(String),
    Login { login: String, password: String },
}

impl PromptKind {
    /// Format a user answer for this prompt, or `None` if it does not fit.
    pub fn format(&self, answer: &UserAnswer) -> Option<String> {
        match (self, answer) {
            (Self::Acknowledge, _) => Some(String::new()),
            (Self::Question, UserAnswer::Yes) => Some("TRUE".to_owned()),
            (Self::Question, UserAnswer::No) => Some("FALSE".to_owned()),
            (Self::Menu(items), UserAnswer::Choose(index)) => items.get(*index).cloned(),
            (Self::MenuNum(items), UserAnswer::Choose(index)) => {
                (*index < items.len()).then(|| index.to_string())
            }
            (Self::Text, UserAnswer::Text(text)) => Some(text.clone()),
            (Self::Login, UserAnswer::Login { login, password }) => {
                Some(format!("{login}~{password}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Pending {
    kind: PromptKind,
    responder: Responder,
}

#[derive(Debug)]
pub struct WizardWindow {
    pub id: String,
    pub top_image: Option<PathBuf>,
    pub left_image: Option<PathBuf>,
    /// Protected windows cannot be cancelled by the user.
    pub protect: bool,
    pub view: WindowView,
    pending: Option<Pending>,
}

impl WizardWindow {
    fn new(id: &str, top_image: &str, left_image: &str, protect: &str) -> Self {
        Self {
            id: id.to_owned(),
            top_image: image_path(top_image),
            left_image: image_path(left_image),
            protect: protect.eq_ignore_ascii_case("protect"),
            view: WindowView::Blank,
            pending: None,
        }
    }

    pub fn prompt(&self) -> Option<&PromptKind> {
        self.pending.as_ref().map(|p| &p.kind)
    }

    /// Owning process id, when the window id is one.
    pub fn pid(&self) -> Option<u32> {
        self.id.parse().ok()
    }
}

fn image_path(raw: &str) -> Option<PathBuf> {
    (!raw.is_empty() && raw != "None").then(|| PathBuf::from(raw))
}

/// A `SimpleMessage` popup waiting for dismissal.
#[derive(Debug)]
pub struct Popup {
    pub message: String,
    responder: Responder,
}

/// Checks whether a process is still running.
pub trait ProcessProbe {
    fn is_alive(&self, pid: u32) -> bool;
}

/// `/proc/<pid>` lookup; on platforms without procfs every pid is alive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcProbe;

impl ProcessProbe for ProcProbe {
    fn is_alive(&self, pid: u32) -> bool {
        if cfg!(target_os = "linux") {
            std::path::Path::new("/proc").join(pid.to_string()).exists()
        } else {
            true
        }
    }
}

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: BTreeMap<String, WizardWindow>,
    popups: VecDeque<Popup>,
    registered_pids: BTreeSet<u32>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// No windows and no popups: the UI can tick slowly.
    pub fn is_idle(&self) -> bool {
        self.windows.is_empty() && self.popups.is_empty()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.windows.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&WizardWindow> {
        self.windows.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(String::as_str)
    }

    pub fn windows(&self) -> impl Iterator<Item = &WizardWindow> {
        self.windows.values()
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popups.front()
    }

    pub fn registered_pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.registered_pids.iter().copied()
    }

    /// Create a window, replacing any existing one with the same id.
    pub fn init(&mut self, id: &str, top_image: &str, left_image: &str, protect: &str) {
        let window = WizardWindow::new(id, top_image, left_image, protect);
        if self.windows.insert(id.to_owned(), window).is_some() {
            debug!(window = id, "wizard window replaced");
        }
    }

    pub fn close(&mut self, id: &str) -> bool {
        self.windows.remove(id).is_some()
    }

    /// User-initiated close. Refused for protected windows.
    pub fn cancel(&mut self, id: &str) -> bool {
        if self.windows.get(id).is_some_and(|w| w.protect) {
            return false;
        }
        self.close(id)
    }

    /// Set a window's view. Returns false if the window does not exist.
    pub fn show(&mut self, id: &str, view: WindowView) -> bool {
        match self.windows.get_mut(id) {
            Some(window) => {
                window.view = view;
                true
            }
            None => false,
        }
    }

    /// Show a prompt and park the caller until the user acts. A caller
    /// already waiting on this window is released as window-gone. If the
    /// window does not exist the responder is handed back.
    pub fn ask(
        &mut self,
        id: &str,
        view: WindowView,
        kind: PromptKind,
        responder: Responder,
    ) -> Result<(), Responder> {
        let Some(window) = self.windows.get_mut(id) else {
            return Err(responder);
        };
        window.view = view;
        window.pending = Some(Pending { kind, responder });
        Ok(())
    }

    pub fn set_text(&mut self, id: &str, text: String) -> bool {
        match self.windows.get_mut(id) {
            Some(window) => {
                window.view.set_text(text);
                true
            }
            None => false,
        }
    }

    pub fn set_percent(&mut self, id: &str, value: u8) -> bool {
        let Some(window) = self.windows.get_mut(id) else {
            return false;
        };
        let value = value.min(100);
        match &mut window.view {
            WindowView::Progress { percent, .. } => *percent = Some(value),
            view => {
                *view = WindowView::Progress {
                    title: view.title().to_owned(),
                    text: view.text().to_owned(),
                    percent: Some(value),
                };
            }
        }
        true
    }

    /// Deliver the user's answer to the waiting caller. Returns false if
    /// nothing was waiting or the answer does not fit the prompt.
    pub fn answer(&mut self, id: &str, answer: &UserAnswer) -> bool {
        let Some(window) = self.windows.get_mut(id) else {
            return false;
        };
        let Some(value) = window.pending.as_ref().and_then(|p| p.kind.format(answer)) else {
            return false;
        };
        if let Some(pending) = window.pending.take() {
            pending.responder.answer(value);
        }
        true
    }

    pub fn update_download(&mut self, id: &str, got: u64, size: Option<u64>) {
        if let Some(WindowView::Download {
            received, total, ..
        }) = self.windows.get_mut(id).map(|w| &mut w.view)
        {
            *received = got;
            *total = size;
        }
    }

    /// Answer the caller waiting on a download in `id`.
    pub fn finish_download(&mut self, id: &str) -> bool {
        self.take_pending(id, &PromptKind::Download)
            .map(|responder| responder.answer(""))
            .is_some()
    }

    /// Release the caller waiting on a download as window-gone and show
    /// the failure in the window.
    pub fn fail_download(&mut self, id: &str, error: &str) -> bool {
        let released = self.take_pending(id, &PromptKind::Download).is_some();
        if released {
            self.set_text(id, format!("Download failed: {error}"));
        }
        released
    }

    fn take_pending(&mut self, id: &str, kind: &PromptKind) -> Option<Responder> {
        let window = self.windows.get_mut(id)?;
        if window.pending.as_ref().is_some_and(|p| &p.kind == kind) {
            window.pending.take().map(|p| p.responder)
        } else {
            None
        }
    }

    pub fn push_popup(&mut self, message: String, responder: Responder) {
        self.popups.push_back(Popup { message, responder });
    }

    /// Dismiss the front popup, answering its caller.
    pub fn dismiss_popup(&mut self) -> bool {
        match self.popups.pop_front() {
            Some(popup) => {
                popup.responder.answer("");
                true
            }
            None => false,
        }
    }

    pub fn register_pid(&mut self, pid: u32) {
        self.registered_pids.insert(pid);
    }

    /// Drop windows owned by dead processes and forget dead registered
    /// pids. Returns the ids of removed windows.
    pub fn reap(&mut self, probe: &dyn ProcessProbe) -> Vec<String> {
        let dead: Vec<String> = self
            .windows
            .values()
            .filter(|w| w.pid().is_some_and(|pid| !probe.is_alive(pid)))
            .map(|w| w.id.clone())
            .collect();
        for id in &dead {
            self.windows.remove(id);
            info!(window = %id, "wizard window owner exited");
        }
        self.registered_pids.retain(|pid| probe.is_alive(*pid));
        dead
    }

    /// Drop everything, releasing every waiting caller.
    pub fn clear(&mut self) {
        self.windows.clear();
        self.popups.clear();
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bridge::{Reply, bridge};
    use crate::protocol::WizardCommand;
    use std::collections::HashSet;
    use tokio::task::JoinHandle;

    #[derive(Debug, Default)]
    pub(crate) struct FakeProbe {
        pub(crate) alive: HashSet<u32>,
    }

    impl ProcessProbe for FakeProbe {
        fn is_alive(&self, pid: u32) -> bool {
            self.alive.contains(&pid)
        }
    }

    /// A responder wired to a real waiting caller.
    pub(crate) async fn waiting_caller() -> (Responder, JoinHandle<Reply>) {
        let (bridge, mut inbox) = bridge();
        let caller = tokio::spawn(async move { bridge.submit(WizardCommand::Die).await });
        let (_, responder, _) = inbox.next().await.unwrap().into_parts();
        (responder, caller)
    }

    fn question() -> WindowView {
        WindowView::Question {
            title: "t".into(),
            text: "Continue?".into(),
        }
    }

    #[tokio::test]
    async fn question_answers_true_false() {
        let mut registry = WindowRegistry::new();
        registry.init("w", "None", "None", "noprotect");
        let (responder, caller) = waiting_caller().await;
        registry
            .ask("w", question(), PromptKind::Question, responder)
            .unwrap();

        assert!(!registry.answer("w", &UserAnswer::Choose(0)));
        assert!(registry.answer("w", &UserAnswer::No));
        assert_eq!(caller.await.unwrap(), Reply::Answered("FALSE".into()));
        assert!(registry.get("w").unwrap().prompt().is_none());
    }

    #[tokio::test]
    async fn close_releases_waiting_caller() {
        let mut registry = WindowRegistry::new();
        registry.init("w", "None", "None", "noprotect");
        let (responder, caller) = waiting_caller().await;
        registry
            .ask("w", question(), PromptKind::Question, responder)
            .unwrap();

        assert!(registry.close("w"));
        assert_eq!(caller.await.unwrap(), Reply::WindowGone);
    }

    #[tokio::test]
    async fn reinit_releases_old_caller() {
        let mut registry = WindowRegistry::new();
        registry.init("w", "None", "None", "noprotect");
        let (responder, caller) = waiting_caller().await;
        registry
            .ask("w", question(), PromptKind::Question, responder)
            .unwrap();

        registry.init("w", "top.png", "None", "noprotect");
        assert_eq!(caller.await.unwrap(), Reply::WindowGone);
        assert_eq!(registry.window_count(), 1);
        assert_eq!(
            registry.get("w").unwrap().top_image,
            Some(PathBuf::from("top.png"))
        );
    }

    #[tokio::test]
    async fn ask_on_missing_window_hands_responder_back() {
        let mut registry = WindowRegistry::new();
        let (responder, caller) = waiting_caller().await;
        let responder = registry
            .ask("nope", question(), PromptKind::Question, responder)
            .unwrap_err();
        drop(responder);
        assert_eq!(caller.await.unwrap(), Reply::WindowGone);
    }

    #[test]
    fn protected_windows_resist_cancel() {
        let mut registry = WindowRegistry::new();
        registry.init("a", "None", "None", "protect");
        registry.init("b", "None", "None", "noprotect");
        assert!(!registry.cancel("a"));
        assert!(registry.cancel("b"));
        assert!(registry.contains("a"));
        assert!(!registry.contains("b"));
    }

    #[test]
    fn menu_formats() {
        let items = vec!["red".to_owned(), "green".to_owned()];
        assert_eq!(
            PromptKind::Menu(items.clone()).format(&UserAnswer::Choose(1)),
            Some("green".into())
        );
        assert_eq!(
            PromptKind::MenuNum(items.clone()).format(&UserAnswer::Choose(1)),
            Some("1".into())
        );
        assert_eq!(PromptKind::MenuNum(items).format(&UserAnswer::Choose(2)), None);
        assert_eq!(
            PromptKind::Login.format(&UserAnswer::Login {
                login: "joe".into(),
                password: "pw".into()
            }),
            Some("joe~pw".into())
        );
        assert_eq!(
            PromptKind::Acknowledge.format(&UserAnswer::Acknowledge),
            Some(String::new())
        );
    }

    #[test]
    fn reap_drops_dead_pid_windows_only() {
        let mut registry = WindowRegistry::new();
        registry.init("100", "None", "None", "noprotect");
        registry.init("200", "None", "None", "noprotect");
        registry.init("named", "None", "None", "noprotect");
        registry.register_pid(100);
        registry.register_pid(300);

        let probe = FakeProbe {
            alive: HashSet::from([200]),
        };
        let removed = registry.reap(&probe);

        assert_eq!(removed, vec!["100".to_owned()]);
        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(ids, vec!["200", "named"]);
        assert_eq!(registry.registered_pids().count(), 0);
    }

    #[test]
    fn pulse_turns_view_into_progress() {
        let mut registry = WindowRegistry::new();
        registry.init("w", "None", "None", "noprotect");
        registry.show(
            "w",
            WindowView::Message {
                title: "T".into(),
                text: "x".into(),
            },
        );
        assert!(registry.set_percent("w", 140));
        assert_eq!(
            registry.get("w").unwrap().view,
            WindowView::Progress {
                title: "T".into(),
                text: "x".into(),
                percent: Some(100),
            }
        );
        assert!(registry.set_text("w", "almost".into()));
        assert_eq!(registry.get("w").unwrap().view.text(), "almost");
        assert!(!registry.set_percent("missing", 1));
    }
}
