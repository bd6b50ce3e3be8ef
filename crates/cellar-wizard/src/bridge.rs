//! Hands wizard commands from connection tasks to the UI loop.
//!
//! The mailbox holds at most one command process-wide. A submitter acquires
//! the single slot permit, deposits a `Delivery`, and waits on its reply.
//! The slot frees when the UI loop drops the delivery after dispatching it;
//! the reply itself may outlive the delivery, stashed in a wizard window.

use crate::protocol::WizardCommand;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answered(String),
    /// The window went away (closed, cancelled, owner died, never existed)
    /// before an answer was given.
    WindowGone,
}

impl Reply {
    /// The string written back to the caller; window-gone is the empty
    /// (falsy) answer.
    pub fn into_response(self) -> String {
        match self {
            Self::Answered(answer) => answer,
            Self::WindowGone => String::new(),
        }
    }
}

/// One-shot answer channel for a single caller. Dropping it without
/// answering resolves the caller to `Reply::WindowGone`.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<String>,
}

impl Responder {
    pub fn answer(self, value: impl Into<String>) {
        if self.tx.send(value.into()).is_err() {
            debug!("wizard caller went away before its answer");
        }
    }

    /// Whether the caller is still waiting.
    pub fn is_waiting(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A command in the mailbox slot.
#[derive(Debug)]
pub struct Delivery {
    pub command: WizardCommand,
    pub responder: Responder,
    permit: OwnedSemaphorePermit,
}

impl Delivery {
    /// Take the parts apart. The returned permit keeps the slot occupied
    /// until it is dropped.
    pub fn into_parts(self) -> (WizardCommand, Responder, OwnedSemaphorePermit) {
        (self.command, self.responder, self.permit)
    }
}

/// Submitting side, cloned into every connection task.
#[derive(Debug, Clone)]
pub struct WizardBridge {
    slot: Arc<Semaphore>,
    tx: mpsc::Sender<Delivery>,
}

/// Consuming side, owned by the UI loop.
#[derive(Debug)]
pub struct WizardInbox {
    rx: mpsc::Receiver<Delivery>,
}

pub fn bridge() -> (WizardBridge, WizardInbox) {
    let (tx, rx) = mpsc::channel(1);
    (
        WizardBridge {
            slot: Arc::new(Semaphore::new(1)),
            tx,
        },
        WizardInbox { rx },
    )
}

impl WizardBridge {
    /// Deposit a command once the slot is free and wait for its answer.
    pub async fn submit(&self, command: WizardCommand) -> Reply {
        let Ok(permit) = Arc::clone(&self.slot).acquire_owned().await else {
            return Reply::WindowGone;
        };
        let (tx, rx) = oneshot::channel();
        let delivery = Delivery {
            command,
            responder: Responder { tx },
            permit,
        };
        if self.tx.send(delivery).await.is_err() {
            debug!("wizard inbox closed");
            return Reply::WindowGone;
        }
        match rx.await {
            Ok(answer) => Reply::Answered(answer),
            Err(_) => Reply::WindowGone,
        }
    }

    /// True while a delivery occupies the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

impl WizardInbox {
    /// Non-blocking poll used by the UI tick.
    pub fn try_next(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}
