pub mod bridge;
pub mod client;
pub mod cookie;
pub mod dispatch;
pub mod protocol;
pub mod registry;
pub mod server;

pub use bridge::{Delivery, Reply, Responder, WizardBridge, WizardInbox, bridge};
pub use client::{call, encode_request};
pub use cookie::{COOKIE_LEN, generate_cookie};
pub use dispatch::{HostEffect, dispatch};
pub use protocol::{ParseError, Request, WizardCommand, parse_request};
pub use registry::{
    Popup, ProcProbe, ProcessProbe, PromptKind, UserAnswer, WindowRegistry, WindowView,
    WizardWindow,
};
pub use server::{DEFAULT_PORT_SPAN, DEFAULT_PORT_START, WizardServer};
