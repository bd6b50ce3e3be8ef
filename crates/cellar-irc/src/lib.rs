pub mod access;
pub mod command;
pub mod dispatch;
pub mod engine;
pub mod message;
pub mod state;

pub use access::{AccessCache, AccessGate};
pub use command::{CommandError, UserCommand};
pub use dispatch::{Effect, dispatch, palette_slot};
pub use engine::{IrcEngine, IrcSettings};
pub use message::{IrcMessage, Prefix};
pub use state::{Channel, ChannelKind, IrcState, Member, MemberRole, channel_key, is_channel_name};
