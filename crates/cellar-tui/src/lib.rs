pub mod components;
pub mod engine;
pub mod input;
pub mod reconcile;
pub mod theme;
pub mod utils;

pub use components::{
    ChannelTabs, Editor, Footer, LogView, MemberList, Popup, Tab, WizardPanel, WizardPanelModel,
};
pub use engine::{Component, Screen, StyledLine, compose_columns};
pub use input::{Focus, InputAction, handle_key_event, poll_event};
pub use reconcile::Reconciled;
