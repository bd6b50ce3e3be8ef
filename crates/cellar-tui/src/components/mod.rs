pub mod editor;
pub mod footer;
pub mod log_view;
pub mod members;
pub mod tabs;
pub mod wizard;

pub use editor::Editor;
pub use footer::Footer;
pub use log_view::LogView;
pub use members::MemberList;
pub use tabs::{ChannelTabs, Tab};
pub use wizard::{Popup, WizardPanel, WizardPanelModel};
