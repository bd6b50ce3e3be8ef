//! Setup Wizard wire format.
//!
//! One request per connection: `cookie \t verb \t arg... \n`. The response is
//! the bare result string followed by connection close.

use thiserror::Error;

pub const FIELD_SEPARATOR: char = '\t';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("request has no cookie")]
    MissingCookie,
    #[error("request has no verb")]
    MissingVerb,
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),
    #[error("{verb} takes {expected} arguments, got {got}")]
    Arity {
        verb: String,
        expected: usize,
        got: usize,
    },
}

/// A parsed wizard command. Field names follow the argument order on the
/// wire; `win` is the caller's window id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardCommand {
    Init {
        win: String,
        top_image: String,
        left_image: String,
        protect: String,
    },
    Message {
        win: String,
        message: String,
        title: String,
    },
    FreePresentation {
        win: String,
        title: String,
        message: String,
    },
    Question {
        win: String,
        message: String,
        title: String,
    },
    Menu {
        win: String,
        message: String,
        title: String,
        items: String,
        separator: String,
    },
    MenuNum {
        win: String,
        message: String,
        title: String,
        items: String,
        separator: String,
    },
    Textbox {
        win: String,
        message: String,
        title: String,
        default: String,
        max_length: String,
    },
    TextboxMultiline {
        win: String,
        message: String,
        title: String,
        default: String,
        max_length: String,
    },
    Browse {
        win: String,
        message: String,
        title: String,
        default: String,
        directory: String,
        filter: String,
    },
    Download {
        win: String,
        message: String,
        title: String,
        url: String,
        path: String,
    },
    Wait {
        win: String,
        message: String,
        title: String,
    },
    WaitBis {
        win: String,
        message: String,
        title: String,
    },
    Pulsebar {
        win: String,
        message: String,
        title: String,
    },
    Pulse {
        win: String,
        percent: String,
    },
    SetText {
        win: String,
        text: String,
    },
    Licence {
        win: String,
        message: String,
        title: String,
        file: String,
    },
    File {
        win: String,
        message: String,
        title: String,
        file: String,
    },
    Login {
        win: String,
        message: String,
        title: String,
        register_url: String,
    },
    Close {
        win: String,
    },
    SimpleMessage {
        message: String,
    },
    Die,
    Restart,
    RegisterPid {
        pid: String,
    },
}

/// Argument count after the verb, or `None` for an unknown verb.
pub fn arity(verb: &str) -> Option<usize> {
    let count = match verb {
        "POL_Die" | "POL_Restart" => 0,
        "POL_SetupWindow_Close" | "SimpleMessage" | "POL_System_RegisterPID" => 1,
        "POL_SetupWindow_pulse" | "POL_SetupWindow_set_text" => 2,
        "POL_SetupWindow_message"
        | "POL_SetupWindow_free_presentation"
        | "POL_SetupWindow_question"
        | "POL_SetupWindow_wait"
        | "POL_SetupWindow_wait_bis"
        | "POL_SetupWindow_pulsebar" => 3,
        "POL_SetupWindow_Init"
        | "POL_SetupWindow_licence"
        | "POL_SetupWindow_file"
        | "POL_SetupWindow_login" => 4,
        "POL_SetupWindow_menu"
        | "POL_SetupWindow_menu_num"
        | "POL_SetupWindow_textbox"
        | "POL_SetupWindow_textbox_multiline"
        | "POL_SetupWindow_download" => 5,
        "POL_SetupWindow_browse" => 6,
        _ => return None,
    };
    Some(count)
}

impl WizardCommand {
    /// Build a command from its verb and exactly-sized argument list.
    pub fn from_parts(verb: &str, args: Vec<String>) -> Result<Self, ParseError> {
        let expected = arity(verb).ok_or_else(|| ParseError::UnknownVerb(verb.to_owned()))?;
        if args.len() != expected {
            return Err(ParseError::Arity {
                verb: verb.to_owned(),
                expected,
                got: args.len(),
            });
        }

        let mut args = args.into_iter();
        let mut next = move || args.next().unwrap_or_default();

        let command = match verb {
            "POL_SetupWindow_Init" => Self::Init {
                win: next(),
                top_image: next(),
                left_image: next(),
                protect: next(),
            },
            "POL_SetupWindow_message" => Self::Message {
                win: next(),
                message: next(),
                title: next(),
            },
            "POL_SetupWindow_free_presentation" => Self::FreePresentation {
                win: next(),
                title: next(),
                message: next(),
            },
            "POL_SetupWindow_question" => Self::Question {
                win: next(),
                message: next(),
                title: next(),
            },
            "POL_SetupWindow_menu" => Self::Menu {
                win: next(),
                message: next(),
                title: next(),
                items: next(),
                separator: next(),
            },
            "POL_SetupWindow_menu_num" => Self::MenuNum {
                win: next(),
                message: next(),
                title: next(),
                items: next(),
                separator: next(),
            },
            "POL_SetupWindow_textbox" => Self::Textbox {
                win: next(),
                message: next(),
                title: next(),
                default: next(),
                max_length: next(),
            },
            "POL_SetupWindow_textbox_multiline" => Self::TextboxMultiline {
                win: next(),
                message: next(),
                title: next(),
                default: next(),
                max_length: next(),
            },
            "POL_SetupWindow_browse" => Self::Browse {
                win: next(),
                message: next(),
                title: next(),
                default: next(),
                directory: next(),
                filter: next(),
            },
            "POL_SetupWindow_download" => Self::Download {
                win: next(),
                message: next(),
                title: next(),
                url: next(),
                path: next(),
            },
            "POL_SetupWindow_wait" => Self::Wait {
                win: next(),
                message: next(),
                title: next(),
            },
            "POL_SetupWindow_wait_bis" => Self::WaitBis {
                win: next(),
                message: next(),
                title: next(),
            },
            "POL_SetupWindow_pulsebar" => Self::Pulsebar {
                win: next(),
                message: next(),
                title: next(),
            },
            "POL_SetupWindow_pulse" => Self::Pulse {
                win: next(),
                percent: next(),
            },
            "POL_SetupWindow_set_text" => Self::SetText {
                win: next(),
                text: next(),
            },
            "POL_SetupWindow_licence" => Self::Licence {
                win: next(),
                message: next(),
                title: next(),
                file: next(),
            },
            "POL_SetupWindow_file" => Self::File {
                win: next(),
                message: next(),
                title: next(),
                file: next(),
            },
            "POL_SetupWindow_login" => Self::Login {
                win: next(),
                message: next(),
                title: next(),
                register_url: next(),
            },
            "POL_SetupWindow_Close" => Self::Close { win: next() },
            "SimpleMessage" => Self::SimpleMessage { message: next() },
            "POL_Die" => Self::Die,
            "POL_Restart" => Self::Restart,
            "POL_System_RegisterPID" => Self::RegisterPid { pid: next() },
            other => return Err(ParseError::UnknownVerb(other.to_owned())),
        };
        Ok(command)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Init { .. } => "POL_SetupWindow_Init",
            Self::Message { .. } => "POL_SetupWindow_message",
            Self::FreePresentation { .. } => "POL_SetupWindow_free_presentation",
            Self::Question { .. } => "POL_SetupWindow_question",
            Self::Menu { .. } => "POL_SetupWindow_menu",
            Self::MenuNum { .. } => "POL_SetupWindow_menu_num",
            Self::Textbox { .. } => "POL_SetupWindow_textbox",
            Self::TextboxMultiline { .. } => "POL_SetupWindow_textbox_multiline",
            Self::Browse { .. } => "POL_SetupWindow_browse",
            Self::Download { .. } => "POL_SetupWindow_download",
            Self::Wait { .. } => "POL_SetupWindow_wait",
            Self::WaitBis { .. } => "POL_SetupWindow_wait_bis",
            Self::Pulsebar { .. } => "POL_SetupWindow_pulsebar",
            Self::Pulse { .. } => "POL_SetupWindow_pulse",
            Self::SetText { .. } => "POL_SetupWindow_set_text",
            Self::Licence { .. } => "POL_SetupWindow_licence",
            Self::File { .. } => "POL_SetupWindow_file",
            Self::Login { .. } => "POL_SetupWindow_login",
            Self::Close { .. } => "POL_SetupWindow_Close",
            Self::SimpleMessage { .. } => "SimpleMessage",
            Self::Die => "POL_Die",
            Self::Restart => "POL_Restart",
            Self::RegisterPid { .. } => "POL_System_RegisterPID",
        }
    }

    /// The window this command addresses, if any.
    pub fn window(&self) -> Option<&str> {
        match self {
            Self::Init { win, .. }
            | Self::Message { win, .. }
            | Self::FreePresentation { win, .. }
            | Self::Question { win, .. }
            | Self::Menu { win, .. }
            | Self::MenuNum { win, .. }
            | Self::Textbox { win, .. }
            | Self::TextboxMultiline { win, .. }
            | Self::Browse { win, .. }
            | Self::Download { win, .. }
            | Self::Wait { win, .. }
            | Self::WaitBis { win, .. }
            | Self::Pulsebar { win, .. }
            | Self::Pulse { win, .. }
            | Self::SetText { win, .. }
            | Self::Licence { win, .. }
            | Self::File { win, .. }
            | Self::Login { win, .. }
            | Self::Close { win } => Some(win),
            Self::SimpleMessage { .. } | Self::Die | Self::Restart | Self::RegisterPid { .. } => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub cookie: String,
    pub command: WizardCommand,
}

/// Parse one request line. A trailing `\n` (and `\r`) is stripped.
pub fn parse_request(line: &str) -> Result<Request, ParseError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut fields = line.split(FIELD_SEPARATOR);
    let cookie = fields
        .next()
        .filter(|c| !c.is_empty())
        .ok_or(ParseError::MissingCookie)?;
    let verb = fields
        .next()
        .filter(|v| !v.is_empty())
        .ok_or(ParseError::MissingVerb)?;
    let args = fields.map(str::to_owned).collect();

    Ok(Request {
        cookie: cookie.to_owned(),
        command: WizardCommand::from_parts(verb, args)?,
    })
}
