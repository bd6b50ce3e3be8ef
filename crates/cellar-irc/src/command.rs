//! Slash commands typed into the chat input.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Plain text for the current window.
    Say(String),
    Join(String),
    /// `None` leaves the current window.
    Part {
        channel: Option<String>,
        reason: Option<String>,
    },
    Query(String),
    Kick {
        nick: String,
        reason: Option<String>,
    },
    Nick(String),
    Me(String),
    Msg {
        target: String,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("nothing to send")]
    Empty,
    #[error("unknown command /{0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl UserCommand {
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let input = input.trim_end_matches(['\r', '\n']);
        if input.trim().is_empty() {
            return Err(CommandError::Empty);
        }
        let Some(body) = input.strip_prefix('/') else {
            return Ok(Self::Say(input.to_owned()));
        };

        let (name, rest) = body.split_once(' ').unwrap_or((body, ""));
        let rest = rest.trim();
        let (first, tail) = match rest.split_once(' ') {
            Some((first, tail)) => (first, Some(tail.trim()).filter(|t| !t.is_empty())),
            None => (rest, None),
        };
        let first = Some(first).filter(|f| !f.is_empty());

        match name.to_ascii_lowercase().as_str() {
            "join" => {
                let channel = first.ok_or(CommandError::Usage("/join #channel"))?;
                let channel = if channel.starts_with('#') {
                    channel.to_owned()
                } else {
                    format!("#{channel}")
                };
                Ok(Self::Join(channel))
            }
            "part" => Ok(Self::Part {
                channel: first.map(str::to_owned),
                reason: tail.map(str::to_owned),
            }),
            "query" => {
                let nick = first.ok_or(CommandError::Usage("/query nick"))?;
                Ok(Self::Query(nick.to_owned()))
            }
            "kick" => {
                let nick = first.ok_or(CommandError::Usage("/kick nick [reason]"))?;
                Ok(Self::Kick {
                    nick: nick.to_owned(),
                    reason: tail.map(str::to_owned),
                })
            }
            "nick" => {
                let nick = first.ok_or(CommandError::Usage("/nick newnick"))?;
                Ok(Self::Nick(nick.to_owned()))
            }
            "me" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("/me action"));
                }
                Ok(Self::Me(rest.to_owned()))
            }
            "msg" | "privmsg" => match (first, tail) {
                (Some(target), Some(text)) => Ok(Self::Msg {
                    target: target.to_owned(),
                    text: text.to_owned(),
                }),
                _ => Err(CommandError::Usage("/msg nick text")),
            },
            other => Err(CommandError::Unknown(other.to_owned())),
        }
    }
}
