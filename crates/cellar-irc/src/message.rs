//! IRC wire lines: `[@tags] [:prefix] COMMAND params... [:trailing]`.

/// Message source, `nick!user@host` for users or a bare server name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    pub fn parse(raw: &str) -> Self {
        let (nick_user, host) = match raw.split_once('@') {
            Some((left, host)) => (left, Some(host.to_owned())),
            None => (raw, None),
        };
        let (nick, user) = match nick_user.split_once('!') {
            Some((nick, user)) => (nick, Some(user.to_owned())),
            None => (nick_user, None),
        };
        Self {
            nick: nick.to_owned(),
            user,
            host,
        }
    }

    /// Servers send a bare name with neither user nor host part.
    pub fn is_server(&self) -> bool {
        self.user.is_none() && self.host.is_none() && self.nick.contains('.')
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<Prefix>,
    /// Upper-cased command or three-digit numeric.
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse one line (without its terminator). Returns `None` for lines
    /// with no command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if let Some(tagged) = rest.strip_prefix('@') {
            rest = tagged.split_once(' ').map_or("", |(_, tail)| tail);
        }
        rest = rest.trim_start_matches(' ');

        let prefix = if let Some(sourced) = rest.strip_prefix(':') {
            let (raw, tail) = sourced.split_once(' ').unwrap_or((sourced, ""));
            rest = tail.trim_start_matches(' ');
            Some(Prefix::parse(raw))
        } else {
            None
        };

        let (command, mut tail) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            tail = tail.trim_start_matches(' ');
            if tail.is_empty() {
                break;
            }
            if let Some(trailing) = tail.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            let (param, next) = tail.split_once(' ').unwrap_or((tail, ""));
            params.push(param.to_owned());
            tail = next;
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    pub fn nick(&self) -> Option<&str> {
        self.prefix.as_ref().map(|p| p.nick.as_str())
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, conventionally the free-text trailing one.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_privmsg_with_user_prefix() {
        let msg = IrcMessage::parse(":bob!u@h PRIVMSG #chat :hi there").unwrap();
        let prefix = msg.prefix.as_ref().unwrap();
        assert_eq!(prefix.nick, "bob");
        assert_eq!(prefix.user.as_deref(), Some("u"));
        assert_eq!(prefix.host.as_deref(), Some("h"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chat", "hi there"]);
    }

    #[test]
    fn parses_numeric_with_middle_params() {
        let msg = IrcMessage::parse(":irc.example.net 353 me = #chat :@alice +bob carol").unwrap();
        assert!(msg.is_numeric());
        assert!(msg.prefix.as_ref().unwrap().is_server());
        assert_eq!(msg.params, vec!["me", "=", "#chat", "@alice +bob carol"]);
    }

    #[test]
    fn parses_prefixless_ping() {
        let msg = IrcMessage::parse("PING :irc.example.net").unwrap();
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.trailing(), Some("irc.example.net"));
    }

    #[test]
    fn skips_message_tags_and_extra_spaces() {
        let msg = IrcMessage::parse("@time=2024 :x!a@b  JOIN   #home").unwrap();
        assert_eq!(msg.nick(), Some("x"));
        assert_eq!(msg.command, "JOIN");
        assert_eq!(msg.params, vec!["#home"]);
    }

    #[test]
    fn keeps_empty_trailing() {
        let msg = IrcMessage::parse(":x!a@b PART #chan :").unwrap();
        assert_eq!(msg.params, vec!["#chan", ""]);
    }

    #[test]
    fn uppercases_commands() {
        let msg = IrcMessage::parse("ping :x").unwrap();
        assert_eq!(msg.command, "PING");
    }

    #[test]
    fn rejects_empty_lines() {
        assert!(IrcMessage::parse("").is_none());
        assert!(IrcMessage::parse(":only.prefix").is_none());
    }
}
