//! Applies one inbound IRC message to the session state.
//!
//! `dispatch` is pure with respect to I/O: it mutates `IrcState` and the
//! access cache and returns the lines to send and whether the session must
//! end. The reader task carries out the effects.

use crate::access::AccessCache;
use crate::engine::IrcSettings;
use crate::message::IrcMessage;
use crate::state::{IrcState, channel_key, is_channel_name};
use cellar_core::{LogEntry, NICK_PALETTE_SIZE, Tone};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Raw line for the server, without terminator.
    Send(String),
    /// Session-fatal condition; tear everything down.
    Fatal(String),
}

/// Mode letters whose changes are audited and trigger a NAMES refresh.
const AUDITED_MODES: &[char] = &['o', 'h', 'v', 'b'];

/// Deterministic palette slot for a nick, case-insensitive.
pub fn palette_slot(nick: &str) -> u8 {
    let hash = nick
        .bytes()
        .map(|b| b.to_ascii_lowercase())
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    u8::try_from(hash % u32::from(NICK_PALETTE_SIZE)).unwrap_or(0)
}

pub fn dispatch(
    state: &mut IrcState,
    access: &AccessCache,
    settings: &IrcSettings,
    msg: &IrcMessage,
) -> Vec<Effect> {
    let mut effects = Vec::new();
    let sender = msg.nick().unwrap_or_default().to_owned();

    debug!(command = %msg.command, sender = %sender, "irc dispatch");

    match msg.command.as_str() {
        "PING" => {
            let token = msg.trailing().unwrap_or_default();
            effects.push(Effect::Send(format!("PONG :{token}")));
        }
        "001" => {
            if let Some(nick) = msg.param(0) {
                nick.clone_into(&mut state.nick);
            }
            if let Some(text) = msg.trailing() {
                state.push_status(LogEntry::notice(text, Tone::Notice));
            }
            let home = settings.home_channel.clone();
            state.join(&home);
            effects.push(Effect::Send(format!("JOIN {home}")));
        }
        "332" => {
            if let (Some(chan), Some(topic)) = (msg.param(1), msg.param(2)) {
                set_topic(state, chan, topic, None);
            }
        }
        "TOPIC" => {
            if let (Some(chan), Some(topic)) = (msg.param(0), msg.param(1)) {
                set_topic(state, chan, topic, Some(&sender));
            }
        }
        "353" => {
            // <me> <type> <channel> :<names>
            if let (Some(chan), Some(names)) = (msg.param(2), msg.param(3))
                && let Some(channel) = state.channel_mut(chan)
            {
                channel.add_names(names);
            }
        }
        "366" => {
            if let Some(chan) = msg.param(1)
                && let Some(channel) = state.channel_mut(chan)
            {
                channel.finish_names();
            }
        }
        "JOIN" => on_join(state, &sender, msg, &mut effects),
        "PART" => on_part(state, &sender, msg, &mut effects),
        "401" => {
            if let Some(target) = msg.param(1) {
                let text = format!("{target} is not online");
                if let Some(query) = state.channel_mut(target).filter(|c| c.is_query()) {
                    query.offline = true;
                    query.push(LogEntry::notice(text, Tone::Error));
                } else {
                    state.push_status(LogEntry::notice(text, Tone::Error));
                }
            }
        }
        "482" => {
            let chan = msg.param(1).unwrap_or_default().to_owned();
            state.push_to(
                &chan,
                LogEntry::notice("You are not a channel operator", Tone::Error),
            );
        }
        "NICK" => on_nick(state, &sender, msg),
        "MODE" => on_mode(state, &sender, msg, &mut effects),
        "432" | "433" => {
            let nick = msg.param(1).unwrap_or_default();
            let reason = if msg.command == "433" {
                format!("Nickname {nick} is already in use")
            } else {
                format!("Nickname {nick} is not allowed")
            };
            effects.push(Effect::Fatal(reason));
        }
        "474" => {
            let chan = msg.param(1).unwrap_or_default().to_owned();
            if is_home(settings, &chan) {
                effects.push(Effect::Fatal(format!("Banned from {chan}")));
            } else {
                state.remove(&chan);
                state.push_status(LogEntry::notice(
                    format!("Cannot join {chan}: you are banned"),
                    Tone::Audit,
                ));
            }
        }
        "KICK" => on_kick(state, settings, &sender, msg, &mut effects),
        "QUIT" => on_quit(state, &sender, msg),
        "ERROR" => {
            let text = msg.trailing().unwrap_or("server closed the link");
            effects.push(Effect::Fatal(text.to_owned()));
        }
        "PRIVMSG" | "NOTICE" => on_message(state, access, settings, &sender, msg, &mut effects),
        _ if msg.is_numeric() => {
            if let Some(text) = msg.trailing().filter(|_| msg.params.len() > 1) {
                let tone = if msg.command.starts_with(['4', '5']) {
                    Tone::Error
                } else {
                    Tone::Plain
                };
                state.push_status(LogEntry::notice(text, tone));
            }
        }
        _ => {}
    }

    effects
}

fn is_home(settings: &IrcSettings, chan: &str) -> bool {
    channel_key(chan) == channel_key(&settings.home_channel)
}

fn set_topic(state: &mut IrcState, chan: &str, topic: &str, setter: Option<&str>) {
    let Some(channel) = state.channel_mut(chan) else {
        return;
    };
    channel.topic = Some(topic.to_owned());
    let text = match setter {
        Some(nick) => format!("{nick} changed the topic to: {topic}"),
        None => format!("Topic: {topic}"),
    };
    channel.push(LogEntry::notice(text, Tone::Notice));
}

fn on_join(state: &mut IrcState, sender: &str, msg: &IrcMessage, effects: &mut Vec<Effect>) {
    let Some(chan) = msg.param(0) else {
        return;
    };
    if state.is_me(sender) {
        state
            .join(chan)
            .push(LogEntry::notice(format!("You joined {chan}"), Tone::Join));
    } else if let Some(channel) = state.channel_mut(chan) {
        channel.push(LogEntry::notice(format!("{sender} joined {chan}"), Tone::Join));
    } else {
        return;
    }
    effects.push(Effect::Send(format!("NAMES {chan}")));
}

fn on_part(state: &mut IrcState, sender: &str, msg: &IrcMessage, effects: &mut Vec<Effect>) {
    let Some(chan) = msg.param(0) else {
        return;
    };
    if state.is_me(sender) {
        state.remove(chan);
        state.push_status(LogEntry::notice(format!("You left {chan}"), Tone::Part));
        return;
    }
    let Some(channel) = state.channel_mut(chan) else {
        return;
    };
    let text = match msg.param(1).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{sender} left {chan} ({reason})"),
        None => format!("{sender} left {chan}"),
    };
    channel.push(LogEntry::notice(text, Tone::Part));
    effects.push(Effect::Send(format!("NAMES {chan}")));
}

fn on_nick(state: &mut IrcState, sender: &str, msg: &IrcMessage) {
    let Some(new) = msg.param(0) else {
        return;
    };
    if state.is_me(sender) {
        new.clone_into(&mut state.nick);
        state.push_status(LogEntry::notice(
            format!("You are now known as {new}"),
            Tone::Notice,
        ));
    }
    state.rename_query(sender, new);
    for channel in state.channels.values_mut() {
        let renamed = channel.rename_member(sender, new)
            || (channel.is_query() && channel.name.eq_ignore_ascii_case(new));
        if renamed {
            channel.push(LogEntry::notice(
                format!("{sender} is now known as {new}"),
                Tone::Notice,
            ));
        }
    }
}

fn on_mode(state: &mut IrcState, sender: &str, msg: &IrcMessage, effects: &mut Vec<Effect>) {
    let (Some(target), Some(modes)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    if !is_channel_name(target) {
        return;
    }
    let audited = modes
        .chars()
        .filter(|c| !matches!(c, '+' | '-'))
        .any(|c| AUDITED_MODES.contains(&c))
        && modes.starts_with(['+', '-']);
    if !audited {
        return;
    }
    let Some(channel) = state.channel_mut(target) else {
        return;
    };
    let args = msg.params[2..].join(" ");
    let text = if args.is_empty() {
        format!("{sender} sets mode {modes}")
    } else {
        format!("{sender} sets mode {modes} {args}")
    };
    channel.push(LogEntry::notice(text, Tone::Audit));
    effects.push(Effect::Send(format!("NAMES {target}")));
}

fn on_kick(
    state: &mut IrcState,
    settings: &IrcSettings,
    sender: &str,
    msg: &IrcMessage,
    effects: &mut Vec<Effect>,
) {
    let (Some(chan), Some(victim)) = (msg.param(0), msg.param(1)) else {
        return;
    };
    let reason = msg.param(2).filter(|r| !r.is_empty()).unwrap_or("no reason");

    if state.is_me(victim) {
        if is_home(settings, chan) {
            effects.push(Effect::Fatal(format!(
                "Kicked from {chan} by {sender} ({reason})"
            )));
        } else {
            state.remove(chan);
            state.push_status(LogEntry::notice(
                format!("You were kicked from {chan} by {sender} ({reason})"),
                Tone::Audit,
            ));
        }
        return;
    }

    if let Some(channel) = state.channel_mut(chan) {
        channel.remove_member(victim);
        channel.push(LogEntry::notice(
            format!("{sender} kicked {victim} from {chan} ({reason})"),
            Tone::Audit,
        ));
    }
}

fn on_quit(state: &mut IrcState, sender: &str, msg: &IrcMessage) {
    let text = match msg.param(0).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{sender} quit ({reason})"),
        None => format!("{sender} quit"),
    };
    for channel in state.channels.values_mut() {
        let present = channel.remove_member(sender)
            || (channel.is_query() && channel.name.eq_ignore_ascii_case(sender));
        if present {
            channel.push(LogEntry::notice(text.clone(), Tone::Part));
        }
    }
}

fn on_message(
    state: &mut IrcState,
    access: &AccessCache,
    settings: &IrcSettings,
    sender: &str,
    msg: &IrcMessage,
    effects: &mut Vec<Effect>,
) {
    let (Some(target), Some(text)) = (msg.param(0), msg.param(1)) else {
        return;
    };

    if sender.eq_ignore_ascii_case(&settings.admin_nick) && access.apply_admin_line(text) {
        return;
    }

    let from_server = msg.prefix.as_ref().is_none_or(|p| p.is_server());
    if from_server || target == "*" {
        state.push_status(LogEntry::notice(text, Tone::Notice));
        return;
    }

    let body = match ctcp(text) {
        Some(("ACTION", rest)) => format!("* {sender} {rest}"),
        Some((verb, _)) => {
            if msg.command == "PRIVMSG" {
                if let Some(reply) = ctcp_reply(verb, text) {
                    effects.push(Effect::Send(format!("NOTICE {sender} :{reply}")));
                }
            }
            return;
        }
        None => text.to_owned(),
    };

    let in_channel = is_channel_name(target);
    let window = if in_channel {
        target.to_owned()
    } else {
        state.open_query(sender).name.clone()
    };

    let mentions_me = !state.is_me(sender)
        && !state.nick.is_empty()
        && body.to_lowercase().contains(&state.nick.to_lowercase());

    let entry = if mentions_me {
        LogEntry::message(sender, body, Tone::Highlight).with_alert()
    } else if in_channel {
        LogEntry::message(sender, body, Tone::Nick(palette_slot(sender)))
    } else {
        LogEntry::message(sender, body, Tone::Plain)
    };

    state.push_to(&window, entry);
}

/// Split a `\x01VERB rest\x01` payload.
fn ctcp(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_prefix('\u{1}')?;
    let inner = inner.strip_suffix('\u{1}').unwrap_or(inner);
    Some(inner.split_once(' ').unwrap_or((inner, "")))
}

fn ctcp_reply(verb: &str, request: &str) -> Option<String> {
    match verb {
        "VERSION" => Some(format!(
            "\u{1}VERSION cellar {}\u{1}",
            env!("CARGO_PKG_VERSION")
        )),
        "PING" => Some(request.to_owned()),
        _ => None,
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ChannelKind;

    fn settings() -> IrcSettings {
        IrcSettings {
            nick: "me".into(),
            home_channel: "#home".into(),
            admin_nick: "CellarBot".into(),
            ..IrcSettings::default()
        }
    }

    fn joined(channels: &[&str]) -> IrcState {
        let mut state = IrcState::new("me");
        state.connected = true;
        for chan in channels {
            state.join(chan);
        }
        state
    }

    fn feed(state: &mut IrcState, line: &str) -> Vec<Effect> {
        feed_with(state, &AccessCache::new(), line)
    }

    fn feed_with(state: &mut IrcState, access: &AccessCache, line: &str) -> Vec<Effect> {
        let msg = IrcMessage::parse(line).unwrap();
        dispatch(state, access, &settings(), &msg)
    }

    #[test]
    fn channel_privmsg_adds_one_colored_entry() {
        let mut state = joined(&["#chat", "#other"]);
        let before_other = state.channel("#other").unwrap().clone();

        let effects = feed(&mut state, ":bob!u@h PRIVMSG #chat :hi");
        assert!(effects.is_empty());

        let chat = state.channel("#chat").unwrap();
        assert_eq!(chat.log.len(), 1);
        let entry = chat.log.last().unwrap();
        assert_eq!(entry.text, "hi");
        assert_eq!(entry.sender.as_deref(), Some("bob"));
        assert_eq!(entry.tone, Tone::Nick(palette_slot("bob")));
        assert!(!entry.alert);

        assert_eq!(state.channel("#other").unwrap(), &before_other);
        assert!(state.status.is_empty());
    }

    #[test]
    fn welcome_joins_home_channel() {
        let mut state = IrcState::new("me");
        let effects = feed(&mut state, ":srv 001 me :Welcome");
        assert_eq!(effects, vec![Effect::Send("JOIN #home".into())]);
        assert!(state.channel("#home").is_some());
        assert_eq!(state.status.last().unwrap().text, "Welcome");
    }

    #[test]
    fn kick_from_home_is_fatal() {
        let mut state = joined(&["#home"]);
        let effects = feed(&mut state, ":x!a@b KICK #home me :bye");
        assert_eq!(
            effects,
            vec![Effect::Fatal("Kicked from #home by x (bye)".into())]
        );
    }

    #[test]
    fn kick_from_other_channel_leaves_only_it() {
        let mut state = joined(&["#home", "#side"]);
        let effects = feed(&mut state, ":x!a@b KICK #side me :out");
        assert!(effects.is_empty());
        assert!(state.channel("#side").is_none());
        assert!(state.channel("#home").is_some());
        assert_eq!(state.status.last().unwrap().tone, Tone::Audit);
    }

    #[test]
    fn kick_of_someone_else_is_audited() {
        let mut state = joined(&["#home"]);
        state.channel_mut("#home").unwrap().add_names("x troll");
        feed(&mut state, ":x!a@b KICK #home troll :spam");
        let home = state.channel("#home").unwrap();
        assert!(!home.has_member("troll"));
        assert_eq!(home.log.last().unwrap().tone, Tone::Audit);
    }

    #[test]
    fn names_cycle_resets_and_completes_per_channel() {
        let mut state = joined(&["#a", "#b"]);
        feed(&mut state, ":srv 353 me = #a :@alice bob");
        feed(&mut state, ":srv 353 me = #b :carol");
        feed(&mut state, ":srv 366 me #a :End of /NAMES list.");

        assert!(state.channel("#a").unwrap().names_complete);
        assert!(!state.channel("#b").unwrap().names_complete);

        feed(&mut state, ":srv 353 me = #a :dave");
        let a = state.channel("#a").unwrap();
        assert!(!a.names_complete);
        assert_eq!(a.members.len(), 1);
        assert_eq!(a.members[0].nick, "dave");
        assert_eq!(state.channel("#b").unwrap().members.len(), 1);
    }

    #[test]
    fn others_joining_refresh_names() {
        let mut state = joined(&["#home"]);
        let effects = feed(&mut state, ":carol!c@h JOIN #home");
        assert_eq!(effects, vec![Effect::Send("NAMES #home".into())]);
        assert_eq!(state.channel("#home").unwrap().log.last().unwrap().tone, Tone::Join);
    }

    #[test]
    fn own_part_removes_channel() {
        let mut state = joined(&["#home", "#side"]);
        let effects = feed(&mut state, ":me!u@h PART #side");
        assert!(effects.is_empty());
        assert!(state.channel("#side").is_none());
    }

    #[test]
    fn nick_change_renames_everywhere() {
        let mut state = joined(&["#a", "#b", "#c"]);
        state.channel_mut("#a").unwrap().add_names("@bob");
        state.channel_mut("#b").unwrap().add_names("bob alice");
        feed(&mut state, ":bob!u@h NICK robert");

        assert!(state.channel("#a").unwrap().has_member("robert"));
        assert_eq!(
            state.channel("#a").unwrap().members[0].display(),
            "@robert"
        );
        assert!(state.channel("#b").unwrap().has_member("robert"));
        assert!(state.channel("#c").unwrap().log.is_empty());
        assert_eq!(state.channel("#b").unwrap().log.len(), 1);
    }

    #[test]
    fn own_nick_change_is_tracked() {
        let mut state = joined(&[]);
        feed(&mut state, ":me!u@h NICK me2");
        assert_eq!(state.nick, "me2");
    }

    #[test]
    fn quit_strips_member_from_every_channel() {
        let mut state = joined(&["#a", "#b"]);
        state.channel_mut("#a").unwrap().add_names("bob");
        state.channel_mut("#b").unwrap().add_names("alice");
        feed(&mut state, ":bob!u@h QUIT :gone");

        assert!(!state.channel("#a").unwrap().has_member("bob"));
        assert_eq!(state.channel("#a").unwrap().log.last().unwrap().text, "bob quit (gone)");
        assert!(state.channel("#b").unwrap().log.is_empty());
    }

    #[test]
    fn audited_mode_refreshes_names() {
        let mut state = joined(&["#home"]);
        let effects = feed(&mut state, ":op!u@h MODE #home +o alice");
        assert_eq!(effects, vec![Effect::Send("NAMES #home".into())]);
        assert_eq!(
            state.channel("#home").unwrap().log.last().unwrap().text,
            "op sets mode +o alice"
        );

        let effects = feed(&mut state, ":op!u@h MODE #home +t");
        assert!(effects.is_empty());
    }

    #[test]
    fn bad_nick_numerics_are_fatal() {
        let mut state = joined(&[]);
        let effects = feed(&mut state, ":srv 433 * me :Nickname is already in use");
        assert!(matches!(effects.as_slice(), [Effect::Fatal(_)]));
        let effects = feed(&mut state, ":srv 432 * b@d :Erroneous nickname");
        assert!(matches!(effects.as_slice(), [Effect::Fatal(_)]));
    }

    #[test]
    fn ban_is_fatal_only_for_home() {
        let mut state = joined(&["#home", "#side"]);
        let effects = feed(&mut state, ":srv 474 me #side :Cannot join channel (+b)");
        assert!(effects.is_empty());
        assert!(state.channel("#side").is_none());

        let effects = feed(&mut state, ":srv 474 me #home :Cannot join channel (+b)");
        assert_eq!(effects, vec![Effect::Fatal("Banned from #home".into())]);
    }

    #[test]
    fn raw_error_is_fatal() {
        let mut state = joined(&["#home"]);
        let effects = feed(&mut state, "ERROR :Closing Link: (Ping timeout)");
        assert_eq!(
            effects,
            vec![Effect::Fatal("Closing Link: (Ping timeout)".into())]
        );
    }

    #[test]
    fn private_message_opens_query_window() {
        let mut state = joined(&["#home"]);
        feed(&mut state, ":alice!a@h PRIVMSG me :psst");
        let query = state.channel("alice").unwrap();
        assert_eq!(query.kind, ChannelKind::Query);
        assert_eq!(query.log.len(), 1);

        feed(&mut state, ":alice!a@h PRIVMSG me :again");
        assert_eq!(state.channel("alice").unwrap().log.len(), 2);
        assert_eq!(state.channels.len(), 2);
    }

    #[test]
    fn ctcp_action_is_unwrapped() {
        let mut state = joined(&["#chat"]);
        feed(&mut state, ":bob!u@h PRIVMSG #chat :\u{1}ACTION waves\u{1}");
        assert_eq!(
            state.channel("#chat").unwrap().log.last().unwrap().text,
            "* bob waves"
        );
    }

    #[test]
    fn ctcp_version_gets_a_reply() {
        let mut state = joined(&[]);
        let effects = feed(&mut state, ":bob!u@h PRIVMSG me :\u{1}VERSION\u{1}");
        assert!(matches!(
            effects.as_slice(),
            [Effect::Send(line)] if line.starts_with("NOTICE bob :\u{1}VERSION cellar")
        ));
        assert!(state.channels.is_empty());
    }

    #[test]
    fn mention_is_highlighted_with_alert() {
        let mut state = joined(&["#chat"]);
        feed(&mut state, ":bob!u@h PRIVMSG #chat :hey ME, look");
        let entry = state.channel("#chat").unwrap().log.last().unwrap().clone();
        assert_eq!(entry.tone, Tone::Highlight);
        assert!(entry.alert);
    }

    #[test]
    fn admin_verdicts_are_not_displayed() {
        let mut state = joined(&["#home"]);
        let access = AccessCache::new();
        feed_with(&mut state, &access, ":CellarBot!b@h PRIVMSG me :ALLOW alice");
        assert_eq!(access.verdict("alice"), Some(true));
        assert!(state.channel("cellarbot").is_none());

        feed_with(&mut state, &access, ":CellarBot!b@h PRIVMSG me :hello human");
        assert_eq!(state.channel("cellarbot").unwrap().log.len(), 1);
    }

    #[test]
    fn offline_target_marks_query() {
        let mut state = joined(&[]);
        state.open_query("ghost");
        feed(&mut state, ":srv 401 me ghost :No such nick/channel");
        assert!(state.channel("ghost").unwrap().offline);
    }

    #[test]
    fn not_operator_is_annotated_in_channel() {
        let mut state = joined(&["#home"]);
        feed(&mut state, ":srv 482 me #home :You're not channel operator");
        assert_eq!(
            state.channel("#home").unwrap().log.last().unwrap().text,
            "You are not a channel operator"
        );
    }

    #[test]
    fn ping_gets_pong() {
        let mut state = joined(&[]);
        let effects = feed(&mut state, "PING :irc.example.net");
        assert_eq!(effects, vec![Effect::Send("PONG :irc.example.net".into())]);
    }

    #[test]
    fn server_notices_go_to_status() {
        let mut state = joined(&[]);
        feed(&mut state, ":irc.example.net NOTICE * :*** Looking up your hostname");
        assert_eq!(state.status.len(), 1);
        assert!(state.channels.is_empty());
    }

    #[test]
    fn palette_slot_is_stable_and_bounded() {
        assert_eq!(palette_slot("bob"), palette_slot("BOB"));
        for nick in ["a", "bob", "alice", "zzzzzzzzzzzzzzzzzzzz"] {
            assert!(palette_slot(nick) < NICK_PALETTE_SIZE);
        }
    }
}
