//! Per-session chat state: joined channels, query windows, status log.
//!
//! One `Channel` record per joined channel, keyed by lower-cased name. The
//! reader task mutates this; the UI loop only ever clones snapshots out.

use cellar_core::{BoundedLog, LogEntry};
use std::collections::BTreeMap;

/// Lower-cased key used to index channels and queries.
pub fn channel_key(name: &str) -> String {
    name.to_lowercase()
}

pub fn is_channel_name(name: &str) -> bool {
    name.starts_with('#')
}

/// Channel membership prefix, highest rank first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemberRole {
    Founder,
    Operator,
    HalfOperator,
    Voice,
}

impl MemberRole {
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            '~' => Some(Self::Founder),
            '@' => Some(Self::Operator),
            '%' => Some(Self::HalfOperator),
            '+' => Some(Self::Voice),
            _ => None,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            Self::Founder => '~',
            Self::Operator => '@',
            Self::HalfOperator => '%',
            Self::Voice => '+',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub nick: String,
    pub role: Option<MemberRole>,
}

impl Member {
    /// Parse a NAMES token such as `@alice`. With multi-prefix tokens
    /// (`@+alice`) the highest rank wins.
    pub fn parse(token: &str) -> Self {
        let nick = token.trim_start_matches(|c| MemberRole::from_prefix(c).is_some());
        let role = token[..token.len() - nick.len()]
            .chars()
            .filter_map(MemberRole::from_prefix)
            .min();
        Self {
            nick: nick.to_owned(),
            role,
        }
    }

    pub fn display(&self) -> String {
        match self.role {
            Some(role) => format!("{}{}", role.prefix(), self.nick),
            None => self.nick.clone(),
        }
    }

    fn is(&self, nick: &str) -> bool {
        self.nick.eq_ignore_ascii_case(nick)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Channel,
    /// A private conversation window named after the peer.
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub kind: ChannelKind,
    pub members: Vec<Member>,
    pub log: BoundedLog,
    /// Members are authoritative only once the latest NAMES cycle ended.
    pub names_complete: bool,
    pub topic: Option<String>,
    /// Query peer reported as not on the network (`401`).
    pub offline: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Channel,
            members: Vec::new(),
            log: BoundedLog::new(),
            names_complete: false,
            topic: None,
            offline: false,
        }
    }

    pub fn query(peer: impl Into<String>) -> Self {
        Self {
            kind: ChannelKind::Query,
            names_complete: true,
            ..Self::new(peer)
        }
    }

    pub fn is_query(&self) -> bool {
        self.kind == ChannelKind::Query
    }

    pub fn push(&mut self, entry: LogEntry) {
        self.log.push(entry);
    }

    pub fn has_member(&self, nick: &str) -> bool {
        self.members.iter().any(|m| m.is(nick))
    }

    /// Accumulate one `353` reply. A reply arriving after a completed cycle
    /// starts a fresh list instead of appending to the old one.
    pub fn add_names(&mut self, names: &str) {
        if self.names_complete {
            self.members.clear();
            self.names_complete = false;
        }
        for token in names.split_whitespace() {
            let member = Member::parse(token);
            if member.nick.is_empty() {
                continue;
            }
            if let Some(existing) = self.members.iter_mut().find(|m| m.is(&member.nick)) {
                *existing = member;
            } else {
                self.members.push(member);
            }
        }
    }

    pub fn finish_names(&mut self) {
        self.names_complete = true;
    }

    pub fn rename_member(&mut self, old: &str, new: &str) -> bool {
        match self.members.iter_mut().find(|m| m.is(old)) {
            Some(member) => {
                new.clone_into(&mut member.nick);
                true
            }
            None => false,
        }
    }

    pub fn remove_member(&mut self, nick: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| !m.is(nick));
        self.members.len() != before
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IrcState {
    pub connected: bool,
    pub nick: String,
    pub channels: BTreeMap<String, Channel>,
    pub status: BoundedLog,
    /// Why the last session ended, kept after teardown clears the logs.
    pub disconnect_reason: Option<String>,
}

impl IrcState {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Self::default()
        }
    }

    pub fn is_me(&self, nick: &str) -> bool {
        self.nick.eq_ignore_ascii_case(nick)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&channel_key(name))
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(&channel_key(name))
    }

    /// The channel record for `name`, created if absent.
    pub fn join(&mut self, name: &str) -> &mut Channel {
        self.channels
            .entry(channel_key(name))
            .or_insert_with(|| Channel::new(name))
    }

    /// The query window for `peer`, created on first contact.
    pub fn open_query(&mut self, peer: &str) -> &mut Channel {
        self.channels
            .entry(channel_key(peer))
            .or_insert_with(|| Channel::query(peer))
    }

    pub fn remove(&mut self, name: &str) -> Option<Channel> {
        self.channels.remove(&channel_key(name))
    }

    /// Re-key a query window after its peer changed nick.
    pub fn rename_query(&mut self, old: &str, new: &str) {
        let key = channel_key(old);
        if !self.channels.get(&key).is_some_and(Channel::is_query) {
            return;
        }
        if let Some(mut query) = self.channels.remove(&key) {
            new.clone_into(&mut query.name);
            self.channels.insert(channel_key(new), query);
        }
    }

    pub fn push_status(&mut self, entry: LogEntry) {
        self.status.push(entry);
    }

    /// Push to the named window, falling back to the status log.
    pub fn push_to(&mut self, name: &str, entry: LogEntry) {
        match self.channel_mut(name) {
            Some(channel) => channel.push(entry),
            None => {
                self.status.push(entry);
            }
        }
    }

    pub fn window_names(&self) -> Vec<String> {
        self.channels.values().map(|c| c.name.clone()).collect()
    }

    /// Drop every channel and the status log and mark the session down.
    pub fn teardown(&mut self, reason: impl Into<String>) {
        self.channels.clear();
        self.status.clear();
        self.connected = false;
        self.disconnect_reason = Some(reason.into());
    }
}
