//! Session data model: messages, channels, networks.
//!
//! Ownership is strictly tree-shaped: a network owns its channels, a channel
//! owns its messages. Nothing here holds a back-reference to its owner; the
//! session layer passes both halves where navigation is needed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide id sequence. Channel and message ids come from the same
/// counter so any id is unambiguous across a whole session, and message ids
/// double as a stable global ordering key for viewers.
#[derive(Debug, Clone)]
pub struct IdSeq(Arc<AtomicU64>);

impl IdSeq {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdSeq {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgKind {
    Message,
    Action,
    Notice,
    Error,
    System,
    Join,
    Part,
    Quit,
    Nick,
    Kick,
    Topic,
    Mode,
    Motd,
    Invite,
    Whois,
    ChannelList,
}

/// One row of a LIST reply, accumulated per network and delivered in a single
/// `ChannelList` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListEntry {
    pub name: String,
    pub users: u64,
    pub topic: String,
}

/// One rendered event in a channel buffer. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct Msg {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: MsgKind,
    pub from: String,
    /// Mode prefix of the sender at the time of sending ("@", "+", ...).
    pub mode: String,
    pub text: String,
    #[serde(rename = "self")]
    pub self_: bool,
    pub highlight: bool,
    pub time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ListEntry>,
}

impl Msg {
    pub fn new(id: u64, kind: MsgKind, from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            from: from.into(),
            mode: String::new(),
            text: text.into(),
            self_: false,
            highlight: false,
            time: Utc::now(),
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChanKind {
    /// The synthetic buffer for the network connection itself. Always the
    /// first channel of a network.
    Lobby,
    Channel,
    Query,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub name: String,
    pub mode: String,
}

#[derive(Debug, Serialize)]
pub struct Chan {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChanKind,
    pub topic: String,
    /// Full in-memory history. Not serialized to viewers wholesale; pages
    /// are served on demand through `more`.
    #[serde(skip)]
    pub messages: Vec<Msg>,
    pub users: Vec<User>,
    pub unread: u64,
    pub highlight: bool,
    /// Id of the first message the viewer has not seen, 0 when none.
    pub first_unread: u64,
}

impl Chan {
    pub fn new(id: u64, kind: ChanKind, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            topic: String::new(),
            messages: Vec::new(),
            users: Vec::new(),
            unread: 0,
            highlight: false,
            first_unread: 0,
        }
    }

    /// Current mode prefix recorded for a nick, empty if unknown.
    pub fn get_mode(&self, nick: &str) -> String {
        self.users
            .iter()
            .find(|u| u.name.eq_ignore_ascii_case(nick))
            .map(|u| u.mode.clone())
            .unwrap_or_default()
    }

    pub fn has_user(&self, nick: &str) -> bool {
        self.users.iter().any(|u| u.name.eq_ignore_ascii_case(nick))
    }

    pub fn add_user(&mut self, nick: impl Into<String>, mode: impl Into<String>) {
        let nick = nick.into();
        if !self.has_user(&nick) {
            self.users.push(User {
                name: nick,
                mode: mode.into(),
            });
        }
    }

    pub fn remove_user(&mut self, nick: &str) {
        self.users.retain(|u| !u.name.eq_ignore_ascii_case(nick));
    }

    /// Sort membership by rank, then name. Called after NAMES and membership
    /// changes so viewers always see a stable order.
    pub fn sort_users(&mut self) {
        fn rank(mode: &str) -> usize {
            match mode {
                "~" => 0,
                "&" => 1,
                "@" => 2,
                "%" => 3,
                "+" => 4,
                _ => 5,
            }
        }
        self.users.sort_by(|a, b| {
            rank(&a.mode)
                .cmp(&rank(&b.mode))
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
    }
}

/// Registration pipeline for one connection. Each stage fires at most once
/// per connection lifetime; a reconnect starts over from `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegPhase {
    /// Transport opened (or opening), welcome not yet seen.
    Connecting,
    /// Welcome received; post-connect commands and the liveness probe are
    /// scheduled.
    Registered,
    /// Probe PING written, waiting for the PONG.
    Probed,
    /// PONG received and autojoin issued. Terminal.
    Ready,
}

#[derive(Debug, Serialize)]
pub struct Network {
    pub id: u64,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub nick: String,
    pub username: String,
    pub realname: String,
    /// Never serialized into fan-out payloads.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Index 0 is always the lobby.
    pub channels: Vec<Chan>,
    pub connected: bool,
    #[serde(skip)]
    pub phase: RegPhase,
    /// Post-connect commands, run spaced one second apart after welcome.
    #[serde(skip)]
    pub commands: Vec<String>,
    /// Autojoin list as supplied ("#a,#b #c"), issued after the probe PONG.
    #[serde(skip)]
    pub autojoin: String,
    /// Accumulation buffer for a LIST in progress.
    #[serde(skip)]
    pub list_cache: Vec<ListEntry>,
}

impl Network {
    pub fn lobby_id(&self) -> u64 {
        self.channels[0].id
    }

    pub fn find_chan(&self, name: &str) -> Option<usize> {
        self.channels
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn chan_index(&self, id: u64) -> Option<usize> {
        self.channels.iter().position(|c| c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_seq_is_monotonic_across_clones() {
        let ids = IdSeq::new();
        let other = ids.clone();
        let a = ids.next();
        let b = other.next();
        let c = ids.next();
        assert!(a < b && b < c);
    }

    #[test]
    fn users_sort_by_rank_then_name() {
        let mut chan = Chan::new(1, ChanKind::Channel, "#test");
        chan.add_user("zoe", "");
        chan.add_user("amy", "+");
        chan.add_user("bob", "@");
        chan.add_user("ann", "");
        chan.sort_users();
        let order: Vec<&str> = chan.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(order, vec!["bob", "amy", "ann", "zoe"]);
    }

    #[test]
    fn duplicate_users_are_not_added() {
        let mut chan = Chan::new(1, ChanKind::Channel, "#test");
        chan.add_user("Amy", "@");
        chan.add_user("amy", "");
        assert_eq!(chan.users.len(), 1);
        assert_eq!(chan.get_mode("AMY"), "@");
    }

    #[test]
    fn channel_list_payload_serializes_only_when_present() {
        let plain = Msg::new(1, MsgKind::Message, "amy", "hi");
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("channels").is_none());
        assert_eq!(json["type"], "message");
        assert_eq!(json["self"], false);
    }
}
