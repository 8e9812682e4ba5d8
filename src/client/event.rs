//! Everything that can happen to a session, and everything a session can
//! ask its driver to do.
//!
//! Handlers are pure folds over `Client` state: the driver feeds them
//! `ClientEvent`s one at a time and performs the returned `Action`s. All
//! session mutation happens on this single stream, so no handler ever needs
//! a lock.

use serde::Deserialize;
use std::time::Duration;

pub type NetworkId = u64;

#[derive(Debug)]
pub enum ClientEvent {
    /// An inbound protocol message on one network's stream.
    Irc {
        network: NetworkId,
        message: irc::proto::Message,
    },
    /// Transport established (handshake may still be in flight).
    Connected { network: NetworkId },
    /// Transport could not be opened. Non-fatal to the session.
    ConnectionFailed { network: NetworkId, error: String },
    /// The stream ended.
    Disconnected { network: NetworkId, reason: String },

    /// Viewer requests.
    Connect(ConnectArgs),
    Input { target: u64, text: String },
    More { target: u64, already_have: usize },
    Open { target: u64 },
    Sort(SortRequest),
    Names { target: u64 },
    /// Store a new login password hash. Handled by the driver directly since
    /// it writes through the config store.
    SetPassword { hash: String },

    /// A scheduled post-connect command came due.
    CommandDue { network: NetworkId, text: String },
    /// The liveness probe timer fired.
    ProbeDue { network: NetworkId },
    /// The save-debounce timer fired. Stale epochs are ignored.
    SaveDue { epoch: u64 },

    /// Tear the whole session down.
    Quit,
}

/// A connect request, as supplied by a viewer or replayed from the config
/// store at login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectArgs {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    /// Channels to join once the connection is probed alive, separated by
    /// commas and/or whitespace.
    #[serde(default)]
    pub join: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortRequest {
    /// "networks" or "channels".
    pub kind: String,
    /// Exact new order by id; ids not present in current state are skipped,
    /// current entries not mentioned are dropped.
    pub order: Vec<u64>,
    /// Required for kind = "channels".
    #[serde(default)]
    pub network: Option<NetworkId>,
}

/// An I/O effect requested by a handler, performed by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open the transport for an already-registered network.
    OpenConnection { network: NetworkId },

    SendPrivmsg {
        network: NetworkId,
        target: String,
        text: String,
    },
    SendAction {
        network: NetworkId,
        target: String,
        text: String,
    },
    SendNotice {
        network: NetworkId,
        target: String,
        text: String,
    },
    SendJoin {
        network: NetworkId,
        channels: String,
    },
    SendPart {
        network: NetworkId,
        channel: String,
        reason: Option<String>,
    },
    SendNick {
        network: NetworkId,
        nick: String,
    },
    SendTopic {
        network: NetworkId,
        channel: String,
        text: String,
    },
    SendKick {
        network: NetworkId,
        channel: String,
        user: String,
    },
    SendInvite {
        network: NetworkId,
        nick: String,
        channel: String,
    },
    SendWhois {
        network: NetworkId,
        nick: String,
    },
    SendMode {
        network: NetworkId,
        target: String,
        modes: String,
    },
    SendNames {
        network: NetworkId,
        channel: String,
    },
    SendRaw {
        network: NetworkId,
        line: String,
    },
    SendPing {
        network: NetworkId,
        token: String,
    },

    /// Graceful protocol quit for a registered network.
    QuitNetwork {
        network: NetworkId,
        message: Option<String>,
    },
    /// Force-close the transport of an unregistered network.
    CloseConnection { network: NetworkId },

    ScheduleCommand {
        network: NetworkId,
        delay: Duration,
        text: String,
    },
    ScheduleProbe {
        network: NetworkId,
        delay: Duration,
    },
    ScheduleSave { epoch: u64 },
    /// Write the session's exportable state to the config store now.
    SaveNow,
}
