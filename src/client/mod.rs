//! One user's session: networks, focus, fan-out and persistence policy.

pub mod commands;
pub mod driver;
pub mod event;
pub mod events;
pub mod handler;
pub mod models;

use crate::config::model::RelayConfig;
use crate::config::{ChannelEntry, ConfigStore, NetworkEntry, UserConfig, UserPatch};
use crate::fanout::{Fanout, Push};
use crate::logging::ChatLogger;
use event::{Action, ConnectArgs, NetworkId, SortRequest};
use models::{Chan, ChanKind, IdSeq, Msg, MsgKind, Network, RegPhase};
use rand::RngCore;
use std::sync::Arc;

/// Messages served per `more` page.
const PAGE_SIZE: usize = 100;

/// One user's session. Mutated only by its own driver task, one event at a
/// time; everything here is plain single-threaded state.
pub struct Client {
    pub id: u64,
    pub name: String,
    /// Random capability string viewers present to attach to this session.
    pub token: String,
    /// Login password hash, mirroring the config store.
    pub password: Option<String>,
    pub networks: Vec<Network>,
    /// Channel currently in focus, shared by all of the session's viewers.
    /// Incoming messages for this channel never count as unread.
    pub active_channel: Option<u64>,
    /// Save-debounce generation. A timer that fires with a stale epoch is
    /// ignored, which is what coalesces bursts of save requests.
    pub save_epoch: u64,
    pub log: bool,
    pub ids: IdSeq,
    pub relay: Arc<RelayConfig>,
    pub fanout: Fanout,
    pub logger: ChatLogger,
}

impl Client {
    pub fn new(
        id: u64,
        name: &str,
        user: &UserConfig,
        relay: Arc<RelayConfig>,
        ids: IdSeq,
        fanout: Fanout,
        logger: ChatLogger,
    ) -> Self {
        let mut buf = [0u8; 48];
        rand::rng().fill_bytes(&mut buf);
        let token: String = buf.iter().map(|b| format!("{b:02x}")).collect();
        Self {
            id,
            name: name.to_string(),
            token,
            password: user.password.clone(),
            networks: Vec::new(),
            active_channel: None,
            save_epoch: 0,
            log: relay.log && user.log,
            ids,
            relay,
            fanout,
            logger,
        }
    }

    /// Locate a channel by id anywhere in the session.
    pub fn find(&self, id: u64) -> Option<(usize, usize)> {
        for (ni, network) in self.networks.iter().enumerate() {
            if let Some(ci) = network.chan_index(id) {
                return Some((ni, ci));
            }
        }
        None
    }

    pub fn network_index(&self, id: NetworkId) -> Option<usize> {
        self.networks.iter().position(|n| n.id == id)
    }

    /// Append a message to a channel, apply unread/highlight accounting,
    /// notify viewers, and feed the chat log.
    ///
    /// `count_unread` is set for message-bearing events (and errors); status
    /// noise like joins and topic changes passes through without touching
    /// the counters. The active channel is exempt either way.
    pub fn deliver(&mut self, ni: usize, ci: usize, msg: Msg, count_unread: bool) {
        let chan_id;
        let host;
        let chan_name;
        {
            let network = &mut self.networks[ni];
            host = network.host.clone();
            let chan = &mut network.channels[ci];
            let active = self.active_channel == Some(chan.id);
            if count_unread && !active {
                if chan.unread == 0 {
                    chan.first_unread = msg.id;
                }
                chan.unread += 1;
                if msg.highlight {
                    chan.highlight = true;
                }
            }
            chan_id = chan.id;
            chan_name = if chan.kind == ChanKind::Lobby {
                host.clone()
            } else {
                chan.name.clone()
            };
            chan.messages.push(msg.clone());
        }
        if self.log {
            self.logger.append(&self.name.clone(), &host, &chan_name, &msg);
        }
        self.fanout.send(Push::Msg {
            chan: Some(chan_id),
            msg,
        });
    }

    /// Error with no target buffer (e.g. a refused connect request).
    pub fn emit_global_error(&mut self, text: &str) {
        let msg = Msg::new(self.ids.next(), MsgKind::Error, "", text);
        self.fanout.send(Push::Msg { chan: None, msg });
    }

    /// Error into a network's lobby.
    pub fn lobby_error(&mut self, ni: usize, text: &str) {
        let msg = Msg::new(self.ids.next(), MsgKind::Error, "", text);
        self.deliver(ni, 0, msg, true);
    }

    pub fn lobby_system(&mut self, ni: usize, text: &str) {
        let msg = Msg::new(self.ids.next(), MsgKind::System, "", text);
        self.deliver(ni, 0, msg, false);
    }

    /// Create a query channel and announce it to viewers. Returns its index
    /// within the network's channel list.
    pub fn new_query(&mut self, ni: usize, name: &str) -> usize {
        let chan = Chan::new(self.ids.next(), ChanKind::Query, name);
        let network_id = self.networks[ni].id;
        self.fanout.send(Push::Join {
            network: network_id,
            chan: serde_json::to_value(&chan).unwrap_or_default(),
        });
        self.networks[ni].channels.push(chan);
        self.networks[ni].channels.len() - 1
    }

    /// Drop a channel from its network. The only normal destruction path
    /// for a channel; its history is discarded with it.
    pub fn close_chan(&mut self, ni: usize, ci: usize) {
        let chan = self.networks[ni].channels.remove(ci);
        if self.active_channel == Some(chan.id) {
            self.active_channel = None;
        }
        self.fanout.send(Push::Part { chan: chan.id });
    }

    /// Handle a connect request: validate, register the network, announce
    /// it, and ask the driver to open the transport.
    pub fn connect(&mut self, mut args: ConnectArgs) -> Vec<Action> {
        if self.relay.lock_network {
            // Deployments locked to one network refuse anything else.
            if !args.host.is_empty() && args.host != self.relay.defaults.host {
                self.emit_global_error("Hostname you specified is not allowed.");
                return vec![];
            }
            args.host = self.relay.defaults.host.clone();
            args.port = Some(self.relay.defaults.port);
            args.tls = self.relay.defaults.tls;
        }

        if args.host.is_empty() {
            self.emit_global_error("You must specify a hostname to connect.");
            return vec![];
        }

        let nick = if args.nick.is_empty() {
            self.relay.defaults.nick.clone()
        } else {
            args.nick.clone()
        };
        let username = args
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| {
                let derived: String = nick.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
                if derived.is_empty() {
                    "limpet".to_string()
                } else {
                    derived
                }
            });
        let realname = args
            .realname
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "Limpet User".to_string());
        let port = args.port.unwrap_or(if args.tls { 6697 } else { 6667 });
        let name = if args.name.is_empty() {
            args.host.clone()
        } else {
            args.name.clone()
        };

        let id = self.ids.next();
        let lobby = Chan::new(self.ids.next(), ChanKind::Lobby, name.clone());
        let network = Network {
            id,
            name,
            host: args.host,
            port,
            tls: args.tls,
            nick,
            username,
            realname,
            password: args.password,
            channels: vec![lobby],
            connected: false,
            phase: RegPhase::Connecting,
            commands: args.commands,
            autojoin: args.join,
            list_cache: Vec::new(),
        };
        // Announce before the handshake completes so viewers can render the
        // pending connection.
        self.fanout.send(Push::Network {
            network: serde_json::to_value(&network).unwrap_or_default(),
        });
        self.networks.push(network);
        vec![Action::OpenConnection { network: id }]
    }

    /// Serve a backward page of history: up to `PAGE_SIZE` messages ending
    /// `already_have` messages before the end of the buffer. Read-only.
    pub fn more(&self, target: u64, already_have: usize) -> Vec<Msg> {
        let Some((ni, ci)) = self.find(target) else {
            return Vec::new();
        };
        let chan = &self.networks[ni].channels[ci];
        let end = chan.messages.len().saturating_sub(already_have);
        let start = end.saturating_sub(PAGE_SIZE);
        let page = chan.messages[start..end].to_vec();
        self.fanout.send(Push::More {
            chan: chan.id,
            messages: page.clone(),
        });
        page
    }

    /// Focus a channel: reset its unread accounting and make it the
    /// session-wide active channel. Unknown ids are a no-op.
    pub fn open(&mut self, target: u64) {
        if let Some((ni, ci)) = self.find(target) {
            let chan = &mut self.networks[ni].channels[ci];
            chan.unread = 0;
            chan.highlight = false;
            chan.first_unread = 0;
            self.active_channel = Some(chan.id);
        }
    }

    /// Apply an exact client-submitted ordering. Ids we do not know are
    /// skipped; entries the order does not mention are dropped.
    pub fn sort(&mut self, req: SortRequest) {
        match req.kind.as_str() {
            "networks" => {
                let mut sorted = Vec::new();
                for id in &req.order {
                    if let Some(pos) = self.networks.iter().position(|n| n.id == *id) {
                        sorted.push(self.networks.remove(pos));
                    }
                }
                self.networks = sorted;
            }
            "channels" => {
                let Some(ni) = req.network.and_then(|id| self.network_index(id)) else {
                    return;
                };
                let network = &mut self.networks[ni];
                let lobby = network.lobby_id();
                let mut sorted = Vec::new();
                for id in &req.order {
                    if let Some(pos) = network.channels.iter().position(|c| c.id == *id) {
                        sorted.push(network.channels.remove(pos));
                    }
                }
                // The lobby lives as long as its network and stays at index
                // 0, whatever order a viewer submits.
                match sorted.iter().position(|c| c.id == lobby) {
                    Some(0) => {}
                    Some(pos) => {
                        let chan = sorted.remove(pos);
                        sorted.insert(0, chan);
                    }
                    None => {
                        if let Some(pos) = network.channels.iter().position(|c| c.id == lobby) {
                            let chan = network.channels.remove(pos);
                            sorted.insert(0, chan);
                        }
                    }
                }
                network.channels = sorted;
            }
            _ => {}
        }
    }

    /// Push a channel's membership snapshot to viewers.
    pub fn names(&self, target: u64) {
        if let Some((ni, ci)) = self.find(target) {
            let chan = &self.networks[ni].channels[ci];
            self.fanout.send(Push::Names {
                chan: chan.id,
                users: chan.users.clone(),
            });
        }
    }

    /// Request a save. Unforced saves are debounced through a one-second
    /// coalescing timer; `force` writes immediately. Public deployments
    /// never save.
    pub fn save(&mut self, force: bool) -> Vec<Action> {
        if self.relay.public {
            return vec![];
        }
        if !force {
            self.save_epoch += 1;
            return vec![Action::ScheduleSave {
                epoch: self.save_epoch,
            }];
        }
        vec![Action::SaveNow]
    }

    /// The exportable state written on save. Passwords are deliberately
    /// absent; they only live in the config store.
    pub fn export_networks(&self) -> Vec<NetworkEntry> {
        self.networks
            .iter()
            .map(|n| NetworkEntry {
                name: n.name.clone(),
                host: n.host.clone(),
                port: n.port,
                tls: n.tls,
                nick: n.nick.clone(),
                username: Some(n.username.clone()),
                realname: Some(n.realname.clone()),
                channels: n
                    .channels
                    .iter()
                    .filter(|c| c.kind == ChanKind::Channel)
                    .map(|c| ChannelEntry {
                        name: c.name.clone(),
                        join: true,
                    })
                    .collect(),
                commands: n.commands.clone(),
            })
            .collect()
    }

    /// Write a new login password hash through the store, then re-read the
    /// config off disk and only adopt the hash if it actually stuck. A
    /// failed write must not leave memory and disk disagreeing across a
    /// restart.
    pub fn set_password(&mut self, store: &ConfigStore, hash: &str) -> bool {
        let patch = UserPatch {
            password: Some(hash.to_string()),
            networks: None,
        };
        if let Err(e) = store.update_user(&self.name, &patch) {
            tracing::warn!(user = %self.name, error = %e, "password update failed");
        }
        match store.load_user(&self.name) {
            Ok(cfg) if cfg.password.as_deref() == Some(hash) => {
                self.password = Some(hash.to_string());
                true
            }
            _ => false,
        }
    }

    /// Tear the session down: disconnect every viewer, then close every
    /// network, gracefully when registered, forcibly otherwise.
    pub fn quit(&mut self) -> Vec<Action> {
        self.fanout.disconnect_all();
        self.networks
            .iter()
            .map(|n| {
                if n.connected {
                    Action::QuitNetwork {
                        network: n.id,
                        message: None,
                    }
                } else {
                    Action::CloseConnection { network: n.id }
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A session against an in-memory deployment config, no logging.
    pub fn client() -> Client {
        client_with_config(RelayConfig::default())
    }

    pub fn client_with_config(relay: RelayConfig) -> Client {
        Client::new(
            1,
            "alice",
            &UserConfig::default(),
            Arc::new(relay),
            IdSeq::new(),
            Fanout::new(64),
            ChatLogger::disabled(),
        )
    }

    /// Add a registered network with the given channels; returns its id.
    pub fn add_network(client: &mut Client, nick: &str, channels: &[&str]) -> u64 {
        let actions = client.connect(ConnectArgs {
            host: "irc.example.org".into(),
            nick: nick.into(),
            ..Default::default()
        });
        assert_eq!(actions.len(), 1);
        let ni = client.networks.len() - 1;
        client.networks[ni].connected = true;
        client.networks[ni].phase = RegPhase::Registered;
        for name in channels {
            let chan = Chan::new(client.ids.next(), ChanKind::Channel, *name);
            client.networks[ni].channels.push(chan);
        }
        client.networks[ni].id
    }

    pub fn chan_id(client: &Client, ni: usize, name: &str) -> u64 {
        let ci = client.networks[ni].find_chan(name).unwrap();
        client.networks[ni].channels[ci].id
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn connect_refuses_foreign_host_when_locked() {
        let relay = RelayConfig {
            lock_network: true,
            defaults: crate::config::model::NetworkDefaults {
                host: "irc.example.org".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut client = client_with_config(relay);
        let mut rx = client.fanout.subscribe();

        let actions = client.connect(ConnectArgs {
            host: "evil.example.org".into(),
            nick: "amy".into(),
            ..Default::default()
        });

        assert!(actions.is_empty());
        assert!(client.networks.is_empty());
        match rx.try_recv().unwrap() {
            Push::Msg { chan: None, msg } => assert_eq!(msg.kind, MsgKind::Error),
            other => panic!("unexpected push: {:?}", other),
        }
    }

    #[test]
    fn connect_forces_defaults_when_locked_and_host_matches() {
        let relay = RelayConfig {
            lock_network: true,
            defaults: crate::config::model::NetworkDefaults {
                host: "irc.example.org".into(),
                port: 6697,
                tls: true,
                nick: "limpet-user".into(),
            },
            ..Default::default()
        };
        let mut client = client_with_config(relay);
        let actions = client.connect(ConnectArgs {
            host: String::new(),
            port: Some(9999),
            nick: "amy".into(),
            ..Default::default()
        });
        assert_eq!(actions.len(), 1);
        let network = &client.networks[0];
        assert_eq!(network.host, "irc.example.org");
        assert_eq!(network.port, 6697);
        assert!(network.tls);
    }

    #[test]
    fn connect_rejects_empty_host() {
        let mut client = client();
        let actions = client.connect(ConnectArgs {
            nick: "amy".into(),
            ..Default::default()
        });
        assert!(actions.is_empty());
        assert!(client.networks.is_empty());
    }

    #[test]
    fn connect_derives_username_and_realname() {
        let mut client = client();
        client.connect(ConnectArgs {
            host: "irc.example.org".into(),
            nick: "amy[away]!".into(),
            ..Default::default()
        });
        let network = &client.networks[0];
        assert_eq!(network.username, "amyaway");
        assert_eq!(network.realname, "Limpet User");
        assert_eq!(network.channels[0].kind, ChanKind::Lobby);
    }

    #[test]
    fn connect_announces_network_without_password() {
        let mut client = client();
        let mut rx = client.fanout.subscribe();
        client.connect(ConnectArgs {
            host: "irc.example.org".into(),
            nick: "amy".into(),
            password: Some("secret".into()),
            ..Default::default()
        });
        match rx.try_recv().unwrap() {
            Push::Network { network } => {
                assert!(network.get("password").is_none());
                assert_eq!(network["host"], "irc.example.org");
            }
            other => panic!("unexpected push: {:?}", other),
        }
    }

    #[test]
    fn more_pages_backwards_and_clamps() {
        let mut client = client();
        add_network(&mut client, "amy", &["#rust"]);
        let id = chan_id(&client, 0, "#rust");
        let (ni, ci) = client.find(id).unwrap();
        for i in 0..250 {
            let msg = Msg::new(client.ids.next(), MsgKind::Message, "bob", format!("m{i}"));
            client.networks[ni].channels[ci].messages.push(msg);
        }

        let page = client.more(id, 0);
        assert_eq!(page.len(), 100);
        assert_eq!(page[0].text, "m150");
        assert_eq!(page[99].text, "m249");

        let page = client.more(id, 100);
        assert_eq!(page.len(), 100);
        assert_eq!(page[0].text, "m50");
        assert_eq!(page[99].text, "m149");

        let page = client.more(id, 240);
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].text, "m0");
        assert_eq!(page[9].text, "m9");

        // Read-only: unread and history untouched.
        assert_eq!(client.networks[ni].channels[ci].messages.len(), 250);
        assert_eq!(client.networks[ni].channels[ci].unread, 0);
    }

    #[test]
    fn open_resets_unread_state_and_sets_focus() {
        let mut client = client();
        add_network(&mut client, "amy", &["#rust"]);
        let id = chan_id(&client, 0, "#rust");
        let (ni, ci) = client.find(id).unwrap();
        client.networks[ni].channels[ci].unread = 7;
        client.networks[ni].channels[ci].highlight = true;
        client.networks[ni].channels[ci].first_unread = 42;

        client.open(id);
        let chan = &client.networks[ni].channels[ci];
        assert_eq!(chan.unread, 0);
        assert!(!chan.highlight);
        assert_eq!(chan.first_unread, 0);
        assert_eq!(client.active_channel, Some(id));

        // Idempotent.
        client.open(id);
        assert_eq!(client.active_channel, Some(id));

        // Unknown id: no-op.
        client.open(999_999);
        assert_eq!(client.active_channel, Some(id));
    }

    #[test]
    fn sort_networks_drops_unmentioned_entries() {
        let mut client = client();
        let a = add_network(&mut client, "amy", &[]);
        let b = add_network(&mut client, "amy", &[]);
        let c = add_network(&mut client, "amy", &[]);
        assert_eq!(client.networks.len(), 3);

        client.sort(SortRequest {
            kind: "networks".into(),
            order: vec![c, 999_999, a],
            network: None,
        });

        let order: Vec<u64> = client.networks.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![c, a]);
        let _ = b; // dropped from view, not merely moved
    }

    #[test]
    fn sort_channels_never_drops_or_displaces_the_lobby() {
        let mut client = client();
        let nid = add_network(&mut client, "amy", &["#a", "#b"]);
        let lobby = client.networks[0].lobby_id();
        let a = chan_id(&client, 0, "#a");
        let b = chan_id(&client, 0, "#b");

        // Order omits the lobby entirely: it is re-pinned at index 0.
        client.sort(SortRequest {
            kind: "channels".into(),
            order: vec![b, a],
            network: Some(nid),
        });
        let order: Vec<u64> = client.networks[0].channels.iter().map(|c| c.id).collect();
        assert_eq!(order, vec![lobby, b, a]);

        // Even an empty order leaves the lobby in place, so lobby-bound
        // events still have somewhere to land.
        client.sort(SortRequest {
            kind: "channels".into(),
            order: vec![],
            network: Some(nid),
        });
        assert_eq!(client.networks[0].lobby_id(), lobby);
        client.lobby_error(0, "whoops");
        assert_eq!(client.networks[0].channels[0].messages.len(), 1);

        // A misplaced lobby is moved back to the front.
        let c = {
            let chan = Chan::new(client.ids.next(), ChanKind::Channel, "#c");
            let id = chan.id;
            client.networks[0].channels.push(chan);
            id
        };
        client.sort(SortRequest {
            kind: "channels".into(),
            order: vec![c, lobby],
            network: Some(nid),
        });
        let order: Vec<u64> = client.networks[0].channels.iter().map(|c| c.id).collect();
        assert_eq!(order, vec![lobby, c]);
    }

    #[test]
    fn sort_channels_applies_within_one_network() {
        let mut client = client();
        let nid = add_network(&mut client, "amy", &["#a", "#b"]);
        let lobby = client.networks[0].lobby_id();
        let a = chan_id(&client, 0, "#a");
        let b = chan_id(&client, 0, "#b");

        client.sort(SortRequest {
            kind: "channels".into(),
            order: vec![lobby, b, a],
            network: Some(nid),
        });
        let order: Vec<u64> = client.networks[0].channels.iter().map(|c| c.id).collect();
        assert_eq!(order, vec![lobby, b, a]);
    }

    #[test]
    fn deliver_skips_unread_for_active_channel() {
        let mut client = client();
        add_network(&mut client, "amy", &["#rust"]);
        let id = chan_id(&client, 0, "#rust");
        client.open(id);

        let msg = Msg::new(client.ids.next(), MsgKind::Message, "bob", "hi");
        let (ni, ci) = client.find(id).unwrap();
        client.deliver(ni, ci, msg, true);

        let chan = &client.networks[ni].channels[ci];
        assert_eq!(chan.unread, 0);
        assert!(!chan.highlight);
        assert_eq!(chan.messages.len(), 1);
    }

    #[test]
    fn deliver_counts_unread_and_marks_first_unread() {
        let mut client = client();
        add_network(&mut client, "amy", &["#rust"]);
        let id = chan_id(&client, 0, "#rust");
        let (ni, ci) = client.find(id).unwrap();

        let first = Msg::new(client.ids.next(), MsgKind::Message, "bob", "one");
        let first_id = first.id;
        client.deliver(ni, ci, first, true);
        let mut second = Msg::new(client.ids.next(), MsgKind::Message, "bob", "two");
        second.highlight = true;
        client.deliver(ni, ci, second, true);

        let chan = &client.networks[ni].channels[ci];
        assert_eq!(chan.unread, 2);
        assert!(chan.highlight);
        assert_eq!(chan.first_unread, first_id);
    }

    #[test]
    fn save_is_debounced_until_forced() {
        let mut client = client();
        let first = client.save(false);
        let second = client.save(false);
        assert_eq!(first, vec![Action::ScheduleSave { epoch: 1 }]);
        assert_eq!(second, vec![Action::ScheduleSave { epoch: 2 }]);
        assert_eq!(client.save(true), vec![Action::SaveNow]);
    }

    #[test]
    fn save_is_skipped_in_public_mode() {
        let relay = RelayConfig {
            public: true,
            ..Default::default()
        };
        let mut client = client_with_config(relay);
        assert!(client.save(false).is_empty());
        assert!(client.save(true).is_empty());
    }

    #[test]
    fn export_covers_channels_and_commands_but_never_passwords() {
        let mut client = client();
        client.connect(ConnectArgs {
            host: "irc.example.org".into(),
            nick: "amy".into(),
            password: Some("secret".into()),
            commands: vec!["/msg NickServ identify x".into()],
            ..Default::default()
        });
        let ni = 0;
        let chan = Chan::new(client.ids.next(), ChanKind::Channel, "#rust");
        client.networks[ni].channels.push(chan);
        let query = Chan::new(client.ids.next(), ChanKind::Query, "bob");
        client.networks[ni].channels.push(query);

        let exported = client.export_networks();
        assert_eq!(exported.len(), 1);
        let entry = &exported[0];
        assert_eq!(entry.host, "irc.example.org");
        assert_eq!(entry.commands.len(), 1);
        // Only joinable channels; the lobby and queries are session-local.
        assert_eq!(entry.channels.len(), 1);
        assert_eq!(entry.channels[0].name, "#rust");
        assert!(entry.channels[0].join);
        let text = toml::to_string(&entry).unwrap();
        assert!(!text.contains("secret"));
    }

    #[test]
    fn set_password_adopts_hash_only_after_readback() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store
            .save_user(
                "alice",
                &UserConfig {
                    password: Some("oldhash".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let mut client = client();
        client.password = Some("oldhash".into());
        assert!(client.set_password(&store, "newhash"));
        assert_eq!(client.password.as_deref(), Some("newhash"));
        assert_eq!(
            store.load_user("alice").unwrap().password.as_deref(),
            Some("newhash")
        );
    }

    #[test]
    fn set_password_keeps_old_hash_when_storage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        // A corrupt document makes both the read-modify-write and the
        // read-back fail, leaving the old bytes on disk.
        std::fs::write(dir.path().join("alice.toml"), "password = [broken").unwrap();

        let mut client = client();
        client.password = Some("oldhash".into());
        assert!(!client.set_password(&store, "newhash"));
        assert_eq!(client.password.as_deref(), Some("oldhash"));
    }

    #[test]
    fn quit_disconnects_viewers_and_closes_networks() {
        let mut client = client();
        let a = add_network(&mut client, "amy", &[]);
        let b = add_network(&mut client, "amy", &[]);
        client.networks[1].connected = false;
        let mut rx = client.fanout.subscribe();

        let actions = client.quit();
        assert_eq!(
            actions,
            vec![
                Action::QuitNetwork {
                    network: a,
                    message: None
                },
                Action::CloseConnection { network: b },
            ]
        );
        assert!(matches!(rx.try_recv().unwrap(), Push::Disconnect));
    }

    #[test]
    fn tokens_are_unique_per_session() {
        let a = client();
        let b = client();
        assert_eq!(a.token.len(), 96);
        assert_ne!(a.token, b.token);
    }
}
