//! Session manager: one always-on driver task per stored user.

use crate::client::driver;
use crate::client::event::{ClientEvent, ConnectArgs};
use crate::client::models::IdSeq;
use crate::client::Client;
use crate::config::model::RelayConfig;
use crate::config::{ConfigStore, UserConfig};
use crate::fanout::Fanout;
use crate::identd::IdentRegistry;
use crate::logging::ChatLogger;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Handle to a running session: its event inbox and its fan-out group.
pub struct SessionHandle {
    pub tx: mpsc::UnboundedSender<ClientEvent>,
    pub fanout: Fanout,
}

pub struct ClientManager {
    relay: Arc<RelayConfig>,
    store: ConfigStore,
    ids: IdSeq,
    ident: IdentRegistry,
    next_client: u64,
    sessions: HashMap<String, SessionHandle>,
}

impl ClientManager {
    pub fn new(relay: Arc<RelayConfig>, store: ConfigStore) -> Self {
        Self {
            relay,
            store,
            ids: IdSeq::new(),
            ident: IdentRegistry::new(),
            next_client: 0,
            sessions: HashMap::new(),
        }
    }

    pub fn ident_registry(&self) -> IdentRegistry {
        self.ident.clone()
    }

    pub fn session(&self, name: &str) -> Option<&SessionHandle> {
        self.sessions.get(name)
    }

    /// Start a session for every stored user. Returns how many came up.
    pub fn load_users(&mut self) -> usize {
        let names = self.store.list_users();
        let mut started = 0;
        for name in names {
            match self.store.load_user(&name) {
                Ok(cfg) => {
                    self.spawn_session(&name, &cfg);
                    started += 1;
                }
                Err(e) => {
                    tracing::error!(user = %name, error = %e, "could not load user");
                }
            }
        }
        started
    }

    /// Spawn one session's driver task and replay its saved networks into
    /// connect requests, staggered a second apart.
    pub fn spawn_session(&mut self, name: &str, cfg: &UserConfig) {
        let fanout = Fanout::default();
        let logger = ChatLogger::new(self.relay.log && cfg.log, self.relay.log_dir.clone());
        self.next_client += 1;
        let client = Client::new(
            self.next_client,
            name,
            cfg,
            self.relay.clone(),
            self.ids.clone(),
            fanout.clone(),
            logger,
        );

        let (tx, rx) = mpsc::unbounded_channel();
        for (i, entry) in cfg.networks.iter().enumerate() {
            let args = ConnectArgs {
                name: entry.name.clone(),
                host: entry.host.clone(),
                port: (entry.port != 0).then_some(entry.port),
                tls: entry.tls,
                nick: entry.nick.clone(),
                username: entry.username.clone(),
                realname: entry.realname.clone(),
                password: None,
                commands: entry.commands.clone(),
                join: entry.join_list(),
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                sleep(Duration::from_secs(i as u64)).await;
                let _ = tx.send(ClientEvent::Connect(args));
            });
        }

        tokio::spawn(driver::run(
            client,
            rx,
            tx.clone(),
            self.store.clone(),
            self.ident.clone(),
        ));
        self.sessions.insert(name.to_string(), SessionHandle { tx, fanout });
    }

    /// Ask every session to shut down.
    pub fn quit_all(&mut self) {
        for (name, handle) in self.sessions.drain() {
            tracing::info!(user = %name, "stopping session");
            let _ = handle.tx.send(ClientEvent::Quit);
        }
    }
}
