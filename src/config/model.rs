//! Configuration data model.
//!
//! Two layers: `RelayConfig` is the deployment-wide config loaded once at
//! startup, `UserConfig` is the per-user document the relay reads at login
//! and writes back on (debounced) saves. All structs derive
//! `Serialize`/`Deserialize` for TOML persistence and every field has a
//! default so a missing config file still works.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Deployment-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Public mode: sessions are throwaway, user configs are never saved.
    #[serde(default)]
    pub public: bool,
    /// Lock every user to the default network; connect requests naming any
    /// other host are refused.
    #[serde(default)]
    pub lock_network: bool,
    /// Enable the chat log sink.
    #[serde(default)]
    pub log: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_users_dir")]
    pub users_dir: PathBuf,
    #[serde(default)]
    pub defaults: NetworkDefaults,
    #[serde(default)]
    pub identd: IdentdConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            public: false,
            lock_network: false,
            log: false,
            log_dir: default_log_dir(),
            users_dir: default_users_dir(),
            defaults: NetworkDefaults::default(),
            identd: IdentdConfig::default(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("limpet")
}

fn default_log_dir() -> PathBuf {
    data_dir().join("logs")
}

fn default_users_dir() -> PathBuf {
    data_dir().join("users")
}

/// The network a connect request falls back to (and, with `lock_network`,
/// is forced onto).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDefaults {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub nick: String,
}

impl Default for NetworkDefaults {
    fn default() -> Self {
        Self {
            host: "irc.libera.chat".into(),
            port: 6697,
            tls: true,
            nick: "limpet-user".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentdConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_identd_bind")]
    pub bind: String,
}

impl Default for IdentdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_identd_bind(),
        }
    }
}

fn default_identd_bind() -> String {
    "0.0.0.0:113".into()
}

/// One user's saved state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Login password hash. Only ever lives here, never in fan-out payloads.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub log: bool,
    #[serde(default)]
    pub networks: Vec<NetworkEntry>,
}

fn default_true() -> bool {
    true
}

/// Exportable snapshot of one network, written on save and replayed into a
/// connect request at login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    /// Scripted post-connect commands.
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
}

impl NetworkEntry {
    /// Channels flagged for autojoin, in the comma-separated form the
    /// connect pipeline consumes.
    pub fn join_list(&self) -> String {
        self.channels
            .iter()
            .filter(|c| c.join)
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub name: String,
    #[serde(default = "default_true")]
    pub join: bool,
}

/// Partial update applied to a stored `UserConfig`. Fields left `None` keep
/// their stored value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub password: Option<String>,
    pub networks: Option<Vec<NetworkEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_list_skips_unflagged_channels() {
        let entry = NetworkEntry {
            host: "irc.example.org".into(),
            channels: vec![
                ChannelEntry {
                    name: "#a".into(),
                    join: true,
                },
                ChannelEntry {
                    name: "#b".into(),
                    join: false,
                },
                ChannelEntry {
                    name: "#c".into(),
                    join: true,
                },
            ],
            ..Default::default()
        };
        assert_eq!(entry.join_list(), "#a,#c");
    }

    #[test]
    fn user_config_roundtrips_through_toml() {
        let cfg = UserConfig {
            password: Some("hash".into()),
            log: true,
            networks: vec![NetworkEntry {
                name: "libera".into(),
                host: "irc.libera.chat".into(),
                port: 6697,
                tls: true,
                nick: "amy".into(),
                commands: vec!["/msg NickServ identify hunter2".into()],
                ..Default::default()
            }],
        };
        let text = toml::to_string(&cfg).unwrap();
        let back: UserConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.password.as_deref(), Some("hash"));
        assert_eq!(back.networks, cfg.networks);
    }
}
