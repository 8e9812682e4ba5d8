//! Configuration loading and the per-user config store.

pub mod model;

use crate::error::RelayError;
use std::path::PathBuf;

pub use model::{ChannelEntry, NetworkEntry, RelayConfig, UserConfig, UserPatch};

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("limpet")
        .join("config.toml")
}

/// Load the deployment config, falling back to defaults when the file does
/// not exist.
pub fn load_config() -> Result<RelayConfig, RelayError> {
    let path = config_path();
    if !path.exists() {
        return Ok(RelayConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| RelayError::ReadConfig {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| RelayError::ParseConfig { path, source })
}

/// Disk-backed store of per-user configuration, one TOML document per user.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    users_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(users_dir: impl Into<PathBuf>) -> Self {
        Self {
            users_dir: users_dir.into(),
        }
    }

    fn user_path(&self, name: &str) -> PathBuf {
        // Keep user-supplied names from escaping the users directory.
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.users_dir.join(format!("{safe}.toml"))
    }

    /// Names of all stored users.
    pub fn list_users(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.users_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                if path.extension().and_then(|x| x.to_str()) == Some("toml") {
                    path.file_stem()
                        .and_then(|s| s.to_str())
                        .map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }

    pub fn load_user(&self, name: &str) -> Result<UserConfig, RelayError> {
        let path = self.user_path(name);
        if !path.exists() {
            return Err(RelayError::UnknownUser(name.to_string()));
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| RelayError::ReadConfig {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| RelayError::ParseConfig { path, source })
    }

    pub fn save_user(&self, name: &str, config: &UserConfig) -> Result<(), RelayError> {
        let path = self.user_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| RelayError::WriteConfig {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = toml::to_string_pretty(config)?;
        std::fs::write(&path, contents).map_err(|source| RelayError::WriteConfig { path, source })
    }

    /// Read-modify-write a user's config with a partial update. Fields the
    /// patch leaves `None` keep their stored value. A user with no document
    /// yet starts from defaults; an unreadable document is an error, never
    /// overwritten.
    pub fn update_user(&self, name: &str, patch: &UserPatch) -> Result<(), RelayError> {
        let mut config = match self.load_user(name) {
            Ok(config) => config,
            Err(RelayError::UnknownUser(_)) => UserConfig::default(),
            Err(e) => return Err(e),
        };
        if let Some(ref password) = patch.password {
            config.password = Some(password.clone());
        }
        if let Some(ref networks) = patch.networks {
            config.networks = networks.clone();
        }
        self.save_user(name, &config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::NetworkEntry;

    #[test]
    fn update_merges_into_existing_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store
            .save_user(
                "amy",
                &UserConfig {
                    password: Some("old".into()),
                    log: true,
                    networks: Vec::new(),
                },
            )
            .unwrap();

        store
            .update_user(
                "amy",
                &UserPatch {
                    password: None,
                    networks: Some(vec![NetworkEntry {
                        host: "irc.example.org".into(),
                        ..Default::default()
                    }]),
                },
            )
            .unwrap();

        let cfg = store.load_user("amy").unwrap();
        assert_eq!(cfg.password.as_deref(), Some("old"));
        assert_eq!(cfg.networks.len(), 1);
    }

    #[test]
    fn update_does_not_clobber_an_unreadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        std::fs::write(dir.path().join("amy.toml"), "password = [broken").unwrap();

        let result = store.update_user(
            "amy",
            &UserPatch {
                password: Some("newhash".into()),
                networks: None,
            },
        );
        assert!(matches!(result, Err(RelayError::ParseConfig { .. })));
        // The stored bytes survive untouched.
        let raw = std::fs::read_to_string(dir.path().join("amy.toml")).unwrap();
        assert_eq!(raw, "password = [broken");
    }

    #[test]
    fn update_starts_from_defaults_for_a_new_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store
            .update_user(
                "amy",
                &UserPatch {
                    password: Some("hash".into()),
                    networks: None,
                },
            )
            .unwrap();
        assert_eq!(store.load_user("amy").unwrap().password.as_deref(), Some("hash"));
    }

    #[test]
    fn unknown_user_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        assert!(matches!(
            store.load_user("ghost"),
            Err(RelayError::UnknownUser(_))
        ));
    }

    #[test]
    fn list_users_finds_toml_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store.save_user("bob", &UserConfig::default()).unwrap();
        store.save_user("amy", &UserConfig::default()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert_eq!(store.list_users(), vec!["amy", "bob"]);
    }

    #[test]
    fn user_names_cannot_escape_the_users_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store
            .save_user("../evil", &UserConfig::default())
            .unwrap();
        assert!(dir.path().join(".._evil.toml").exists());
    }
}
