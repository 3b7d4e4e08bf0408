use crate::codec::LineMode;
use crate::model::StatePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

pub const CONFIG_ENV: &str = "NAGMQ_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "nagmq.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("can't read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Configuration complète (fichier YAML, chaque section optionnelle)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub bus: BusConf,
    pub inbound: InboundConf,
    pub outbound: OutboundConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BusConf {
    pub url: String,
    /// Racine de namespace des topics côté broker
    pub exchange: String,
    /// File partagée entre instances (session persistante)
    pub shared: bool,
    pub shared_group: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InboundConf {
    pub cmd_file: PathBuf,
    pub topic_prefix: String,
    pub strip_fqdn: bool,
    pub selfcheck: SelfCheckConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SelfCheckConf {
    pub enabled: bool,
    /// `None` => hostname de la machine
    pub host: Option<String>,
    pub service: String,
    pub interval_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutboundConf {
    pub topic_prefix: String,
    pub mode: LineMode,
    pub state_policy: StatePolicy,
}

impl Default for BusConf {
    fn default() -> Self {
        Self {
            url: "mqtt://localhost:1883".into(),
            exchange: "monitoring".into(),
            shared: false,
            shared_group: "nagcmd-receiver".into(),
            keep_alive_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for InboundConf {
    fn default() -> Self {
        Self {
            cmd_file: PathBuf::from("/tmp/nagios-cmd-test"),
            topic_prefix: "check.results".into(),
            strip_fqdn: false,
            selfcheck: SelfCheckConf::default(),
        }
    }
}

impl Default for SelfCheckConf {
    fn default() -> Self {
        Self {
            enabled: true,
            host: None,
            service: "mq2nagcmd".into(),
            interval_secs: 60,
        }
    }
}

impl Default for OutboundConf {
    fn default() -> Self {
        Self {
            topic_prefix: "check.results".into(),
            mode: LineMode::Standard,
            state_policy: StatePolicy::Coerce,
        }
    }
}

impl InboundConf {
    /// Pattern de souscription : tout ce qui est sous le préfixe
    pub fn subscribe_pattern(&self) -> String {
        format!("{}.#", self.topic_prefix)
    }
}

/// Charge la config : `path` explicite, sinon `$NAGMQ_CONFIG`, sinon `nagmq.yaml`.
/// Fichier absent ou vide => valeurs par défaut.
pub async fn load_config(path: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return Ok(BridgeConfig::default());
    }

    let txt = fs::read_to_string(&path).await.map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if txt.trim().is_empty() {
        return Ok(BridgeConfig::default());
    }
    serde_yaml::from_str(&txt).map_err(|source| ConfigError::Yaml {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("absent.yaml"))).await.unwrap();
        assert_eq!(cfg, BridgeConfig::default());
        assert_eq!(cfg.inbound.subscribe_pattern(), "check.results.#");
        assert_eq!(cfg.inbound.selfcheck.interval_secs, 60);
    }

    #[tokio::test]
    async fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nagmq.yaml");
        std::fs::write(
            &path,
            "bus:\n  url: mqtt://broker:1884\n  shared: true\ninbound:\n  strip_fqdn: true\n  selfcheck:\n    enabled: false\noutbound:\n  mode: legacy-tab\n  state_policy: reject\n",
        )
        .unwrap();

        let cfg = load_config(Some(&path)).await.unwrap();
        assert_eq!(cfg.bus.url, "mqtt://broker:1884");
        assert!(cfg.bus.shared);
        assert_eq!(cfg.bus.exchange, "monitoring");
        assert!(cfg.inbound.strip_fqdn);
        assert!(!cfg.inbound.selfcheck.enabled);
        assert_eq!(cfg.inbound.selfcheck.service, "mq2nagcmd");
        assert_eq!(cfg.outbound.mode, LineMode::LegacyTab);
        assert_eq!(cfg.outbound.state_policy, StatePolicy::Reject);
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "bus: [not, a, map]\n").unwrap();
        assert!(matches!(load_config(Some(&path)).await, Err(ConfigError::Yaml { .. })));
    }
}
