//! Options de `send_check`, compatibles avec l'usage habituel de send_nsca.

use anyhow::{Context, Result};
use clap::Parser;
use nagmq_core::codec::LineMode;
use nagmq_core::config::BridgeConfig;
use nagmq_core::model::StatePolicy;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BUS_URL_FILE: &str = "/etc/nagios/send_check_url";

#[derive(Debug, Parser)]
#[command(
    name = "send_check",
    version,
    about = "Read passive check results on stdin and publish them to the message bus"
)]
pub struct Cli {
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// URL du broker. Absente => première ligne de --bus-url-file
    #[arg(long, env = "BUS_URL")]
    pub bus_url: Option<String>,

    #[arg(long, default_value = DEFAULT_BUS_URL_FILE)]
    pub bus_url_file: PathBuf,

    /// Accepté pour compatibilité send_nsca, ignoré
    #[arg(short = 'H', long = "host")]
    pub nsca_host: Option<String>,

    #[arg(long, alias = "topic")]
    pub topic_prefix: Option<String>,

    #[arg(long)]
    pub exchange: Option<String>,

    /// Lignes au format send_nsca (champs séparés par des tabulations)
    #[arg(long)]
    pub emulate_send_nsca: bool,

    /// coerce | reject
    #[arg(long)]
    pub state_policy: Option<StatePolicy>,

    #[arg(long, short)]
    pub debug: bool,
}

impl Cli {
    /// Applique les flags. L'URL du bus vient du flag/env, sinon du fichier
    /// d'URL s'il existe, sinon de la config.
    pub async fn apply(&self, cfg: &mut BridgeConfig) -> Result<()> {
        if let Some(url) = self.bus_url.as_ref().filter(|u| !u.trim().is_empty()) {
            cfg.bus.url = url.trim().to_string();
        } else if let Some(url) = read_url_file(&self.bus_url_file).await? {
            cfg.bus.url = url;
        }
        // émetteur ponctuel : jamais de session persistante
        cfg.bus.shared = false;

        if let Some(exchange) = &self.exchange {
            cfg.bus.exchange = exchange.clone();
        }
        if let Some(prefix) = &self.topic_prefix {
            cfg.outbound.topic_prefix = prefix.clone();
        }
        if self.emulate_send_nsca {
            cfg.outbound.mode = LineMode::LegacyTab;
        }
        if let Some(policy) = self.state_policy {
            cfg.outbound.state_policy = policy;
        }
        if let Some(host) = &self.nsca_host {
            debug!("Ignoring -H {}", host);
        }
        Ok(())
    }
}

/// Première ligne non vide du fichier, `None` si le fichier n'existe pas
async fn read_url_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading bus URL from {}", path.display()))?;
    Ok(txt
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut cli =
            Cli::try_parse_from(std::iter::once("send_check").chain(args.iter().copied())).unwrap();
        if !args.contains(&"--bus-url") {
            cli.bus_url = None;
        }
        cli
    }

    #[tokio::test]
    async fn test_url_file_is_used_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("send_check_url");
        std::fs::write(&path, "mqtt://from-file:1883\nignored\n").unwrap();

        let cli = parse(&["--bus-url-file", path.to_str().unwrap(), "-H", "nagios.example.com"]);
        let mut cfg = BridgeConfig::default();
        cli.apply(&mut cfg).await.unwrap();
        assert_eq!(cfg.bus.url, "mqtt://from-file:1883");
    }

    #[tokio::test]
    async fn test_flag_wins_over_url_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("send_check_url");
        std::fs::write(&path, "mqtt://from-file:1883\n").unwrap();

        let cli = parse(&[
            "--bus-url",
            "mqtt://from-flag:1883",
            "--bus-url-file",
            path.to_str().unwrap(),
        ]);
        let mut cfg = BridgeConfig::default();
        cli.apply(&mut cfg).await.unwrap();
        assert_eq!(cfg.bus.url, "mqtt://from-flag:1883");
    }

    #[tokio::test]
    async fn test_missing_url_file_keeps_config() {
        let dir = tempfile::tempdir().unwrap();
        let cli = parse(&[
            "--bus-url-file",
            dir.path().join("absent").to_str().unwrap(),
            "--emulate-send-nsca",
            "--topic",
            "checks",
            "--state-policy",
            "reject",
        ]);
        let mut cfg = BridgeConfig::default();
        cfg.bus.shared = true;
        cli.apply(&mut cfg).await.unwrap();

        assert_eq!(cfg.bus.url, "mqtt://localhost:1883");
        assert!(!cfg.bus.shared);
        assert_eq!(cfg.outbound.mode, LineMode::LegacyTab);
        assert_eq!(cfg.outbound.topic_prefix, "checks");
        assert_eq!(cfg.outbound.state_policy, StatePolicy::Reject);
    }
}
