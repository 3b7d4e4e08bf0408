//! Initialisation des logs (tracing-subscriber, sortie stderr).
//!
//! `RUST_LOG` garde la main s'il est défini ; sinon `--debug` choisit entre
//! `debug` et `info` pour les crates du bridge.

use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &["nagmq_core", "mq2nagcmd", "send_check"];

fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|c| format!("{c}={level}")));
    directives.join(",")
}

/// À appeler une seule fois, au démarrage du binaire. Un second appel est ignoré.
pub fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            default_directives(false),
            "warn,nagmq_core=info,mq2nagcmd=info,send_check=info"
        );
        assert!(default_directives(true).contains("nagmq_core=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging(false);
        init_logging(true);
    }
}
