//! Taxonomie d'erreurs du bridge.
//!
//! - `ParseError` / `DecodeError` : entrée invalide, message ignoré, la boucle continue
//! - `TransportError` : bus indisponible (fatal au démarrage, loggé ensuite)
//! - `SinkError` : fichier de commandes inutilisable (fatal côté entrant)
//! - `DispatchError` : cause d'arrêt d'une boucle de dispatch

/// Ligne texte non conforme à la grammaire attendue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing '[timestamp]' prefix")]
    MissingTimestamp,
    #[error("invalid timestamp '{0}'")]
    BadTimestamp(String),
    #[error("missing command name")]
    MissingCommand,
    #[error("unsupported command '{0}'")]
    UnsupportedCommand(String),
    #[error("{command} expects {expected} arguments, got {got}")]
    WrongArity {
        command: String,
        expected: usize,
        got: usize,
    },
    #[error("expected 3 (host) or 4 (service) tab-separated fields, got {0}")]
    BadFieldCount(usize),
    #[error("empty hostname")]
    EmptyHostname,
    #[error("empty service description")]
    EmptyServiceDescription,
    #[error("invalid state '{0}'")]
    BadState(String),
}

/// Enveloppe bus impossible à convertir en CheckResult
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("envelope has no 'command' header")]
    MissingCommand,
    #[error("command not supported: {0}")]
    UnsupportedCommand(String),
    #[error("malformed body: {0}")]
    Format(#[source] serde_json::Error),
    #[error("invalid check result: {0}")]
    Validation(String),
}

/// Erreurs du transport bus
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid bus url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("can't connect to bus: {0}")]
    Connect(String),
    #[error("subscribe to '{pattern}' failed: {reason}")]
    Subscribe { pattern: String, reason: String },
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("bus connection closed")]
    Closed,
    #[error("frame error: {0}")]
    Frame(#[from] serde_json::Error),
}

/// Erreurs du fichier de commandes
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("can't open command file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("write to command file failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("command file not open")]
    NotOpen,
}

/// Cause d'arrêt non gracieux d'une boucle de dispatch
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("can't subscribe: {0}")]
    Subscribe(#[source] TransportError),
    #[error("can't open sink: {0}")]
    SinkOpen(#[source] SinkError),
    #[error("error while writing to cmdfile: {0}")]
    SinkWrite(#[source] SinkError),
    #[error("bus disconnected")]
    BusDisconnected,
    #[error("input read failed: {0}")]
    Input(#[source] std::io::Error),
}
