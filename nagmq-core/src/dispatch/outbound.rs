//! Sens sortant : lignes texte (stdin) -> enveloppes publiées sur le bus.
//! Une ligne invalide ou une publication ratée n'interrompt jamais le flux.

use crate::bus::Bus;
use crate::codec::{decode, LineMode};
use crate::envelope::{generic_to_envelope, to_envelope, Envelope, HEADER_CLIENT_VERSION};
use crate::error::DispatchError;
use crate::model::{Decoded, StatePolicy};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct OutboundOptions {
    pub topic_prefix: String,
    pub mode: LineMode,
    pub state_policy: StatePolicy,
    /// Valeur du header `client-version`, ex: `send_check-0.1.0`
    pub client_version: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutboundStats {
    pub read: u64,
    pub published: u64,
    pub rejected: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Sort d'une ligne d'entrée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Published,
    Rejected,
    PublishFailed,
    Skipped,
}

pub struct OutboundPublisher {
    bus: Arc<dyn Bus>,
    options: OutboundOptions,
}

impl OutboundPublisher {
    pub fn new(bus: Arc<dyn Bus>, options: OutboundOptions) -> Self {
        Self { bus, options }
    }

    /// Lit jusqu'à la fin du flux (ou l'arrêt demandé). Seule une erreur de lecture est fatale.
    pub async fn run<R>(
        &self,
        reader: R,
        shutdown: CancellationToken,
    ) -> Result<OutboundStats, DispatchError>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut lines = reader.lines();
        let mut stats = OutboundStats::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stop reading input");
                    break;
                }
                next = lines.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("Reading input failed: {}", e);
                    return Err(DispatchError::Input(e));
                }
            };

            stats.read += 1;
            match self.handle_line(&line).await {
                LineOutcome::Published => stats.published += 1,
                LineOutcome::Rejected => stats.rejected += 1,
                LineOutcome::PublishFailed => stats.failed += 1,
                LineOutcome::Skipped => stats.skipped += 1,
            }
        }

        info!(
            "Input done (read: {}, published: {}, rejected: {}, failed: {})",
            stats.read, stats.published, stats.rejected, stats.failed
        );
        Ok(stats)
    }

    pub async fn handle_line(&self, line: &str) -> LineOutcome {
        if line.trim().is_empty() {
            debug!("Skipping blank line");
            return LineOutcome::Skipped;
        }

        let envelope = match self.build_envelope(line) {
            Ok(envelope) => envelope,
            Err(reason) => {
                error!("error when parsing [{}]: {}", line, reason);
                return LineOutcome::Rejected;
            }
        };

        debug!("Will send {:?} to [{}]", envelope.headers, envelope.topic);
        match self.bus.publish(&envelope).await {
            Ok(()) => LineOutcome::Published,
            Err(e) => {
                warn!("Publish of [{}] failed: {}", line, e);
                LineOutcome::PublishFailed
            }
        }
    }

    fn build_envelope(&self, line: &str) -> Result<Envelope, String> {
        let decoded = decode(line, self.options.mode, self.options.state_policy)
            .map_err(|e| e.to_string())?;
        let prefix = self.options.topic_prefix.as_str();
        let envelope = match &decoded {
            Decoded::Check(result) => to_envelope(result, prefix),
            Decoded::Generic(command) => generic_to_envelope(command, prefix),
        }
        .map_err(|e| e.to_string())?;

        Ok(match &self.options.client_version {
            Some(version) => envelope.with_header(HEADER_CLIENT_VERSION, version.as_str()),
            None => envelope,
        })
    }
}
