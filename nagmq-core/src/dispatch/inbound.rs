//! Sens entrant : enveloppes du bus -> lignes du fichier de commandes.
//!
//! `Disconnected -> Subscribed -> Running -> Draining -> Stopped`

use crate::bus::Bus;
use crate::codec::encode;
use crate::envelope::{from_envelope, Envelope};
use crate::error::{DecodeError, DispatchError};
use crate::model::strip_fqdn;
use crate::sink::CommandSink;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundState {
    Disconnected,
    Subscribed,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct InboundOptions {
    /// Pattern de souscription (ex: `check.results.#`)
    pub pattern: String,
    /// Tronque le hostname au premier `.` avant écriture
    pub strip_fqdn: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InboundStats {
    pub received: u64,
    pub written: u64,
    pub dropped: u64,
}

pub struct InboundDispatcher<S: CommandSink> {
    bus: Arc<dyn Bus>,
    sink: S,
    options: InboundOptions,
    state: watch::Sender<InboundState>,
    stats: InboundStats,
}

impl<S: CommandSink> InboundDispatcher<S> {
    pub fn new(bus: Arc<dyn Bus>, sink: S, options: InboundOptions) -> Self {
        let (state, _) = watch::channel(InboundState::Disconnected);
        Self {
            bus,
            sink,
            options,
            state,
            stats: InboundStats::default(),
        }
    }

    pub fn state(&self) -> InboundState {
        *self.state.borrow()
    }

    /// Suivi des transitions d'état (ex: démarrer le selfcheck une fois `Running`)
    pub fn watch_state(&self) -> watch::Receiver<InboundState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> InboundStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Boucle principale. `Ok(())` uniquement sur arrêt demandé via `shutdown`.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), DispatchError> {
        let mut deliveries = match self.bus.subscribe(&self.options.pattern).await {
            Ok(deliveries) => deliveries,
            Err(e) => {
                error!("Can't get events channel from bus: {}", e);
                self.set_state(InboundState::Stopped);
                return Err(DispatchError::Subscribe(e));
            }
        };
        self.set_state(InboundState::Subscribed);

        if let Err(e) = self.sink.open().await {
            error!("Can't open command file: {}", e);
            self.set_state(InboundState::Stopped);
            return Err(DispatchError::SinkOpen(e));
        }
        self.set_state(InboundState::Running);
        info!("Connected to bus and cmd file, entering main loop");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                delivery = deliveries.recv() => match delivery {
                    Some(envelope) => {
                        if let Err(e) = self.handle(envelope).await {
                            error!("{}, exiting", e);
                            break Err(e);
                        }
                    }
                    None => {
                        warn!("Bus disconnected");
                        break Err(DispatchError::BusDisconnected);
                    }
                },
            }
        };

        self.set_state(InboundState::Draining);
        deliveries.close();
        if let Err(e) = self.sink.flush().await {
            warn!("Flushing command file failed: {}", e);
        }
        self.set_state(InboundState::Stopped);
        info!(
            "Exiting main loop (received: {}, written: {}, dropped: {})",
            self.stats.received, self.stats.written, self.stats.dropped
        );
        outcome
    }

    /// Traite une enveloppe. Seule une erreur d'écriture remonte.
    async fn handle(&mut self, envelope: Envelope) -> Result<(), DispatchError> {
        self.stats.received += 1;

        let result = match from_envelope(&envelope) {
            Ok(result) => result,
            Err(e) => {
                self.stats.dropped += 1;
                log_dropped(&envelope, &e);
                return Ok(());
            }
        };

        let result = if self.options.strip_fqdn {
            result.map_hostname(strip_fqdn)
        } else {
            result
        };

        let line = encode(&result);
        debug!("Got command [{}] -> {}", result.command_name(), line);

        self.sink
            .append(&line)
            .await
            .map_err(DispatchError::SinkWrite)?;
        self.stats.written += 1;
        Ok(())
    }

    fn set_state(&self, state: InboundState) {
        debug!("Inbound dispatcher -> {:?}", state);
        self.state.send_replace(state);
    }
}

fn log_dropped(envelope: &Envelope, err: &DecodeError) {
    match err {
        DecodeError::MissingCommand => warn!(
            "Got unknown event with no 'command' header on {}: {:?} | {}",
            envelope.topic,
            envelope.headers,
            envelope.body_text()
        ),
        DecodeError::UnsupportedCommand(cmd) => {
            warn!("Cmd not supported: {} (topic {})", cmd, envelope.topic)
        }
        DecodeError::Format(_) | DecodeError::Validation(_) => warn!(
            "Error when decoding check on {}: {} | {}",
            envelope.topic,
            err,
            envelope.body_text()
        ),
    }
}
