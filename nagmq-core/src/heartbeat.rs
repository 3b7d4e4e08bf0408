/**
 * SELFCHECK - Heartbeat périodique du bridge
 *
 * RÔLE :
 * Publie à intervalle fixe un ServiceCheck synthétique sur le bridge lui-même.
 * L'événement repasse par le bus puis par la boucle entrante : s'il arrive dans
 * Nagios, toute la chaîne fonctionne. S'il manque, le check devient stale côté Nagios.
 *
 * FONCTIONNEMENT :
 * - snapshot immuable (host, service, état, texte) fourni à la construction
 * - compteurs possédés par la seule task du heartbeat
 * - échec de publication = log, jamais fatal
 */

use crate::bus::Bus;
use crate::envelope::{to_envelope, Envelope, HEADER_CLIENT_VERSION};
use crate::model::{CheckResult, ServiceCheck, ServiceState};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Identité et état rapportés par le selfcheck
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfCheck {
    pub host: String,
    pub service: String,
    pub state: ServiceState,
    pub output: String,
}

impl SelfCheck {
    pub fn running<H: Into<String>, S: Into<String>>(host: H, service: S, version: &str) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            state: ServiceState::Ok,
            output: format!("Running v{version}"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatStats {
    pub sent: u64,
    pub failed: u64,
}

/// Période minimale : une période nulle (ex: `interval_secs: 0`) est ramenée ici
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

pub struct HeartbeatEmitter {
    bus: Arc<dyn Bus>,
    check: SelfCheck,
    topic_prefix: String,
    period: Duration,
    client_version: Option<String>,
}

impl HeartbeatEmitter {
    pub fn new<P: Into<String>>(
        bus: Arc<dyn Bus>,
        check: SelfCheck,
        topic_prefix: P,
        period: Duration,
    ) -> Self {
        if period < MIN_PERIOD {
            warn!("Selfcheck period {:?} too short, using {:?}", period, MIN_PERIOD);
        }
        Self {
            bus,
            check,
            topic_prefix: topic_prefix.into(),
            period: period.max(MIN_PERIOD),
            client_version: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn with_client_version<S: Into<String>>(mut self, version: S) -> Self {
        self.client_version = Some(version.into());
        self
    }

    /// Enveloppe du selfcheck, horodatée à `now`
    pub fn build_envelope(&self, now: OffsetDateTime) -> Result<Envelope, serde_json::Error> {
        let result = CheckResult::Service(ServiceCheck {
            hostname: self.check.host.clone(),
            service_description: self.check.service.clone(),
            state: self.check.state,
            output: self.check.output.clone(),
            last_check: now,
        });
        let envelope = to_envelope(&result, &self.topic_prefix)?;
        Ok(match &self.client_version {
            Some(version) => envelope.with_header(HEADER_CLIENT_VERSION, version.as_str()),
            None => envelope,
        })
    }

    /// Premier envoi immédiat, puis toutes les `period`, jusqu'à `shutdown`.
    pub async fn run(self, shutdown: CancellationToken) -> HeartbeatStats {
        let mut stats = HeartbeatStats::default();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Generating selfcheck event every {:?} for {}/{}",
            self.period, self.check.host, self.check.service
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.emit().await {
                        if stats.failed > 0 && stats.sent == 0 {
                            info!("Selfcheck publishing recovered");
                        }
                        stats.sent += 1;
                    } else {
                        stats.failed += 1;
                    }
                }
            }
        }

        debug!("Selfcheck stopped (sent: {}, failed: {})", stats.sent, stats.failed);
        stats
    }

    async fn emit(&self) -> bool {
        let envelope = match self.build_envelope(OffsetDateTime::now_utc()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Can't build selfcheck event: {}", e);
                return false;
            }
        };
        debug!("Sending selfcheck to [{}]", envelope.topic);
        match self.bus.publish(&envelope).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Selfcheck publish failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::DeliveryStream;
    use crate::envelope::from_envelope;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use time::macros::datetime;

    struct NullBus;

    #[async_trait]
    impl Bus for NullBus {
        async fn subscribe(&self, pattern: &str) -> Result<DeliveryStream, TransportError> {
            Err(TransportError::Subscribe {
                pattern: pattern.to_string(),
                reason: "not supported".into(),
            })
        }

        async fn publish(&self, _envelope: &Envelope) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn test_selfcheck_snapshot() {
        let check = SelfCheck::running("nagios01", "mq2nagcmd", "1.2.3");
        assert_eq!(check.state, ServiceState::Ok);
        assert_eq!(check.output, "Running v1.2.3");
    }

    #[test]
    fn test_selfcheck_envelope_goes_through_inbound_path() {
        let emitter = HeartbeatEmitter::new(
            Arc::new(NullBus),
            SelfCheck::running("nagios01", "mq2nagcmd", "0.1.0"),
            "check.results",
            Duration::from_secs(60),
        )
        .with_client_version("mq2nagcmd-0.1.0");

        let now = datetime!(2024-05-01 12:00:00 UTC);
        let envelope = emitter.build_envelope(now).unwrap();
        assert_eq!(envelope.topic, "check.results.service.nagios01");
        assert_eq!(envelope.header(HEADER_CLIENT_VERSION), Some("mq2nagcmd-0.1.0"));

        match from_envelope(&envelope).unwrap() {
            CheckResult::Service(svc) => {
                assert_eq!(svc.hostname, "nagios01");
                assert_eq!(svc.service_description, "mq2nagcmd");
                assert_eq!(svc.state, ServiceState::Ok);
                assert_eq!(svc.output, "Running v0.1.0");
                assert_eq!(svc.last_check, now);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_zero_period_is_clamped() {
        let emitter = HeartbeatEmitter::new(
            Arc::new(NullBus),
            SelfCheck::running("h", "s", "0.1.0"),
            "p",
            Duration::ZERO,
        );
        assert_eq!(emitter.period(), MIN_PERIOD);
    }

    #[test]
    fn test_no_client_version_by_default() {
        let emitter = HeartbeatEmitter::new(
            Arc::new(NullBus),
            SelfCheck::running("h", "s", "0.1.0"),
            "p",
            Duration::from_secs(1),
        );
        let envelope = emitter.build_envelope(OffsetDateTime::now_utc()).unwrap();
        assert!(envelope.header(HEADER_CLIENT_VERSION).is_none());
    }
}
