/*!
Mock Bus pour développement sans broker

Implémente `nagmq_core::Bus` en mémoire. Enregistre toutes les publications,
route les messages simulés vers les souscriptions dont le pattern correspond,
et permet d'injecter des pannes (publish, subscribe, déconnexion).
*/

use async_trait::async_trait;
use nagmq_core::bus::{topic_matches, Bus, DeliveryStream};
use nagmq_core::envelope::Envelope;
use nagmq_core::error::TransportError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const DELIVERY_CAPACITY: usize = 64;

struct Subscription {
    pattern: String,
    sender: mpsc::Sender<Envelope>,
}

#[derive(Default)]
struct Inner {
    published: Mutex<Vec<Envelope>>,
    subscriptions: Mutex<Vec<Subscription>>,
    patterns: Mutex<Vec<String>>,
    fail_publish: AtomicBool,
    fail_subscribe: AtomicBool,
    loopback: AtomicBool,
    closed: AtomicBool,
}

/// Bus en mémoire, clonable (tous les clones partagent le même état)
#[derive(Clone, Default)]
pub struct MockBus {
    inner: Arc<Inner>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Les publications sont aussi livrées aux souscriptions correspondantes,
    /// comme le ferait un vrai broker.
    pub fn with_loopback(self) -> Self {
        self.inner.loopback.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_publish(&self, fail: bool) {
        self.inner.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Simule la réception d'un message. Retourne le nombre de souscriptions livrées.
    pub async fn simulate_incoming(&self, envelope: Envelope) -> usize {
        let targets = self.senders_for(&envelope.topic);
        let mut delivered = 0;
        for sender in targets {
            if sender.send(envelope.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        log::info!("[MOCK] Simulated incoming on {} ({} deliveries)", envelope.topic, delivered);
        delivered
    }

    /// Simule une perte de connexion : tous les flux de livraison se ferment.
    pub fn disconnect(&self) {
        self.inner.subscriptions.lock().clear();
        log::info!("[MOCK] Bus disconnected");
    }

    /// Toutes les enveloppes publiées, dans l'ordre
    pub fn published(&self) -> Vec<Envelope> {
        self.inner.published.lock().clone()
    }

    pub fn find_by_topic(&self, topic: &str) -> Vec<Envelope> {
        self.inner
            .published
            .lock()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Patterns demandés via `subscribe`, y compris ceux d'abonnements fermés
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.patterns.lock().clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.inner.published.lock().clear();
        self.inner.patterns.lock().clear();
    }

    fn senders_for(&self, topic: &str) -> Vec<mpsc::Sender<Envelope>> {
        self.inner
            .subscriptions
            .lock()
            .iter()
            .filter(|s| topic_matches(&s.pattern, topic))
            .map(|s| s.sender.clone())
            .collect()
    }
}

#[async_trait]
impl Bus for MockBus {
    async fn subscribe(&self, pattern: &str) -> Result<DeliveryStream, TransportError> {
        if self.inner.fail_subscribe.load(Ordering::SeqCst) {
            return Err(TransportError::Subscribe {
                pattern: pattern.to_string(),
                reason: "mock subscribe failure".into(),
            });
        }
        let (sender, receiver) = mpsc::channel(DELIVERY_CAPACITY);
        self.inner.subscriptions.lock().push(Subscription {
            pattern: pattern.to_string(),
            sender,
        });
        self.inner.patterns.lock().push(pattern.to_string());
        log::info!("[MOCK] Subscribed to {}", pattern);
        Ok(receiver)
    }

    async fn publish(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.inner.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Publish {
                topic: envelope.topic.clone(),
                reason: "mock publish failure".into(),
            });
        }
        self.inner.published.lock().push(envelope.clone());
        log::info!("[MOCK] Published to {}: {} bytes", envelope.topic, envelope.body.len());

        if self.inner.loopback.load(Ordering::SeqCst) {
            for sender in self.senders_for(&envelope.topic) {
                let _ = sender.send(envelope.clone()).await;
            }
        }
        Ok(())
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(topic: &str) -> Envelope {
        Envelope::new(topic, b"{}".to_vec())
    }

    #[tokio::test]
    async fn test_mock_bus_publish_subscribe() {
        let bus = MockBus::new();
        let mut rx = bus.subscribe("check.results.#").await.unwrap();
        assert_eq!(bus.subscriptions(), vec!["check.results.#"]);

        bus.publish(&envelope("check.results.host.web01")).await.unwrap();
        assert_eq!(bus.published().len(), 1);
        assert_eq!(bus.find_by_topic("check.results.host.web01").len(), 1);
        // pas de loopback par défaut
        assert!(rx.try_recv().is_err());

        assert_eq!(bus.simulate_incoming(envelope("check.results.service.db")).await, 1);
        assert_eq!(bus.simulate_incoming(envelope("other.topic")).await, 0);
        assert_eq!(rx.recv().await.unwrap().topic, "check.results.service.db");
    }

    #[tokio::test]
    async fn test_loopback_and_disconnect() {
        let bus = MockBus::new().with_loopback();
        let mut rx = bus.subscribe("a.*").await.unwrap();

        bus.publish(&envelope("a.b")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().topic, "a.b");

        bus.disconnect();
        assert_eq!(bus.active_subscriptions(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let bus = MockBus::new();
        bus.fail_publish(true);
        assert!(matches!(
            bus.publish(&envelope("x")).await,
            Err(TransportError::Publish { .. })
        ));
        assert!(bus.published().is_empty());

        bus.fail_subscribe(true);
        assert!(bus.subscribe("x.#").await.is_err());

        bus.close().await;
        assert!(bus.is_closed());
    }
}
