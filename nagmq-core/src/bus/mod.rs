/**
 * BUS - Interface étroite vers le transport pub/sub
 *
 * RÔLE :
 * Le cœur ne voit que `subscribe(pattern)` et `publish(envelope)`.
 * L'implémentation MQTT (rumqttc) vit dans `mqtt`, les tests utilisent le MockBus du devkit.
 *
 * TOPICS :
 * Hiérarchiques, segments séparés par `.`. Dans un pattern, `#` couvre tout le
 * suffixe restant (zéro ou plusieurs segments) et `*` exactement un segment.
 */

mod frame;
pub mod mqtt;
mod topic;

pub use frame::{decode_frame, encode_frame};
pub use mqtt::{BusUrl, MqttBus};
pub use topic::{topic_matches, TopicMapper};

use crate::envelope::Envelope;
use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Flux de livraison d'une souscription. Se ferme quand le bus se déconnecte.
pub type DeliveryStream = mpsc::Receiver<Envelope>;

#[async_trait]
pub trait Bus: Send + Sync {
    async fn subscribe(&self, pattern: &str) -> Result<DeliveryStream, TransportError>;

    async fn publish(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Vide les publications en attente puis coupe la connexion
    async fn close(&self) {}
}
