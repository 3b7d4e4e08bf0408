/**
 * NAGMQ CORE - Pont entre un bus pub/sub et le fichier de commandes Nagios
 *
 * RÔLE :
 * Tout ce que partagent les deux binaires : modèle des check results, codecs
 * texte (commande externe Nagios et format send_nsca), enveloppes bus,
 * transport MQTT, sink fichier, boucles de dispatch et selfcheck.
 *
 * FLUX :
 * - entrant  : bus -> InboundDispatcher -> CommandSink (fichier de commandes)
 * - sortant  : stdin -> OutboundPublisher -> bus
 * - selfcheck: HeartbeatEmitter -> bus -> (boucle entrante) -> Nagios
 */

pub mod bus;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod model;
pub mod sink;

pub use bus::{Bus, DeliveryStream, MqttBus};
pub use codec::{decode, encode, LineMode};
pub use config::{load_config, BridgeConfig};
pub use dispatch::{InboundDispatcher, InboundOptions, InboundState, OutboundOptions, OutboundPublisher};
pub use envelope::{from_envelope, to_envelope, Envelope};
pub use error::{DecodeError, DispatchError, ParseError, SinkError, TransportError};
pub use heartbeat::{HeartbeatEmitter, SelfCheck};
pub use model::{CheckResult, HostCheck, HostState, ServiceCheck, ServiceState, StatePolicy};
pub use sink::{CommandSink, FileSink};

/// Version du crate, reprise dans les headers `client-version` et le selfcheck
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
