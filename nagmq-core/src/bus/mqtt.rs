/**
 * TRANSPORT MQTT - Implémentation du Bus au-dessus de rumqttc
 *
 * FONCTIONNEMENT :
 * - `connect` attend le ConnAck du broker (borné par un timeout), sinon erreur fatale
 * - une task possède l'EventLoop et route chaque Publish reçu vers les souscriptions
 * - mode partagé : session persistante + `$share/<group>/<filtre>` (les instances se partagent le flux)
 * - mode exclusif : session propre, client id unique
 * - erreur de connexion après démarrage : toutes les souscriptions sont fermées
 */

use super::frame::{decode_frame, encode_frame};
use super::topic::{topic_matches, TopicMapper};
use super::{Bus, DeliveryStream};
use crate::config::BusConf;
use crate::envelope::Envelope;
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

const DEFAULT_MQTT_PORT: u16 = 1883;
const DELIVERY_BUFFER: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// `mqtt://[user[:pass]@]host[:port]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusUrl {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
}

impl BusUrl {
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let raw = raw.trim();
        let invalid = |reason: &str| TransportError::InvalidUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "mqtt" | "tcp") {
            return Err(invalid("scheme must be mqtt:// or tcp://"));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host"))?
            .to_string();
        let port = url.port().unwrap_or(DEFAULT_MQTT_PORT);
        let credentials = if url.username().is_empty() {
            None
        } else {
            Some((
                url.username().to_string(),
                url.password().unwrap_or_default().to_string(),
            ))
        };

        Ok(Self {
            host,
            port,
            credentials,
        })
    }
}

struct Subscriber {
    pattern: String,
    sender: mpsc::Sender<Envelope>,
}

type Subscribers = Arc<Mutex<Vec<Subscriber>>>;

pub struct MqttBus {
    client: AsyncClient,
    topics: TopicMapper,
    shared_group: Option<String>,
    subscribers: Subscribers,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttBus {
    /// Connexion au broker. `node_name` identifie l'instance (ex: `nagcmd-receiver@host`).
    pub async fn connect(conf: &BusConf, node_name: &str) -> Result<Self, TransportError> {
        let url = BusUrl::parse(&conf.url)?;
        let client_id = if conf.shared {
            node_name.to_string()
        } else {
            format!("{}-{}", node_name, &Uuid::new_v4().simple().to_string()[..8])
        };

        let mut opts = MqttOptions::new(client_id.clone(), url.host.clone(), url.port);
        opts.set_keep_alive(Duration::from_secs(conf.keep_alive_secs));
        opts.set_clean_session(!conf.shared);
        if let Some((user, pass)) = &url.credentials {
            opts.set_credentials(user.clone(), pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(opts, 64);

        let timeout = Duration::from_secs(conf.connect_timeout_secs);
        tokio::time::timeout(timeout, wait_connack(&mut eventloop))
            .await
            .map_err(|_| {
                TransportError::Connect(format!(
                    "no answer from {}:{} after {:?}",
                    url.host, url.port, timeout
                ))
            })??;

        info!(
            "Connected to MQTT broker {}:{} as {} (exchange: {})",
            url.host, url.port, client_id, conf.exchange
        );

        let topics = TopicMapper::new(conf.exchange.clone());
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));
        let handle = tokio::spawn(run_event_loop(
            eventloop,
            subscribers.clone(),
            topics.clone(),
        ));

        Ok(Self {
            client,
            topics,
            shared_group: conf.shared.then(|| conf.shared_group.clone()),
            subscribers,
            event_loop: Mutex::new(Some(handle)),
        })
    }
}

#[async_trait]
impl Bus for MqttBus {
    async fn subscribe(&self, pattern: &str) -> Result<DeliveryStream, TransportError> {
        let filter = self.topics.to_mqtt_filter(pattern);
        let filter = match &self.shared_group {
            Some(group) => format!("$share/{group}/{filter}"),
            None => filter,
        };

        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        self.subscribers.lock().push(Subscriber {
            pattern: pattern.to_string(),
            sender: tx,
        });

        self.client
            .subscribe(filter.clone(), QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Subscribe {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        info!("Subscribed to {} ({})", pattern, filter);
        Ok(rx)
    }

    async fn publish(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let mqtt_topic = self.topics.to_mqtt_topic(&envelope.topic);
        let payload = encode_frame(envelope)?;
        self.client
            .publish(mqtt_topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish {
                topic: envelope.topic.clone(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect request failed: {}", e);
        }
        let handle = self.event_loop.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(CLOSE_TIMEOUT, handle).await.is_err() {
                warn!("MQTT event loop did not stop within {:?}", CLOSE_TIMEOUT);
            }
        }
    }
}

async fn wait_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(TransportError::Connect(format!("broker refused connection: {:?}", ack.code)))
                };
            }
            Ok(_) => {}
            Err(e) => return Err(TransportError::Connect(e.to_string())),
        }
    }
}

async fn run_event_loop(mut eventloop: EventLoop, subscribers: Subscribers, topics: TopicMapper) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(p))) => {
                route(&subscribers, &topics, &p.topic, &p.payload).await;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                break;
            }
        }
    }
    // fermeture des flux de livraison => les boucles de dispatch voient la déconnexion
    subscribers.lock().clear();
}

async fn route(subscribers: &Subscribers, topics: &TopicMapper, mqtt_topic: &str, payload: &[u8]) {
    let Some(topic) = topics.from_mqtt_topic(mqtt_topic) else {
        warn!("Ignoring message outside exchange '{}': {}", topics.exchange(), mqtt_topic);
        return;
    };
    let envelope = match decode_frame(topic, payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(
                "Dropping undecodable message on {}: {} | {}",
                mqtt_topic,
                e,
                String::from_utf8_lossy(payload)
            );
            return;
        }
    };

    let targets: Vec<mpsc::Sender<Envelope>> = subscribers
        .lock()
        .iter()
        .filter(|s| topic_matches(&s.pattern, &envelope.topic))
        .map(|s| s.sender.clone())
        .collect();

    for target in targets {
        if target.send(envelope.clone()).await.is_err() {
            debug!("Subscriber gone, dropping message on {}", envelope.topic);
        }
    }
}
