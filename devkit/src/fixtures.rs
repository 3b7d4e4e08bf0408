/*!
Fixtures pour tests du bridge

- check results typés, horodatés à un instant fixe
- `EnvelopeBuilder` : enveloppes brutes, y compris volontairement invalides
  (header manquant, body hors modèle, JSON cassé)
*/

use nagmq_core::envelope::{to_envelope, Envelope, HEADER_COMMAND, HEADER_HOST, HEADER_SERVICE};
use nagmq_core::model::{
    CheckResult, HostCheck, HostState, ServiceCheck, ServiceState,
    CMD_PROCESS_HOST_CHECK_RESULT, CMD_PROCESS_SERVICE_CHECK_RESULT,
};
use serde_json::{Map, Value};
use time::macros::datetime;
use time::OffsetDateTime;

pub const PREFIX: &str = "check.results";

/// `[1700000000]`, instant de référence des fixtures
pub const FIXED_TS: i64 = 1_700_000_000;

pub fn fixed_time() -> OffsetDateTime {
    datetime!(2023-11-14 22:13:20 UTC)
}

pub fn host_check(hostname: &str, state: HostState, output: &str) -> CheckResult {
    CheckResult::Host(HostCheck {
        hostname: hostname.to_string(),
        state,
        output: output.to_string(),
        last_check: fixed_time(),
    })
}

pub fn service_check(
    hostname: &str,
    service: &str,
    state: ServiceState,
    output: &str,
) -> CheckResult {
    CheckResult::Service(ServiceCheck {
        hostname: hostname.to_string(),
        service_description: service.to_string(),
        state,
        output: output.to_string(),
        last_check: fixed_time(),
    })
}

/// Enveloppe valide publiée sous `check.results`
pub fn envelope_for(result: &CheckResult) -> Envelope {
    match to_envelope(result, PREFIX) {
        Ok(envelope) => envelope,
        Err(e) => panic!("fixture envelope: {e}"),
    }
}

/// Ligne de commande externe standard
pub fn command_line(command: &str, args: &[&str]) -> String {
    format!("[{}] {};{}", FIXED_TS, command, args.join(";"))
}

/// Ligne send_nsca (champs séparés par des tabulations)
pub fn legacy_line(fields: &[&str]) -> String {
    fields.join("\t")
}

/// Construction d'enveloppes brutes, champ par champ
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    topic: String,
    headers: Vec<(String, String)>,
    body: Map<String, Value>,
    raw_body: Option<Vec<u8>>,
}

impl EnvelopeBuilder {
    pub fn new<S: Into<String>>(topic: S) -> Self {
        Self {
            topic: topic.into(),
            headers: Vec::new(),
            body: Map::new(),
            raw_body: None,
        }
    }

    /// Enveloppe host complète (header + body) pour `hostname`
    pub fn host(hostname: &str) -> Self {
        Self::new(format!("{PREFIX}.host.{hostname}"))
            .header(HEADER_COMMAND, CMD_PROCESS_HOST_CHECK_RESULT)
            .header(HEADER_HOST, hostname)
            .set_string("hostname", hostname)
            .set_field("state", Value::from(0))
            .set_string("output", "OK")
            .set_string("last_check", "2023-11-14T22:13:20Z")
    }

    /// Enveloppe service complète (header + body) pour `hostname`/`service`
    pub fn service(hostname: &str, service: &str) -> Self {
        Self::new(format!("{PREFIX}.service.{hostname}"))
            .header(HEADER_COMMAND, CMD_PROCESS_SERVICE_CHECK_RESULT)
            .header(HEADER_HOST, hostname)
            .header(HEADER_SERVICE, service)
            .set_string("hostname", hostname)
            .set_string("description", service)
            .set_field("state", Value::from(0))
            .set_string("output", "OK")
            .set_string("last_check", "2023-11-14T22:13:20Z")
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn without_header(mut self, key: &str) -> Self {
        self.headers.retain(|(k, _)| k != key);
        self
    }

    pub fn set_field<S: Into<String>>(mut self, field: S, value: Value) -> Self {
        self.body.insert(field.into(), value);
        self
    }

    pub fn set_string<S: Into<String>, V: Into<String>>(self, field: S, value: V) -> Self {
        self.set_field(field, Value::String(value.into()))
    }

    pub fn remove_field(mut self, field: &str) -> Self {
        self.body.remove(field);
        self
    }

    /// Remplace le body JSON par des octets arbitraires
    pub fn raw_body<B: Into<Vec<u8>>>(mut self, body: B) -> Self {
        self.raw_body = Some(body.into());
        self
    }

    pub fn build(self) -> Envelope {
        let body = match self.raw_body {
            Some(raw) => raw,
            None => Value::Object(self.body).to_string().into_bytes(),
        };
        self.headers
            .into_iter()
            .fold(Envelope::new(self.topic, body), |env, (k, v)| env.with_header(k, v))
    }
}
