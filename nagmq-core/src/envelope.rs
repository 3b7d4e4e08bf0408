/**
 * ENVELOPPES BUS - CheckResult <-> message bus (topic + headers + body)
 *
 * RÔLE :
 * Construit les enveloppes publiées sur le bus et reconstruit les CheckResult
 * à la réception. Le header `command` porte le type sémantique du payload.
 *
 * TOPICS :
 * - `<prefix>.host.<hostname>`    : PROCESS_HOST_CHECK_RESULT
 * - `<prefix>.service.<hostname>` : PROCESS_SERVICE_CHECK_RESULT
 * - `<prefix>.command`            : commandes opaques (body = liste d'arguments JSON)
 */

use crate::error::DecodeError;
use crate::model::{
    CheckResult, GenericCommand, HostCheck, ServiceCheck, CMD_PROCESS_HOST_CHECK_RESULT,
    CMD_PROCESS_SERVICE_CHECK_RESULT,
};
use serde_json::error::Category;
use std::borrow::Cow;
use std::collections::BTreeMap;

pub const HEADER_COMMAND: &str = "command";
pub const HEADER_HOST: &str = "host";
pub const HEADER_SERVICE: &str = "service";
pub const HEADER_CLIENT_VERSION: &str = "client-version";

/// Message bus : topic de routage, headers, body opaque
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub topic: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new<S: Into<String>>(topic: S, body: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Body en texte, pour les logs
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Topic de publication d'un résultat
pub fn topic_for(result: &CheckResult, prefix: &str) -> String {
    match result {
        CheckResult::Host(h) => format!("{prefix}.host.{}", h.hostname),
        CheckResult::Service(s) => format!("{prefix}.service.{}", s.hostname),
    }
}

/// CheckResult -> enveloppe. Fonction pure.
pub fn to_envelope(result: &CheckResult, prefix: &str) -> Result<Envelope, serde_json::Error> {
    let body = match result {
        CheckResult::Host(h) => serde_json::to_vec(h)?,
        CheckResult::Service(s) => serde_json::to_vec(s)?,
    };
    let mut envelope = Envelope::new(topic_for(result, prefix), body)
        .with_header(HEADER_COMMAND, result.command_name())
        .with_header(HEADER_HOST, result.hostname());
    if let CheckResult::Service(s) = result {
        envelope = envelope.with_header(HEADER_SERVICE, s.service_description.as_str());
    }
    Ok(envelope)
}

/// Commande opaque -> enveloppe sur `<prefix>.command`
pub fn generic_to_envelope(
    command: &GenericCommand,
    prefix: &str,
) -> Result<Envelope, serde_json::Error> {
    let body = serde_json::to_vec(&command.args)?;
    Ok(Envelope::new(format!("{prefix}.command"), body)
        .with_header(HEADER_COMMAND, command.name.as_str()))
}

/// Enveloppe -> CheckResult.
///
/// JSON mal formé => `Format`, JSON bien formé mais hors modèle => `Validation`.
pub fn from_envelope(envelope: &Envelope) -> Result<CheckResult, DecodeError> {
    let command = envelope
        .header(HEADER_COMMAND)
        .ok_or(DecodeError::MissingCommand)?;

    let result = match command {
        CMD_PROCESS_HOST_CHECK_RESULT => {
            CheckResult::Host(parse_body::<HostCheck>(&envelope.body)?)
        }
        CMD_PROCESS_SERVICE_CHECK_RESULT => {
            CheckResult::Service(parse_body::<ServiceCheck>(&envelope.body)?)
        }
        other => return Err(DecodeError::UnsupportedCommand(other.to_string())),
    };

    result.validate().map_err(DecodeError::Validation)?;
    Ok(result)
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(body).map_err(|e| match e.classify() {
        Category::Data => DecodeError::Validation(e.to_string()),
        _ => DecodeError::Format(e),
    })
}
