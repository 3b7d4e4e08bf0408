//! Trame JSON transportant headers + body dans le payload MQTT (MQTT 3.1.1 n'a pas de headers).
//!
//! `{"headers": {"command": "...", "host": "..."}, "body": "<json du check>"}`

use crate::envelope::Envelope;
use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: String,
}

pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, TransportError> {
    let frame = Frame {
        headers: envelope.headers.clone(),
        body: envelope.body_text().into_owned(),
    };
    Ok(serde_json::to_vec(&frame)?)
}

/// `topic` est le topic pointé déjà démappé
pub fn decode_frame(topic: String, payload: &[u8]) -> Result<Envelope, TransportError> {
    let frame: Frame = serde_json::from_slice(payload)?;
    Ok(Envelope {
        topic,
        headers: frame.headers,
        body: frame.body.into_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_keeps_headers_and_body() {
        let env = Envelope::new("check.results.host.db01", br#"{"hostname":"db01"}"#.to_vec())
            .with_header("command", "PROCESS_HOST_CHECK_RESULT")
            .with_header("host", "db01");
        let payload = encode_frame(&env).unwrap();
        let back = decode_frame(env.topic.clone(), &payload).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn test_garbage_payload() {
        assert!(matches!(
            decode_frame("t".into(), b"PROCESS_HOST_CHECK_RESULT;db01"),
            Err(TransportError::Frame(_))
        ));
    }
}
