//! Format send_nsca : `host\tstate\toutput` ou `host\tservice\tstate\toutput`.
//! Pas de nom de commande, l'arité seule décide du type de check.

use super::{host_from_fields, service_from_fields};
use crate::error::ParseError;
use crate::model::{CheckResult, StatePolicy};
use time::OffsetDateTime;

pub(super) fn decode(
    line: &str,
    last_check: OffsetDateTime,
    policy: StatePolicy,
) -> Result<CheckResult, ParseError> {
    let fields: Vec<&str> = line.split('\t').collect();
    match fields.len() {
        3 => host_from_fields(&fields, last_check, policy),
        4 => service_from_fields(&fields, last_check, policy),
        n => Err(ParseError::BadFieldCount(n)),
    }
}
