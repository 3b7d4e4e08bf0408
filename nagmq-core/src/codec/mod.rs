/**
 * CODEC LIGNES - Grammaires texte des check results passifs
 *
 * RÔLE :
 * Décode/encode les deux grammaires texte supportées :
 * - `standard`   : commande externe Nagios `[ts] COMMAND;arg1;arg2;...`
 * - `legacy-tab` : format send_nsca, champs séparés par tabulation, sans nom de commande
 *
 * FONCTIONNEMENT :
 * - Le mode est choisi une fois au démarrage (pas de détection par ligne)
 * - En legacy-tab, seul le nombre de champs distingue host (3) et service (4)
 * - Limite connue : `;` et retours à la ligne dans un champ ne survivent pas à l'encodage
 */

mod command;
mod legacy;

pub use command::{encode, encode_generic, lookup_command, CommandSpec, CHECK_COMMANDS};

use crate::error::ParseError;
use crate::model::{
    CheckResult, Decoded, HostCheck, HostState, ServiceCheck, ServiceState, StatePolicy,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Grammaire d'entrée, sélectionnée au démarrage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineMode {
    #[default]
    Standard,
    LegacyTab,
}

/// Décode une ligne selon le mode configuré.
///
/// `last_check` vient du timestamp entre crochets en mode standard, de l'heure
/// courante en legacy-tab.
pub fn decode(line: &str, mode: LineMode, policy: StatePolicy) -> Result<Decoded, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    match mode {
        LineMode::Standard => command::decode(line, policy),
        LineMode::LegacyTab => {
            legacy::decode(line, OffsetDateTime::now_utc(), policy).map(Decoded::Check)
        }
    }
}

/// hostname;state;output
pub(crate) fn host_from_fields(
    fields: &[&str],
    last_check: OffsetDateTime,
    policy: StatePolicy,
) -> Result<CheckResult, ParseError> {
    let [hostname, state, output] = fields else {
        return Err(ParseError::BadFieldCount(fields.len()));
    };
    let hostname = non_empty(hostname, ParseError::EmptyHostname)?;
    let code = parse_state(state)?;
    let state = HostState::from_code(code, policy)
        .ok_or_else(|| ParseError::BadState(state.to_string()))?;

    Ok(CheckResult::Host(HostCheck {
        hostname,
        state,
        output: output.to_string(),
        last_check,
    }))
}

/// hostname;service;state;output
pub(crate) fn service_from_fields(
    fields: &[&str],
    last_check: OffsetDateTime,
    policy: StatePolicy,
) -> Result<CheckResult, ParseError> {
    let [hostname, service, state, output] = fields else {
        return Err(ParseError::BadFieldCount(fields.len()));
    };
    let hostname = non_empty(hostname, ParseError::EmptyHostname)?;
    let service_description = non_empty(service, ParseError::EmptyServiceDescription)?;
    let code = parse_state(state)?;
    let state = ServiceState::from_code(code, policy)
        .ok_or_else(|| ParseError::BadState(state.to_string()))?;

    Ok(CheckResult::Service(ServiceCheck {
        hostname,
        service_description,
        state,
        output: output.to_string(),
        last_check,
    }))
}

// Vide après trim => refusé ; sinon le champ est gardé tel quel
fn non_empty(field: &str, err: ParseError) -> Result<String, ParseError> {
    if field.trim().is_empty() {
        Err(err)
    } else {
        Ok(field.to_string())
    }
}

// Numérique mais hors u8 => traité comme hors plage, pas comme non numérique
fn parse_state(raw: &str) -> Result<u8, ParseError> {
    raw.trim()
        .parse::<u64>()
        .map(|code| u8::try_from(code).unwrap_or(u8::MAX))
        .map_err(|_| ParseError::BadState(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenericCommand;
    use time::macros::datetime;

    #[test]
    fn test_service_scenario() {
        let line = "[1700000000] PROCESS_SERVICE_CHECK_RESULT;web01;HTTP;2;timeout";
        let decoded = decode(line, LineMode::Standard, StatePolicy::Reject).unwrap();
        assert_eq!(
            decoded,
            Decoded::Check(CheckResult::Service(ServiceCheck {
                hostname: "web01".into(),
                service_description: "HTTP".into(),
                state: ServiceState::Critical,
                output: "timeout".into(),
                last_check: datetime!(2023-11-14 22:13:20 UTC),
            }))
        );
    }

    #[test]
    fn test_legacy_host_scenario() {
        match decode("db01\t0\tok", LineMode::LegacyTab, StatePolicy::Coerce).unwrap() {
            Decoded::Check(CheckResult::Host(h)) => {
                assert_eq!(h.hostname, "db01");
                assert_eq!(h.state, HostState::Ok);
                assert_eq!(h.output, "ok");
            }
            other => panic!("expected host check, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip() {
        let results = vec![
            CheckResult::Host(HostCheck {
                hostname: "db01".into(),
                state: HostState::Down,
                output: "PING CRITICAL - Packet loss = 100%".into(),
                last_check: datetime!(2024-02-01 08:00:00 UTC),
            }),
            CheckResult::Service(ServiceCheck {
                hostname: "web01.example.com".into(),
                service_description: "Disk /var".into(),
                state: ServiceState::Warning,
                output: String::new(),
                last_check: datetime!(2024-02-01 08:00:05 UTC),
            }),
            CheckResult::Host(HostCheck {
                hostname: "web01 ".into(),
                state: HostState::Ok,
                output: "ok".into(),
                last_check: datetime!(2024-01-01 00:00:00 UTC),
            }),
            CheckResult::Service(ServiceCheck {
                hostname: " db02".into(),
                service_description: " MySQL ".into(),
                state: ServiceState::Ok,
                output: " padded ".into(),
                last_check: datetime!(2024-01-01 00:00:00 UTC),
            }),
        ];
        for result in results {
            let line = encode(&result);
            let back = decode(&line, LineMode::Standard, StatePolicy::Reject).unwrap();
            assert_eq!(back, Decoded::Check(result));
        }
    }

    #[test]
    fn test_trailing_newline_ignored() {
        let decoded = decode(
            "[1700000000] PROCESS_HOST_CHECK_RESULT;db01;1;down\r\n",
            LineMode::Standard,
            StatePolicy::Reject,
        )
        .unwrap();
        match decoded {
            Decoded::Check(CheckResult::Host(h)) => assert_eq!(h.output, "down"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_generic_passthrough() {
        let decoded = decode(
            "[1700000000] SCHEDULE_FORCED_SVC_CHECK;web01;HTTP;1700000100",
            LineMode::Standard,
            StatePolicy::Reject,
        )
        .unwrap();
        assert_eq!(
            decoded,
            Decoded::Generic(GenericCommand {
                name: "SCHEDULE_FORCED_SVC_CHECK".into(),
                args: vec!["web01".into(), "HTTP".into(), "1700000100".into()],
            })
        );
    }

    #[test]
    fn test_standard_rejections() {
        let cases = [
            ("PROCESS_HOST_CHECK_RESULT;db01;0;ok", ParseError::MissingTimestamp),
            ("[abc] PROCESS_HOST_CHECK_RESULT;db01;0;ok", ParseError::BadTimestamp("abc".into())),
            ("[1700000000] ;db01", ParseError::MissingCommand),
            (
                "[1700000000] process_host_check_result;db01;0;ok",
                ParseError::UnsupportedCommand("process_host_check_result".into()),
            ),
            (
                "[1700000000] SAVE_STATE_INFORMATION",
                ParseError::UnsupportedCommand("SAVE_STATE_INFORMATION".into()),
            ),
            (
                "[1700000000] PROCESS_HOST_CHECK_RESULT;db01;0",
                ParseError::WrongArity {
                    command: "PROCESS_HOST_CHECK_RESULT".into(),
                    expected: 3,
                    got: 2,
                },
            ),
            (
                "[1700000000] PROCESS_SERVICE_CHECK_RESULT;web01;HTTP;2;a;b",
                ParseError::WrongArity {
                    command: "PROCESS_SERVICE_CHECK_RESULT".into(),
                    expected: 4,
                    got: 5,
                },
            ),
            ("[1700000000] PROCESS_HOST_CHECK_RESULT; ;0;ok", ParseError::EmptyHostname),
            (
                "[1700000000] PROCESS_SERVICE_CHECK_RESULT;web01;  ;0;ok",
                ParseError::EmptyServiceDescription,
            ),
            ("[1700000000] PROCESS_HOST_CHECK_RESULT;db01;up;ok", ParseError::BadState("up".into())),
        ];
        for (line, expected) in cases {
            assert_eq!(
                decode(line, LineMode::Standard, StatePolicy::Reject),
                Err(expected),
                "line: {line}"
            );
        }
    }

    #[test]
    fn test_empty_output_is_valid() {
        let decoded = decode(
            "[1700000000] PROCESS_SERVICE_CHECK_RESULT;web01;HTTP;0;",
            LineMode::Standard,
            StatePolicy::Reject,
        );
        assert!(matches!(decoded, Ok(Decoded::Check(CheckResult::Service(_)))));
    }

    #[test]
    fn test_out_of_range_state_policy() {
        let line = "[1700000000] PROCESS_SERVICE_CHECK_RESULT;web01;HTTP;7;weird";
        assert_eq!(
            decode(line, LineMode::Standard, StatePolicy::Reject),
            Err(ParseError::BadState("7".into()))
        );
        match decode(line, LineMode::Standard, StatePolicy::Coerce).unwrap() {
            Decoded::Check(CheckResult::Service(s)) => assert_eq!(s.state, ServiceState::Unknown),
            other => panic!("unexpected: {other:?}"),
        }

        let host = "[1700000000] PROCESS_HOST_CHECK_RESULT;db01;300;weird";
        match decode(host, LineMode::Standard, StatePolicy::Coerce).unwrap() {
            Decoded::Check(CheckResult::Host(h)) => assert_eq!(h.state, HostState::Unreachable),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            decode(host, LineMode::Standard, StatePolicy::Reject),
            Err(ParseError::BadState("300".into()))
        );
    }
}
