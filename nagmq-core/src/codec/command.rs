//! Grammaire des commandes externes Nagios : `[<unix-ts>] <COMMAND>;<arg1>;...;<argN>`

use super::{host_from_fields, service_from_fields};
use crate::error::ParseError;
use crate::model::{
    CheckResult, Decoded, GenericCommand, StatePolicy, CMD_PROCESS_HOST_CHECK_RESULT,
    CMD_PROCESS_SERVICE_CHECK_RESULT,
};
use time::OffsetDateTime;

type Builder = fn(&[&str], OffsetDateTime, StatePolicy) -> Result<CheckResult, ParseError>;

/// Entrée de la table commande -> constructeur
pub struct CommandSpec {
    pub name: &'static str,
    pub arity: usize,
    build: Builder,
}

/// Commandes décodées structurellement. Ajouter une commande = ajouter une ligne ici.
pub static CHECK_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: CMD_PROCESS_HOST_CHECK_RESULT,
        arity: 3,
        build: host_from_fields,
    },
    CommandSpec {
        name: CMD_PROCESS_SERVICE_CHECK_RESULT,
        arity: 4,
        build: service_from_fields,
    },
];

pub fn lookup_command(name: &str) -> Option<&'static CommandSpec> {
    CHECK_COMMANDS.iter().find(|spec| spec.name == name)
}

pub(super) fn decode(line: &str, policy: StatePolicy) -> Result<Decoded, ParseError> {
    let rest = line.trim_start();
    let rest = rest.strip_prefix('[').ok_or(ParseError::MissingTimestamp)?;
    let (ts, rest) = rest.split_once(']').ok_or(ParseError::MissingTimestamp)?;
    let ts = ts.trim();
    let last_check = ts
        .parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .ok_or_else(|| ParseError::BadTimestamp(ts.to_string()))?;

    let mut parts = rest.trim_start().split(';');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(ParseError::MissingCommand);
    }
    let args: Vec<&str> = parts.collect();

    if let Some(spec) = lookup_command(name) {
        if args.len() != spec.arity {
            return Err(ParseError::WrongArity {
                command: name.to_string(),
                expected: spec.arity,
                got: args.len(),
            });
        }
        return (spec.build)(&args, last_check, policy).map(Decoded::Check);
    }

    if is_command_name(name) && !args.is_empty() {
        Ok(Decoded::Generic(GenericCommand {
            name: name.to_string(),
            args: args.into_iter().map(str::to_string).collect(),
        }))
    } else {
        Err(ParseError::UnsupportedCommand(name.to_string()))
    }
}

// Commande opaque : nom déjà entièrement en majuscules
fn is_command_name(name: &str) -> bool {
    name == name.to_uppercase()
}

/// Encode un résultat en ligne de commande externe (sans `\n` final).
/// Le timestamp entre crochets est celui du check.
pub fn encode(result: &CheckResult) -> String {
    format_line(
        result.last_check().unix_timestamp(),
        result.command_name(),
        &result.command_args(),
    )
}

/// Encode une commande opaque, horodatée à `at`
pub fn encode_generic(command: &GenericCommand, at: OffsetDateTime) -> String {
    format_line(at.unix_timestamp(), &command.name, &command.args)
}

fn format_line(ts: i64, name: &str, args: &[String]) -> String {
    format!("[{}] {};{}", ts, name, args.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HostCheck, HostState};
    use time::macros::datetime;

    #[test]
    fn test_encode_host_line() {
        let host = CheckResult::Host(HostCheck {
            hostname: "db01".into(),
            state: HostState::Unreachable,
            output: "no route".into(),
            last_check: datetime!(2023-11-14 22:13:20 UTC),
        });
        assert_eq!(encode(&host), "[1700000000] PROCESS_HOST_CHECK_RESULT;db01;2;no route");
    }

    #[test]
    fn test_encode_generic_line() {
        let cmd = GenericCommand {
            name: "ACKNOWLEDGE_HOST_PROBLEM".into(),
            args: vec!["db01".into(), "1".into()],
        };
        assert_eq!(
            encode_generic(&cmd, datetime!(2023-11-14 22:13:20 UTC)),
            "[1700000000] ACKNOWLEDGE_HOST_PROBLEM;db01;1"
        );
    }

    #[test]
    fn test_table_lookup() {
        assert_eq!(lookup_command(CMD_PROCESS_HOST_CHECK_RESULT).map(|s| s.arity), Some(3));
        assert_eq!(lookup_command(CMD_PROCESS_SERVICE_CHECK_RESULT).map(|s| s.arity), Some(4));
        assert!(lookup_command("DISABLE_NOTIFICATIONS").is_none());
    }

    #[test]
    fn test_command_name_charset() {
        assert!(is_command_name("SCHEDULE_HOST_DOWNTIME"));
        assert!(is_command_name("ADD_SVC_COMMENT2"));
        assert!(is_command_name("FOO-BAR"));
        assert!(!is_command_name("Schedule_host"));
        assert!(!is_command_name("process_host_check_result"));
    }

    #[test]
    fn test_any_upper_case_name_passes_through() {
        assert_eq!(
            decode("[1700000000] FOO-BAR;x", StatePolicy::Reject),
            Ok(Decoded::Generic(GenericCommand {
                name: "FOO-BAR".into(),
                args: vec!["x".into()],
            }))
        );
        assert_eq!(
            decode("[1700000000] Foo-Bar;x", StatePolicy::Reject),
            Err(ParseError::UnsupportedCommand("Foo-Bar".into()))
        );
    }
}
