/**
 * MODÈLE - Résultats de checks passifs (host / service)
 *
 * RÔLE :
 * Représentation typée d'un résultat de check tel qu'il circule entre le bus
 * et le fichier de commandes Nagios. Valeurs immuables, créées par message.
 *
 * INVARIANTS :
 * - `hostname` jamais vide (après trim)
 * - `service_description` jamais vide pour un ServiceCheck
 * - `last_check` toujours renseigné (heure de décodage si la source n'en fournit pas)
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Nom de la commande externe pour un résultat de check host
pub const CMD_PROCESS_HOST_CHECK_RESULT: &str = "PROCESS_HOST_CHECK_RESULT";
/// Nom de la commande externe pour un résultat de check service
pub const CMD_PROCESS_SERVICE_CHECK_RESULT: &str = "PROCESS_SERVICE_CHECK_RESULT";

/// Politique appliquée aux états numériques hors plage (ex: `7`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatePolicy {
    /// Remplace par l'état "inconnu" de la variante (UNREACHABLE / UNKNOWN)
    #[default]
    Coerce,
    /// Refuse la ligne
    Reject,
}

impl std::str::FromStr for StatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coerce" => Ok(StatePolicy::Coerce),
            "reject" => Ok(StatePolicy::Reject),
            other => Err(format!("unknown state policy '{other}' (expected coerce|reject)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HostState {
    Ok = 0,
    Down = 1,
    Unreachable = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ServiceState {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl HostState {
    pub fn from_code(code: u8, policy: StatePolicy) -> Option<Self> {
        match (Self::try_from(code), policy) {
            (Ok(state), _) => Some(state),
            (Err(_), StatePolicy::Coerce) => Some(HostState::Unreachable),
            (Err(_), StatePolicy::Reject) => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl ServiceState {
    pub fn from_code(code: u8, policy: StatePolicy) -> Option<Self> {
        match (Self::try_from(code), policy) {
            (Ok(state), _) => Some(state),
            (Err(_), StatePolicy::Coerce) => Some(ServiceState::Unknown),
            (Err(_), StatePolicy::Reject) => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for HostState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(HostState::Ok),
            1 => Ok(HostState::Down),
            2 => Ok(HostState::Unreachable),
            other => Err(format!("host state out of range: {other}")),
        }
    }
}

impl TryFrom<u8> for ServiceState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ServiceState::Ok),
            1 => Ok(ServiceState::Warning),
            2 => Ok(ServiceState::Critical),
            3 => Ok(ServiceState::Unknown),
            other => Err(format!("service state out of range: {other}")),
        }
    }
}

impl From<HostState> for u8 {
    fn from(state: HostState) -> u8 {
        state.code()
    }
}

impl From<ServiceState> for u8 {
    fn from(state: ServiceState) -> u8 {
        state.code()
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HostState::Ok => "OK",
            HostState::Down => "DOWN",
            HostState::Unreachable => "UNREACHABLE",
        };
        f.write_str(label)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Résultat de check d'un host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCheck {
    pub hostname: String,
    pub state: HostState,
    #[serde(default)]
    pub output: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_check: OffsetDateTime,
}

/// Résultat de check d'un service rattaché à un host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCheck {
    pub hostname: String,
    #[serde(rename = "description")]
    pub service_description: String,
    pub state: ServiceState,
    #[serde(default)]
    pub output: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_check: OffsetDateTime,
}

/// Union fermée des deux résultats de check supportés
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Host(HostCheck),
    Service(ServiceCheck),
}

impl CheckResult {
    /// Nom de commande externe correspondant à la variante
    pub fn command_name(&self) -> &'static str {
        match self {
            CheckResult::Host(_) => CMD_PROCESS_HOST_CHECK_RESULT,
            CheckResult::Service(_) => CMD_PROCESS_SERVICE_CHECK_RESULT,
        }
    }

    pub fn hostname(&self) -> &str {
        match self {
            CheckResult::Host(h) => &h.hostname,
            CheckResult::Service(s) => &s.hostname,
        }
    }

    pub fn last_check(&self) -> OffsetDateTime {
        match self {
            CheckResult::Host(h) => h.last_check,
            CheckResult::Service(s) => s.last_check,
        }
    }

    /// Arguments de la commande externe, dans l'ordre attendu par Nagios
    pub fn command_args(&self) -> Vec<String> {
        match self {
            CheckResult::Host(h) => vec![
                h.hostname.clone(),
                h.state.code().to_string(),
                h.output.clone(),
            ],
            CheckResult::Service(s) => vec![
                s.hostname.clone(),
                s.service_description.clone(),
                s.state.code().to_string(),
                s.output.clone(),
            ],
        }
    }

    /// Vérifie les invariants du modèle
    pub fn validate(&self) -> Result<(), String> {
        if self.hostname().trim().is_empty() {
            return Err("hostname is empty".to_string());
        }
        if let CheckResult::Service(s) = self {
            if s.service_description.trim().is_empty() {
                return Err("service description is empty".to_string());
            }
        }
        Ok(())
    }

    /// Applique une transformation au seul champ hostname
    pub fn map_hostname<F>(self, f: F) -> Self
    where
        F: FnOnce(&str) -> String,
    {
        match self {
            CheckResult::Host(mut h) => {
                h.hostname = f(&h.hostname);
                CheckResult::Host(h)
            }
            CheckResult::Service(mut s) => {
                s.hostname = f(&s.hostname);
                CheckResult::Service(s)
            }
        }
    }
}

/// Commande externe non structurée, transmise telle quelle (nom + arguments)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Résultat du décodage d'une ligne texte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Check(CheckResult),
    Generic(GenericCommand),
}

/// Tronque le hostname au premier `.` (suffixe FQDN). Idempotent.
/// Un hostname commençant par `.` est laissé intact pour ne jamais produire de nom vide.
pub fn strip_fqdn(hostname: &str) -> String {
    match hostname.split_once('.') {
        Some((short, _)) if !short.is_empty() => short.to_string(),
        _ => hostname.to_string(),
    }
}
