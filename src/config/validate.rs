// src/config/validate.rs

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::config::model::{
    Bind, ConnectionSettings, ProvisionerConfig, RawProvisionerConfig, RawServiceConfig,
    ServiceSpec,
};
use crate::errors::{ConfigError, ConfigProblem};
use crate::types::{ServiceType, Topology, UpdateStrategy};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Separators of the compact bind form.
const BIND_SEPARATORS: [char; 2] = [':', '.'];

static IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^/\s]+/[^/\s]+(/[^/\s]+){0,2}$").expect("ident regex is valid")
});

impl TryFrom<RawProvisionerConfig> for ProvisionerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawProvisionerConfig) -> std::result::Result<Self, Self::Error> {
        let mut problems = Vec::new();

        let service_type = match raw.service_type.as_deref() {
            None | Some("") => ServiceType::default(),
            Some(s) => s.parse::<ServiceType>().unwrap_or_else(|msg| {
                problems.push(ConfigProblem::InvalidServiceType(msg));
                ServiceType::default()
            }),
        };

        let connection = validate_connection(&raw, &mut problems);

        let services: Vec<ServiceSpec> = raw
            .services
            .iter()
            .map(|svc| validate_service(svc, &mut problems))
            .collect();

        if !problems.is_empty() {
            return Err(ConfigError { problems });
        }

        Ok(ProvisionerConfig::new_unchecked(
            &raw,
            service_type,
            connection,
            services,
        ))
    }
}

/// Run every check against a raw config and return all problems found.
///
/// An empty list means `ProvisionerConfig::try_from` will succeed.
pub fn validate_config(raw: &RawProvisionerConfig) -> Vec<ConfigProblem> {
    match ProvisionerConfig::try_from(raw.clone()) {
        Ok(_) => Vec::new(),
        Err(err) => err.problems,
    }
}

fn validate_connection(
    raw: &RawProvisionerConfig,
    problems: &mut Vec<ConfigProblem>,
) -> ConnectionSettings {
    let conn = &raw.connection;

    if conn.host.trim().is_empty() {
        problems.push(ConfigProblem::MissingHost);
    }

    let timeout = duration_field(
        "[connection].timeout",
        conn.timeout.as_deref(),
        DEFAULT_CONNECT_TIMEOUT,
        problems,
    );
    let retry_interval = duration_field(
        "[connection].retry_interval",
        conn.retry_interval.as_deref(),
        DEFAULT_RETRY_INTERVAL,
        problems,
    );

    ConnectionSettings {
        host: conn.host.trim().to_string(),
        user: conn.user.clone(),
        port: conn.port,
        identity_file: conn.identity_file.clone(),
        timeout,
        retry_interval,
    }
}

fn duration_field(
    field: &str,
    value: Option<&str>,
    default: Duration,
    problems: &mut Vec<ConfigProblem>,
) -> Duration {
    match value {
        None => default,
        Some(s) => parse_duration(s).unwrap_or_else(|message| {
            problems.push(ConfigProblem::InvalidDuration {
                field: field.to_string(),
                message,
            });
            default
        }),
    }
}

fn validate_service(svc: &RawServiceConfig, problems: &mut Vec<ConfigProblem>) -> ServiceSpec {
    if !IDENT_RE.is_match(&svc.name) {
        problems.push(ConfigProblem::InvalidPackageIdent(svc.name.clone()));
    }

    let strategy = match svc.strategy.as_deref() {
        None | Some("") => None,
        Some(s) => match s.parse::<UpdateStrategy>() {
            Ok(v) => Some(v),
            Err(message) => {
                problems.push(ConfigProblem::InvalidStrategy {
                    service: svc.name.clone(),
                    message,
                });
                None
            }
        },
    };

    let topology = match svc.topology.as_deref() {
        None | Some("") => None,
        Some(s) => match s.parse::<Topology>() {
            Ok(v) => Some(v),
            Err(message) => {
                problems.push(ConfigProblem::InvalidTopology {
                    service: svc.name.clone(),
                    message,
                });
                None
            }
        },
    };

    let mut binds = Vec::with_capacity(svc.binds.len() + svc.bind_strings.len());
    for bind in &svc.binds {
        if [&bind.alias, &bind.service, &bind.group]
            .into_iter()
            .all(|part| is_bind_part(part))
        {
            binds.push(bind.clone());
        } else {
            problems.push(ConfigProblem::InvalidBind {
                service: svc.name.clone(),
                bind: bind.to_string(),
            });
        }
    }
    for bind in &svc.bind_strings {
        match parse_bind(bind) {
            Some(b) => binds.push(b),
            None => problems.push(ConfigProblem::InvalidBind {
                service: svc.name.clone(),
                bind: bind.clone(),
            }),
        }
    }

    ServiceSpec {
        ident: svc.name.clone(),
        strategy,
        topology,
        channel: non_empty(&svc.channel),
        group: non_empty(&svc.group),
        url: non_empty(&svc.url),
        binds,
        user_toml: svc.user_toml.clone(),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Parse a compact bind string such as `alias:service.group`.
///
/// The string is split on `:` and `.` with empty pieces dropped; exactly
/// three pieces must remain, taken as alias, service and group.
pub fn parse_bind(s: &str) -> Option<Bind> {
    let parts: Vec<&str> = s
        .trim()
        .split(BIND_SEPARATORS)
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [alias, service, group] => Some(Bind::new(alias, service, group)),
        _ => None,
    }
}

/// A bind field must be non-empty and free of bind separators.
fn is_bind_part(part: &str) -> bool {
    !part.is_empty() && !part.contains(BIND_SEPARATORS)
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
