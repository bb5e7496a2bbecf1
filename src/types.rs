use std::fmt;
use std::str::FromStr;

/// Update strategy a supervised service follows when a new release of its
/// package shows up in the tracked channel.
///
/// - `AtOnce`: every member updates immediately.
/// - `Rolling`: members of the service group update one after another.
/// - `None`: the service never updates on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    AtOnce,
    Rolling,
    None,
}

impl UpdateStrategy {
    pub const ALL: [UpdateStrategy; 3] = [
        UpdateStrategy::AtOnce,
        UpdateStrategy::Rolling,
        UpdateStrategy::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateStrategy::AtOnce => "at-once",
            UpdateStrategy::Rolling => "rolling",
            UpdateStrategy::None => "none",
        }
    }
}

impl FromStr for UpdateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "at-once" => Ok(UpdateStrategy::AtOnce),
            "rolling" => Ok(UpdateStrategy::Rolling),
            "none" => Ok(UpdateStrategy::None),
            other => Err(format!(
                "{other} is not a valid update strategy (expected \"at-once\", \"rolling\" or \"none\")"
            )),
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordination mode of a service group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Members elect a leader before starting.
    Leader,
    /// Members run independently.
    Standalone,
}

impl Topology {
    pub const ALL: [Topology; 2] = [Topology::Leader, Topology::Standalone];

    pub fn as_str(self) -> &'static str {
        match self {
            Topology::Leader => "leader",
            Topology::Standalone => "standalone",
        }
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leader" => Ok(Topology::Leader),
            "standalone" => Ok(Topology::Standalone),
            other => Err(format!(
                "{other} is not a valid topology (expected \"leader\" or \"standalone\")"
            )),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the supervisor process itself is kept running on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceType {
    /// Background the supervisor with `setsid`, logging to a file.
    #[default]
    Unmanaged,
    /// Install and start a systemd unit.
    Systemd,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Unmanaged => "unmanaged",
            ServiceType::Systemd => "systemd",
        }
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unmanaged" => Ok(ServiceType::Unmanaged),
            "systemd" => Ok(ServiceType::Systemd),
            other => Err(format!(
                "{other} is not a valid service_type (expected \"unmanaged\" or \"systemd\")"
            )),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_values_parse_from_their_own_rendering() {
        for strategy in UpdateStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<UpdateStrategy>(), Ok(strategy));
        }
        for topology in Topology::ALL {
            assert_eq!(topology.as_str().parse::<Topology>(), Ok(topology));
        }
        assert_eq!("systemd".parse::<ServiceType>(), Ok(ServiceType::Systemd));
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert!("Rolling".parse::<UpdateStrategy>().is_err());
        assert!("LEADER".parse::<Topology>().is_err());
        assert!("at_once".parse::<UpdateStrategy>().is_err());
    }

    #[test]
    fn unknown_service_type_message_names_the_value() {
        let err = "upstart".parse::<ServiceType>().unwrap_err();
        assert!(err.contains("upstart"));
        assert!(err.contains("service_type"));
    }
}
