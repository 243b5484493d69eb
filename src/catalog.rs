//! Neuromuscular blocking agent catalog
//!
//! Static, build-time table of the agents a re-dosing timer can track. The
//! key set is closed, so looking an agent up is total; only parsing a key from
//! untrusted text can fail.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Identifier of a neuromuscular blocking agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKey {
    Rocuronium,
    Vecuronium,
    Atracurium,
    Cisatracurium,
}

/// Static description of an agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentInfo {
    pub key: AgentKey,
    pub label: &'static str,
    /// Typical prepared concentration, display only
    pub conc_mg_per_ml: f64,
    /// Default timer after an intubating dose
    pub bolus_minutes_default: i64,
    /// Default timer after a typical intermittent maintenance dose
    pub maint_minutes_default: i64,
    /// Display-only maintenance dose range
    pub maint_dose_range_mg_per_kg: (f64, f64),
}

static AGENTS: [AgentInfo; 4] = [
    AgentInfo {
        key: AgentKey::Rocuronium,
        label: "Rocuronium",
        conc_mg_per_ml: 10.0,
        bolus_minutes_default: 31,
        maint_minutes_default: 17,
        maint_dose_range_mg_per_kg: (0.1, 0.2),
    },
    AgentInfo {
        key: AgentKey::Vecuronium,
        label: "Vecuronium",
        conc_mg_per_ml: 1.0,
        bolus_minutes_default: 30,
        maint_minutes_default: 12,
        maint_dose_range_mg_per_kg: (0.01, 0.015),
    },
    AgentInfo {
        key: AgentKey::Atracurium,
        label: "Atracurium",
        conc_mg_per_ml: 10.0,
        bolus_minutes_default: 40,
        maint_minutes_default: 20,
        maint_dose_range_mg_per_kg: (0.08, 0.1),
    },
    AgentInfo {
        key: AgentKey::Cisatracurium,
        label: "Cisatracurium",
        conc_mg_per_ml: 2.0,
        bolus_minutes_default: 60,
        maint_minutes_default: 20,
        maint_dose_range_mg_per_kg: (0.02, 0.03),
    },
];

impl AgentKey {
    pub const ALL: [AgentKey; 4] = [
        AgentKey::Rocuronium,
        AgentKey::Vecuronium,
        AgentKey::Atracurium,
        AgentKey::Cisatracurium,
    ];

    /// Look up the static catalog entry for this agent
    pub fn info(self) -> &'static AgentInfo {
        get(self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgentKey::Rocuronium => "rocuronium",
            AgentKey::Vecuronium => "vecuronium",
            AgentKey::Atracurium => "atracurium",
            AgentKey::Cisatracurium => "cisatracurium",
        }
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown agent key; a wiring defect rather than a user error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent key: {0}")]
pub struct UnknownAgent(pub String);

impl FromStr for AgentKey {
    type Err = UnknownAgent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAgent(s.to_string()))
    }
}

/// Catalog entry for an agent
pub fn get(key: AgentKey) -> &'static AgentInfo {
    match key {
        AgentKey::Rocuronium => &AGENTS[0],
        AgentKey::Vecuronium => &AGENTS[1],
        AgentKey::Atracurium => &AGENTS[2],
        AgentKey::Cisatracurium => &AGENTS[3],
    }
}

/// All catalog entries in display order
pub fn all() -> &'static [AgentInfo] {
    &AGENTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_key() {
        for key in AgentKey::ALL {
            assert_eq!(get(key).key, key);
        }
    }

    #[test]
    fn rocuronium_defaults() {
        let roc = get(AgentKey::Rocuronium);
        assert_eq!(roc.bolus_minutes_default, 31);
        assert_eq!(roc.maint_minutes_default, 17);
    }

    #[test]
    fn maintenance_is_shorter_than_bolus() {
        for info in all() {
            assert!(info.maint_minutes_default < info.bolus_minutes_default, "{}", info.label);
        }
    }

    #[test]
    fn parses_keys_case_insensitively() {
        assert_eq!("Rocuronium".parse::<AgentKey>(), Ok(AgentKey::Rocuronium));
        assert_eq!(" cisatracurium ".parse::<AgentKey>(), Ok(AgentKey::Cisatracurium));
        assert!("sux".parse::<AgentKey>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&AgentKey::Vecuronium).unwrap();
        assert_eq!(json, "\"vecuronium\"");
    }
}
