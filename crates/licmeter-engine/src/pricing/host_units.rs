//! Host unit calculator
//!
//! Maps a host's memory capacity and monitoring mode to host units:
//! - 16 GiB and above: one unit per started 16 GiB (full stack), or 0.3 per
//!   started 16 GiB capped at 1.0 (infrastructure only)
//! - below 16 GiB: fixed tiers, first threshold strictly above the capacity

use std::str::FromStr;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Capacity at which the per-16-GiB formula takes over from the tiers
const TIERED_LIMIT_GIB: f64 = 16.0;

/// Full stack tiers, ascending by threshold (GiB, units)
const FULL_STACK_TIERS: &[(f64, f64)] = &[(1.6, 0.1), (4.0, 0.25), (8.0, 0.5), (16.0, 1.0)];

/// Infrastructure-only tiers, ascending by threshold (GiB, units)
const INFRA_ONLY_TIERS: &[(f64, f64)] = &[
    (1.6, 0.03),
    (4.0, 0.075),
    (8.0, 0.15),
    (16.0, 0.3),
    (32.0, 0.6),
    (48.0, 0.9),
    (64.0, 1.0),
];

/// Per-16-GiB rate and ceiling for infrastructure-only hosts
const INFRA_ONLY_RATE: f64 = 0.3;
const INFRA_ONLY_CAP: f64 = 1.0;

/// Host monitoring depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitoringMode {
    #[default]
    FullStack,
    InfraOnly,
}

impl MonitoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringMode::FullStack => "FULL_STACK",
            MonitoringMode::InfraOnly => "INFRA_ONLY",
        }
    }

    fn tiers(&self) -> &'static [(f64, f64)] {
        match self {
            MonitoringMode::FullStack => FULL_STACK_TIERS,
            MonitoringMode::InfraOnly => INFRA_ONLY_TIERS,
        }
    }

    /// Parse the inventory's mode string; unknown modes bill as full stack
    pub fn from_inventory(raw: Option<&str>) -> Self {
        raw.and_then(|m| m.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for MonitoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL_STACK" => Ok(MonitoringMode::FullStack),
            "INFRA_ONLY" | "INFRASTRUCTURE" => Ok(MonitoringMode::InfraOnly),
            other => Err(format!("unknown monitoring mode: {}", other)),
        }
    }
}

/// Host units for `memory_bytes` of capacity in the given mode
pub fn host_units(memory_bytes: f64, mode: MonitoringMode) -> f64 {
    if memory_bytes.is_nan() || memory_bytes <= 0.0 {
        return 0.0;
    }
    let gib = memory_bytes / BYTES_PER_GIB;

    if gib >= TIERED_LIMIT_GIB {
        let blocks = (gib / TIERED_LIMIT_GIB).ceil();
        return match mode {
            MonitoringMode::FullStack => blocks,
            MonitoringMode::InfraOnly => (blocks * INFRA_ONLY_RATE).min(INFRA_ONLY_CAP),
        };
    }

    mode.tiers()
        .iter()
        .find(|(threshold, _)| gib < *threshold)
        .map(|(_, units)| *units)
        .unwrap_or(0.0)
}

/// Memory capacity of a host in bytes; a container limit (MiB) wins over
/// the physical total
pub fn host_memory_bytes(memory_total: Option<f64>, paas_memory_limit_mib: Option<f64>) -> f64 {
    match paas_memory_limit_mib {
        Some(limit) => limit * 1024.0 * 1024.0,
        None => memory_total.unwrap_or(0.0),
    }
}
