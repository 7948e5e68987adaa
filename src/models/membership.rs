use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::zone::Severity;

/// Whether one user is inside one active zone. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMembership {
    pub user_id: String,
    pub zone_id: Uuid,
    pub is_inside: bool,
}

/// Aggregate status of a user: the highest severity among containing zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskStatus {
    #[serde(rename = "safe")]
    Safe,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "HIGH")]
    High,
}

impl From<Severity> for RiskStatus {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => RiskStatus::Low,
            Severity::Moderate => RiskStatus::Moderate,
            Severity::High => RiskStatus::High,
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskStatus::Safe => f.write_str("safe"),
            RiskStatus::Low => f.write_str("LOW"),
            RiskStatus::Moderate => f.write_str("MODERATE"),
            RiskStatus::High => f.write_str("HIGH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user_id: String,
    pub memberships: Vec<ZoneMembership>,
    pub dominant_severity: RiskStatus,
}

impl UserStatus {
    pub fn containing_zones(&self) -> impl Iterator<Item = &Uuid> {
        self.memberships
            .iter()
            .filter(|m| m.is_inside)
            .map(|m| &m.zone_id)
    }
}
