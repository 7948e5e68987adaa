use std::collections::HashMap;
use tracing::{info, warn};

use crate::geofence::evaluate_all;
use crate::models::{LivePosition, RiskStatus, UserStatus, Zone};

/// A change in a user's aggregate zone status between two evaluations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub user_id: String,
    pub from: RiskStatus,
    pub to: RiskStatus,
}

/// Tracks the last status per user and reports only changes.
///
/// Users seen for the first time are compared against `Safe`, so a user
/// appearing inside a zone is reported while one appearing outside is not.
#[derive(Debug, Default)]
pub struct MembershipMonitor {
    last: HashMap<String, RiskStatus>,
}

impl MembershipMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, user_id: &str) -> Option<RiskStatus> {
        self.last.get(user_id).copied()
    }

    pub fn tick(
        &mut self,
        zones: &[Zone],
        positions: &[LivePosition],
        clock_hour: u32,
    ) -> (Vec<UserStatus>, Vec<StatusTransition>) {
        let statuses = evaluate_all(positions, zones, clock_hour);

        let mut transitions = Vec::new();
        let mut next = HashMap::with_capacity(statuses.len());
        for status in &statuses {
            let from = self
                .last
                .get(&status.user_id)
                .copied()
                .unwrap_or(RiskStatus::Safe);
            let to = status.dominant_severity;
            if from != to {
                let transition = StatusTransition {
                    user_id: status.user_id.clone(),
                    from,
                    to,
                };
                log_transition(&transition, status);
                transitions.push(transition);
            }
            next.insert(status.user_id.clone(), to);
        }
        self.last = next;

        (statuses, transitions)
    }
}

fn log_transition(transition: &StatusTransition, status: &UserStatus) {
    let zones: Vec<String> = status.containing_zones().map(|id| id.to_string()).collect();
    if transition.to == RiskStatus::High {
        warn!(
            user_id = %transition.user_id,
            zones = ?zones,
            "User entered HIGH risk zone (was {})",
            transition.from
        );
    } else {
        info!(
            user_id = %transition.user_id,
            "User status changed {} -> {}",
            transition.from,
            transition.to
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, Severity, Transport};
    use chrono::Utc;
    use uuid::Uuid;

    fn at(user_id: &str, latitude: f64, longitude: f64) -> LivePosition {
        LivePosition {
            user_id: user_id.to_string(),
            latitude,
            longitude,
            heading: None,
            speed: Some(1.2),
            updated_at: Utc::now(),
            transport: Transport::Relayed { hop_count: 1 },
        }
    }

    #[test]
    fn test_reports_only_changes() {
        let zones = vec![Zone::new(
            Uuid::new_v4(),
            "Green Circle Junction",
            Coordinate::new(12.9716, 79.1594),
            300.0,
            Severity::High,
        )];
        let mut monitor = MembershipMonitor::new();

        let (statuses, transitions) = monitor.tick(&zones, &[at("u", 12.9716, 79.1594), at("v", 13.5, 79.0)], 12);
        assert_eq!(statuses.len(), 2);
        assert_eq!(
            transitions,
            vec![StatusTransition {
                user_id: "u".to_string(),
                from: RiskStatus::Safe,
                to: RiskStatus::High,
            }]
        );

        let (_, transitions) = monitor.tick(&zones, &[at("u", 12.9716, 79.1594)], 12);
        assert!(transitions.is_empty());
        assert_eq!(monitor.status_of("v"), None);

        let (_, transitions) = monitor.tick(&zones, &[at("u", 12.9806, 79.1594)], 12);
        assert_eq!(transitions[0].to, RiskStatus::Safe);
        assert_eq!(monitor.status_of("u"), Some(RiskStatus::Safe));
    }
}
