//! Zone membership checks.
//!
//! Everything here is pure and cheap enough to run on every position update.

use crate::models::zone::{sanitize_radius, Coordinate, Severity, TimeMode, Zone, ZoneStats};
use crate::models::{LivePosition, RiskStatus, UserStatus, ZoneMembership};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in meters.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c * 1000.0
}

/// Boundary inclusive. A zero radius matches only the exact center.
pub fn is_inside(position: &LivePosition, zone: &Zone) -> bool {
    contains(zone, position.coordinate())
}

pub fn contains(zone: &Zone, point: Coordinate) -> bool {
    let radius_m = sanitize_radius(&zone.name, zone.radius_m);
    haversine_m(point, zone.center) <= radius_m
}

pub fn active_now(zone: &Zone, clock_hour: u32) -> bool {
    zone.active_window
        .map_or(true, |window| window.contains(clock_hour))
}

/// Zones shown in `mode`. A zone without a window belongs to every mode.
pub fn zones_by_time_mode(zones: &[Zone], mode: TimeMode) -> Vec<&Zone> {
    zones
        .iter()
        .filter(|zone| zone.active_window.map_or(true, |w| w.matches_mode(mode)))
        .collect()
}

pub fn zone_stats(zones: &[Zone], mode: TimeMode) -> ZoneStats {
    zones_by_time_mode(zones, mode)
        .into_iter()
        .fold(ZoneStats::default(), |mut stats, zone| {
            stats.total += 1;
            match zone.severity {
                Severity::High => stats.high += 1,
                Severity::Moderate => stats.moderate += 1,
                Severity::Low => stats.low += 1,
            }
            stats
        })
}

/// Memberships against every zone active at `clock_hour`, plus the dominant severity.
pub fn evaluate(position: &LivePosition, zones: &[Zone], clock_hour: u32) -> UserStatus {
    let mut dominant_severity = RiskStatus::Safe;
    let memberships = zones
        .iter()
        .filter(|zone| active_now(zone, clock_hour))
        .map(|zone| {
            let inside = is_inside(position, zone);
            if inside {
                dominant_severity = dominant_severity.max(RiskStatus::from(zone.severity));
            }
            ZoneMembership {
                user_id: position.user_id.clone(),
                zone_id: zone.id,
                is_inside: inside,
            }
        })
        .collect();

    UserStatus {
        user_id: position.user_id.clone(),
        memberships,
        dominant_severity,
    }
}

pub fn evaluate_all(positions: &[LivePosition], zones: &[Zone], clock_hour: u32) -> Vec<UserStatus> {
    positions
        .iter()
        .map(|position| evaluate(position, zones, clock_hour))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::zone::{ActiveWindow, DEFAULT_RADIUS_M};
    use crate::models::Transport;
    use chrono::Utc;
    use uuid::Uuid;

    fn position_at(user_id: &str, latitude: f64, longitude: f64) -> LivePosition {
        LivePosition {
            user_id: user_id.to_string(),
            latitude,
            longitude,
            heading: None,
            speed: None,
            updated_at: Utc::now(),
            transport: Transport::Direct,
        }
    }

    fn zone(name: &str, center: Coordinate, radius_m: f64, severity: Severity) -> Zone {
        Zone::new(Uuid::new_v4(), name, center, radius_m, severity)
    }

    #[test]
    fn test_identical_points_have_zero_distance() {
        let p = Coordinate::new(12.9716, 79.1594);
        assert_eq!(haversine_m(p, p), 0.0);

        let user = position_at("u", p.latitude, p.longitude);
        for radius in [0.0, 1.0, 300.0] {
            assert!(is_inside(&user, &zone("z", p, radius, Severity::Low)));
        }
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let center = Coordinate::new(12.9716, 79.1594);
        let user = position_at("u", 12.9740, 79.1610);
        let distance = haversine_m(user.coordinate(), center);

        assert!(is_inside(&user, &zone("exact", center, distance, Severity::High)));
        assert!(!is_inside(&user, &zone("short", center, distance - 1e-6, Severity::High)));
        assert!(!is_inside(&user, &zone("shorter", center, distance / 2.0, Severity::High)));
    }

    #[test]
    fn test_zero_radius_only_matches_center() {
        let center = Coordinate::new(12.0, 79.0);
        let z = zone("pin", center, 0.0, Severity::Low);
        assert!(is_inside(&position_at("u", 12.0, 79.0), &z));
        assert!(!is_inside(&position_at("u", 12.00001, 79.0), &z));
    }

    #[test]
    fn test_unusable_radius_falls_back_to_default() {
        let center = Coordinate::new(12.0, 79.0);
        let mut z = zone("broken", center, 100.0, Severity::Low);
        z.radius_m = f64::NAN;

        // ~150 m and ~330 m north of the center.
        let near = position_at("u", 12.00135, 79.0);
        let far = position_at("u", 12.0030, 79.0);
        assert!(haversine_m(near.coordinate(), center) < DEFAULT_RADIUS_M);
        assert!(is_inside(&near, &z));
        assert!(!is_inside(&far, &z));

        z.radius_m = -40.0;
        assert!(is_inside(&near, &z));
    }

    #[test]
    fn test_active_now_respects_window() {
        let center = Coordinate::new(12.0, 79.0);
        let always = zone("always", center, 100.0, Severity::Low);
        let night = zone("night", center, 100.0, Severity::Low)
            .with_active_window(ActiveWindow::parse("21-05"));

        assert!(active_now(&always, 12));
        assert!(active_now(&night, 23));
        assert!(active_now(&night, 2));
        assert!(!active_now(&night, 12));
    }

    #[test]
    fn test_dominant_severity_prefers_highest() {
        let center = Coordinate::new(12.9716, 79.1594);
        let zones = vec![
            zone("low", center, 500.0, Severity::Low),
            zone("high", center, 300.0, Severity::High),
            zone("moderate", center, 400.0, Severity::Moderate),
        ];
        let status = evaluate(&position_at("u", 12.9716, 79.1594), &zones, 12);
        assert_eq!(status.dominant_severity, RiskStatus::High);
        assert_eq!(status.memberships.len(), 3);
        assert_eq!(status.containing_zones().count(), 3);
    }

    #[test]
    fn test_inactive_zones_are_skipped() {
        let center = Coordinate::new(12.0, 79.0);
        let zones = vec![
            zone("day", center, 300.0, Severity::Low),
            zone("night", center, 300.0, Severity::High).with_active_window(ActiveWindow::parse("18-06")),
        ];

        let noon = evaluate(&position_at("u", 12.0, 79.0), &zones, 12);
        assert_eq!(noon.memberships.len(), 1);
        assert_eq!(noon.dominant_severity, RiskStatus::Low);

        let midnight = evaluate(&position_at("u", 12.0, 79.0), &zones, 0);
        assert_eq!(midnight.dominant_severity, RiskStatus::High);
    }

    #[test]
    fn test_high_zone_then_safe_after_moving_away() {
        let zones = vec![zone(
            "Green Circle Junction",
            Coordinate::new(12.9716, 79.1594),
            300.0,
            Severity::High,
        )];

        let at_center = position_at("u", 12.9716, 79.1594);
        assert_eq!(evaluate(&at_center, &zones, 10).dominant_severity, RiskStatus::High);

        // 0.009 degrees of latitude is roughly 1 km.
        let moved = position_at("u", 12.9806, 79.1594);
        assert!(haversine_m(moved.coordinate(), zones[0].center) > 950.0);
        let status = evaluate(&moved, &zones, 10);
        assert_eq!(status.dominant_severity, RiskStatus::Safe);
        assert_eq!(status.dominant_severity.to_string(), "safe");
    }

    #[test]
    fn test_evaluate_all_returns_one_status_per_position() {
        let zones = vec![zone("z", Coordinate::new(0.0, 0.0), 100.0, Severity::Moderate)];
        let positions = vec![position_at("a", 0.0, 0.0), position_at("b", 1.0, 1.0)];
        let statuses = evaluate_all(&positions, &zones, 0);
        assert_eq!(statuses[0].dominant_severity, RiskStatus::Moderate);
        assert_eq!(statuses[1].dominant_severity, RiskStatus::Safe);
    }

    #[test]
    fn test_time_mode_filter_and_stats() {
        let c = Coordinate::new(12.97, 79.15);
        let zones = vec![
            zone("night", c, 100.0, Severity::High).with_active_window(ActiveWindow::parse("21-05")),
            zone("evening", c, 100.0, Severity::High).with_active_window(ActiveWindow::parse("18-06")),
            zone("afternoon", c, 100.0, Severity::Moderate).with_active_window(ActiveWindow::parse("13-17")),
            zone("always", c, 100.0, Severity::Low),
        ];

        fn names(zones: &[Zone], mode: TimeMode) -> Vec<&str> {
            zones_by_time_mode(zones, mode).iter().map(|z| z.name.as_str()).collect()
        }
        assert_eq!(names(&zones, TimeMode::Night), vec!["night", "evening", "always"]);
        assert_eq!(names(&zones, TimeMode::Day), vec!["afternoon", "always"]);
        assert_eq!(names(&zones, TimeMode::All).len(), 4);

        assert_eq!(
            zone_stats(&zones, TimeMode::Night),
            ZoneStats { total: 3, high: 2, moderate: 0, low: 1 }
        );
        assert_eq!(
            zone_stats(&zones, TimeMode::Day),
            ZoneStats { total: 2, high: 0, moderate: 1, low: 1 }
        );
    }
}
