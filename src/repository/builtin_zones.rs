//! Reference set of risk zones every deployment starts with.
//!
//! Names are the identity: a persisted record whose name matches an entry
//! here is treated as built-in and cannot be deleted.

use uuid::Uuid;

use crate::models::zone::name_key;
use crate::models::{ActiveWindow, Coordinate, Severity, Zone};

/// Namespace for the deterministic ids of built-in zones.
const BUILTIN_NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_2c84_93b0_4a4e_9f0d_5a2b_7c11_e3a9);

#[derive(Debug, Clone, Copy)]
pub struct BuiltinZone {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
    pub severity: Severity,
    pub active_hours: Option<&'static str>,
    pub description: &'static str,
    pub radius_m: f64,
}

impl BuiltinZone {
    pub fn id(&self) -> Uuid {
        Uuid::new_v5(&BUILTIN_NAMESPACE, self.name.as_bytes())
    }

    pub fn to_zone(&self) -> Zone {
        Zone::new(
            self.id(),
            self.name,
            Coordinate::new(self.latitude, self.longitude),
            self.radius_m,
            self.severity,
        )
        .with_description(self.description)
        .with_active_window(self.active_hours.and_then(ActiveWindow::parse))
        .builtin()
    }
}

pub const BUILTIN_ZONES: &[BuiltinZone] = &[
    BuiltinZone {
        name: "Sathuvachari (Burial Ground Area)",
        latitude: 12.9490,
        longitude: 79.1650,
        severity: Severity::High,
        active_hours: Some("18-06"),
        description: "Critical red zone along NH 48. Share autos divert to secluded areas after dark.",
        radius_m: 250.0,
    },
    BuiltinZone {
        name: "Green Circle Junction",
        latitude: 12.9716,
        longitude: 79.1594,
        severity: Severity::High,
        active_hours: Some("21-05"),
        description: "High transit friction zone between liquor outlets late at night.",
        radius_m: 200.0,
    },
    BuiltinZone {
        name: "Katpadi Railway Station",
        latitude: 12.9796,
        longitude: 79.1374,
        severity: Severity::High,
        active_hours: None,
        description: "Epicenter of transit crime near station approaches.",
        radius_m: 300.0,
    },
    BuiltinZone {
        name: "VIT Road (UGD Works)",
        latitude: 12.9750,
        longitude: 79.1500,
        severity: Severity::High,
        active_hours: None,
        description: "Construction slowdowns trap two-wheeler riders.",
        radius_m: 180.0,
    },
    BuiltinZone {
        name: "Chittoor Bus Stand (Katpadi)",
        latitude: 12.9760,
        longitude: 79.1350,
        severity: Severity::High,
        active_hours: None,
        description: "Hotspot for rings targeting two-wheelers.",
        radius_m: 220.0,
    },
    BuiltinZone {
        name: "Kagithapattarai (Palar River Bank)",
        latitude: 12.9550,
        longitude: 79.1450,
        severity: Severity::High,
        active_hours: Some("19-05"),
        description: "Dense liquor outlets; streets unsafe after 7 PM.",
        radius_m: 280.0,
    },
    BuiltinZone {
        name: "Vellore Fort Park (Moat Area)",
        latitude: 12.9204,
        longitude: 79.1325,
        severity: Severity::High,
        active_hours: Some("18-06"),
        description: "Secluded corners near the moat obscure visibility after dark.",
        radius_m: 260.0,
    },
    BuiltinZone {
        name: "Vellore New Bus Stand",
        latitude: 12.9350,
        longitude: 79.1450,
        severity: Severity::High,
        active_hours: None,
        description: "Dark corners and little patrolling inside the terminus.",
        radius_m: 240.0,
    },
    BuiltinZone {
        name: "Viruthampet (Student Housing)",
        latitude: 12.9600,
        longitude: 79.1400,
        severity: Severity::Moderate,
        active_hours: None,
        description: "Narrow residential lanes with reported stalking.",
        radius_m: 150.0,
    },
    BuiltinZone {
        name: "Gandhi Nagar (Residential)",
        latitude: 12.9500,
        longitude: 79.1350,
        severity: Severity::Moderate,
        active_hours: Some("13-17"),
        description: "Desolate tree-lined streets in the afternoon.",
        radius_m: 160.0,
    },
    BuiltinZone {
        name: "Bagayam (Southern Fringe)",
        latitude: 12.8900,
        longitude: 79.1200,
        severity: Severity::Moderate,
        active_hours: None,
        description: "Inter-gang violence creates a volatile environment.",
        radius_m: 200.0,
    },
    BuiltinZone {
        name: "Ariyur",
        latitude: 12.8800,
        longitude: 79.1000,
        severity: Severity::Moderate,
        active_hours: None,
        description: "Semi-rural settlement with high incidence of domestic violence.",
        radius_m: 180.0,
    },
];

pub fn find_builtin(name: &str) -> Option<&'static BuiltinZone> {
    let name = name_key(name);
    BUILTIN_ZONES.iter().find(|b| b.name == name)
}

pub fn is_builtin_name(name: &str) -> bool {
    find_builtin(name).is_some()
}

pub fn builtin_zones() -> Vec<Zone> {
    BUILTIN_ZONES.iter().map(BuiltinZone::to_zone).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_names_and_ids_are_unique() {
        let names: HashSet<_> = BUILTIN_ZONES.iter().map(|b| b.name).collect();
        let ids: HashSet<_> = BUILTIN_ZONES.iter().map(|b| b.id()).collect();
        assert_eq!(names.len(), BUILTIN_ZONES.len());
        assert_eq!(ids.len(), BUILTIN_ZONES.len());
    }

    #[test]
    fn test_builtin_zone_shape() {
        let zones = builtin_zones();
        assert_eq!(zones.len(), 12);
        assert!(zones.iter().all(|z| z.is_builtin && z.radius_m > 0.0));

        let junction = zones.iter().find(|z| z.name == "Green Circle Junction").unwrap();
        assert_eq!(junction.severity, Severity::High);
        assert_eq!(junction.active_window, ActiveWindow::parse("21-05"));
        assert_eq!(junction.id, find_builtin("Green Circle Junction").unwrap().id());
        assert!(is_builtin_name("  Ariyur "));
        assert!(!is_builtin_name("Somewhere Else"));
    }
}
