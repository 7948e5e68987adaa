pub mod live_position;
pub mod membership;
pub mod zone;

pub use live_position::{ChangeKind, LivePosition, PositionChange, PositionDelta, PositionRecord, Transport};
pub use membership::{RiskStatus, UserStatus, ZoneMembership};
pub use zone::{
    ActiveWindow, Coordinate, NewZoneRecord, Severity, TimeMode, Zone, ZoneDraft, ZoneRecord, ZoneStats,
};
