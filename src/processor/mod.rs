pub mod membership_monitor;

pub use membership_monitor::{MembershipMonitor, StatusTransition};
