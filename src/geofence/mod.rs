pub mod evaluator;
pub mod geometry;

pub use evaluator::{
    active_now, evaluate, evaluate_all, haversine_m, is_inside, zone_stats, zones_by_time_mode,
};
pub use geometry::{build_polygon, centroid_and_radius, DEFAULT_POINT_COUNT};
