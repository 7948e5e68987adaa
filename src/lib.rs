//! Geofence monitoring core: risk zones, live user positions and the
//! per-user zone status derived from them.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod geofence;
pub mod kafka;
pub mod models;
pub mod processor;
pub mod repository;
