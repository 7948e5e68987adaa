//! Circle-to-polygon synthesis for zone storage and display.
//!
//! Offsets are computed in a local planar approximation, which holds for
//! radii up to a few kilometers.

use std::f64::consts::PI;

use crate::error::GeometryError;
use crate::models::Coordinate;

use super::evaluator::haversine_m;

pub const DEFAULT_POINT_COUNT: usize = 64;

/// Kilometers per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Largest radius the planar approximation is trusted for.
pub const MAX_PLANAR_RADIUS_M: f64 = 5_000.0;

/// Below this `cos(latitude)` (about 87.1 degrees) longitude offsets stop being planar.
pub const MIN_LONGITUDE_SCALE: f64 = 0.05;

/// Closed ring of `[lng, lat]` pairs approximating a circle; `point_count + 1` vertices.
pub fn build_polygon(
    center: Coordinate,
    radius_m: f64,
    point_count: usize,
) -> Result<Vec<[f64; 2]>, GeometryError> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(GeometryError::InvalidRadius(radius_m));
    }
    if radius_m > MAX_PLANAR_RADIUS_M {
        return Err(GeometryError::RadiusTooLarge(radius_m));
    }
    if point_count < 3 {
        return Err(GeometryError::TooFewPoints(point_count));
    }

    let cos_lat = center.latitude.to_radians().cos();
    if !cos_lat.is_finite() || cos_lat < MIN_LONGITUDE_SCALE {
        return Err(GeometryError::PolarCenter(center.latitude));
    }

    let radius_km = radius_m / 1000.0;
    let lng_scale = KM_PER_DEGREE * cos_lat;

    let mut ring = Vec::with_capacity(point_count + 1);
    for i in 0..point_count {
        let angle = (i as f64 / point_count as f64) * 2.0 * PI;
        let dx = radius_km * angle.cos();
        let dy = radius_km * angle.sin();
        ring.push([center.longitude + dx / lng_scale, center.latitude + dy / KM_PER_DEGREE]);
    }
    ring.push(ring[0]);

    Ok(ring)
}

/// Inverse of [`build_polygon`]: vertex mean as center, haversine to the first vertex as radius.
pub fn centroid_and_radius(ring: &[[f64; 2]]) -> Result<(Coordinate, f64), GeometryError> {
    let first = *ring.first().ok_or(GeometryError::EmptyRing)?;
    let vertices = match ring {
        [.., last] if ring.len() > 1 && *last == first => &ring[..ring.len() - 1],
        _ => ring,
    };

    let n = vertices.len() as f64;
    let (sum_lng, sum_lat) = vertices
        .iter()
        .fold((0.0, 0.0), |(lng, lat), v| (lng + v[0], lat + v[1]));
    let center = Coordinate::new(sum_lat / n, sum_lng / n);
    let radius_m = haversine_m(center, Coordinate::new(first[1], first[0]));

    Ok((center, radius_m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_closed_with_expected_vertex_count() {
        let center = Coordinate::new(12.9716, 79.1594);
        for count in [3, 16, DEFAULT_POINT_COUNT, 100] {
            let ring = build_polygon(center, 250.0, count).unwrap();
            assert_eq!(ring.len(), count + 1);
            assert_eq!(ring.first(), ring.last());
        }
    }

    #[test]
    fn test_degenerate_radius_is_rejected() {
        let center = Coordinate::new(12.0, 79.0);
        assert_eq!(build_polygon(center, 0.0, 64), Err(GeometryError::InvalidRadius(0.0)));
        assert_eq!(build_polygon(center, -10.0, 64), Err(GeometryError::InvalidRadius(-10.0)));
        assert!(matches!(build_polygon(center, f64::NAN, 64), Err(GeometryError::InvalidRadius(_))));
        assert_eq!(build_polygon(center, 100.0, 2), Err(GeometryError::TooFewPoints(2)));
        assert_eq!(
            build_polygon(center, 20_000.0, 64),
            Err(GeometryError::RadiusTooLarge(20_000.0))
        );
    }

    #[test]
    fn test_polar_centers_are_rejected() {
        for latitude in [90.0, -90.0, 89.5] {
            assert_eq!(
                build_polygon(Coordinate::new(latitude, 0.0), 200.0, 64),
                Err(GeometryError::PolarCenter(latitude))
            );
        }
        assert!(matches!(
            build_polygon(Coordinate::new(f64::NAN, 0.0), 200.0, 64),
            Err(GeometryError::PolarCenter(_))
        ));

        let ring = build_polygon(Coordinate::new(85.0, 10.0), 5_000.0, 64).unwrap();
        assert!(ring.iter().all(|v| (v[0] - 10.0).abs() < 1.0 && v[1] < 90.0));
    }

    #[test]
    fn test_vertices_sit_on_the_circle() {
        let center = Coordinate::new(12.9490, 79.1650);
        let ring = build_polygon(center, 250.0, 64).unwrap();
        for v in &ring {
            let d = haversine_m(center, Coordinate::new(v[1], v[0]));
            assert!((d - 250.0).abs() / 250.0 < 0.01, "vertex at {} m", d);
        }
    }

    #[test]
    fn test_centroid_and_radius_recovers_the_circle() {
        for (lat, lng, radius) in [(12.9716, 79.1594, 300.0), (12.88, 79.10, 150.0), (51.5, -0.12, 200.0)] {
            let center = Coordinate::new(lat, lng);
            let ring = build_polygon(center, radius, DEFAULT_POINT_COUNT).unwrap();
            let (recovered, recovered_radius) = centroid_and_radius(&ring).unwrap();

            assert!(haversine_m(center, recovered) < radius * 0.01);
            assert!((recovered_radius - radius).abs() / radius < 0.01);
        }
    }

    #[test]
    fn test_centroid_of_open_ring_and_empty_ring() {
        let open = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        let (center, _) = centroid_and_radius(&open).unwrap();
        assert_eq!(center, Coordinate::new(1.0, 1.0));

        assert_eq!(centroid_and_radius(&[]), Err(GeometryError::EmptyRing));

        let (single, radius) = centroid_and_radius(&[[79.0, 12.0]]).unwrap();
        assert_eq!(single, Coordinate::new(12.0, 79.0));
        assert_eq!(radius, 0.0);
    }
}
