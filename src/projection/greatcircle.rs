//! Great-circle navigation on the viewing sphere.

use super::SPHEROID_RADIUS;

/// Great-circle distance in meters between two geographic points.
pub fn distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let rlon1 = lon1.to_radians();
    let rlat1 = lat1.to_radians();
    let rlon2 = lon2.to_radians();
    let rlat2 = lat2.to_radians();
    let t1 = (0.5 * (rlon1 - rlon2)).sin();
    let t2 = (0.5 * (rlat1 - rlat2)).sin();
    let dd = 2.0 * (t2 * t2 + rlat1.cos() * rlat2.cos() * t1 * t1).sqrt().asin();
    SPHEROID_RADIUS * dd
}

/// Great-circle distance in meters and initial bearing in degrees
/// clockwise from north.
///
/// At the poles the bearing formula degenerates; a point at the north
/// pole heads south (180) and one at the south pole heads north (0).
pub fn dist_bearing(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> (f64, f64) {
    let rlon1 = lon1.to_radians();
    let rlat1 = lat1.to_radians();
    let rlon2 = lon2.to_radians();
    let rlat2 = lat2.to_radians();
    let t1 = (0.5 * (rlon1 - rlon2)).sin();
    let t2 = (0.5 * (rlat1 - rlat2)).sin();
    let dd = 2.0 * (t2 * t2 + rlat1.cos() * rlat2.cos() * t1 * t1).sqrt().asin();
    let distance = SPHEROID_RADIUS * dd;

    let bearing = if (1.0 - rlat1.sin().abs()).abs() < 1e-6 {
        if lat1 > 0.0 {
            180.0
        } else {
            0.0
        }
    } else {
        let t3 = (rlat2.sin() - rlat1.sin() * dd.cos()) / (dd.sin() * rlat1.cos());
        let rbearing = t3.clamp(-1.0, 1.0).acos();
        let mut b = if t1 <= 0.0 {
            rbearing.to_degrees()
        } else {
            360.0 - rbearing.to_degrees()
        };
        if b < 0.0 {
            b += 360.0;
        }
        b
    };
    (distance, bearing)
}

/// Destination point after travelling `distance` meters from (lon1, lat1)
/// along the given bearing (degrees clockwise from north).
pub fn end_position(lon1: f64, lat1: f64, bearing: f64, distance: f64) -> (f64, f64) {
    let rd = distance / SPHEROID_RADIUS;
    let rbearing = (360.0 - bearing).to_radians();
    let rlon1 = lon1.to_radians();
    let rlat1 = lat1.to_radians();

    let rlat2 = (rlat1.sin() * rd.cos() + rlat1.cos() * rd.sin() * rbearing.cos()).asin();
    let lat2 = rlat2.to_degrees();

    // longitude is indeterminate at the poles
    let lon2 = if rlat2.cos() < 1e-6 {
        lon1
    } else {
        let rlon2 = (rlon1 - (rbearing.sin() * rd.sin() / rlat2.cos()).asin() + std::f64::consts::PI)
            .rem_euclid(2.0 * std::f64::consts::PI)
            - std::f64::consts::PI;
        rlon2.to_degrees()
    };
    (lon2, lat2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL_M: f64 = 1.0;

    #[test]
    fn zero_distance_to_self() {
        let d = distance(-121.5, 36.7, -121.5, 36.7);
        assert!(d.abs() < 1e-6, "distance to self should be 0, got {}", d);
    }

    #[test]
    fn antipode_is_half_circumference() {
        let d = distance(10.0, 20.0, -170.0, -20.0);
        let half = std::f64::consts::PI * SPHEROID_RADIUS;
        assert!((d - half).abs() < TOL_M, "got {}, want {}", d, half);
    }

    #[test]
    fn equator_degree_of_longitude() {
        let d = distance(0.0, 0.0, 1.0, 0.0);
        let want = SPHEROID_RADIUS * 1.0f64.to_radians();
        assert!((d - want).abs() < TOL_M);
    }

    #[test]
    fn bearing_cardinal_directions() {
        let (_, north) = dist_bearing(0.0, 0.0, 0.0, 1.0);
        assert!((north - 0.0).abs() < 1e-6 || (north - 360.0).abs() < 1e-6);
        let (_, east) = dist_bearing(0.0, 0.0, 1.0, 0.0);
        assert!((east - 90.0).abs() < 1e-6, "east bearing {}", east);
        let (_, south) = dist_bearing(0.0, 1.0, 0.0, 0.0);
        assert!((south - 180.0).abs() < 1e-6, "south bearing {}", south);
        let (_, west) = dist_bearing(1.0, 0.0, 0.0, 0.0);
        assert!((west - 270.0).abs() < 1e-6, "west bearing {}", west);
    }

    #[test]
    fn pole_bearing_special_case() {
        let (_, b) = dist_bearing(0.0, 90.0, 10.0, 45.0);
        assert_eq!(b, 180.0, "north pole heads south");
        let (_, b) = dist_bearing(0.0, -90.0, 10.0, -45.0);
        assert_eq!(b, 0.0, "south pole heads north");
    }

    #[test]
    fn end_position_round_trip() {
        let (lon1, lat1) = (-121.9, 36.6);
        let (lon2, lat2) = (-121.2, 36.9);
        let (d, b) = dist_bearing(lon1, lat1, lon2, lat2);
        let (rlon, rlat) = end_position(lon1, lat1, b, d);
        assert!(
            (rlon - lon2).abs() < 1e-3 && (rlat - lat2).abs() < 1e-3,
            "round trip gave ({}, {}), want ({}, {})",
            rlon,
            rlat,
            lon2,
            lat2
        );
    }
}
