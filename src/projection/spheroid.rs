//! Earth-centered sphere rotation for the 3D spheroid display mode.
//!
//! Two Euler rotation matrices (z, x', z'' convention) are built from a
//! reference longitude/latitude so the rotated reference point lands on
//! the positive z axis; the reverse matrix undoes the rotation.

use glam::{DMat3, DVec3};

use super::SPHEROID_RADIUS;

#[derive(Debug, Clone)]
pub struct SphereRotation {
    pub reflon: f64,
    pub reflat: f64,
    /// Rotated Cartesian position of the reference point; zero when the
    /// view is earth-centered.
    pub refpos: DVec3,
    forward: DMat3,
    reverse: DMat3,
}

/// Euler rotation matrix for successive rotations about z (phi),
/// x' (theta), and z'' (psi), in radians.
fn euler_matrix(phi: f64, theta: f64, psi: f64) -> DMat3 {
    let (sphi, cphi) = phi.sin_cos();
    let (stheta, ctheta) = theta.sin_cos();
    let (spsi, cpsi) = psi.sin_cos();
    // rows of the rotation matrix; glam stores columns, so transpose
    DMat3::from_cols(
        DVec3::new(
            cphi * cpsi - sphi * ctheta * spsi,
            -cphi * spsi - sphi * ctheta * cpsi,
            sphi * stheta,
        ),
        DVec3::new(
            sphi * cpsi + cphi * ctheta * spsi,
            -sphi * spsi + cphi * ctheta * cpsi,
            -cphi * stheta,
        ),
        DVec3::new(stheta * spsi, stheta * cpsi, ctheta),
    )
}

impl SphereRotation {
    /// Build the rotation pair for a reference point. With
    /// `earth_centered` the rotated frame keeps the sphere's center at
    /// the origin; otherwise coordinates are later offset so the
    /// reference point itself is the origin.
    pub fn new(reflon: f64, reflat: f64, earth_centered: bool) -> Self {
        use std::f64::consts::PI;
        let forward = euler_matrix(
            reflon.to_radians() - 0.5 * PI,
            reflat.to_radians() - 0.5 * PI,
            PI,
        );
        let reverse = euler_matrix(
            -PI,
            0.5 * PI - reflat.to_radians(),
            0.5 * PI - reflon.to_radians(),
        );
        let mut rot = Self {
            reflon,
            reflat,
            refpos: DVec3::ZERO,
            forward,
            reverse,
        };
        if !earth_centered {
            rot.refpos = rot.forward(reflon, reflat);
        }
        rot
    }

    /// Geographic position to rotated Cartesian coordinates on the
    /// sphere surface (no elevation applied).
    pub fn forward(&self, lon: f64, lat: f64) -> DVec3 {
        let (sinlon, coslon) = lon.to_radians().sin_cos();
        let (sinlat, coslat) = lat.to_radians().sin_cos();
        let pos = DVec3::new(
            SPHEROID_RADIUS * coslon * coslat,
            SPHEROID_RADIUS * sinlon * coslat,
            SPHEROID_RADIUS * sinlat,
        );
        self.forward * pos
    }

    /// Rotated Cartesian coordinates back to geographic position.
    pub fn inverse(&self, pos: DVec3) -> (f64, f64) {
        let p = self.reverse * pos;
        let lon = p.y.atan2(p.x).to_degrees();
        let lat = 90.0 - (p.x * p.x + p.y * p.y).sqrt().atan2(p.z).to_degrees();
        (lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_lands_on_z_axis() {
        let rot = SphereRotation::new(-121.5, 36.7, true);
        let p = rot.forward(-121.5, 36.7);
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6, "ref not on z axis: {:?}", p);
        assert!((p.z - SPHEROID_RADIUS).abs() < 1e-6);
    }

    #[test]
    fn forward_inverse_round_trip() {
        let rot = SphereRotation::new(15.0, -40.0, true);
        for &(lon, lat) in &[(14.0, -41.0), (17.5, -38.25), (15.0, -40.0), (-30.0, 10.0)] {
            let p = rot.forward(lon, lat);
            let (rlon, rlat) = rot.inverse(p);
            assert!(
                (rlon - lon).abs() < 1e-9 && (rlat - lat).abs() < 1e-9,
                "round trip ({}, {}) gave ({}, {})",
                lon,
                lat,
                rlon,
                rlat
            );
        }
    }

    #[test]
    fn refpos_zero_when_earth_centered() {
        let centered = SphereRotation::new(5.0, 5.0, true);
        assert_eq!(centered.refpos, DVec3::ZERO);
        let local = SphereRotation::new(5.0, 5.0, false);
        assert!((local.refpos.length() - SPHEROID_RADIUS).abs() < 1e-6);
    }
}
