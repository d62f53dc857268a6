//! View transform from display space to screen pixels.
//!
//! 2D mode uses an orthographic view of the display plane with pan and
//! zoom; 3D mode orbits the terrain with separate model and view
//! rotations. Pixel coordinates follow the read-back convention: origin
//! at the lower-left of the viewport.

use glam::{DMat4, DVec3, DVec4};

use crate::projection::VIEW_WIDTH;

const ORTHO_NEAR: f64 = -5.0;
const ORTHO_FAR: f64 = 1000.0;
const FOVY_DEGREES: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDimension {
    TwoD,
    ThreeD,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub dimension: ViewDimension,
    /// Viewport width / height.
    pub aspect: f64,
    /// 2D zoom; larger values zoom in.
    pub zoom: f64,
    pub offset2d_x: f64,
    pub offset2d_y: f64,
    /// Model rotation, degrees.
    pub azimuth: f64,
    pub elevation: f64,
    /// Additional view (camera) rotation for 3D, degrees.
    pub view_azimuth: f64,
    pub view_elevation: f64,
    pub offset3d: DVec3,
    pub view_offset_z: f64,
}

impl Camera {
    pub fn new(dimension: ViewDimension, aspect: f64) -> Self {
        Self {
            dimension,
            aspect,
            zoom: 1.0,
            offset2d_x: 0.0,
            offset2d_y: 0.0,
            azimuth: 0.0,
            elevation: 90.0,
            view_azimuth: 0.0,
            view_elevation: 90.0,
            offset3d: DVec3::ZERO,
            view_offset_z: 0.0,
        }
    }

    /// Horizontal half-extent of the 2D view frustum in display units.
    pub fn half_width(&self) -> f64 {
        VIEW_WIDTH / self.zoom
    }

    /// Vertical half-extent of the 2D view frustum.
    pub fn half_height(&self) -> f64 {
        VIEW_WIDTH / self.aspect / self.zoom
    }

    /// Combined projection and model-view transform.
    pub fn view_proj(&self) -> DMat4 {
        match self.dimension {
            ViewDimension::TwoD => {
                let proj = DMat4::orthographic_rh_gl(
                    -self.half_width(),
                    self.half_width(),
                    -self.half_height(),
                    self.half_height(),
                    ORTHO_NEAR,
                    ORTHO_FAR,
                );
                let model = DMat4::from_translation(DVec3::new(
                    self.offset2d_x,
                    self.offset2d_y,
                    ORTHO_NEAR,
                ));
                proj * model
            }
            ViewDimension::ThreeD => {
                let proj = DMat4::perspective_rh_gl(
                    FOVY_DEGREES.to_radians(),
                    self.aspect,
                    0.01 * VIEW_WIDTH,
                    1000.0 * VIEW_WIDTH,
                );
                let view_distance = 0.48 * VIEW_WIDTH * VIEW_WIDTH / self.aspect;
                let model = DMat4::from_translation(DVec3::new(
                    0.0,
                    0.0,
                    -view_distance + self.view_offset_z,
                )) * DMat4::from_rotation_x((self.view_elevation - 90.0).to_radians())
                    * DMat4::from_rotation_z(self.view_azimuth.to_radians())
                    * DMat4::from_translation(DVec3::new(
                        self.offset3d.x,
                        self.offset3d.y,
                        -view_distance + self.offset3d.z,
                    ))
                    * DMat4::from_rotation_x((self.elevation - 90.0).to_radians())
                    * DMat4::from_rotation_z(self.azimuth.to_radians());
                proj * model
            }
        }
    }

    /// Project a display-space point to pixel coordinates plus NDC depth.
    /// Returns None for points behind the camera.
    pub fn display_to_pixel(
        &self,
        p: DVec3,
        width: u32,
        height: u32,
    ) -> Option<(f64, f64, f64)> {
        let clip = self.view_proj() * DVec4::new(p.x, p.y, p.z, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip / clip.w;
        let px = (ndc.x + 1.0) * 0.5 * width as f64;
        let py = (ndc.y + 1.0) * 0.5 * height as f64;
        Some((px, py, ndc.z))
    }

    /// Invert a 2D-mode pixel back to display-plane coordinates.
    pub fn pixel_to_display_2d(&self, xpixel: f64, ypixel: f64, width: u32, height: u32) -> (f64, f64) {
        let x = -self.half_width() - self.offset2d_x
            + 2.0 * self.half_width() * xpixel / width as f64;
        let y = -self.half_height() - self.offset2d_y
            + 2.0 * self.half_height() * ypixel / height as f64;
        (x, y)
    }
}
