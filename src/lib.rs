//! Geometry engine for an interactive bathymetric terrain viewer.
//!
//! A [`viewer::Viewer`] owns a scalar [`grid::Grid`] and derives everything
//! the screen needs from it: display coordinates through a configurable
//! [`projection::ProjectionEngine`], ramp colors and shading, contour
//! lines, draped annotation geometry, and color-coded pick frames.
//! Heavy per-vertex work is cached behind epoch masks and recomputed
//! lazily after invalidation; redraws walk a low/high/full resolution
//! ladder with cooperative cancellation.
//!
//! Rendering and pick readback run on wgpu off-screen targets; a CPU
//! rasterizer backs picking where no GPU is available.

pub mod annotate;
pub mod camera;
pub mod color;
pub mod contour;
pub mod drape;
pub mod error;
pub mod grid;
pub mod mask;
pub mod mesh;
pub mod pick;
pub mod projection;
pub mod render;
pub mod shade;
pub mod viewer;

pub use error::{ViewError, ViewResult};
pub use grid::{Bounds, Grid};
pub use viewer::Viewer;
