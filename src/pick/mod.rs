//! Screen-space terrain picking.
//!
//! The mesh is rendered with flat per-triangle colors encoding quantized
//! grid-index buckets in the red and green channels and the triangle half
//! in blue, against a white background. Reading back one pixel and
//! decoding the color yields the cell under the cursor; successive passes
//! narrow the search window and raise the resolution until the pick is
//! exact at full resolution, falling back to the last successful coarser
//! result when a finer pass misses.

pub mod gpu;
pub mod raster;

use glam::{DMat4, DVec3};

use crate::camera::{Camera, ViewDimension};
use crate::error::ViewResult;
use crate::grid::Grid;
use crate::mesh::TerrainMesh;
use crate::projection::ProjectionEngine;
use crate::render::{Rez, HIGH_REZ_DIMENSION};

/// Bucket count per color channel.
pub const PICK_DIVISION: usize = 15;

/// Background channel value meaning "no terrain here".
pub const PICK_BACKGROUND: [f32; 3] = [1.0, 1.0, 1.0];

/// Inclusive vertex-index search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IjBounds {
    pub imin: usize,
    pub imax: usize,
    pub jmin: usize,
    pub jmax: usize,
}

impl IjBounds {
    pub fn full(grid: &Grid) -> Self {
        Self {
            imin: 0,
            imax: grid.nx - 1,
            jmin: 0,
            jmax: grid.ny - 1,
        }
    }

    fn collapsed(&self) -> bool {
        self.imin == self.imax && self.jmin == self.jmax
    }

    fn span(&self) -> usize {
        (self.imax - self.imin).max(self.jmax - self.jmin)
    }
}

/// A resolved pick.
#[derive(Debug, Clone, Copy)]
pub struct PickResult {
    pub xgrid: f64,
    pub ygrid: f64,
    pub zdata: f64,
    pub xlon: f64,
    pub ylat: f64,
    pub display: DVec3,
}

/// One flat-colored triangle of the pick rendering.
#[derive(Debug, Clone, Copy)]
pub struct PickTriangle {
    pub positions: [DVec3; 3],
    pub color: [f32; 3],
}

/// The triangles and view transform of one pick pass.
pub struct PickScene<'a> {
    grid: &'a Grid,
    mesh: &'a TerrainMesh,
    bounds: IjBounds,
    stride: usize,
    pickstride: usize,
    pub view_proj: DMat4,
}

impl PickScene<'_> {
    /// Visit every valid triangle with its encoded color.
    pub fn for_each_triangle(&self, mut visit: impl FnMut(PickTriangle)) {
        let grid = self.grid;
        let mut i = self.bounds.imin;
        while i + self.stride <= self.bounds.imax {
            let mut j = self.bounds.jmin;
            while j + self.stride <= self.bounds.jmax {
                let k = grid.index(i, j);
                let l = grid.index(i + self.stride, j);
                let m = grid.index(i, j + self.stride);
                let n = grid.index(i + self.stride, j + self.stride);
                let r = ((i - self.bounds.imin) / self.pickstride) as f32
                    / (PICK_DIVISION as f32 + 1.0);
                let g = ((j - self.bounds.jmin) / self.pickstride) as f32
                    / (PICK_DIVISION as f32 + 1.0);
                if grid.is_valid(k) && grid.is_valid(l) && grid.is_valid(m) {
                    visit(PickTriangle {
                        positions: [
                            self.mesh.position(k),
                            self.mesh.position(l),
                            self.mesh.position(m),
                        ],
                        color: [r, g, 0.25],
                    });
                }
                if grid.is_valid(l) && grid.is_valid(n) && grid.is_valid(m) {
                    visit(PickTriangle {
                        positions: [
                            self.mesh.position(l),
                            self.mesh.position(n),
                            self.mesh.position(m),
                        ],
                        color: [r, g, 0.75],
                    });
                }
                j += self.stride;
            }
            i += self.stride;
        }
    }
}

/// Renders a pick scene and reads back the color under one pixel.
pub trait PickSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn read_pixel(&mut self, scene: &PickScene, xpixel: u32, ypixel: u32) -> ViewResult<[f32; 3]>;
}

/// Resolve a screen pixel to terrain coordinates, refining the pick from
/// low through full resolution.
pub fn find_point(
    grid: &Grid,
    mesh: &mut TerrainMesh,
    proj: &ProjectionEngine,
    camera: &Camera,
    surface: &mut dyn PickSurface,
    xpixel: u32,
    ypixel: u32,
) -> ViewResult<Option<PickResult>> {
    let mut bounds = IjBounds::full(grid);
    let mut best: Option<PickResult> = None;

    let mut current =
        find_point_rez(grid, mesh, proj, camera, surface, Rez::Low, &mut bounds, xpixel, ypixel)?;
    if current.is_some() {
        best = current;
    }

    current =
        find_point_rez(grid, mesh, proj, camera, surface, Rez::High, &mut bounds, xpixel, ypixel)?;
    if current.is_some() {
        best = current;
    }

    // narrow until the window collapses to a single vertex
    while current.is_some() && !bounds.collapsed() {
        let rez = if bounds.span() > HIGH_REZ_DIMENSION {
            Rez::High
        } else {
            Rez::Full
        };
        current =
            find_point_rez(grid, mesh, proj, camera, surface, rez, &mut bounds, xpixel, ypixel)?;
        if current.is_some() {
            best = current;
        }
    }

    if best.is_none() && camera.dimension == ViewDimension::TwoD {
        // in the flat view the pixel inverts directly to the display
        // plane even off the grid
        let (x, y) = camera.pixel_to_display_2d(
            xpixel as f64,
            ypixel as f64,
            surface.width(),
            surface.height(),
        );
        let display = DVec3::new(x, y, 0.0);
        let (xlon, ylat) = proj.display_to_ll(display)?;
        let (xgrid, ygrid) = proj.ll_to_grid(xlon, ylat)?;
        let zdata = grid.sample(xgrid, ygrid).unwrap_or(0.0);
        return Ok(Some(PickResult {
            xgrid,
            ygrid,
            zdata,
            xlon,
            ylat,
            display,
        }));
    }

    Ok(best)
}

/// One pick pass at a fixed resolution tier. On success the bounds are
/// narrowed around the picked cell for the next pass.
#[allow(clippy::too_many_arguments)]
fn find_point_rez(
    grid: &Grid,
    mesh: &mut TerrainMesh,
    proj: &ProjectionEngine,
    camera: &Camera,
    surface: &mut dyn PickSurface,
    rez: Rez,
    bounds: &mut IjBounds,
    xpixel: u32,
    ypixel: u32,
) -> ViewResult<Option<PickResult>> {
    let stride = rez.stride(grid.nx, grid.ny);
    let ni = bounds.imax - bounds.imin + 1;
    let nj = bounds.jmax - bounds.jmin + 1;
    let ipickstride = stride * ((ni / stride) / PICK_DIVISION + 1);
    let jpickstride = stride * ((nj / stride) / PICK_DIVISION + 1);
    let pickstride = ipickstride.max(jpickstride);

    // positions for every vertex the pass may touch
    let mut i = bounds.imin;
    while i <= bounds.imax {
        let mut j = bounds.jmin;
        while j <= bounds.jmax {
            let k = grid.index(i, j);
            if grid.is_valid(k) {
                mesh.ensure_position(grid, proj, k)?;
            }
            j += stride;
        }
        i += stride;
    }

    let scene = PickScene {
        grid,
        mesh,
        bounds: *bounds,
        stride,
        pickstride,
        view_proj: camera.view_proj(),
    };
    let rgb = surface.read_pixel(&scene, xpixel, ypixel)?;

    let Some((i, j, first_half)) = decode(rgb, bounds, pickstride) else {
        return Ok(None);
    };
    if i + stride >= grid.nx || j + stride >= grid.ny {
        return Ok(None);
    }

    let k = grid.index(i, j);
    let l = grid.index(i + stride, j);
    let m = grid.index(i, j + stride);
    let n = grid.index(i + stride, j + stride);
    let (xgrid, ygrid, zdata) = if first_half {
        (
            grid.bounds.xmin + (3 * i + stride) as f64 * grid.dx / 3.0,
            grid.bounds.ymin + (3 * j + stride) as f64 * grid.dy / 3.0,
            (grid.data[k] as f64 + grid.data[l] as f64 + grid.data[m] as f64) / 3.0,
        )
    } else {
        (
            grid.bounds.xmin + (3 * i + 2 * stride) as f64 * grid.dx / 3.0,
            grid.bounds.ymin + (3 * j + 2 * stride) as f64 * grid.dy / 3.0,
            (grid.data[l] as f64 + grid.data[n] as f64 + grid.data[m] as f64) / 3.0,
        )
    };
    let (xlon, ylat, display) = proj.forward(xgrid, ygrid, zdata)?;

    *bounds = if pickstride == 1 {
        IjBounds {
            imin: i,
            imax: i,
            jmin: j,
            jmax: j,
        }
    } else {
        IjBounds {
            imin: i.saturating_sub(pickstride),
            imax: (i + 2 * pickstride - 1).min(grid.nx - 1),
            jmin: j.saturating_sub(pickstride),
            jmax: (j + 2 * pickstride - 1).min(grid.ny - 1),
        }
    };

    Ok(Some(PickResult {
        xgrid,
        ygrid,
        zdata,
        xlon,
        ylat,
        display,
    }))
}

/// Decode a read-back color to vertex indices and triangle half. The
/// background and anything color-quantization puts outside the encoding
/// report a miss.
fn decode(rgb: [f32; 3], bounds: &IjBounds, pickstride: usize) -> Option<(usize, usize, bool)> {
    let div = PICK_DIVISION as f32 + 1.0;
    if rgb[0] == 1.0 || rgb[1] == 1.0 || rgb[2] <= 0.2 || rgb[2] >= 0.8 {
        return None;
    }
    let i = bounds.imin + pickstride * (div * rgb[0]).round() as usize;
    let j = bounds.jmin + pickstride * (div * rgb[1]).round() as usize;
    let first_half = (div * rgb[2]).round() == (div / 4.0).round();
    Some((i, j, first_half))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_background() {
        let bounds = IjBounds {
            imin: 0,
            imax: 99,
            jmin: 0,
            jmax: 99,
        };
        assert!(decode(PICK_BACKGROUND, &bounds, 1).is_none());
        assert!(decode([0.1, 0.1, 0.0], &bounds, 1).is_none(), "blue outside band");
        assert!(decode([0.1, 0.1, 0.9], &bounds, 1).is_none());
    }

    #[test]
    fn decode_round_trips_buckets() {
        let bounds = IjBounds {
            imin: 10,
            imax: 80,
            jmin: 20,
            jmax: 90,
        };
        let pickstride = 5;
        for bucket_i in 0..=PICK_DIVISION {
            for half in [true, false] {
                let r = bucket_i as f32 / (PICK_DIVISION as f32 + 1.0);
                let g = 3.0 / (PICK_DIVISION as f32 + 1.0);
                let b = if half { 0.25 } else { 0.75 };
                let (i, j, h) = decode([r, g, b], &bounds, pickstride).unwrap();
                assert_eq!(i, 10 + pickstride * bucket_i);
                assert_eq!(j, 20 + pickstride * 3);
                assert_eq!(h, half);
            }
        }
    }

    #[test]
    fn decode_survives_8bit_quantization() {
        let bounds = IjBounds {
            imin: 0,
            imax: 99,
            jmin: 0,
            jmax: 99,
        };
        let quantize = |v: f32| (v * 255.0).round() / 255.0;
        for bucket in 0..=PICK_DIVISION {
            let r = quantize(bucket as f32 / (PICK_DIVISION as f32 + 1.0));
            let (i, _, _) = decode([r, quantize(0.0), quantize(0.25)], &bounds, 1).unwrap();
            assert_eq!(i, bucket, "bucket {} decoded as {}", bucket, i);
        }
    }
}
