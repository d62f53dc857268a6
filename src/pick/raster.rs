//! Software pick surface.
//!
//! Evaluates the pick rendering analytically at the queried pixel: each
//! triangle is projected to screen space, the pixel is tested for
//! coverage, and the nearest covering triangle wins the depth test. The
//! result is identical to rasterizing the whole frame and reading one
//! pixel back, without touching a GPU.

use glam::{DVec2, DVec4};

use crate::error::ViewResult;

use super::{PickScene, PickSurface, PICK_BACKGROUND};

pub struct RasterPickSurface {
    width: u32,
    height: u32,
}

impl RasterPickSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl PickSurface for RasterPickSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn read_pixel(&mut self, scene: &PickScene, xpixel: u32, ypixel: u32) -> ViewResult<[f32; 3]> {
        let target = DVec2::new(xpixel as f64 + 0.5, ypixel as f64 + 0.5);
        let mut color = PICK_BACKGROUND;
        let mut depth = f64::INFINITY;

        scene.for_each_triangle(|tri| {
            let mut screen = [DVec2::ZERO; 3];
            let mut ndc_z = [0.0f64; 3];
            for (idx, p) in tri.positions.iter().enumerate() {
                let clip = scene.view_proj * DVec4::new(p.x, p.y, p.z, 1.0);
                if clip.w <= 0.0 {
                    return;
                }
                let ndc = clip / clip.w;
                screen[idx] = DVec2::new(
                    (ndc.x + 1.0) * 0.5 * self.width as f64,
                    (ndc.y + 1.0) * 0.5 * self.height as f64,
                );
                ndc_z[idx] = ndc.z;
            }

            let area = edge(screen[0], screen[1], screen[2]);
            if area == 0.0 {
                return;
            }
            let w0 = edge(screen[1], screen[2], target) / area;
            let w1 = edge(screen[2], screen[0], target) / area;
            let w2 = edge(screen[0], screen[1], target) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                return;
            }
            let z = w0 * ndc_z[0] + w1 * ndc_z[1] + w2 * ndc_z[2];
            if z < depth {
                depth = z;
                color = tri.color;
            }
        });

        Ok(color)
    }
}

/// Signed parallelogram area of (b - a) x (c - a).
fn edge(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, ViewDimension};
    use crate::grid::{Bounds, Grid};
    use crate::mesh::TerrainMesh;
    use crate::pick;
    use crate::projection::{NoProviders, ProjectionEngine, ProjectionMode};

    fn bowl_grid() -> Grid {
        // shallow bowl so triangles are non-degenerate in 3D too
        let n = 16usize;
        let mut data = vec![0.0f32; n * n];
        for i in 0..n {
            for j in 0..n {
                let di = i as f32 - 7.5;
                let dj = j as f32 - 7.5;
                data[i * n + j] = -100.0 + (di * di + dj * dj) * 0.5;
            }
        }
        Grid::new(
            n,
            n,
            Bounds::new(-121.9, -121.4, 36.0, 36.5),
            -9999.0,
            data,
            "",
        )
        .unwrap()
    }

    fn setup(grid: &Grid) -> (ProjectionEngine, TerrainMesh, Camera) {
        let proj = ProjectionEngine::configure(
            grid,
            ProjectionMode::Geographic,
            ProjectionMode::Geographic,
            "",
            1.0,
            1.0,
            &NoProviders,
        )
        .unwrap();
        let mesh = TerrainMesh::new(grid.len());
        let camera = Camera::new(ViewDimension::TwoD, 1.0);
        (proj, mesh, camera)
    }

    #[test]
    fn center_pixel_picks_center_cell() {
        let grid = bowl_grid();
        let (proj, mut mesh, camera) = setup(&grid);
        let mut surface = RasterPickSurface::new(400, 400);
        let result = pick::find_point(&grid, &mut mesh, &proj, &camera, &mut surface, 200, 200)
            .unwrap()
            .unwrap();
        // the display origin sits at the grid center
        let mid_x = 0.5 * (grid.bounds.xmin + grid.bounds.xmax);
        let mid_y = 0.5 * (grid.bounds.ymin + grid.bounds.ymax);
        assert!(
            (result.xgrid - mid_x).abs() < 2.0 * grid.dx,
            "picked {} vs center {}",
            result.xgrid,
            mid_x
        );
        assert!((result.ygrid - mid_y).abs() < 2.0 * grid.dy);
        // scalar is the triangle's vertex mean, near the bowl bottom
        assert!(result.zdata < -80.0, "zdata {}", result.zdata);
    }

    #[test]
    fn refinement_converges_to_one_cell() {
        let grid = bowl_grid();
        let (proj, mut mesh, camera) = setup(&grid);
        let mut surface = RasterPickSurface::new(400, 400);
        // a pixel off-center still over the terrain
        let result = pick::find_point(&grid, &mut mesh, &proj, &camera, &mut surface, 260, 250)
            .unwrap()
            .unwrap();
        // full-resolution pick lands within one cell of the exact spot
        let (_, _, display) = proj.forward(result.xgrid, result.ygrid, result.zdata).unwrap();
        let (px, py, _) = camera.display_to_pixel(display, 400, 400).unwrap();
        let cell_px = 400.0 * camera.zoom / (grid.nx as f64);
        assert!(
            (px - 260.0).abs() < 2.0 * cell_px && (py - 250.0).abs() < 2.0 * cell_px,
            "picked point reprojects to ({}, {}), want near (260, 250)",
            px,
            py
        );
    }

    #[test]
    fn background_pixel_in_2d_inverts_directly() {
        let grid = bowl_grid();
        let (proj, mut mesh, camera) = setup(&grid);
        let mut surface = RasterPickSurface::new(400, 400);
        // corner pixel, far off the rendered terrain
        let result = pick::find_point(&grid, &mut mesh, &proj, &camera, &mut surface, 2, 2)
            .unwrap()
            .unwrap();
        assert!(
            !grid.bounds.contains(result.xgrid, result.ygrid),
            "corner pixel must fall outside the grid"
        );
    }

    #[test]
    fn background_pixel_in_3d_is_a_miss() {
        let grid = bowl_grid();
        let (proj, mut mesh, _) = setup(&grid);
        let mut camera = Camera::new(ViewDimension::ThreeD, 1.0);
        camera.view_offset_z = -5.0;
        let mut surface = RasterPickSurface::new(400, 400);
        let result =
            pick::find_point(&grid, &mut mesh, &proj, &camera, &mut surface, 2, 2).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn nodata_hole_reads_background() {
        let mut grid = bowl_grid();
        let nodata = grid.nodata;
        // punch a hole across the middle
        for i in 6..10usize {
            for j in 6..10usize {
                let k = grid.index(i, j);
                grid.data[k] = nodata;
            }
        }
        let (proj, mut mesh, camera) = setup(&grid);
        let mut surface = RasterPickSurface::new(400, 400);
        let result = pick::find_point(&grid, &mut mesh, &proj, &camera, &mut surface, 200, 200)
            .unwrap()
            .unwrap();
        // 2D fallback inverts the pixel; it lands inside the bounds but
        // over the hole, so the sampled scalar is absent
        assert!(grid.bounds.contains(result.xgrid, result.ygrid));
        assert_eq!(result.zdata, 0.0, "hole has no scalar to sample");
    }
}
