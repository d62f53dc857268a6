//! Derived per-vertex buffers for the terrain surface.
//!
//! Display positions, slope pairs, and colors are computed lazily: each
//! buffer has an epoch mask, a vertex is filled on first access within the
//! current epoch, and invalidation bumps the epoch instead of rewriting
//! the buffers.

use glam::DVec3;

use crate::error::ViewResult;
use crate::grid::Grid;
use crate::mask::EpochMask;
use crate::projection::ProjectionEngine;

pub struct TerrainMesh {
    pub xdisplay: Vec<f32>,
    pub ydisplay: Vec<f32>,
    pub zdisplay: Vec<f32>,
    /// Slope in display units, scale * dz/dx
    pub dzdx: Vec<f32>,
    pub dzdy: Vec<f32>,
    pub color: Vec<[f32; 3]>,
    pub position_mask: EpochMask,
    pub slope_mask: EpochMask,
    pub color_mask: EpochMask,
}

impl TerrainMesh {
    pub fn new(len: usize) -> Self {
        Self {
            xdisplay: vec![0.0; len],
            ydisplay: vec![0.0; len],
            zdisplay: vec![0.0; len],
            dzdx: vec![0.0; len],
            dzdy: vec![0.0; len],
            color: vec![[0.0; 3]; len],
            position_mask: EpochMask::new(len),
            slope_mask: EpochMask::new(len),
            color_mask: EpochMask::new(len),
        }
    }

    /// Invalidate display positions and slopes (projection, scale, or
    /// exaggeration changed).
    pub fn invalidate_positions(&mut self) {
        self.position_mask.clear();
        self.slope_mask.clear();
    }

    /// Invalidate vertex colors (color parameters changed).
    pub fn invalidate_colors(&mut self) {
        self.color_mask.clear();
    }

    #[inline]
    pub fn position(&self, k: usize) -> DVec3 {
        DVec3::new(
            self.xdisplay[k] as f64,
            self.ydisplay[k] as f64,
            self.zdisplay[k] as f64,
        )
    }

    /// Compute the display position of vertex k if not already computed
    /// in the current epoch.
    pub fn ensure_position(
        &mut self,
        grid: &Grid,
        proj: &ProjectionEngine,
        k: usize,
    ) -> ViewResult<()> {
        if self.position_mask.is_set(k) {
            return Ok(());
        }
        let (i, j) = grid.vertex(k);
        let (_, _, display) = proj.forward(grid.grid_x(i), grid.grid_y(j), grid.data[k] as f64)?;
        self.xdisplay[k] = display.x as f32;
        self.ydisplay[k] = display.y as f32;
        self.zdisplay[k] = display.z as f32;
        self.position_mask.set(k);
        Ok(())
    }

    /// Compute the slope pair of vertex k if not already computed in the
    /// current epoch. Uses the centered difference between the two valid
    /// neighbors, falling back to a one-sided difference when only one
    /// side is valid, and zero otherwise.
    pub fn ensure_slope(&mut self, grid: &Grid, proj: &ProjectionEngine, k: usize) -> ViewResult<()> {
        if self.slope_mask.is_set(k) {
            return Ok(());
        }
        let (i, j) = grid.vertex(k);

        // x direction
        let xpair = neighbor_pair(grid, k, i, grid.nx, |ii| grid.index(ii, j));
        self.dzdx[k] = match xpair {
            Some((k1, k2)) => {
                self.ensure_position(grid, proj, k1)?;
                self.ensure_position(grid, proj, k2)?;
                let dx = (self.xdisplay[k2] - self.xdisplay[k1]) as f64;
                if dx != 0.0 {
                    (proj.scale * (grid.data[k2] - grid.data[k1]) as f64 / dx) as f32
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        // y direction
        let ypair = neighbor_pair(grid, k, j, grid.ny, |jj| grid.index(i, jj));
        self.dzdy[k] = match ypair {
            Some((k1, k2)) => {
                self.ensure_position(grid, proj, k1)?;
                self.ensure_position(grid, proj, k2)?;
                let dy = (self.ydisplay[k2] - self.ydisplay[k1]) as f64;
                if dy != 0.0 {
                    (proj.scale * (grid.data[k2] - grid.data[k1]) as f64 / dy) as f32
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        self.slope_mask.set(k);
        Ok(())
    }
}

/// Pick the difference pair (k1, k2) along one axis: the two neighbors
/// when both are valid, otherwise the vertex itself and its single valid
/// neighbor, otherwise None.
fn neighbor_pair(
    grid: &Grid,
    k: usize,
    idx: usize,
    count: usize,
    index_of: impl Fn(usize) -> usize,
) -> Option<(usize, usize)> {
    if idx == 0 {
        let k1 = index_of(idx);
        let k2 = index_of(idx + 1);
        (grid.is_valid(k1) && grid.is_valid(k2)).then_some((k1, k2))
    } else if idx == count - 1 {
        let k1 = index_of(idx - 1);
        let k2 = index_of(idx);
        (grid.is_valid(k1) && grid.is_valid(k2)).then_some((k1, k2))
    } else {
        let k1 = index_of(idx - 1);
        let k2 = index_of(idx + 1);
        if grid.is_valid(k1) && grid.is_valid(k2) {
            Some((k1, k2))
        } else if grid.is_valid(k1) && grid.is_valid(k) {
            Some((k1, k))
        } else if grid.is_valid(k) && grid.is_valid(k2) {
            Some((k, k2))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bounds;
    use crate::projection::{NoProviders, ProjectionEngine, ProjectionMode};

    fn ramp_grid() -> Grid {
        // 4x4 geographic grid, z = 100 * i
        let mut data = vec![0.0f32; 16];
        for i in 0..4 {
            for j in 0..4 {
                data[i * 4 + j] = 100.0 * i as f32;
            }
        }
        Grid::new(4, 4, Bounds::new(-121.6, -121.3, 36.6, 36.9), -9999.0, data, "").unwrap()
    }

    fn geo_engine(grid: &Grid) -> ProjectionEngine {
        ProjectionEngine::configure(
            grid,
            ProjectionMode::Geographic,
            ProjectionMode::Geographic,
            "",
            1.0,
            1.0,
            &NoProviders,
        )
        .unwrap()
    }

    #[test]
    fn positions_computed_once_per_epoch() {
        let grid = ramp_grid();
        let proj = geo_engine(&grid);
        let mut mesh = TerrainMesh::new(grid.len());
        mesh.ensure_position(&grid, &proj, 5).unwrap();
        let before = mesh.position(5);
        assert!(mesh.position_mask.is_set(5));
        mesh.ensure_position(&grid, &proj, 5).unwrap();
        assert_eq!(mesh.position(5), before);
        mesh.invalidate_positions();
        assert!(!mesh.position_mask.is_set(5));
    }

    #[test]
    fn uniform_ramp_slope_is_constant() {
        let grid = ramp_grid();
        let proj = geo_engine(&grid);
        let mut mesh = TerrainMesh::new(grid.len());
        // interior vertices see the same centered difference
        let ka = grid.index(1, 1);
        let kb = grid.index(2, 2);
        mesh.ensure_slope(&grid, &proj, ka).unwrap();
        mesh.ensure_slope(&grid, &proj, kb).unwrap();
        assert!((mesh.dzdx[ka] - mesh.dzdx[kb]).abs() < 1e-6);
        assert!(mesh.dzdx[ka] > 0.0, "ramp slopes up along x");
        assert!(mesh.dzdy[ka].abs() < 1e-6, "no y gradient on an x ramp");
    }

    #[test]
    fn edge_vertex_uses_one_sided_difference() {
        let grid = ramp_grid();
        let proj = geo_engine(&grid);
        let mut mesh = TerrainMesh::new(grid.len());
        let k_edge = grid.index(0, 1);
        let k_mid = grid.index(1, 1);
        mesh.ensure_slope(&grid, &proj, k_edge).unwrap();
        mesh.ensure_slope(&grid, &proj, k_mid).unwrap();
        // a linear ramp gives the same slope either way
        assert!((mesh.dzdx[k_edge] - mesh.dzdx[k_mid]).abs() < 1e-6);
    }

    #[test]
    fn isolated_vertex_has_zero_slope() {
        let mut grid = ramp_grid();
        let nodata = grid.nodata;
        for i in 0..4usize {
            for j in 0..4usize {
                if (i, j) != (1, 1) {
                    let k = grid.index(i, j);
                    grid.data[k] = nodata;
                }
            }
        }
        let proj = geo_engine(&grid);
        let mut mesh = TerrainMesh::new(grid.len());
        let k = grid.index(1, 1);
        mesh.ensure_slope(&grid, &proj, k).unwrap();
        assert_eq!((mesh.dzdx[k], mesh.dzdy[k]), (0.0, 0.0));
    }
}
