//! Iso-elevation contour extraction.
//!
//! Each grid cell (stride-stepped at the active resolution tier) is split
//! into two triangles. For every contour level crossing a triangle's
//! elevation range the two edge crossings are interpolated in display
//! space and emitted as one line segment, lifted off the surface by the
//! contour offset policy.

use glam::DVec3;

use crate::error::{ViewError, ViewResult};
use crate::grid::Grid;
use crate::mesh::TerrainMesh;
use crate::projection::{ProjectionEngine, SurfaceOffset};
use crate::render::{CancelToken, Progress, Rez, EVENT_CHECK_COARSENESS};

/// Inclusive cell index window limiting extraction to a sub-region.
#[derive(Debug, Clone, Copy)]
pub struct CellWindow {
    pub imin: usize,
    pub imax: usize,
    pub jmin: usize,
    pub jmax: usize,
}

impl CellWindow {
    pub fn full(grid: &Grid) -> Self {
        Self {
            imin: 0,
            imax: grid.nx - 1,
            jmin: 0,
            jmax: grid.ny - 1,
        }
    }
}

/// Contour segments extracted at one tier.
#[derive(Debug, Clone)]
pub struct ContourSet {
    pub interval: f64,
    pub rez: Rez,
    pub segments: Vec<[DVec3; 2]>,
}

/// Extract contours over the whole grid. Returns None if cancelled.
pub fn extract(
    grid: &Grid,
    mesh: &mut TerrainMesh,
    proj: &ProjectionEngine,
    interval: f64,
    rez: Rez,
    cancel: &CancelToken,
    progress: Option<&mut dyn FnMut(Progress)>,
) -> ViewResult<Option<ContourSet>> {
    extract_window(
        grid,
        mesh,
        proj,
        interval,
        rez,
        CellWindow::full(grid),
        cancel,
        progress,
    )
}

/// Extract contours within a cell window.
#[allow(clippy::too_many_arguments)]
pub fn extract_window(
    grid: &Grid,
    mesh: &mut TerrainMesh,
    proj: &ProjectionEngine,
    interval: f64,
    rez: Rez,
    window: CellWindow,
    cancel: &CancelToken,
    mut progress: Option<&mut dyn FnMut(Progress)>,
) -> ViewResult<Option<ContourSet>> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(ViewError::grid(format!(
            "contour interval must be positive, got {}",
            interval
        )));
    }

    let stride = rez.stride(grid.nx, grid.ny);
    let offset = SurfaceOffset::contour(proj);
    let imax = window.imax.min(grid.nx - 1);
    let jmax = window.jmax.min(grid.ny - 1);
    let mut segments = Vec::new();

    let total = imax.saturating_sub(window.imin);
    let mut columns = 0usize;
    let mut i = window.imin;
    while i + stride <= imax {
        if columns % EVENT_CHECK_COARSENESS == 0 {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            if let Some(report) = progress.as_deref_mut() {
                report(Progress {
                    rez,
                    done: i - window.imin,
                    total,
                });
            }
        }
        columns += 1;

        let mut j = window.jmin;
        while j + stride <= jmax {
            contour_cell(grid, mesh, proj, interval, offset, i, j, stride, &mut segments)?;
            j += stride;
        }
        i += stride;
    }

    log::debug!(
        "contoured {:?} at interval {}: {} segments",
        rez,
        interval,
        segments.len()
    );
    Ok(Some(ContourSet {
        interval,
        rez,
        segments,
    }))
}

/// Contour both triangles of one cell.
#[allow(clippy::too_many_arguments)]
fn contour_cell(
    grid: &Grid,
    mesh: &mut TerrainMesh,
    proj: &ProjectionEngine,
    interval: f64,
    offset: SurfaceOffset,
    i: usize,
    j: usize,
    stride: usize,
    segments: &mut Vec<[DVec3; 2]>,
) -> ViewResult<()> {
    let k = grid.index(i, j);
    let l = grid.index(i + stride, j);
    let m = grid.index(i, j + stride);
    let n = grid.index(i + stride, j + stride);

    let triangle_a = grid.is_valid(k) && grid.is_valid(l) && grid.is_valid(m);
    let triangle_b = grid.is_valid(l) && grid.is_valid(n) && grid.is_valid(m);
    if !(triangle_a || triangle_b) {
        return Ok(());
    }

    let mut datamin = f64::INFINITY;
    let mut datamax = f64::NEG_INFINITY;
    for &kk in &[k, l, m, n] {
        if grid.is_valid(kk) {
            mesh.ensure_position(grid, proj, kk)?;
            let v = grid.data[kk] as f64;
            datamin = datamin.min(v);
            datamax = datamax.max(v);
        }
    }

    let level_min = (datamin / interval).ceil() as i64;
    let level_max = (datamax / interval).floor() as i64;
    for level in level_min..=level_max {
        let value = level as f64 * interval;
        if triangle_a {
            emit_triangle(grid, mesh, value, interval, offset, [k, l, m], segments);
        }
        if triangle_b {
            emit_triangle(grid, mesh, value, interval, offset, [l, n, m], segments);
        }
    }
    Ok(())
}

/// Emit the crossing segment of one triangle at one level, if the level
/// crosses exactly two edges.
fn emit_triangle(
    grid: &Grid,
    mesh: &TerrainMesh,
    level: f64,
    interval: f64,
    offset: SurfaceOffset,
    vertices: [usize; 3],
    segments: &mut Vec<[DVec3; 2]>,
) {
    // a vertex exactly on the level would be tangent under strict
    // comparison; nudge it off so the level still produces a line
    let z = |k: usize| {
        let v = grid.data[k] as f64;
        if v == level {
            v + 1e-6 * interval
        } else {
            v
        }
    };
    let [a, b, c] = vertices;
    let mut ends = [DVec3::ZERO; 2];
    let mut nside = 0usize;
    for (k1, k2) in [(a, b), (b, c), (c, a)] {
        if nside >= 2 {
            break;
        }
        let (z1, z2) = (z(k1), z(k2));
        if (z1 > level && z2 < level) || (z1 < level && z2 > level) {
            let factor = (level - z1) / (z2 - z1);
            let p1 = mesh.position(k1);
            let p2 = mesh.position(k2);
            ends[nside] = p1 + factor * (p2 - p1);
            nside += 1;
        }
    }
    if nside == 2 {
        segments.push([offset.apply(ends[0]), offset.apply(ends[1])]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Bounds;
    use crate::projection::{NoProviders, ProjectionMode};

    fn ramp_grid() -> Grid {
        // z ramps 0..30 across x
        let mut data = vec![0.0f32; 16];
        for i in 0..4 {
            for j in 0..4 {
                data[i * 4 + j] = 10.0 * i as f32;
            }
        }
        Grid::new(4, 4, Bounds::new(-121.6, -121.3, 36.6, 36.9), -9999.0, data, "").unwrap()
    }

    fn setup(grid: &Grid) -> (ProjectionEngine, TerrainMesh) {
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
        (proj, mesh)
    }

    #[test]
    fn ramp_produces_two_internal_levels() {
        let grid = ramp_grid();
        let (proj, mut mesh) = setup(&grid);
        let cancel = CancelToken::new();
        let set = extract(&grid, &mut mesh, &proj, 10.0, Rez::Full, &cancel, None)
            .unwrap()
            .unwrap();
        assert!(!set.segments.is_empty(), "ramp must contour");

        // recover contour levels from segment x positions: level 10 at
        // column 1, level 20 at column 2
        let x_of = |i: usize| {
            let (_, _, d) = proj.forward(grid.grid_x(i), grid.grid_y(1), 0.0).unwrap();
            d.x
        };
        let cell_diag = (x_of(1) - x_of(0)).abs() * 2.0f64.sqrt();
        let mut near_10 = 0;
        let mut near_20 = 0;
        for [a, b] in &set.segments {
            for p in [a, b] {
                let d1 = (p.x - x_of(1)).abs();
                let d2 = (p.x - x_of(2)).abs();
                assert!(
                    d1 < cell_diag || d2 < cell_diag,
                    "segment endpoint off both contour lines"
                );
                if d1 < d2 {
                    near_10 += 1;
                } else {
                    near_20 += 1;
                }
            }
        }
        assert!(near_10 > 0 && near_20 > 0, "both internal levels present");
    }

    #[test]
    fn level_count_matches_triangle_range() {
        // one cell, elevations spanning 5..35: levels 10, 20, 30
        let data = vec![5.0, 35.0, 5.0, 35.0];
        let grid = Grid::new(2, 2, Bounds::new(0.0, 0.1, 0.0, 0.1), -9999.0, data, "").unwrap();
        let (proj, mut mesh) = setup(&grid);
        let cancel = CancelToken::new();
        let set = extract(&grid, &mut mesh, &proj, 10.0, Rez::Full, &cancel, None)
            .unwrap()
            .unwrap();
        // two triangles, three levels each
        assert_eq!(set.segments.len(), 6, "{:?}", set.segments);
    }

    #[test]
    fn nodata_triangle_is_skipped() {
        let mut grid = ramp_grid();
        let nodata = grid.nodata;
        // knock out one corner: triangle A of cell (0,0) is gone
        let k = grid.index(0, 0);
        grid.data[k] = nodata;
        let (proj, mut mesh) = setup(&grid);
        let cancel = CancelToken::new();
        let set = extract(&grid, &mut mesh, &proj, 10.0, Rez::Full, &cancel, None)
            .unwrap()
            .unwrap();
        assert!(!set.segments.is_empty(), "remaining triangles still contour");
    }

    #[test]
    fn progress_reports_cover_the_sweep() {
        let grid = ramp_grid();
        let (proj, mut mesh) = setup(&grid);
        let cancel = CancelToken::new();
        let mut reports: Vec<Progress> = Vec::new();
        let mut on_progress = |p: Progress| reports.push(p);
        let set = extract(
            &grid,
            &mut mesh,
            &proj,
            10.0,
            Rez::Full,
            &cancel,
            Some(&mut on_progress),
        )
        .unwrap()
        .unwrap();
        assert!(!set.segments.is_empty());
        assert!(!reports.is_empty(), "extraction reports progress");
        assert!(reports.iter().all(|p| p.rez == Rez::Full && p.done <= p.total));
    }

    #[test]
    fn cancelled_extraction_returns_none() {
        let grid = ramp_grid();
        let (proj, mut mesh) = setup(&grid);
        let cancel = CancelToken::new();
        cancel.cancel();
        let set = extract(&grid, &mut mesh, &proj, 10.0, Rez::Full, &cancel, None).unwrap();
        assert!(set.is_none());
    }

    #[test]
    fn bad_interval_is_rejected() {
        let grid = ramp_grid();
        let (proj, mut mesh) = setup(&grid);
        let cancel = CancelToken::new();
        for interval in [0.0, -5.0, f64::NAN] {
            assert!(
                extract(&grid, &mut mesh, &proj, interval, Rez::Full, &cancel, None).is_err(),
                "interval {} accepted",
                interval
            );
        }
    }

    #[test]
    fn flat_grid_has_no_internal_contours() {
        let data = vec![15.0f32; 16];
        let grid = Grid::new(4, 4, Bounds::new(0.0, 0.3, 0.0, 0.3), -9999.0, data, "").unwrap();
        let (proj, mut mesh) = setup(&grid);
        let cancel = CancelToken::new();
        let set = extract(&grid, &mut mesh, &proj, 10.0, Rez::Full, &cancel, None)
            .unwrap()
            .unwrap();
        assert!(set.segments.is_empty(), "flat surface crosses no level");
    }
}
