//! Draping annotation segments onto the terrain surface.
//!
//! A draped segment carries an interior polyline that follows the relief
//! between its endpoints. In planar display modes the polyline samples the
//! grid lines the segment crosses; in spheroid mode it follows the great
//! circle between the endpoints. The polyline is cached and recomputed
//! only after an endpoint or projection change.

use glam::DVec3;

use crate::error::ViewResult;
use crate::grid::Grid;
use crate::projection::{greatcircle, ProjectionEngine, ProjectionMode, SurfaceOffset};

/// One point of annotation geometry, carried in every coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrapePoint {
    pub xgrid: f64,
    pub ygrid: f64,
    pub xlon: f64,
    pub ylat: f64,
    pub zdata: f64,
    pub display: DVec3,
}

impl DrapePoint {
    /// Build a point from grid coordinates.
    pub fn from_grid(
        proj: &ProjectionEngine,
        xgrid: f64,
        ygrid: f64,
        zdata: f64,
    ) -> ViewResult<Self> {
        let (xlon, ylat, display) = proj.forward(xgrid, ygrid, zdata)?;
        Ok(Self {
            xgrid,
            ygrid,
            xlon,
            ylat,
            zdata,
            display,
        })
    }

    /// Build a point from geographic coordinates.
    pub fn from_ll(proj: &ProjectionEngine, xlon: f64, ylat: f64, zdata: f64) -> ViewResult<Self> {
        let (xgrid, ygrid, display) = proj.from_ll(xlon, ylat, zdata)?;
        Ok(Self {
            xgrid,
            ygrid,
            xlon,
            ylat,
            zdata,
            display,
        })
    }

    /// Recompute the cached display coordinates under the current
    /// projection.
    pub fn reproject(&mut self, proj: &ProjectionEngine) -> ViewResult<()> {
        let (xlon, ylat, display) = proj.forward(self.xgrid, self.ygrid, self.zdata)?;
        self.xlon = xlon;
        self.ylat = ylat;
        self.display = display;
        Ok(())
    }
}

/// Interior drape points closer together than this fraction of the
/// segment are merged.
const MERGE_EPSILON: f64 = 1e-9;

/// A segment between two annotation points plus its cached drape
/// polyline.
#[derive(Debug, Clone)]
pub struct DrapedSegment {
    pub endpoints: [DrapePoint; 2],
    points: Vec<DrapePoint>,
    valid: bool,
}

impl DrapedSegment {
    pub fn new(start: DrapePoint, end: DrapePoint) -> Self {
        Self {
            endpoints: [start, end],
            points: Vec::new(),
            valid: false,
        }
    }

    /// Replace an endpoint, invalidating the cached polyline.
    pub fn set_endpoint(&mut self, which: usize, point: DrapePoint) {
        self.endpoints[which] = point;
        self.valid = false;
    }

    /// Drop the cached polyline (projection or exaggeration changed).
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn is_draped(&self) -> bool {
        self.valid
    }

    /// Number of interior drape points (excludes the endpoints).
    pub fn interior_len(&self) -> usize {
        self.points.len().saturating_sub(2)
    }

    /// The drape polyline from endpoint 0 to endpoint 1, computing it if
    /// the cache is stale.
    pub fn drape(&mut self, grid: &Grid, proj: &ProjectionEngine) -> ViewResult<&[DrapePoint]> {
        if !self.valid {
            self.points = if proj.display_mode == ProjectionMode::Spheroid {
                drape_great_circle(grid, proj, &self.endpoints)?
            } else {
                drape_planar(grid, proj, &self.endpoints)?
            };
            self.valid = true;
        }
        Ok(&self.points)
    }
}

/// Interior crossing candidate, keyed by its parametric position along
/// the segment.
struct Crossing {
    t: f64,
    xgrid: f64,
    ygrid: f64,
    zdata: f64,
}

/// Planar drape: sample the segment where it crosses grid lines, ordered
/// by parametric position.
fn drape_planar(
    grid: &Grid,
    proj: &ProjectionEngine,
    endpoints: &[DrapePoint; 2],
) -> ViewResult<Vec<DrapePoint>> {
    let (x0, y0) = (endpoints[0].xgrid, endpoints[0].ygrid);
    let (x1, y1) = (endpoints[1].xgrid, endpoints[1].ygrid);
    let istart = ((x0 - grid.bounds.xmin) / grid.dx) as i64;
    let iend = ((x1 - grid.bounds.xmin) / grid.dx) as i64;
    let jstart = ((y0 - grid.bounds.ymin) / grid.dy) as i64;
    let jend = ((y1 - grid.bounds.ymin) / grid.dy) as i64;

    let mut crossings: Vec<Crossing> = Vec::new();

    // crossings of x-direction grid lines, interpolated along y in the
    // crossed column
    if istart != iend && x1 != x0 {
        let mm = (y1 - y0) / (x1 - x0);
        let lo = istart.min(iend) + 1;
        let hi = istart.max(iend);
        for i in lo..=hi {
            let xgrid = grid.bounds.xmin + i as f64 * grid.dx;
            let ygrid = y0 + mm * (xgrid - x0);
            let j = ((ygrid - grid.bounds.ymin) / grid.dy) as i64;
            if i < 0 || i as usize >= grid.nx - 1 || j < 0 || j as usize >= grid.ny - 1 {
                continue;
            }
            let k = grid.index(i as usize, j as usize);
            let l = grid.index(i as usize, j as usize + 1);
            if !(grid.is_valid(k) && grid.is_valid(l)) {
                continue;
            }
            let frac = (ygrid - grid.bounds.ymin - j as f64 * grid.dy) / grid.dy;
            let zdata = grid.data[k] as f64 + frac * (grid.data[l] - grid.data[k]) as f64;
            insert_crossing(
                &mut crossings,
                Crossing {
                    t: (xgrid - x0) / (x1 - x0),
                    xgrid,
                    ygrid,
                    zdata,
                },
            );
        }
    }

    // crossings of y-direction grid lines, interpolated along x in the
    // crossed row
    if jstart != jend && y1 != y0 {
        let mm = (x1 - x0) / (y1 - y0);
        let lo = jstart.min(jend) + 1;
        let hi = jstart.max(jend);
        for j in lo..=hi {
            let ygrid = grid.bounds.ymin + j as f64 * grid.dy;
            let xgrid = x0 + mm * (ygrid - y0);
            let i = ((xgrid - grid.bounds.xmin) / grid.dx) as i64;
            if i < 0 || i as usize >= grid.nx - 1 || j < 0 || j as usize >= grid.ny - 1 {
                continue;
            }
            let k = grid.index(i as usize, j as usize);
            let l = grid.index(i as usize + 1, j as usize);
            if !(grid.is_valid(k) && grid.is_valid(l)) {
                continue;
            }
            let frac = (xgrid - grid.bounds.xmin - i as f64 * grid.dx) / grid.dx;
            let zdata = grid.data[k] as f64 + frac * (grid.data[l] - grid.data[k]) as f64;
            insert_crossing(
                &mut crossings,
                Crossing {
                    t: (ygrid - y0) / (y1 - y0),
                    xgrid,
                    ygrid,
                    zdata,
                },
            );
        }
    }

    let offset = SurfaceOffset::drape(proj);
    let mut points = Vec::with_capacity(crossings.len() + 2);
    points.push(offset_point(proj, offset, endpoints[0])?);
    for c in crossings {
        let p = DrapePoint::from_grid(proj, c.xgrid, c.ygrid, c.zdata)?;
        points.push(apply_offset(offset, p));
    }
    points.push(offset_point(proj, offset, endpoints[1])?);
    Ok(points)
}

/// Keep the crossing list ordered by parametric position; a crossing
/// landing on an already-inserted position (a grid corner hit by both
/// walks) is dropped.
fn insert_crossing(crossings: &mut Vec<Crossing>, c: Crossing) {
    if !(0.0..=1.0).contains(&c.t) {
        return;
    }
    match crossings.binary_search_by(|probe| probe.t.partial_cmp(&c.t).unwrap_or(std::cmp::Ordering::Equal)) {
        Ok(_) => {}
        Err(pos) => {
            let duplicate = (pos > 0 && (crossings[pos - 1].t - c.t).abs() <= MERGE_EPSILON)
                || (pos < crossings.len() && (crossings[pos].t - c.t).abs() <= MERGE_EPSILON);
            if !duplicate {
                crossings.insert(pos, c);
            }
        }
    }
}

/// Spheroid drape: subdivide the great circle between the endpoints at
/// the grid's characteristic sample spacing.
fn drape_great_circle(
    grid: &Grid,
    proj: &ProjectionEngine,
    endpoints: &[DrapePoint; 2],
) -> ViewResult<Vec<DrapePoint>> {
    // characteristic spacing: the diagonal of the center cell in
    // real-world distance
    let ic = grid.nx / 2;
    let jc = grid.ny / 2;
    let (lon1, lat1) = proj.grid_to_ll(grid.grid_x(ic), grid.grid_y(jc))?;
    let (lon2, lat2) = proj.grid_to_ll(
        grid.bounds.xmin + (ic + 1) as f64 * grid.dx,
        grid.bounds.ymin + (jc + 1) as f64 * grid.dy,
    )?;
    let char_dist = greatcircle::distance(lon1, lat1, lon2, lat2);

    let (seg_dist, seg_bearing) = {
        let (d, b) = greatcircle::dist_bearing(
            endpoints[0].xlon,
            endpoints[0].ylat,
            endpoints[1].xlon,
            endpoints[1].ylat,
        );
        (d, b)
    };
    let npoint = if char_dist > 0.0 {
        (((seg_dist / char_dist) as i64) + 1).max(2)
    } else {
        2
    };

    let offset = SurfaceOffset::drape(proj);
    let mut points = Vec::new();
    points.push(offset_point(proj, offset, endpoints[0])?);
    if npoint > 2 {
        let step = seg_dist / (npoint - 1) as f64;
        for i in 1..npoint - 1 {
            let (lon, lat) = greatcircle::end_position(
                endpoints[0].xlon,
                endpoints[0].ylat,
                seg_bearing,
                i as f64 * step,
            );
            let (xgrid, ygrid) = proj.ll_to_grid(lon, lat)?;
            // points over no-data or outside the grid are dropped
            if let Some(zdata) = grid.sample(xgrid, ygrid) {
                let p = DrapePoint::from_ll(proj, lon, lat, zdata)?;
                points.push(apply_offset(offset, p));
            }
        }
    }
    points.push(offset_point(proj, offset, endpoints[1])?);
    Ok(points)
}

fn offset_point(
    proj: &ProjectionEngine,
    offset: SurfaceOffset,
    mut p: DrapePoint,
) -> ViewResult<DrapePoint> {
    p.reproject(proj)?;
    Ok(apply_offset(offset, p))
}

fn apply_offset(offset: SurfaceOffset, mut p: DrapePoint) -> DrapePoint {
    p.display = offset.apply(p.display);
    p
}
