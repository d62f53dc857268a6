//! Annotations draped over the terrain surface.
//!
//! Pick marks, sites, routes, navigation tracks, a great-circle area, and
//! a lon/lat region box. All segment geometry is stored as draped
//! segments so it follows the relief; a projection change invalidates the
//! cached drapes and they are recomputed on next access.

use crate::drape::{DrapePoint, DrapedSegment};
use crate::error::ViewResult;
use crate::grid::{Bounds, Grid};
use crate::projection::{greatcircle, ProjectionEngine, SurfaceOffset};

/// Crosshair arm length in grid cells.
const PICK_ARM_CELLS: f64 = 2.0;

/// A one- or two-point pick mark. Each point carries a draped crosshair;
/// a two-point pick also drapes the connecting segment.
#[derive(Debug)]
pub struct PickMark {
    pub points: Vec<DrapePoint>,
    /// Four crosshair arms per point.
    pub crosshairs: Vec<DrapedSegment>,
    pub connector: Option<DrapedSegment>,
}

impl PickMark {
    pub fn single(grid: &Grid, proj: &ProjectionEngine, point: DrapePoint) -> ViewResult<Self> {
        let mut mark = Self {
            points: vec![point],
            crosshairs: Vec::new(),
            connector: None,
        };
        mark.rebuild(grid, proj)?;
        Ok(mark)
    }

    /// Extend a single pick to a two-point pick.
    pub fn extend(
        &mut self,
        grid: &Grid,
        proj: &ProjectionEngine,
        point: DrapePoint,
    ) -> ViewResult<()> {
        self.points.truncate(1);
        self.points.push(point);
        self.rebuild(grid, proj)
    }

    /// Recompute crosshair arms and the connector from the points.
    pub fn rebuild(&mut self, grid: &Grid, proj: &ProjectionEngine) -> ViewResult<()> {
        self.crosshairs.clear();
        let arm_x = PICK_ARM_CELLS * grid.dx;
        let arm_y = PICK_ARM_CELLS * grid.dy;
        for p in &self.points {
            for (dx, dy) in [(-arm_x, 0.0), (arm_x, 0.0), (0.0, -arm_y), (0.0, arm_y)] {
                let xg = p.xgrid + dx;
                let yg = p.ygrid + dy;
                let z = grid.sample(xg, yg).unwrap_or(p.zdata);
                let end = DrapePoint::from_grid(proj, xg, yg, z)?;
                let mut seg = DrapedSegment::new(*p, end);
                seg.drape(grid, proj)?;
                self.crosshairs.push(seg);
            }
        }
        self.connector = if self.points.len() == 2 {
            let mut seg = DrapedSegment::new(self.points[0], self.points[1]);
            seg.drape(grid, proj)?;
            Some(seg)
        } else {
            None
        };
        Ok(())
    }

    /// Drop cached drapes after a projection change.
    pub fn invalidate(&mut self) {
        for seg in &mut self.crosshairs {
            seg.invalidate();
        }
        if let Some(seg) = &mut self.connector {
            seg.invalidate();
        }
    }

    /// Display position of a point, lifted clear of the surface.
    pub fn marker_display(&self, proj: &ProjectionEngine, index: usize) -> glam::DVec3 {
        SurfaceOffset::annotation(proj).apply(self.points[index].display)
    }
}

/// A named point of interest.
#[derive(Debug, Clone)]
pub struct Site {
    pub name: String,
    pub point: DrapePoint,
    pub color: [f32; 3],
}

/// A waypoint route; legs between consecutive waypoints are draped.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub color: [f32; 3],
    pub waypoints: Vec<DrapePoint>,
    legs: Vec<DrapedSegment>,
}

impl Route {
    pub fn new(name: impl Into<String>, color: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            color,
            waypoints: Vec::new(),
            legs: Vec::new(),
        }
    }

    pub fn add_waypoint(&mut self, point: DrapePoint) {
        if let Some(&last) = self.waypoints.last() {
            self.legs.push(DrapedSegment::new(last, point));
        }
        self.waypoints.push(point);
    }

    /// Remove waypoint `index`, rejoining the legs around it.
    pub fn remove_waypoint(&mut self, index: usize) {
        if index >= self.waypoints.len() {
            return;
        }
        self.waypoints.remove(index);
        self.legs = self
            .waypoints
            .windows(2)
            .map(|w| DrapedSegment::new(w[0], w[1]))
            .collect();
    }

    pub fn legs(&mut self, grid: &Grid, proj: &ProjectionEngine) -> ViewResult<&[DrapedSegment]> {
        for leg in &mut self.legs {
            leg.drape(grid, proj)?;
        }
        Ok(&self.legs)
    }

    /// Total route length over the great circle between waypoints, meters.
    pub fn length(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|w| greatcircle::distance(w[0].xlon, w[0].ylat, w[1].xlon, w[1].ylat))
            .sum()
    }

    pub fn invalidate(&mut self) {
        for leg in &mut self.legs {
            leg.invalidate();
        }
    }
}

/// A navigation track: an ordered point sequence draped leg by leg.
#[derive(Debug)]
pub struct NavTrack {
    pub name: String,
    pub color: [f32; 3],
    pub points: Vec<DrapePoint>,
    legs: Vec<DrapedSegment>,
}

impl NavTrack {
    pub fn new(name: impl Into<String>, color: [f32; 3], points: Vec<DrapePoint>) -> Self {
        let legs = points
            .windows(2)
            .map(|w| DrapedSegment::new(w[0], w[1]))
            .collect();
        Self {
            name: name.into(),
            color,
            points,
            legs,
        }
    }

    pub fn legs(&mut self, grid: &Grid, proj: &ProjectionEngine) -> ViewResult<&[DrapedSegment]> {
        for leg in &mut self.legs {
            leg.drape(grid, proj)?;
        }
        Ok(&self.legs)
    }

    pub fn invalidate(&mut self) {
        for leg in &mut self.legs {
            leg.invalidate();
        }
    }
}

/// A rectangular survey area: a centerline plus a width. The corners lie
/// at great-circle destination points perpendicular to the centerline
/// bearing, half the width to each side of its endpoints.
#[derive(Debug)]
pub struct Area {
    pub endpoints: [DrapePoint; 2],
    /// Meters across track.
    pub width: f64,
    /// Meters along the centerline.
    pub length: f64,
    /// Centerline bearing, degrees clockwise from north.
    pub bearing: f64,
    pub corners: [DrapePoint; 4],
    edges: Vec<DrapedSegment>,
    centerline: DrapedSegment,
}

impl Area {
    pub fn new(
        grid: &Grid,
        proj: &ProjectionEngine,
        start: DrapePoint,
        end: DrapePoint,
        width: f64,
    ) -> ViewResult<Self> {
        let (length, bearing) = greatcircle::dist_bearing(start.xlon, start.ylat, end.xlon, end.ylat);
        let half = 0.5 * width;
        let mut corners = Vec::with_capacity(4);
        // port-start, starboard-start, starboard-end, port-end
        for (anchor, side) in [
            (&start, bearing - 90.0),
            (&start, bearing + 90.0),
            (&end, bearing + 90.0),
            (&end, bearing - 90.0),
        ] {
            let (lon, lat) = greatcircle::end_position(anchor.xlon, anchor.ylat, side, half);
            let (xg, yg) = proj.ll_to_grid(lon, lat)?;
            let z = grid.sample(xg, yg).unwrap_or(anchor.zdata);
            corners.push(DrapePoint::from_ll(proj, lon, lat, z)?);
        }
        let corners: [DrapePoint; 4] = [corners[0], corners[1], corners[2], corners[3]];
        let edges = (0..4)
            .map(|i| DrapedSegment::new(corners[i], corners[(i + 1) % 4]))
            .collect();
        Ok(Self {
            endpoints: [start, end],
            width,
            length,
            bearing,
            corners,
            edges,
            centerline: DrapedSegment::new(start, end),
        })
    }

    pub fn edges(&mut self, grid: &Grid, proj: &ProjectionEngine) -> ViewResult<&[DrapedSegment]> {
        for edge in &mut self.edges {
            edge.drape(grid, proj)?;
        }
        Ok(&self.edges)
    }

    pub fn centerline(
        &mut self,
        grid: &Grid,
        proj: &ProjectionEngine,
    ) -> ViewResult<&DrapedSegment> {
        self.centerline.drape(grid, proj)?;
        Ok(&self.centerline)
    }

    pub fn invalidate(&mut self) {
        for edge in &mut self.edges {
            edge.invalidate();
        }
        self.centerline.invalidate();
    }
}

/// An axis-aligned lon/lat region box.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub bounds: Bounds,
}

impl Region {
    pub fn new(lon1: f64, lon2: f64, lat1: f64, lat2: f64) -> Self {
        Self {
            bounds: Bounds::new(lon1.min(lon2), lon1.max(lon2), lat1.min(lat2), lat1.max(lat2)),
        }
    }

    /// Corner points counterclockwise from the southwest, draped onto the
    /// surface where the grid covers them.
    pub fn corners(&self, grid: &Grid, proj: &ProjectionEngine) -> ViewResult<[DrapePoint; 4]> {
        let b = &self.bounds;
        let mut out = [DrapePoint::from_ll(proj, b.xmin, b.ymin, 0.0)?; 4];
        for (idx, (lon, lat)) in [
            (b.xmin, b.ymin),
            (b.xmax, b.ymin),
            (b.xmax, b.ymax),
            (b.xmin, b.ymax),
        ]
        .into_iter()
        .enumerate()
        {
            let (xg, yg) = proj.ll_to_grid(lon, lat)?;
            let z = grid.sample(xg, yg).unwrap_or(0.0);
            out[idx] = DrapePoint::from_ll(proj, lon, lat, z)?;
        }
        Ok(out)
    }
}
