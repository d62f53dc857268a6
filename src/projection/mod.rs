//! Coordinate frames for the viewer.
//!
//! Grid coordinates are the raster's native units; geographic coordinates
//! are longitude/latitude; display coordinates are the scaled, origin-
//! centered units handed to rendering. Four display modes are supported:
//! a local linear geographic approximation, an external map projection, a
//! pass-through for grids already in display units, and an earth-centered
//! spheroid.

pub mod greatcircle;
pub mod spheroid;

use glam::DVec3;

use crate::error::{ViewError, ViewResult};
use crate::grid::{Bounds, Grid};

use spheroid::SphereRotation;

/// Radius of the viewing sphere in meters.
pub const SPHEROID_RADIUS: f64 = 6371000.0;

/// Half-width of the rendered view volume in display units.
pub const VIEW_WIDTH: f64 = 3.0;

/// Projection mode for a grid layer or for the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Geographic,
    Projected,
    AlreadyProjected,
    Spheroid,
}

/// Forward/inverse transform supplied by an external cartographic
/// projection library, keyed by an identifier string.
pub trait ProjectionProvider {
    fn forward(&self, lon: f64, lat: f64) -> ViewResult<(f64, f64)>;
    fn inverse(&self, x: f64, y: f64) -> ViewResult<(f64, f64)>;
}

/// Opens providers by identifier. Provider initialization failure is
/// fatal to establishing the requested projection mode.
pub trait ProviderFactory {
    fn open(&self, id: &str) -> ViewResult<Box<dyn ProjectionProvider>>;
}

/// Factory for configurations that never use PROJECTED layers.
pub struct NoProviders;

impl ProviderFactory for NoProviders {
    fn open(&self, id: &str) -> ViewResult<Box<dyn ProjectionProvider>> {
        Err(ViewError::projection(format!(
            "no projection provider available for '{}'",
            id
        )))
    }
}

/// Meters-to-degrees conversion at a latitude (WGS84 series expansion).
/// Returns (degrees of longitude per meter, degrees of latitude per meter).
pub fn coor_scale(latitude: f64) -> (f64, f64) {
    let r = latitude.to_radians();
    let mtodeglon = 1.0 / (111412.84 * r.cos() - 93.5 * (3.0 * r).cos() + 0.118 * (5.0 * r).cos());
    let mtodeglat =
        1.0 / (111132.92 - 559.82 * (2.0 * r).cos() + 1.175 * (4.0 * r).cos() - 0.0023 * (6.0 * r).cos());
    (mtodeglon, mtodeglat)
}

/// Active projection state for one viewer.
pub struct ProjectionEngine {
    pub grid_mode: ProjectionMode,
    pub display_mode: ProjectionMode,
    grid_provider: Option<Box<dyn ProjectionProvider>>,
    display_provider: Option<Box<dyn ProjectionProvider>>,

    /// Native bounds of the primary grid
    grid_bounds: Bounds,
    /// Geographic bounds of the primary grid
    geo_bounds: Bounds,
    /// Valid elevation range midpoint
    pub zmid: f64,
    pub exaggeration: f64,

    // display frame
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub xorigin: f64,
    pub yorigin: f64,
    pub zorigin: f64,
    pub scale: f64,

    // geographic pseudo-projection
    pub mtodeglon: f64,
    pub mtodeglat: f64,

    // spheroid mode
    pub sphere: Option<SphereRotation>,
}

impl ProjectionEngine {
    /// Establish projection state for a grid and display mode. Opens the
    /// needed providers through the factory; a provider failure is
    /// returned as-is so the caller never proceeds with a half
    /// initialized mode.
    pub fn configure(
        grid: &Grid,
        grid_mode: ProjectionMode,
        display_mode: ProjectionMode,
        display_id: &str,
        exaggeration: f64,
        aspect_ratio: f64,
        factory: &dyn ProviderFactory,
    ) -> ViewResult<Self> {
        // a layer flagged as already projected is an ordinary projected
        // layer until the id comparison below collapses the pair
        let mut grid_mode = if grid_mode == ProjectionMode::AlreadyProjected {
            ProjectionMode::Projected
        } else {
            grid_mode
        };
        let mut display_mode = if display_mode == ProjectionMode::AlreadyProjected {
            ProjectionMode::Projected
        } else {
            display_mode
        };

        let (zmin, zmax) = grid.min_max().unwrap_or((0.0, 0.0));
        let zmid = 0.5 * (zmin as f64 + zmax as f64);

        let mut engine = Self {
            grid_mode,
            display_mode,
            grid_provider: None,
            display_provider: None,
            grid_bounds: grid.bounds,
            geo_bounds: grid.bounds,
            zmid,
            exaggeration,
            xmin: 0.0,
            xmax: 0.0,
            ymin: 0.0,
            ymax: 0.0,
            xorigin: 0.0,
            yorigin: 0.0,
            zorigin: 0.0,
            scale: 1.0,
            mtodeglon: 1.0,
            mtodeglat: 1.0,
            sphere: None,
        };

        // grid displayed in its own projected frame: keep native bounds
        if grid_mode == ProjectionMode::Projected
            && display_mode == ProjectionMode::Projected
            && grid.projection_id == display_id
        {
            grid_mode = ProjectionMode::AlreadyProjected;
            display_mode = ProjectionMode::AlreadyProjected;
            engine.grid_mode = grid_mode;
            engine.display_mode = display_mode;

            engine.xmin = grid.bounds.xmin;
            engine.xmax = grid.bounds.xmax;
            engine.ymin = grid.bounds.ymin;
            engine.ymax = grid.bounds.ymax;
            engine.xorigin = 0.5 * (engine.xmin + engine.xmax);
            engine.yorigin = 0.5 * (engine.ymin + engine.ymax);
            engine.zorigin = exaggeration * zmid;

            // providers stay open for lon/lat readout
            let gp = factory.open(&grid.projection_id)?;
            let (lonmin, latmin) = gp.inverse(grid.bounds.xmin, grid.bounds.ymin)?;
            let (lonmax, latmax) = gp.inverse(grid.bounds.xmax, grid.bounds.ymax)?;
            engine.geo_bounds = Bounds::new(lonmin, lonmax, latmin, latmax);
            engine.grid_provider = Some(gp);
            engine.display_provider = Some(factory.open(display_id)?);
        } else {
            // geographic bounds of the grid
            let geo_bounds = if grid_mode == ProjectionMode::Projected {
                let provider = factory.open(&grid.projection_id)?;
                let (lonmin, latmin) = provider.inverse(grid.bounds.xmin, grid.bounds.ymin)?;
                let (lonmax, latmax) = provider.inverse(grid.bounds.xmax, grid.bounds.ymax)?;
                engine.grid_provider = Some(provider);
                Bounds::new(lonmin, lonmax, latmin, latmax)
            } else {
                grid.bounds
            };
            engine.geo_bounds = geo_bounds;

            match display_mode {
                ProjectionMode::Projected => {
                    let provider = factory.open(display_id)?;
                    let (x0, y0) = provider.forward(geo_bounds.xmin, geo_bounds.ymin)?;
                    let (x1, y1) = provider.forward(geo_bounds.xmax, geo_bounds.ymax)?;
                    engine.display_provider = Some(provider);
                    engine.xmin = x0;
                    engine.ymin = y0;
                    engine.xmax = x1;
                    engine.ymax = y1;
                    engine.xorigin = 0.5 * (engine.xmin + engine.xmax);
                    engine.yorigin = 0.5 * (engine.ymin + engine.ymax);
                    engine.zorigin = exaggeration * zmid;
                }
                ProjectionMode::Geographic => {
                    let meanlat = 0.5 * (geo_bounds.ymin + geo_bounds.ymax);
                    let (mtodeglon, mtodeglat) = coor_scale(meanlat);
                    engine.mtodeglon = mtodeglon;
                    engine.mtodeglat = mtodeglat;
                    engine.xmin = geo_bounds.xmin / mtodeglon;
                    engine.xmax = geo_bounds.xmax / mtodeglon;
                    engine.ymin = geo_bounds.ymin / mtodeglat;
                    engine.ymax = geo_bounds.ymax / mtodeglat;
                    engine.xorigin = 0.5 * (engine.xmin + engine.xmax);
                    engine.yorigin = 0.5 * (engine.ymin + engine.ymax);
                    engine.zorigin = exaggeration * zmid;
                }
                ProjectionMode::Spheroid => {
                    let lonmid = 0.5 * (geo_bounds.xmin + geo_bounds.xmax);
                    let latmid = 0.5 * (geo_bounds.ymin + geo_bounds.ymax);
                    let global = geo_bounds.xmax - geo_bounds.xmin >= 180.0
                        || geo_bounds.ymax - geo_bounds.ymin >= 90.0;
                    if global {
                        engine.sphere = Some(SphereRotation::new(lonmid, latmid, true));
                        engine.xmin = -SPHEROID_RADIUS;
                        engine.xmax = SPHEROID_RADIUS;
                        engine.ymin = -SPHEROID_RADIUS;
                        engine.ymax = SPHEROID_RADIUS;
                        engine.xorigin = 0.0;
                        engine.yorigin = 0.0;
                        engine.zorigin = 0.0;
                    } else {
                        let sphere = SphereRotation::new(lonmid, latmid, false);
                        let refpos = sphere.refpos;
                        let pmin = sphere.forward(geo_bounds.xmin, geo_bounds.ymin);
                        let pmax = sphere.forward(geo_bounds.xmax, geo_bounds.ymax);
                        engine.xmin = pmin.x - refpos.x;
                        engine.xmax = pmax.x - refpos.x;
                        engine.ymin = pmin.y - refpos.y;
                        engine.ymax = pmax.y - refpos.y;
                        let center = sphere.forward(lonmid, latmid);
                        engine.xorigin = center.x - refpos.x;
                        engine.yorigin = center.y - refpos.y;
                        engine.zorigin = center.z + zmid - refpos.z;
                        engine.sphere = Some(sphere);
                    }
                }
                ProjectionMode::AlreadyProjected => {
                    // unreachable: collapsed above
                    return Err(ViewError::projection(
                        "already-projected display requires a matching projected grid",
                    ));
                }
            }
        }

        engine.scale = (1.75 * VIEW_WIDTH / (engine.xmax - engine.xmin))
            .min(1.75 * VIEW_WIDTH / aspect_ratio / (engine.ymax - engine.ymin));
        Ok(engine)
    }

    /// True when the spheroid view rotates about the earth's center
    /// rather than the grid's reference point.
    pub fn is_global_spheroid(&self) -> bool {
        matches!(&self.sphere, Some(s) if s.refpos == DVec3::ZERO)
            && self.display_mode == ProjectionMode::Spheroid
    }

    fn sphere(&self) -> ViewResult<&SphereRotation> {
        self.sphere
            .as_ref()
            .ok_or_else(|| ViewError::projection("spheroid rotation not initialized"))
    }

    /// Grid coordinates to geographic coordinates.
    pub fn grid_to_ll(&self, xgrid: f64, ygrid: f64) -> ViewResult<(f64, f64)> {
        match self.grid_mode {
            ProjectionMode::Projected | ProjectionMode::AlreadyProjected => {
                let provider = self.grid_provider.as_ref().ok_or_else(|| {
                    ViewError::projection("grid projection provider not initialized")
                })?;
                provider.inverse(xgrid, ygrid)
            }
            _ => Ok((xgrid, ygrid)),
        }
    }

    /// Geographic coordinates to grid coordinates.
    pub fn ll_to_grid(&self, xlon: f64, ylat: f64) -> ViewResult<(f64, f64)> {
        match self.grid_mode {
            ProjectionMode::Projected | ProjectionMode::AlreadyProjected => {
                let provider = self.grid_provider.as_ref().ok_or_else(|| {
                    ViewError::projection("grid projection provider not initialized")
                })?;
                provider.forward(xlon, ylat)
            }
            mode => {
                let mut xlon = xlon;
                if mode == ProjectionMode::Geographic {
                    // grids spanning the antimeridian store longitudes
                    // outside [-180, 180]
                    if self.grid_bounds.xmin < -180.0 && xlon > 0.0 {
                        xlon -= 360.0;
                    }
                    if self.grid_bounds.xmax > 180.0 && xlon < 0.0 {
                        xlon += 360.0;
                    }
                }
                Ok((xlon, ylat))
            }
        }
    }

    /// Geographic coordinates plus elevation to display coordinates.
    pub fn ll_to_display(&self, xlon: f64, ylat: f64, zdata: f64) -> ViewResult<DVec3> {
        let (xx, yy, zz) = match self.display_mode {
            ProjectionMode::Projected | ProjectionMode::AlreadyProjected => {
                let provider = self.display_provider.as_ref().ok_or_else(|| {
                    ViewError::projection("display projection provider not initialized")
                })?;
                let (xx, yy) = provider.forward(xlon, ylat)?;
                (xx, yy, self.exaggeration * zdata)
            }
            ProjectionMode::Geographic => (
                xlon / self.mtodeglon,
                ylat / self.mtodeglat,
                self.exaggeration * zdata,
            ),
            ProjectionMode::Spheroid => {
                let sphere = self.sphere()?;
                let p = sphere.forward(xlon, ylat);
                // exaggerate relief about the grid's mid elevation and
                // push it radially outward
                let topo = self.exaggeration * (zdata - self.zmid) + self.zmid;
                let refpos = sphere.refpos;
                (
                    p.x + topo * p.x / SPHEROID_RADIUS - refpos.x,
                    p.y + topo * p.y / SPHEROID_RADIUS - refpos.y,
                    p.z + topo * p.z / SPHEROID_RADIUS - refpos.z,
                )
            }
        };
        Ok(DVec3::new(
            self.scale * (xx - self.xorigin),
            self.scale * (yy - self.yorigin),
            self.scale * (zz - self.zorigin),
        ))
    }

    /// Display coordinates back to geographic coordinates.
    pub fn display_to_ll(&self, display: DVec3) -> ViewResult<(f64, f64)> {
        let xx = display.x / self.scale + self.xorigin;
        let yy = display.y / self.scale + self.yorigin;
        let zz = display.z / self.scale + self.zorigin;
        match self.display_mode {
            ProjectionMode::Projected | ProjectionMode::AlreadyProjected => {
                let provider = self.display_provider.as_ref().ok_or_else(|| {
                    ViewError::projection("display projection provider not initialized")
                })?;
                provider.inverse(xx, yy)
            }
            ProjectionMode::Geographic => Ok((xx * self.mtodeglon, yy * self.mtodeglat)),
            ProjectionMode::Spheroid => {
                let sphere = self.sphere()?;
                let p = DVec3::new(xx, yy, zz) + sphere.refpos;
                Ok(sphere.inverse(p))
            }
        }
    }

    /// Grid coordinates plus elevation to geographic and display
    /// coordinates.
    pub fn forward(&self, xgrid: f64, ygrid: f64, zdata: f64) -> ViewResult<(f64, f64, DVec3)> {
        if self.grid_mode == ProjectionMode::AlreadyProjected {
            let (xlon, ylat) = self.grid_to_ll(xgrid, ygrid)?;
            let display = DVec3::new(
                self.scale * (xgrid - self.xorigin),
                self.scale * (ygrid - self.yorigin),
                self.scale * (self.exaggeration * zdata - self.zorigin),
            );
            Ok((xlon, ylat, display))
        } else {
            let (xlon, ylat) = self.grid_to_ll(xgrid, ygrid)?;
            let display = self.ll_to_display(xlon, ylat, zdata)?;
            Ok((xlon, ylat, display))
        }
    }

    /// Display coordinates back to geographic and grid coordinates.
    pub fn inverse(&self, display: DVec3) -> ViewResult<(f64, f64, f64, f64)> {
        let (xlon, ylat) = self.display_to_ll(display)?;
        let (xgrid, ygrid) = if self.grid_mode == ProjectionMode::AlreadyProjected {
            (
                display.x / self.scale + self.xorigin,
                display.y / self.scale + self.yorigin,
            )
        } else {
            self.ll_to_grid(xlon, ylat)?
        };
        Ok((xlon, ylat, xgrid, ygrid))
    }

    /// Geographic coordinates plus elevation to grid and display
    /// coordinates.
    pub fn from_ll(&self, xlon: f64, ylat: f64, zdata: f64) -> ViewResult<(f64, f64, DVec3)> {
        let (xgrid, ygrid) = self.ll_to_grid(xlon, ylat)?;
        let display = self.ll_to_display(xlon, ylat, zdata)?;
        Ok((xgrid, ygrid, display))
    }

    /// Lateral and over-ground distance in real-world units between two
    /// geographic points, plus the gradient between them.
    pub fn distance(
        &self,
        lon1: f64,
        lat1: f64,
        z1: f64,
        lon2: f64,
        lat2: f64,
        z2: f64,
    ) -> ViewResult<(f64, f64, f64)> {
        let (dx, dy, lateral) = match self.display_mode {
            ProjectionMode::Projected | ProjectionMode::AlreadyProjected => {
                let provider = self.display_provider.as_ref().ok_or_else(|| {
                    ViewError::projection("display projection provider not initialized")
                })?;
                let (x1, y1) = provider.forward(lon1, lat1)?;
                let (x2, y2) = provider.forward(lon2, lat2)?;
                let (dx, dy) = (x2 - x1, y2 - y1);
                (dx, dy, (dx * dx + dy * dy).sqrt())
            }
            ProjectionMode::Geographic => {
                let dx = (lon2 - lon1) / self.mtodeglon;
                let dy = (lat2 - lat1) / self.mtodeglat;
                (dx, dy, (dx * dx + dy * dy).sqrt())
            }
            ProjectionMode::Spheroid => {
                let sphere = self.sphere()?;
                let p1 = sphere.forward(lon1, lat1);
                let p2 = sphere.forward(lon2, lat2);
                let lateral = greatcircle::distance(lon1, lat1, lon2, lat2);
                let q1 = p1 + z1 * p1 / SPHEROID_RADIUS;
                let q2 = p2 + z2 * p2 / SPHEROID_RADIUS;
                let over_ground = (q2 - q1).length();
                let slope = if lateral > 0.0 { (z2 - z1) / lateral } else { 0.0 };
                return Ok((lateral, over_ground, slope));
            }
        };
        let dz = z2 - z1;
        let over_ground = (dx * dx + dy * dy + dz * dz).sqrt();
        let slope = if lateral > 0.0 { dz / lateral } else { 0.0 };
        Ok((lateral, over_ground, slope))
    }

    /// Geographic bounds of the primary grid.
    pub fn geo_bounds(&self) -> Bounds {
        self.geo_bounds
    }
}

/// Base offset, in display units, lifting overlay geometry off the
/// terrain surface.
pub const SURFACE_OFFSET: f64 = 0.001;

/// How overlay geometry (drapes, contours) is nudged off the surface to
/// avoid z-fighting with the terrain.
#[derive(Debug, Clone, Copy)]
pub enum SurfaceOffset {
    /// Additive bump to the vertical display coordinate.
    Vertical(f64),
    /// Multiplicative nudge on all three axes, radially outward from the
    /// rotation center of an earth-centered spheroid view.
    Radial(f64),
}

impl SurfaceOffset {
    /// Offset policy for contour segments.
    pub fn contour(proj: &ProjectionEngine) -> Self {
        if proj.is_global_spheroid() {
            SurfaceOffset::Radial(SURFACE_OFFSET / (proj.scale * SPHEROID_RADIUS))
        } else {
            SurfaceOffset::Vertical(SURFACE_OFFSET)
        }
    }

    /// Offset policy for drape polylines, which sit above the contours.
    pub fn drape(proj: &ProjectionEngine) -> Self {
        if proj.is_global_spheroid() {
            SurfaceOffset::Radial(10.0 * SURFACE_OFFSET / (proj.scale * SPHEROID_RADIUS))
        } else {
            SurfaceOffset::Vertical(10.0 * SURFACE_OFFSET)
        }
    }

    /// Offset policy for single annotation points.
    pub fn annotation(proj: &ProjectionEngine) -> Self {
        if proj.is_global_spheroid() {
            SurfaceOffset::Radial(10.0 * SURFACE_OFFSET / (proj.scale * SPHEROID_RADIUS))
        } else {
            SurfaceOffset::Vertical(SURFACE_OFFSET)
        }
    }

    pub fn apply(&self, p: DVec3) -> DVec3 {
        match *self {
            SurfaceOffset::Vertical(dz) => DVec3::new(p.x, p.y, p.z + dz),
            SurfaceOffset::Radial(f) => p + p * f,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Bounds, Grid};

    fn geo_grid() -> Grid {
        let data = vec![100.0f32; 16];
        Grid::new(
            4,
            4,
            Bounds::new(-121.6, -121.3, 36.6, 36.9),
            -9999.0,
            data,
            "",
        )
        .unwrap()
    }

    fn engine(display_mode: ProjectionMode) -> ProjectionEngine {
        ProjectionEngine::configure(
            &geo_grid(),
            ProjectionMode::Geographic,
            display_mode,
            "",
            1.0,
            1.0,
            &NoProviders,
        )
        .unwrap()
    }

    /// Linear provider standing in for an external projection library.
    struct FakeUtm;

    impl ProjectionProvider for FakeUtm {
        fn forward(&self, lon: f64, lat: f64) -> ViewResult<(f64, f64)> {
            Ok((lon * 90000.0 + 500000.0, lat * 111000.0))
        }
        fn inverse(&self, x: f64, y: f64) -> ViewResult<(f64, f64)> {
            Ok(((x - 500000.0) / 90000.0, y / 111000.0))
        }
    }

    struct FakeFactory;

    impl ProviderFactory for FakeFactory {
        fn open(&self, id: &str) -> ViewResult<Box<dyn ProjectionProvider>> {
            if id == "utm10n" {
                Ok(Box::new(FakeUtm))
            } else {
                Err(ViewError::projection(format!("unknown projection '{}'", id)))
            }
        }
    }

    #[test]
    fn geographic_round_trip() {
        let eng = engine(ProjectionMode::Geographic);
        let (lon, lat, display) = eng.forward(-121.45, 36.75, 250.0).unwrap();
        assert!((lon - -121.45).abs() < 1e-12 && (lat - 36.75).abs() < 1e-12);
        let (rlon, rlat, xg, yg) = eng.inverse(display).unwrap();
        assert!((rlon - lon).abs() < 1e-9, "lon {} vs {}", rlon, lon);
        assert!((rlat - lat).abs() < 1e-9);
        assert!((xg - -121.45).abs() < 1e-9 && (yg - 36.75).abs() < 1e-9);
    }

    #[test]
    fn spheroid_round_trip() {
        let eng = engine(ProjectionMode::Spheroid);
        assert!(!eng.is_global_spheroid(), "small grid gets a local view");
        let (_, _, display) = eng.forward(-121.45, 36.75, 250.0).unwrap();
        // display-to-ll ignores relief offset error only at the surface
        let (rlon, rlat) = eng.display_to_ll(display).unwrap();
        assert!((rlon - -121.45).abs() < 1e-2 && (rlat - 36.75).abs() < 1e-2);
    }

    #[test]
    fn projected_display_round_trip() {
        let eng = ProjectionEngine::configure(
            &geo_grid(),
            ProjectionMode::Geographic,
            ProjectionMode::Projected,
            "utm10n",
            1.0,
            1.0,
            &FakeFactory,
        )
        .unwrap();
        let (lon, lat, display) = eng.forward(-121.5, 36.7, 0.0).unwrap();
        let (rlon, rlat, _, _) = eng.inverse(display).unwrap();
        assert!((rlon - lon).abs() < 1e-9 && (rlat - lat).abs() < 1e-9);
    }

    #[test]
    fn already_projected_collapse() {
        let data = vec![10.0f32; 16];
        let grid = Grid::new(
            4,
            4,
            Bounds::new(500000.0, 503000.0, 4.06e6, 4.063e6),
            -9999.0,
            data,
            "utm10n",
        )
        .unwrap();
        let eng = ProjectionEngine::configure(
            &grid,
            ProjectionMode::Projected,
            ProjectionMode::Projected,
            "utm10n",
            1.0,
            1.0,
            &FakeFactory,
        )
        .unwrap();
        assert_eq!(eng.grid_mode, ProjectionMode::AlreadyProjected);
        assert_eq!(eng.display_mode, ProjectionMode::AlreadyProjected);
        // grid coordinates pass straight through to display scaling
        let (_, _, display) = eng.forward(501500.0, 4.0615e6, 10.0).unwrap();
        assert!(display.x.abs() < 1e-9 && display.y.abs() < 1e-9);
    }

    #[test]
    fn provider_failure_is_fatal() {
        let result = ProjectionEngine::configure(
            &geo_grid(),
            ProjectionMode::Geographic,
            ProjectionMode::Projected,
            "missing-projection",
            1.0,
            1.0,
            &FakeFactory,
        );
        assert!(matches!(result, Err(ViewError::Projection(_))));
    }

    #[test]
    fn mode_aware_distance() {
        let eng = engine(ProjectionMode::Geographic);
        let (lateral, over_ground, slope) =
            eng.distance(-121.5, 36.7, 0.0, -121.5, 36.7, 0.0).unwrap();
        assert_eq!((lateral, over_ground, slope), (0.0, 0.0, 0.0));
        let (lateral, over_ground, _) = eng
            .distance(-121.5, 36.7, 0.0, -121.45, 36.7, 100.0)
            .unwrap();
        assert!(over_ground > lateral, "vertical offset lengthens path");
    }

    #[test]
    fn surface_offset_policy_by_mode() {
        let flat = engine(ProjectionMode::Geographic);
        match SurfaceOffset::contour(&flat) {
            SurfaceOffset::Vertical(dz) => assert_eq!(dz, SURFACE_OFFSET),
            other => panic!("flat view should bump vertically, got {:?}", other),
        }
        let p = DVec3::new(1.0, 2.0, 3.0);
        let q = SurfaceOffset::Vertical(0.5).apply(p);
        assert_eq!((q.x, q.y, q.z), (1.0, 2.0, 3.5));
        let r = SurfaceOffset::Radial(0.1).apply(p);
        assert!((r.length() - 1.1 * p.length()).abs() < 1e-12, "radial nudge scales outward");
    }
}
