//! Gridded elevation surface shared read-only by every component.
//!
//! The scalar array is row-major with index k = i * ny + j, where i is the
//! column (x direction) and j is the row (y direction). A cell is valid iff
//! its scalar differs from the no-data sentinel.

/// Rectangular bounds of a grid in its native coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self { xmin, xmax, ymin, ymax }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

/// Primary (or secondary overlay) scalar raster.
#[derive(Debug, Clone)]
pub struct Grid {
    /// Number of columns
    pub nx: usize,
    /// Number of rows
    pub ny: usize,
    pub bounds: Bounds,
    /// Cell spacing along x
    pub dx: f64,
    /// Cell spacing along y
    pub dy: f64,
    /// Reserved value marking a vertex as having no measurement
    pub nodata: f32,
    /// Row-major scalars, k = i * ny + j
    pub data: Vec<f32>,
    /// Projection identifier for this grid's native coordinates
    pub projection_id: String,
}

impl Grid {
    /// Build a grid after validating dimensions against the data length.
    pub fn new(
        nx: usize,
        ny: usize,
        bounds: Bounds,
        nodata: f32,
        data: Vec<f32>,
        projection_id: &str,
    ) -> Result<Self, String> {
        if nx < 2 || ny < 2 {
            return Err(format!("grid must be at least 2x2, got {}x{}", nx, ny));
        }
        if data.len() != nx * ny {
            return Err(format!(
                "data length {} does not match dimensions {}x{}",
                data.len(),
                nx,
                ny
            ));
        }
        if bounds.xmax <= bounds.xmin || bounds.ymax <= bounds.ymin {
            return Err("grid bounds must have positive extent".to_string());
        }
        let dx = (bounds.xmax - bounds.xmin) / (nx - 1) as f64;
        let dy = (bounds.ymax - bounds.ymin) / (ny - 1) as f64;
        Ok(Self {
            nx,
            ny,
            bounds,
            dx,
            dy,
            nodata,
            data,
            projection_id: projection_id.to_string(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat index of vertex (i, j).
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        i * self.ny + j
    }

    /// Vertex (i, j) of flat index k.
    #[inline]
    pub fn vertex(&self, k: usize) -> (usize, usize) {
        (k / self.ny, k % self.ny)
    }

    #[inline]
    pub fn value(&self, i: usize, j: usize) -> f32 {
        self.data[self.index(i, j)]
    }

    #[inline]
    pub fn is_valid(&self, k: usize) -> bool {
        self.data[k] != self.nodata
    }

    /// Native x coordinate of column i.
    #[inline]
    pub fn grid_x(&self, i: usize) -> f64 {
        self.bounds.xmin + i as f64 * self.dx
    }

    /// Native y coordinate of row j.
    #[inline]
    pub fn grid_y(&self, j: usize) -> f64 {
        self.bounds.ymin + j as f64 * self.dy
    }

    /// Cell indices containing the native position, or None outside the
    /// interior cell range [0, n-2].
    pub fn cell_of(&self, xgrid: f64, ygrid: f64) -> Option<(usize, usize)> {
        let fi = (xgrid - self.bounds.xmin) / self.dx;
        let fj = (ygrid - self.bounds.ymin) / self.dy;
        if fi < 0.0 || fj < 0.0 {
            return None;
        }
        let i = fi as usize;
        let j = fj as usize;
        if i + 1 >= self.nx || j + 1 >= self.ny {
            return None;
        }
        Some((i, j))
    }

    /// Scalar at an arbitrary grid position: the average of the valid
    /// corners of the containing cell. None when the position is outside
    /// the grid or all four corners are no-data.
    pub fn sample(&self, xgrid: f64, ygrid: f64) -> Option<f64> {
        let (i, j) = self.cell_of(xgrid, ygrid)?;
        let corners = [
            self.index(i, j),
            self.index(i + 1, j),
            self.index(i, j + 1),
            self.index(i + 1, j + 1),
        ];
        let mut nsum = 0usize;
        let mut sum = 0.0f64;
        for &k in &corners {
            if self.is_valid(k) {
                sum += self.data[k] as f64;
                nsum += 1;
            }
        }
        if nsum > 0 {
            Some(sum / nsum as f64)
        } else {
            None
        }
    }

    /// Minimum and maximum over valid vertices. None if every vertex is
    /// no-data.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut range: Option<(f32, f32)> = None;
        for (k, &z) in self.data.iter().enumerate() {
            if !self.is_valid(k) {
                continue;
            }
            range = Some(match range {
                Some((lo, hi)) => (lo.min(z), hi.max(z)),
                None => (z, z),
            });
        }
        range
    }
}
