//! Grid geometry and simulation time bases.
//!
//! Two independent grids exist in a run: the fire-model grid (a refined
//! version of the air-flow grid) and the air-flow grid itself. Each carries
//! its own print-interval time base, plus a coarser "averaged" base for
//! variables written less often. The two bases are never implicitly
//! reconciled; callers pass the one matching the variable they decode.

use serde::{Deserialize, Serialize};

/// Cell counts of a 3-D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    /// Columns (x direction)
    pub nx: usize,
    /// Rows (y direction)
    pub ny: usize,
    /// Vertical layers
    pub nz: usize,
}

impl GridShape {
    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Cells in one horizontal plane.
    #[must_use]
    pub fn plane_count(&self) -> usize {
        self.nx * self.ny
    }

    /// Whether a `(row, col, layer)` triple lies inside the grid.
    #[must_use]
    pub fn contains(&self, row: usize, col: usize, layer: usize) -> bool {
        row < self.ny && col < self.nx && layer < self.nz
    }
}

/// Physical geometry of a simulation grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireGrid {
    pub shape: GridShape,
    /// Horizontal spacing in x (m)
    pub dx: f32,
    /// Horizontal spacing in y (m)
    pub dy: f32,
    /// Per-layer vertical spacing (m), length `nz`
    pub dz: Vec<f32>,
    /// Cell-face heights (m), length `nz + 1`, starting at 0
    pub z: Vec<f32>,
    /// Cell-center heights (m), length `nz`
    pub zm: Vec<f32>,
}

impl FireGrid {
    /// Build a grid from its shape, horizontal spacing and vertical
    /// spacing profile, deriving face and center heights.
    #[must_use]
    pub fn new(shape: GridShape, dx: f32, dy: f32, dz: Vec<f32>) -> Self {
        let mut z = vec![0.0_f32; shape.nz + 1];
        for k in 1..=shape.nz {
            z[k] = z[k - 1] + dz[k - 1];
        }
        let mut zm = vec![0.0_f32; shape.nz];
        for k in 0..shape.nz {
            zm[k] = z[k] + dz[k] * 0.5;
        }
        Self {
            shape,
            dx,
            dy,
            dz,
            z,
            zm,
        }
    }

    /// Uniform-spacing convenience constructor.
    #[must_use]
    pub fn uniform(shape: GridShape, dx: f32, dy: f32, dz: f32) -> Self {
        Self::new(shape, dx, dy, vec![dz; shape.nz])
    }

    /// Horizontal cell footprint (m²).
    #[must_use]
    pub fn cell_area(&self) -> f32 {
        self.dx * self.dy
    }

    /// Physical extent `[x_min, x_max, y_min, y_max]` in meters.
    #[must_use]
    pub fn horizontal_extent(&self) -> [f32; 4] {
        [
            0.0,
            self.dx * self.shape.nx as f32,
            0.0,
            self.dy * self.shape.ny as f32,
        ]
    }
}

/// Print-interval time base: the discrete times at which a variable is
/// written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    /// Total simulated time (s)
    pub sim_time: u32,
    /// Seconds between successive snapshots
    pub dt_print: u32,
    times: Vec<u32>,
}

impl TimeBase {
    /// Build the base `0, dt_print, 2·dt_print, …` covering `sim_time`.
    #[must_use]
    pub fn new(sim_time: u32, dt_print: u32) -> Self {
        let ntimes = (sim_time / dt_print + 1) as usize;
        let times = (0..ntimes).map(|i| i as u32 * dt_print).collect();
        Self {
            sim_time,
            dt_print,
            times,
        }
    }

    /// Number of snapshots, including time zero.
    #[must_use]
    pub fn ntimes(&self) -> usize {
        self.times.len()
    }

    /// Snapshot times in seconds, strictly increasing.
    #[must_use]
    pub fn times(&self) -> &[u32] {
        &self.times
    }
}
