//! Peak surface-power aggregation.
//!
//! The fire model writes instantaneous surface energy once per simulated
//! second as a headerless `ny × nx` block of `f32` (`surfEnergy#####.bin`).
//! At the native resolution the per-second peaks are noisy; the product of
//! interest is the peak of a locally averaged power. Each second's plane is
//! block-averaged over `AGGREGATION × AGGREGATION` cell tiles and the
//! element-wise maximum across all seconds is kept.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{PostError, Result};
use crate::field::DenseField;
use crate::grid::GridShape;
use crate::raw;

/// Cells per side of one averaging tile.
pub const AGGREGATION: usize = 3;

/// Block-average a row-major plane over `agg × agg` tiles.
///
/// A plane whose sides are not multiples of `agg` is padded first by
/// repeating its trailing rows and columns, so edge tiles weight the
/// boundary cells more instead of shrinking.
fn block_mean(values: &[f32], ny: usize, nx: usize, agg: usize) -> (Vec<f32>, usize, usize) {
    let pad_y = (agg - ny % agg) % agg;
    let pad_x = (agg - nx % agg) % agg;
    let (pny, pnx) = (ny + pad_y, nx + pad_x);

    let mut padded = vec![0.0_f32; pny * pnx];
    for row in 0..pny {
        let src_row = if row < ny { row } else { row - pad_y };
        for col in 0..pnx {
            let src_col = if col < nx { col } else { col - pad_x };
            padded[row * pnx + col] = values[src_row * nx + src_col];
        }
    }

    let (cny, cnx) = (pny / agg, pnx / agg);
    let mut coarse = vec![0.0_f32; cny * cnx];
    let norm = (agg * agg) as f32;
    for (tile_row, coarse_row) in coarse.chunks_exact_mut(cnx).enumerate() {
        for (tile_col, out) in coarse_row.iter_mut().enumerate() {
            let mut sum = 0.0_f32;
            for dy in 0..agg {
                let row = tile_row * agg + dy;
                for dx in 0..agg {
                    sum += padded[row * pnx + tile_col * agg + dx];
                }
            }
            *out = sum / norm;
        }
    }
    (coarse, cny, cnx)
}

/// Aggregate per-second surface energy into a peak block-averaged power
/// field.
///
/// Reads `surfEnergy#####.bin` for every second `1..=sim_time` from
/// `output_dir`; `nx`/`ny` are the fire grid's horizontal cell counts.
/// The result is one coarse plane of `ceil(ny/3) × ceil(nx/3)` tiles.
pub fn aggregate_max_power(
    output_dir: &Path,
    nx: usize,
    ny: usize,
    sim_time: u32,
) -> Result<DenseField> {
    let pad_y = (AGGREGATION - ny % AGGREGATION) % AGGREGATION;
    let pad_x = (AGGREGATION - nx % AGGREGATION) % AGGREGATION;
    let coarse_shape = GridShape {
        nx: (nx + pad_x) / AGGREGATION,
        ny: (ny + pad_y) / AGGREGATION,
        nz: 1,
    };
    let mut max_power = DenseField::zeros(coarse_shape);

    info!(sim_time, "aggregating surface energy into peak power");
    for second in 1..=sim_time {
        let path = output_dir.join(format!("surfEnergy{second:05}.bin"));
        let file = File::open(&path).map_err(|e| PostError::io(&path, e))?;
        let file_len = file.metadata().map_err(|e| PostError::io(&path, e))?.len();
        let expected = (nx * ny * 4) as u64;
        if file_len < expected {
            return Err(PostError::shape(&path, expected, file_len, "bytes"));
        }

        let mut reader = BufReader::new(file);
        let values = raw::read_f32_vec(&mut reader, nx * ny, &path)?;
        let (coarse, _, cnx) = block_mean(&values, ny, nx, AGGREGATION);

        for (i, &v) in coarse.iter().enumerate() {
            let (row, col) = (i / cnx, i % cnx);
            if v > max_power.surface_value(row, col) {
                max_power.set(row, col, 0, v);
            }
        }
        debug!(second, "folded surface-energy plane");
    }
    Ok(max_power)
}
