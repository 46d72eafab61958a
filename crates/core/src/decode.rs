//! Binary snapshot decoder.
//!
//! Turns time-stamped simulation output files into dense fields. Two
//! on-disk layouts exist:
//!
//! - **sparse**: a header word followed by exactly `num_cells` floats in
//!   the order of the run's [`GridIndex`]; values are scattered into a
//!   zero-initialized `(ny, nx, nz)` array.
//! - **dense-per-layer**: a header word followed by `layer_count` blocks
//!   of `ny × nx` floats in row-major order, one block per layer.
//!
//! File names follow `<template><5-digit zero-padded time>.bin`. Decoding
//! a series walks the requested times in order; each file handle lives
//! only for the duration of its own read. A missing or short file is
//! fatal: simulation outputs are written once, and absence means the
//! producing stage failed.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::error::{PostError, Result};
use crate::field::DenseField;
use crate::grid::GridShape;
use crate::index::GridIndex;
use crate::raw;

/// Bytes of unread header at the start of every snapshot file.
const HEADER_BYTES: u64 = 4;

/// On-disk payload arrangement of a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Compact active-cell values positioned via the grid index.
    Sparse,
    /// Full `ny × nx` planes, one per vertical layer.
    DensePerLayer,
}

/// Decoder for one output variable across a run.
#[derive(Debug)]
pub struct SnapshotDecoder<'a> {
    output_dir: PathBuf,
    template: String,
    shape: GridShape,
    layout: Layout,
    index: Option<&'a GridIndex>,
    layer_count: usize,
    surface_only: bool,
}

impl<'a> SnapshotDecoder<'a> {
    /// Decoder for a sparse-layout variable.
    #[must_use]
    pub fn sparse(
        output_dir: &Path,
        template: &str,
        shape: GridShape,
        index: &'a GridIndex,
    ) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            template: template.to_string(),
            shape,
            layout: Layout::Sparse,
            index: Some(index),
            layer_count: shape.nz,
            surface_only: false,
        }
    }

    /// Decoder for a dense-per-layer variable with `layer_count` planes.
    ///
    /// Vertically integrated variables (e.g. percent mass burnt) use a
    /// single plane regardless of the grid's `nz`.
    #[must_use]
    pub fn dense(output_dir: &Path, template: &str, shape: GridShape, layer_count: usize) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            template: template.to_string(),
            shape,
            layout: Layout::DensePerLayer,
            index: None,
            layer_count,
            surface_only: false,
        }
    }

    /// Keep only layer 0 of every decoded snapshot.
    ///
    /// Bounds memory when a long series is consumed for its ground layer
    /// only (e.g. fuel density for spread analytics).
    #[must_use]
    pub fn surface_only(mut self, enabled: bool) -> Self {
        self.surface_only = enabled;
        self
    }

    /// Path of the snapshot written at `time` seconds.
    #[must_use]
    pub fn snapshot_path(&self, time: u32) -> PathBuf {
        self.output_dir.join(format!("{}{:05}.bin", self.template, time))
    }

    /// Decode the single snapshot written at `time`.
    pub fn decode_at(&self, time: u32) -> Result<DenseField> {
        let path = self.snapshot_path(time);
        let file = File::open(&path).map_err(|e| PostError::io(&path, e))?;
        let file_len = file.metadata().map_err(|e| PostError::io(&path, e))?.len();

        let payload_values = match self.layout {
            Layout::Sparse => self.index.map_or(0, GridIndex::num_cells),
            Layout::DensePerLayer => self.shape.plane_count() * self.layer_count,
        };
        // Trailing bytes (e.g. record markers) are tolerated; a short file
        // is a shape mismatch.
        let expected = HEADER_BYTES + payload_values as u64 * 4;
        if file_len < expected {
            return Err(PostError::shape(&path, expected, file_len, "bytes"));
        }

        let mut reader = BufReader::new(file);
        raw::skip_words(&mut reader, 1, &path)?;

        let field_shape = GridShape {
            nx: self.shape.nx,
            ny: self.shape.ny,
            nz: self.layer_count,
        };
        let mut field = DenseField::zeros(field_shape);

        match self.layout {
            Layout::Sparse => {
                // Constructors guarantee an index for sparse decoders.
                let index = self.index.ok_or_else(|| {
                    PostError::config(&path, "sparse decode requires a grid index")
                })?;
                let values = raw::read_f32_vec(&mut reader, index.num_cells(), &path)?;
                for (value, &(row, col, layer)) in values.iter().zip(index.coordinates()) {
                    field.set(row, col, layer, *value);
                }
            }
            Layout::DensePerLayer => {
                let plane = self.shape.plane_count();
                for layer in 0..self.layer_count {
                    let values = raw::read_f32_vec(&mut reader, plane, &path)?;
                    for row in 0..self.shape.ny {
                        for col in 0..self.shape.nx {
                            field.set(row, col, layer, values[row * self.shape.nx + col]);
                        }
                    }
                }
            }
        }

        debug!(time, path = %path.display(), "decoded snapshot");
        if self.surface_only && field.layer_count() > 1 {
            Ok(field.surface())
        } else {
            Ok(field)
        }
    }

    /// Decode a full series, strictly in the order of `times`.
    pub fn decode_series(&self, times: &[u32]) -> Result<Vec<DenseField>> {
        times.iter().map(|&t| self.decode_at(t)).collect()
    }

    /// Decode a series across worker threads.
    ///
    /// Each time step's file is independent; results are reassembled in
    /// time order before being returned, which is all downstream
    /// analytics require.
    pub fn decode_series_par(&self, times: &[u32]) -> Result<Vec<DenseField>> {
        times.par_iter().map(|&t| self.decode_at(t)).collect()
    }

    /// Decode a series one snapshot at a time, handing each to `consume`
    /// without retaining the sequence.
    pub fn decode_each<F>(&self, times: &[u32], mut consume: F) -> Result<()>
    where
        F: FnMut(u32, DenseField),
    {
        for &t in times {
            consume(t, self.decode_at(t)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn shape(nx: usize, ny: usize, nz: usize) -> GridShape {
        GridShape { nx, ny, nz }
    }

    fn write_snapshot(path: &Path, values: &[f32]) {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0_f32.to_le_bytes()); // header word
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut f = File::create(path).unwrap();
        f.write_all(&bytes).unwrap();
    }

    #[test]
    fn test_sparse_scatter_exact_values_rest_zero() {
        let dir = tempfile::tempdir().unwrap();
        let sh = shape(4, 3, 2);
        let index =
            GridIndex::new(vec![(0, 0, 0), (2, 3, 1), (1, 1, 0)], sh).unwrap();
        write_snapshot(&dir.path().join("fuels-dens-00050.bin"), &[1.25, -3.5, 0.75]);

        let decoder = SnapshotDecoder::sparse(dir.path(), "fuels-dens-", sh, &index);
        let field = decoder.decode_at(50).unwrap();

        assert_eq!(field.get(0, 0, 0), 1.25);
        assert_eq!(field.get(2, 3, 1), -3.5);
        assert_eq!(field.get(1, 1, 0), 0.75);
        assert_eq!(field.nonzero_count(), 3);
    }

    #[test]
    fn test_dense_per_layer_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sh = shape(3, 2, 2);
        // layer 0 then layer 1, each row-major (ny * nx)
        let values: Vec<f32> = (0..12).map(|v| v as f32 * 0.5).collect();
        write_snapshot(&dir.path().join("windu00100.bin"), &values);

        let decoder = SnapshotDecoder::dense(dir.path(), "windu", sh, 2);
        let field = decoder.decode_at(100).unwrap();

        for layer in 0..2 {
            for row in 0..2 {
                for col in 0..3 {
                    let flat = layer * 6 + row * 3 + col;
                    assert_eq!(field.get(row, col, layer), values[flat]);
                }
            }
        }
    }

    #[test]
    fn test_surface_only_drops_upper_layers() {
        let dir = tempfile::tempdir().unwrap();
        let sh = shape(2, 2, 3);
        let values: Vec<f32> = (1..=12).map(|v| v as f32).collect();
        write_snapshot(&dir.path().join("fuels-dens-00000.bin"), &values);

        let decoder = SnapshotDecoder::dense(dir.path(), "fuels-dens-", sh, 3).surface_only(true);
        let field = decoder.decode_at(0).unwrap();

        assert_eq!(field.layer_count(), 1);
        assert_eq!(field.surface_value(0, 0), 1.0);
        assert_eq!(field.surface_value(1, 1), 4.0);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let sh = shape(2, 2, 1);
        let decoder = SnapshotDecoder::dense(dir.path(), "fuels-dens-", sh, 1);
        assert!(matches!(
            decoder.decode_at(0).unwrap_err(),
            PostError::Io { .. }
        ));
    }

    #[test]
    fn test_short_file_is_shape_error() {
        let dir = tempfile::tempdir().unwrap();
        let sh = shape(4, 4, 1);
        write_snapshot(&dir.path().join("fuels-dens-00000.bin"), &[1.0, 2.0]);
        let decoder = SnapshotDecoder::dense(dir.path(), "fuels-dens-", sh, 1);
        assert!(matches!(
            decoder.decode_at(0).unwrap_err(),
            PostError::DataShape { .. }
        ));
    }

    #[test]
    fn test_series_orders_match_sequential_and_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let sh = shape(1, 1, 1);
        for (t, v) in [(0_u32, 5.0_f32), (30, 6.0), (60, 7.0)] {
            write_snapshot(&dir.path().join(format!("mburnt_integ-{t:05}.bin")), &[v]);
        }
        let decoder = SnapshotDecoder::dense(dir.path(), "mburnt_integ-", sh, 1);
        let times = [0, 30, 60];

        let seq = decoder.decode_series(&times).unwrap();
        let par = decoder.decode_series_par(&times).unwrap();
        let surface: Vec<f32> = seq.iter().map(|f| f.surface_value(0, 0)).collect();
        assert_eq!(surface, vec![5.0, 6.0, 7.0]);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_zero_padded_five_digit_names() {
        let dir = tempfile::tempdir().unwrap();
        let sh = shape(1, 1, 1);
        let decoder = SnapshotDecoder::dense(dir.path(), "fire-energy_to_atmos-", sh, 1);
        assert!(decoder
            .snapshot_path(300)
            .ends_with("fire-energy_to_atmos-00300.bin"));
    }
}
