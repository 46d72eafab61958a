//! Sparse cell index for compact snapshot layouts.
//!
//! The fire model writes most variables as a compact list of active-cell
//! values; `fire_indexes.bin` stores the matching `(row, col, layer)`
//! coordinates once for the whole run. On disk the file holds a header
//! word, the cell count, a skip block of `7 + num_cells` words, and then
//! three parallel `i32` arrays: the column, row and layer component of
//! every active cell, 1-based. Coordinates are converted to 0-based on
//! load and validated against the grid shape.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PostError, Result};
use crate::grid::GridShape;
use crate::raw;

/// Immutable lookup from compact value position to dense grid position.
#[derive(Debug, Clone)]
pub struct GridIndex {
    coords: Vec<(usize, usize, usize)>,
}

impl GridIndex {
    /// Build an index from already 0-based `(row, col, layer)` triples.
    ///
    /// Fails with [`PostError::DataShape`] if any triple lies outside the
    /// grid: a partial index is never usable.
    pub fn new(coords: Vec<(usize, usize, usize)>, shape: GridShape) -> Result<Self> {
        for &(row, col, layer) in &coords {
            if !shape.contains(row, col, layer) {
                return Err(PostError::config(
                    Path::new("<grid index>"),
                    format!(
                        "cell ({row}, {col}, {layer}) outside grid {}x{}x{}",
                        shape.ny, shape.nx, shape.nz
                    ),
                ));
            }
        }
        Ok(Self { coords })
    }

    /// Number of active cells.
    #[must_use]
    pub fn num_cells(&self) -> usize {
        self.coords.len()
    }

    /// Active-cell coordinates in on-disk value order.
    #[must_use]
    pub fn coordinates(&self) -> &[(usize, usize, usize)] {
        &self.coords
    }

    /// Load the index from a `fire_indexes.bin` file.
    ///
    /// The declared cell count is validated against the bytes remaining
    /// after the skip block before any coordinate is read.
    pub fn from_file(path: &Path, shape: GridShape) -> Result<Self> {
        let file = File::open(path).map_err(|e| PostError::io(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| PostError::io(path, e))?
            .len();
        let mut reader = BufReader::new(file);

        raw::skip_words(&mut reader, 1, path)?; // header
        let declared = raw::read_i32(&mut reader, path)?;
        if declared < 0 {
            return Err(PostError::config(
                path,
                format!("negative cell count {declared}"),
            ));
        }
        let num_cells = declared as usize;
        raw::skip_words(&mut reader, 7 + num_cells, path)?;

        // header + count + skip block, in bytes
        let consumed = (1 + 1 + 7 + num_cells) as u64 * 4;
        let expected = consumed + 3 * num_cells as u64 * 4;
        if file_len != expected {
            return Err(PostError::shape(path, expected, file_len, "bytes"));
        }

        let cols = raw::read_i32_vec(&mut reader, num_cells, path)?;
        let rows = raw::read_i32_vec(&mut reader, num_cells, path)?;
        let layers = raw::read_i32_vec(&mut reader, num_cells, path)?;

        let mut coords = Vec::with_capacity(num_cells);
        for i in 0..num_cells {
            if cols[i] < 1 || rows[i] < 1 || layers[i] < 1 {
                return Err(PostError::config(
                    path,
                    format!(
                        "cell {i}: 1-based coordinate ({}, {}, {}) out of range",
                        rows[i], cols[i], layers[i]
                    ),
                ));
            }
            coords.push((
                rows[i] as usize - 1,
                cols[i] as usize - 1,
                layers[i] as usize - 1,
            ));
        }

        Self::new(coords, shape).map_err(|_| {
            PostError::config(path, "coordinate outside declared grid shape".to_string())
        })
    }
}

/// Vertical grid of the air-flow model, read from `z_qu.bin`.
///
/// Both arrays have `nz + 2` entries because the air-flow solver pads the
/// column with one ghost layer at each end.
#[derive(Debug, Clone)]
pub struct VerticalGrid {
    /// Cell-face heights (m)
    pub z: Vec<f32>,
    /// Cell-center heights (m)
    pub zm: Vec<f32>,
}

impl VerticalGrid {
    /// Read the padded face/center height arrays.
    pub fn from_file(path: &Path, nz: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| PostError::io(path, e))?;
        let mut reader = BufReader::new(file);
        raw::skip_words(&mut reader, 1, path)?;
        let z = raw::read_f32_vec(&mut reader, nz + 2, path)?;
        raw::skip_words(&mut reader, 2, path)?;
        let zm = raw::read_f32_vec(&mut reader, nz + 2, path)?;
        Ok(Self { z, zm })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn shape(nx: usize, ny: usize, nz: usize) -> GridShape {
        GridShape { nx, ny, nz }
    }

    /// Serialize an index file the way the fire model writes it.
    fn write_index_file(path: &Path, cells: &[(i32, i32, i32)]) {
        let n = cells.len();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0_i32.to_le_bytes()); // header
        bytes.extend_from_slice(&(n as i32).to_le_bytes());
        for _ in 0..(7 + n) {
            bytes.extend_from_slice(&0_i32.to_le_bytes());
        }
        for &(_, col, _) in cells {
            bytes.extend_from_slice(&col.to_le_bytes());
        }
        for &(row, _, _) in cells {
            bytes.extend_from_slice(&row.to_le_bytes());
        }
        for &(_, _, layer) in cells {
            bytes.extend_from_slice(&layer.to_le_bytes());
        }
        let mut f = File::create(path).unwrap();
        f.write_all(&bytes).unwrap();
    }

    #[test]
    fn test_load_converts_to_zero_based() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fire_indexes.bin");
        write_index_file(&path, &[(1, 1, 1), (3, 4, 2)]);

        let index = GridIndex::from_file(&path, shape(5, 5, 2)).unwrap();
        assert_eq!(index.num_cells(), 2);
        assert_eq!(index.coordinates(), &[(0, 0, 0), (2, 3, 1)]);
    }

    #[test]
    fn test_declared_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fire_indexes.bin");
        write_index_file(&path, &[(1, 1, 1), (2, 2, 1)]);
        // Corrupt the declared count without changing the payload.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4..8].copy_from_slice(&5_i32.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();

        let err = GridIndex::from_file(&path, shape(5, 5, 2)).unwrap_err();
        assert!(matches!(err, PostError::Io { .. } | PostError::DataShape { .. }));
    }

    #[test]
    fn test_out_of_shape_coordinate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fire_indexes.bin");
        write_index_file(&path, &[(6, 1, 1)]); // row 6 of a 5-row grid

        assert!(GridIndex::from_file(&path, shape(5, 5, 1)).is_err());
    }

    #[test]
    fn test_vertical_grid_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z_qu.bin");
        let nz = 2;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0_i32.to_le_bytes());
        for v in [0.0_f32, 1.0, 2.0, 3.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(&0_i32.to_le_bytes());
        bytes.extend_from_slice(&0_i32.to_le_bytes());
        for v in [0.5_f32, 1.5, 2.5, 3.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();

        let vg = VerticalGrid::from_file(&path, nz).unwrap();
        assert_eq!(vg.z, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(vg.zm, vec![0.5, 1.5, 2.5, 3.5]);
    }
}
