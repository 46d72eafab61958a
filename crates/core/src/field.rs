//! Dense field storage for decoded snapshots.
//!
//! A [`DenseField`] holds one time snapshot of a simulation variable as a
//! flat `Vec<f32>` shaped `(ny, nx, nz)` in row-major order. Fields are
//! produced fresh per snapshot and never shared between snapshots, so
//! callers can drop them as soon as they are consumed to bound memory.

use crate::grid::GridShape;

/// One dense 3-D snapshot of a simulation variable.
///
/// Storage is row-major over `(row, col, layer)`: the flat index is
/// `(row * nx + col) * nz + layer`. 2-D fields are represented with
/// `nz == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseField {
    data: Vec<f32>,
    ny: usize,
    nx: usize,
    nz: usize,
}

impl DenseField {
    /// Create a zero-initialized field with the given shape.
    #[must_use]
    pub fn zeros(shape: GridShape) -> Self {
        Self {
            data: vec![0.0; shape.ny * shape.nx * shape.nz],
            ny: shape.ny,
            nx: shape.nx,
            nz: shape.nz,
        }
    }

    /// Create a field filled with a constant value.
    #[must_use]
    pub fn filled(shape: GridShape, value: f32) -> Self {
        Self {
            data: vec![value; shape.ny * shape.nx * shape.nz],
            ny: shape.ny,
            nx: shape.nx,
            nz: shape.nz,
        }
    }

    /// Shape of this field.
    #[must_use]
    pub fn shape(&self) -> GridShape {
        GridShape {
            nx: self.nx,
            ny: self.ny,
            nz: self.nz,
        }
    }

    /// Number of vertical layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.nz
    }

    /// Value at `(row, col, layer)`.
    ///
    /// # Panics
    ///
    /// Panics if any coordinate is out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize, layer: usize) -> f32 {
        assert!(
            row < self.ny && col < self.nx && layer < self.nz,
            "Coordinates out of bounds"
        );
        self.data[(row * self.nx + col) * self.nz + layer]
    }

    /// Set the value at `(row, col, layer)`.
    ///
    /// # Panics
    ///
    /// Panics if any coordinate is out of bounds.
    pub fn set(&mut self, row: usize, col: usize, layer: usize, value: f32) {
        assert!(
            row < self.ny && col < self.nx && layer < self.nz,
            "Coordinates out of bounds"
        );
        self.data[(row * self.nx + col) * self.nz + layer] = value;
    }

    /// Ground-layer value at `(row, col)`.
    #[must_use]
    pub fn surface_value(&self, row: usize, col: usize) -> f32 {
        self.get(row, col, 0)
    }

    /// Copy of layer 0 as a standalone single-layer field.
    ///
    /// Used by the decoder's surface-only mode to discard canopy layers
    /// when only ground fuel is needed across a long time series.
    #[must_use]
    pub fn surface(&self) -> DenseField {
        let mut out = DenseField::zeros(GridShape {
            nx: self.nx,
            ny: self.ny,
            nz: 1,
        });
        for row in 0..self.ny {
            for col in 0..self.nx {
                out.set(row, col, 0, self.get(row, col, 0));
            }
        }
        out
    }

    /// Flat view of the raw values.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Number of entries different from zero.
    #[must_use]
    pub fn nonzero_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0.0).count()
    }

    /// Maximum value over the whole field, or 0.0 for an empty field.
    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(0.0_f32, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(nx: usize, ny: usize, nz: usize) -> GridShape {
        GridShape { nx, ny, nz }
    }

    #[test]
    fn test_zeros_shape_and_contents() {
        let f = DenseField::zeros(shape(4, 3, 2));
        assert_eq!(f.as_slice().len(), 24);
        assert!(f.as_slice().iter().all(|&v| v == 0.0));
        assert_eq!(f.layer_count(), 2);
    }

    #[test]
    fn test_get_set_row_major_layout() {
        let mut f = DenseField::zeros(shape(5, 4, 3));
        f.set(2, 3, 1, 7.5);
        assert_eq!(f.get(2, 3, 1), 7.5);
        // flat index = (row * nx + col) * nz + layer
        assert_eq!(f.as_slice()[(2 * 5 + 3) * 3 + 1], 7.5);
    }

    #[test]
    fn test_surface_extraction() {
        let mut f = DenseField::zeros(shape(2, 2, 3));
        f.set(1, 0, 0, 1.0);
        f.set(1, 0, 2, 9.0); // canopy value must not leak into the surface
        let s = f.surface();
        assert_eq!(s.layer_count(), 1);
        assert_eq!(s.surface_value(1, 0), 1.0);
        assert_eq!(s.nonzero_count(), 1);
    }

    #[test]
    #[should_panic(expected = "Coordinates out of bounds")]
    fn test_bounds_check() {
        let f = DenseField::zeros(shape(2, 2, 1));
        let _ = f.get(0, 2, 0);
    }
}
