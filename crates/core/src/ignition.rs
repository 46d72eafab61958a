//! Ignition-zone rasterization.
//!
//! A run declares its ignition in one of five forms: an axis-aligned line
//! (rectangle), a rectangular ring, a circular ring, an explicit list of
//! ignition points, or a binary file of pre-selected cells. All variants
//! rasterize to the same product: a boolean mask over the horizontal grid
//! plus its physical area. Geometry outside the grid is clipped with a
//! warning, never an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PostError, Result};
use crate::grid::FireGrid;
use crate::raw;

/// Coordinate unit of an explicit ignition point list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinateScale {
    /// Values are already grid-cell indices.
    Cells,
    /// Values are in half-cell units; integer-divide by 2 before use.
    HalfCells,
}

impl CoordinateScale {
    fn to_cell(self, value: f32) -> isize {
        match self {
            CoordinateScale::Cells => value as isize,
            CoordinateScale::HalfCells => (value / 2.0) as isize,
        }
    }
}

/// One explicit ignition point, optionally with an end point for moving
/// (strip) ignitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IgnitionPoint {
    pub x: f32,
    pub y: f32,
    pub time: f32,
    /// `(x, y, time)` of the strip end, for formats that record one.
    pub end: Option<(f32, f32, f32)>,
}

/// Declarative ignition geometry. Exactly one variant is active per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IgnitionSpec {
    /// Axis-aligned rectangle (line fire).
    Line {
        x0: f32,
        y0: f32,
        len_x: f32,
        len_y: f32,
    },
    /// Rectangular ring of the given strip widths inside the outer
    /// rectangle.
    SquareRing {
        x0: f32,
        y0: f32,
        len_x: f32,
        len_y: f32,
        width_x: f32,
        width_y: f32,
    },
    /// Circular ring; `diameter` spans the outer circle.
    Circle {
        x0: f32,
        y0: f32,
        diameter: f32,
        ring_width: f32,
    },
    /// Explicit point list with its coordinate unit.
    ExplicitPoints {
        points: Vec<IgnitionPoint>,
        scale: CoordinateScale,
    },
    /// Binary file of pre-selected cells (`ignite_selected.dat`).
    SparseCellFile { path: PathBuf },
}

/// Bounding box of the marked cells; `x_max`/`y_max` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskBounds {
    pub x_min: usize,
    pub x_max: usize,
    pub y_min: usize,
    pub y_max: usize,
}

/// Rasterized ignition zone: boolean grid plus derived physical area.
/// Created once at setup and read-only afterward.
#[derive(Debug, Clone)]
pub struct IgnitionMask {
    cells: Vec<bool>,
    nx: usize,
    ny: usize,
    area: f32,
    bounds: Option<MaskBounds>,
}

impl IgnitionMask {
    fn empty(nx: usize, ny: usize) -> Self {
        Self {
            cells: vec![false; nx * ny],
            nx,
            ny,
            area: 0.0,
            bounds: None,
        }
    }

    fn mark(&mut self, row: isize, col: isize, clipped: &mut usize) {
        if row >= 0 && col >= 0 && (row as usize) < self.ny && (col as usize) < self.nx {
            self.cells[row as usize * self.nx + col as usize] = true;
        } else {
            *clipped += 1;
        }
    }

    fn finalize(&mut self, cell_area: f32) {
        let mut count = 0_usize;
        let mut bounds: Option<MaskBounds> = None;
        for row in 0..self.ny {
            for col in 0..self.nx {
                if !self.cells[row * self.nx + col] {
                    continue;
                }
                count += 1;
                bounds = Some(match bounds {
                    None => MaskBounds {
                        x_min: col,
                        x_max: col + 1,
                        y_min: row,
                        y_max: row + 1,
                    },
                    Some(b) => MaskBounds {
                        x_min: b.x_min.min(col),
                        x_max: b.x_max.max(col + 1),
                        y_min: b.y_min.min(row),
                        y_max: b.y_max.max(row + 1),
                    },
                });
            }
        }
        self.area = count as f32 * cell_area;
        self.bounds = bounds;
    }

    /// Whether the cell at `(row, col)` is part of the ignition zone.
    #[must_use]
    pub fn is_marked(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.nx + col]
    }

    /// Number of marked cells.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Physical ignition area: `marked × dx × dy` (m²).
    #[must_use]
    pub fn area(&self) -> f32 {
        self.area
    }

    /// Bounding box of the marked cells, if any cell is marked.
    #[must_use]
    pub fn bounds(&self) -> Option<MaskBounds> {
        self.bounds
    }

    /// Grid dimensions `(nx, ny)` of the mask.
    #[must_use]
    pub fn dims(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }
}

impl IgnitionSpec {
    /// Rasterize this geometry onto the horizontal plane of `grid`.
    pub fn rasterize(&self, grid: &FireGrid) -> Result<IgnitionMask> {
        let mut mask = IgnitionMask::empty(grid.shape.nx, grid.shape.ny);
        let mut clipped = 0_usize;

        match self {
            IgnitionSpec::Line { x0, y0, len_x, len_y } => {
                // Floor the lower edge, ceil the upper: the rasterized
                // strip always covers the requested physical footprint.
                let x_min = (x0 / grid.dx) as isize;
                let x_max = ((x0 + len_x) / grid.dx).ceil() as isize;
                let y_min = (y0 / grid.dy) as isize;
                let y_max = ((y0 + len_y) / grid.dy).ceil() as isize;
                for row in y_min..y_max {
                    for col in x_min..x_max {
                        mask.mark(row, col, &mut clipped);
                    }
                }
            }
            IgnitionSpec::SquareRing {
                x0,
                y0,
                len_x,
                len_y,
                width_x,
                width_y,
            } => {
                let idelta = (width_x / grid.dx).ceil() as isize;
                let jdelta = (width_y / grid.dy).ceil() as isize;
                let (iis, iie) = ring_span(*x0, *len_x, grid.dx);
                let (jjs, jje) = ring_span(*y0, *len_y, grid.dy);
                for col in iis..iie {
                    for row in jjs..(jjs + jdelta - 1) {
                        mask.mark(row, col, &mut clipped); // bottom strip
                    }
                    for row in (jje - jdelta + 1)..jje {
                        mask.mark(row, col, &mut clipped); // top strip
                    }
                }
                for row in jjs..jje {
                    for col in iis..(iis + idelta - 1) {
                        mask.mark(row, col, &mut clipped); // left strip
                    }
                    for col in (iie - idelta + 1)..iie {
                        mask.mark(row, col, &mut clipped); // right strip
                    }
                }
            }
            IgnitionSpec::Circle {
                x0,
                y0,
                diameter,
                ring_width,
            } => {
                let (iis, iie) = ring_span(*x0, *diameter, grid.dx);
                let (jjs, jje) = ring_span(*y0, *diameter, grid.dy);
                let radius = diameter * 0.5;
                let cx = x0 + radius;
                let cy = y0 + radius;
                for row in jjs..jje {
                    let y = (row as f32 - 0.5) * grid.dy;
                    for col in iis..iie {
                        let x = (col as f32 - 0.5) * grid.dx;
                        let dist = (x - cx).hypot(y - cy);
                        if (radius - ring_width..=radius).contains(&dist) {
                            mask.mark(row, col, &mut clipped);
                        }
                    }
                }
            }
            IgnitionSpec::ExplicitPoints { points, scale } => {
                for p in points {
                    mask.mark(scale.to_cell(p.y), scale.to_cell(p.x), &mut clipped);
                    if let Some((ex, ey, _)) = p.end {
                        mask.mark(scale.to_cell(ey), scale.to_cell(ex), &mut clipped);
                    }
                }
            }
            IgnitionSpec::SparseCellFile { path } => {
                for (row, col) in read_selected_cells(path)? {
                    mask.mark(row, col, &mut clipped);
                }
            }
        }

        if clipped > 0 {
            warn!(clipped, "ignition cells outside grid bounds were clipped");
        }
        mask.finalize(grid.cell_area());
        Ok(mask)
    }
}

/// Cell span of a ring's outer rectangle along one axis, 0-based and
/// end-exclusive. When the physical origin falls exactly on a cell edge
/// the start shifts by one so adjacent strips don't double-count the
/// shared cell.
fn ring_span(origin: f32, length: f32, spacing: f32) -> (isize, isize) {
    let mut start = (origin / spacing).ceil() as isize;
    if origin % spacing == 0.0 {
        start += 1;
    }
    let end = ((origin + length) / spacing).ceil() as isize;
    (start - 1, end - 1)
}

/// Horizontal cells from a binary selected-cell file.
///
/// Records are five consecutive `i32`s; fields 2 and 1 hold the 1-based
/// row and column (field 3 is the layer, irrelevant to the horizontal
/// mask; fields 0 and 4 are bookkeeping).
fn read_selected_cells(path: &Path) -> Result<Vec<(isize, isize)>> {
    const RECORD_BYTES: u64 = 5 * 4;
    let file = File::open(path).map_err(|e| PostError::io(path, e))?;
    let file_len = file.metadata().map_err(|e| PostError::io(path, e))?.len();
    if file_len % RECORD_BYTES != 0 {
        let expected = file_len / RECORD_BYTES * RECORD_BYTES;
        return Err(PostError::shape(path, expected, file_len, "bytes"));
    }
    let count = (file_len / RECORD_BYTES) as usize;
    let mut reader = BufReader::new(file);
    let words = raw::read_i32_vec(&mut reader, count * 5, path)?;
    Ok(words
        .chunks_exact(5)
        .map(|rec| (rec[2] as isize - 1, rec[1] as isize - 1))
        .collect())
}

/// Parse an explicit ignition point file.
///
/// The first line carries a format flag: format 4 rows are integer
/// `(x, y, time)` in grid-cell units; format 5 rows are float
/// `(x0, y0, x1, y1, t0, t1)` strips in half-cell units. Five header
/// lines follow the flag line before data rows.
pub fn read_point_file(path: &Path) -> Result<(Vec<IgnitionPoint>, CoordinateScale)> {
    let file = File::open(path).map_err(|e| PostError::io(path, e))?;
    let mut lines = BufReader::new(file).lines();
    let next_line = |n: &mut std::io::Lines<BufReader<File>>| -> Result<String> {
        n.next()
            .ok_or_else(|| PostError::config(path, "unexpected end of file"))?
            .map_err(|e| PostError::io(path, e))
    };

    let flag_line = next_line(&mut lines)?;
    let flag = flag_line
        .split_whitespace()
        .find_map(|t| t.parse::<i64>().ok())
        .ok_or_else(|| PostError::config(path, "missing format flag on first line"))?;
    let (scale, min_fields) = match flag {
        4 => (CoordinateScale::Cells, 3),
        5 => (CoordinateScale::HalfCells, 6),
        other => {
            return Err(PostError::config(
                path,
                format!("unsupported ignition point format {other}"),
            ))
        }
    };
    for _ in 0..5 {
        next_line(&mut lines)?;
    }

    let mut points = Vec::new();
    for line in lines {
        let line = line.map_err(|e| PostError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<f32> = line
            .split_whitespace()
            .filter_map(|t| t.parse::<f32>().ok())
            .collect();
        if fields.len() < min_fields {
            return Err(PostError::config(
                path,
                format!("ignition row has {} fields, need {min_fields}", fields.len()),
            ));
        }
        points.push(match scale {
            CoordinateScale::Cells => IgnitionPoint {
                x: fields[0],
                y: fields[1],
                time: fields[2],
                end: None,
            },
            CoordinateScale::HalfCells => IgnitionPoint {
                x: fields[0],
                y: fields[1],
                time: fields[4],
                end: Some((fields[2], fields[3], fields[5])),
            },
        });
    }
    Ok((points, scale))
}

/// One spatial cluster of ignition points with its first and last
/// timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IgnitionCluster {
    /// Point carrying the cluster's earliest timestamp.
    pub start: IgnitionPoint,
    /// Point carrying the cluster's latest timestamp (the strip end for
    /// formats that record one).
    pub end: IgnitionPoint,
    /// Number of points grouped into the cluster.
    pub count: usize,
}

/// Group ignition points into labeled spatial clusters.
///
/// Points sharing an x-band of `2 × x_tolerance` units belong to one
/// cluster; each cluster is labeled with the points carrying its earliest
/// and latest timestamps. Points that record an explicit end form one
/// cluster per strip. Cluster order follows first appearance in the
/// input.
pub fn cluster_points(points: &[IgnitionPoint], x_tolerance: f32) -> Vec<IgnitionCluster> {
    let mut clusters: Vec<IgnitionCluster> = Vec::new();
    let mut by_band: FxHashMap<i64, usize> = FxHashMap::default();
    let band_width = (2.0 * x_tolerance).max(1.0);

    for &p in points {
        if let Some((ex, ey, et)) = p.end {
            clusters.push(IgnitionCluster {
                start: p,
                end: IgnitionPoint {
                    x: ex,
                    y: ey,
                    time: et,
                    end: None,
                },
                count: 1,
            });
            continue;
        }
        let band = (p.x / band_width).floor() as i64;
        match by_band.get(&band) {
            Some(&slot) => {
                let cluster = &mut clusters[slot];
                cluster.count += 1;
                if p.time < cluster.start.time {
                    cluster.start = p;
                }
                if p.time > cluster.end.time {
                    cluster.end = p;
                }
            }
            None => {
                by_band.insert(band, clusters.len());
                clusters.push(IgnitionCluster {
                    start: p,
                    end: p,
                    count: 1,
                });
            }
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridShape;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn grid(nx: usize, ny: usize, dx: f32, dy: f32) -> FireGrid {
        FireGrid::uniform(GridShape { nx, ny, nz: 1 }, dx, dy, 1.0)
    }

    #[test]
    fn test_line_covers_requested_footprint() {
        let g = grid(10, 10, 2.0, 2.0);
        // 3m..9m in x covers cells 1..5 after floor/ceil, 2 rows in y
        let spec = IgnitionSpec::Line {
            x0: 3.0,
            y0: 0.0,
            len_x: 6.0,
            len_y: 4.0,
        };
        let mask = spec.rasterize(&g).unwrap();
        assert!(mask.is_marked(0, 1) && mask.is_marked(1, 4));
        assert!(!mask.is_marked(0, 0) && !mask.is_marked(2, 2));
        assert_eq!(mask.marked_count(), 4 * 2);
        let b = mask.bounds().unwrap();
        assert_eq!((b.x_min, b.x_max, b.y_min, b.y_max), (1, 5, 0, 2));
        // rasterized footprint is never smaller than requested
        assert!((b.x_max - b.x_min) as f32 * g.dx >= 6.0);
    }

    #[test]
    fn test_area_identity() {
        let g = grid(10, 10, 2.0, 3.0);
        let spec = IgnitionSpec::Line {
            x0: 0.0,
            y0: 0.0,
            len_x: 4.0,
            len_y: 3.0,
        };
        let mask = spec.rasterize(&g).unwrap();
        assert_relative_eq!(mask.area(), mask.marked_count() as f32 * 2.0 * 3.0);
    }

    #[test]
    fn test_out_of_grid_geometry_is_clipped_not_fatal() {
        let g = grid(4, 4, 1.0, 1.0);
        let spec = IgnitionSpec::Line {
            x0: 2.0,
            y0: 2.0,
            len_x: 10.0,
            len_y: 10.0,
        };
        let mask = spec.rasterize(&g).unwrap();
        assert_eq!(mask.marked_count(), 4); // 2x2 corner survives
        assert_eq!(mask.bounds().unwrap().x_max, 4);
    }

    #[test]
    fn test_square_ring_stays_inside_outer_rectangle() {
        let g = grid(20, 20, 1.0, 1.0);
        let spec = IgnitionSpec::SquareRing {
            x0: 2.0,
            y0: 2.0,
            len_x: 10.0,
            len_y: 10.0,
            width_x: 2.0,
            width_y: 2.0,
        };
        let mask = spec.rasterize(&g).unwrap();
        assert!(mask.marked_count() > 0);
        let b = mask.bounds().unwrap();
        assert!(b.x_min >= 2 && b.x_max <= 12);
        assert!(b.y_min >= 2 && b.y_max <= 12);
        // interior of the ring stays unmarked
        assert!(!mask.is_marked(7, 7));
    }

    #[test]
    fn test_circle_ring_band_only() {
        let g = grid(30, 30, 1.0, 1.0);
        let spec = IgnitionSpec::Circle {
            x0: 5.0,
            y0: 5.0,
            diameter: 16.0,
            ring_width: 2.0,
        };
        let mask = spec.rasterize(&g).unwrap();
        assert!(mask.marked_count() > 0);
        let b = mask.bounds().unwrap();
        assert!(b.x_min >= 5 && b.x_max <= 21);
        assert!(b.y_min >= 5 && b.y_max <= 21);
        // center of the circle is far inside the ring band
        assert!(!mask.is_marked(13, 13));
    }

    #[test]
    fn test_explicit_points_half_cell_scale() {
        let g = grid(10, 10, 1.0, 1.0);
        let spec = IgnitionSpec::ExplicitPoints {
            points: vec![IgnitionPoint {
                x: 6.0,
                y: 4.0,
                time: 0.0,
                end: Some((10.0, 8.0, 30.0)),
            }],
            scale: CoordinateScale::HalfCells,
        };
        let mask = spec.rasterize(&g).unwrap();
        assert!(mask.is_marked(2, 3)); // (4/2, 6/2)
        assert!(mask.is_marked(4, 5)); // (8/2, 10/2)
        assert_eq!(mask.marked_count(), 2);
    }

    #[test]
    fn test_sparse_cell_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ignite_selected.dat");
        let mut bytes = Vec::new();
        // two records: (seq, col, row, layer, state), 1-based
        for rec in [[1_i32, 3, 2, 1, 0], [2, 4, 5, 1, 0]] {
            for w in rec {
                bytes.extend_from_slice(&w.to_le_bytes());
            }
        }
        File::create(&path).unwrap().write_all(&bytes).unwrap();

        let g = grid(8, 8, 1.0, 1.0);
        let mask = IgnitionSpec::SparseCellFile { path }.rasterize(&g).unwrap();
        assert!(mask.is_marked(1, 2));
        assert!(mask.is_marked(4, 3));
        assert_eq!(mask.marked_count(), 2);
    }

    #[test]
    fn test_point_file_format_four() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ignite.dat");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "igniteType = 4").unwrap();
        for _ in 0..5 {
            writeln!(f, "! header").unwrap();
        }
        writeln!(f, "10 20 0").unwrap();
        writeln!(f, "11 20 5").unwrap();
        drop(f);

        let (points, scale) = read_point_file(&path).unwrap();
        assert_eq!(scale, CoordinateScale::Cells);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].x, 11.0);
        assert_eq!(points[1].time, 5.0);
        assert!(points[1].end.is_none());
    }

    #[test]
    fn test_cluster_grouping_by_x_band() {
        let mk = |x: f32, t: f32| IgnitionPoint {
            x,
            y: 1.0,
            time: t,
            end: None,
        };
        // two bands: x near 10 and x near 200
        let points = vec![mk(10.0, 5.0), mk(12.0, 0.0), mk(200.0, 3.0), mk(11.0, 9.0)];
        let clusters = cluster_points(&points, 24.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 3);
        assert_eq!(clusters[0].start.time, 0.0);
        assert_eq!(clusters[0].end.time, 9.0);
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn test_strip_points_form_one_cluster_each() {
        let p = IgnitionPoint {
            x: 4.0,
            y: 4.0,
            time: 0.0,
            end: Some((8.0, 8.0, 60.0)),
        };
        let clusters = cluster_points(&[p, p], 24.0);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].end.time, 60.0);
    }
}
