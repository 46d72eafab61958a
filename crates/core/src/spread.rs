//! Rate-of-spread and cumulative burned-area analytics.
//!
//! Successive fuel-density snapshots are compared against the initial
//! state: a surface cell counts as burned once its fuel has strictly
//! decreased. The fire front is tracked along a single downwind axis
//! chosen from the run's mean wind direction; the frontier coordinate
//! only ever advances (retreat is impossible in this model and clamps to
//! a stationary front). The burned-area series subtracts the ignition
//! footprint so it measures newly burned area.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::field::DenseField;
use crate::grid::FireGrid;
use crate::ignition::IgnitionMask;
use crate::wind::{run_mean_direction, WindStep};

/// Ignition zones smaller than this (m²) have no meaningful downwind
/// edge; spread direction is reported as undetermined.
const MIN_IGNITION_AREA: f32 = 0.5;

/// Per-window bearings further than this from the run mean trigger a
/// variability warning (the downwind bucket is fixed for the whole run).
const DIRECTION_DRIFT_WARN_DEG: f32 = 45.0;

/// Downwind edge the fire front is tracked toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadDirection {
    /// Wind from the east quadrant; spread toward decreasing x.
    Western,
    /// Wind from the south quadrant; spread toward increasing y.
    Northern,
    /// Wind from the west quadrant; spread toward increasing x.
    Eastern,
    /// Wind from the north quadrant; spread toward decreasing y.
    Southern,
    /// Degenerate ignition geometry; no rate of spread available.
    Undetermined,
}

impl std::fmt::Display for SpreadDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SpreadDirection::Western => "Western",
            SpreadDirection::Northern => "Northern",
            SpreadDirection::Eastern => "Eastern",
            SpreadDirection::Southern => "Southern",
            SpreadDirection::Undetermined => "Undetermined",
        };
        f.write_str(label)
    }
}

/// One post-ignition print step of the spread series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadRecord {
    /// Snapshot time (s)
    pub time: u32,
    /// Downwind front displacement per second (m/s), ≥ 0
    pub rate_of_spread: f32,
    /// Newly burned area since ignition (m²), non-decreasing
    pub cumulative_burned_area: f32,
}

/// Spread series for a whole run, with the resolved downwind direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadSummary {
    pub direction: SpreadDirection,
    pub records: Vec<SpreadRecord>,
}

/// Quadrant bucket for a mean wind bearing (degrees, wind *from*).
fn bucket_direction(mean_dir: f32) -> SpreadDirection {
    if mean_dir > 45.0 && mean_dir <= 135.0 {
        SpreadDirection::Western
    } else if mean_dir > 135.0 && mean_dir <= 225.0 {
        SpreadDirection::Northern
    } else if mean_dir > 225.0 && mean_dir <= 315.0 {
        SpreadDirection::Eastern
    } else {
        SpreadDirection::Southern
    }
}

/// Smallest absolute angular difference between two bearings (degrees).
fn bearing_distance(a: f32, b: f32) -> f32 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

/// Extremes of the burned cell set for one step.
#[derive(Debug, Clone, Copy)]
struct BurnExtent {
    count: usize,
    min_row: usize,
    max_row: usize,
    min_col: usize,
    max_col: usize,
}

fn burned_extent(initial: &DenseField, current: &DenseField) -> Option<BurnExtent> {
    let shape = initial.shape();
    let mut extent: Option<BurnExtent> = None;
    for row in 0..shape.ny {
        for col in 0..shape.nx {
            // one-directional: a cell burns only when fuel strictly drops
            if initial.surface_value(row, col) - current.surface_value(row, col) <= 0.0 {
                continue;
            }
            extent = Some(match extent {
                None => BurnExtent {
                    count: 1,
                    min_row: row,
                    max_row: row,
                    min_col: col,
                    max_col: col,
                },
                Some(e) => BurnExtent {
                    count: e.count + 1,
                    min_row: e.min_row.min(row),
                    max_row: e.max_row.max(row),
                    min_col: e.min_col.min(col),
                    max_col: e.max_col.max(col),
                },
            });
        }
    }
    extent
}

/// Derive the ROS / burned-area series from a fuel-density sequence.
///
/// `fuel` must hold one snapshot per entry of `fire_times`, in time
/// order, with the initial state first. The frontier coordinate is a
/// fold over steps 1.. and is inherently sequential.
#[must_use]
pub fn analyze(
    grid: &FireGrid,
    fire_times: &[u32],
    fuel: &[DenseField],
    ignition: &IgnitionMask,
    wind: &[WindStep],
) -> SpreadSummary {
    let dt_print = match fire_times.windows(2).next() {
        Some(pair) => (pair[1] - pair[0]) as f32,
        None => 1.0,
    };

    let mean_dir = run_mean_direction(wind);
    let direction = if ignition.area() < MIN_IGNITION_AREA || ignition.bounds().is_none() {
        SpreadDirection::Undetermined
    } else {
        bucket_direction(mean_dir)
    };

    if direction != SpreadDirection::Undetermined {
        let max_drift = wind
            .iter()
            .map(|s| bearing_distance(s.direction, mean_dir))
            .fold(0.0_f32, f32::max);
        if max_drift > DIRECTION_DRIFT_WARN_DEG {
            warn!(
                mean_direction = mean_dir,
                max_drift,
                "wind direction varies substantially; downwind bucket is fixed to the run mean"
            );
        }
    }

    // Frontier seed: the ignition bounding edge on the downwind side.
    // Upper bounds are exclusive, mirroring the rasterizer's spans.
    let mut frontier: isize = match (direction, ignition.bounds()) {
        (SpreadDirection::Western, Some(b)) => b.x_min as isize,
        (SpreadDirection::Northern, Some(b)) => b.y_max as isize,
        (SpreadDirection::Eastern, Some(b)) => b.x_max as isize,
        (SpreadDirection::Southern, Some(b)) => b.y_min as isize,
        _ => 0,
    };

    let mut records = Vec::with_capacity(fuel.len().saturating_sub(1));
    for (i, current) in fuel.iter().enumerate().skip(1) {
        let extent = burned_extent(&fuel[0], current);
        let burned_count = extent.map_or(0, |e| e.count);
        let cumulative_burned_area = burned_count as f32 * grid.cell_area() - ignition.area();

        let rate_of_spread = match (direction, extent) {
            (SpreadDirection::Undetermined, _) | (_, None) => 0.0,
            (SpreadDirection::Western, Some(e)) => {
                advance(&mut frontier, e.min_col as isize, false, grid.dx, dt_print)
            }
            (SpreadDirection::Northern, Some(e)) => {
                advance(&mut frontier, e.max_row as isize, true, grid.dy, dt_print)
            }
            (SpreadDirection::Eastern, Some(e)) => {
                advance(&mut frontier, e.max_col as isize, true, grid.dx, dt_print)
            }
            (SpreadDirection::Southern, Some(e)) => {
                advance(&mut frontier, e.min_row as isize, false, grid.dy, dt_print)
            }
        };

        records.push(SpreadRecord {
            time: fire_times.get(i).copied().unwrap_or(0),
            rate_of_spread,
            cumulative_burned_area,
        });
    }

    SpreadSummary { direction, records }
}

/// Fold step for the frontier coordinate: returns the ROS if the extreme
/// burned cell moved past the frontier in the downwind sense, else 0.
/// The frontier never regresses.
fn advance(
    frontier: &mut isize,
    extreme: isize,
    increasing: bool,
    spacing: f32,
    dt_print: f32,
) -> f32 {
    let moved = if increasing {
        extreme > *frontier
    } else {
        extreme < *frontier
    };
    if moved {
        let distance = (*frontier - extreme).abs() as f32 * spacing;
        *frontier = extreme;
        distance / dt_print
    } else {
        0.0
    }
}
