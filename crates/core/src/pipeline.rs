//! Post-processing orchestration.
//!
//! [`run`] walks a run directory end to end: parse the declarative
//! inputs, load the sparse index and vertical grid, rasterize the
//! ignition zone, resample the wind record, and produce the optional
//! analytics products. Every optional product is controlled by
//! [`PipelineOptions`]; a requested product whose prerequisite output
//! was disabled in the run is an error, never a silent skip.

use std::path::Path;

use tracing::info;

use crate::config::{
    read_fire_inputs, read_sim_params, read_wind_samples, OutputFlags, PipelineOptions,
};
use crate::decode::SnapshotDecoder;
use crate::energy::aggregate_max_power;
use crate::error::{PostError, Result};
use crate::field::DenseField;
use crate::grid::{FireGrid, TimeBase};
use crate::ignition::IgnitionMask;
use crate::index::{GridIndex, VerticalGrid};
use crate::spread::{analyze, SpreadSummary};
use crate::wind::{resample, WindStep};

/// Everything one pipeline invocation produces.
#[derive(Debug)]
pub struct PipelineOutputs {
    pub fire_grid: FireGrid,
    pub fire_times: TimeBase,
    /// Air-flow vertical grid (face and center heights)
    pub qu_vertical: VerticalGrid,
    pub ignition: IgnitionMask,
    /// Wind state per fire print step
    pub wind: Vec<WindStep>,
    pub flags: OutputFlags,
    /// Rate-of-spread and burned-area series; `None` when not requested
    pub spread: Option<SpreadSummary>,
    /// Peak block-averaged surface power; `None` when not requested
    pub max_power: Option<DenseField>,
}

/// File name template of the fuel-density snapshot series.
const FUEL_DENSITY_TEMPLATE: &str = "fuels-dens-";

/// Run the full post-processing pipeline over a run directory.
pub fn run(root: &Path, options: &PipelineOptions) -> Result<PipelineOutputs> {
    let qu = read_sim_params(root)?;
    let qf = read_fire_inputs(root, &qu)?;
    info!(
        nx = qf.grid.shape.nx,
        ny = qf.grid.shape.ny,
        nz = qf.grid.shape.nz,
        sim_time = qf.fire_times.sim_time,
        "parsed run inputs"
    );

    let index = GridIndex::from_file(&qf.output_dir.join("fire_indexes.bin"), qf.grid.shape)?;
    let qu_vertical =
        VerticalGrid::from_file(&qf.output_dir.join("z_qu.bin"), qu.grid.shape.nz)?;
    info!(active_cells = index.num_cells(), "loaded sparse cell index");

    let ignition = qf.ignition.rasterize(&qf.grid)?;
    info!(
        cells = ignition.marked_count(),
        area_m2 = ignition.area(),
        "rasterized ignition zone"
    );

    let samples = read_wind_samples(root, qu.num_wind_inputs)?;
    let wind = resample(&samples, qf.fire_times.times());

    let spread = if options.compute_spread {
        Some(compute_spread(&qf.grid, &qf.fire_times, &qf.flags, &qf.output_dir, &index, &ignition, &wind, options)?)
    } else {
        info!("spread analytics not requested; skipping");
        None
    };

    let max_power = if options.aggregate_max_power {
        Some(aggregate_max_power(
            &qf.output_dir,
            qf.grid.shape.nx,
            qf.grid.shape.ny,
            qf.fire_times.sim_time,
        )?)
    } else {
        info!("peak-power aggregation not requested; skipping");
        None
    };

    Ok(PipelineOutputs {
        fire_grid: qf.grid,
        fire_times: qf.fire_times,
        qu_vertical,
        ignition,
        wind,
        flags: qf.flags,
        spread,
        max_power,
    })
}

#[allow(clippy::too_many_arguments)]
fn compute_spread(
    grid: &FireGrid,
    fire_times: &TimeBase,
    flags: &OutputFlags,
    output_dir: &Path,
    index: &GridIndex,
    ignition: &IgnitionMask,
    wind: &[WindStep],
    options: &PipelineOptions,
) -> Result<SpreadSummary> {
    if !flags.fuel_density {
        return Err(PostError::config(
            output_dir,
            "spread analytics requested but the run wrote no fuel-density output",
        ));
    }
    let decoder = SnapshotDecoder::sparse(output_dir, FUEL_DENSITY_TEMPLATE, grid.shape, index)
        .surface_only(options.surface_only);
    let fuel = decoder.decode_series_par(fire_times.times())?;
    let summary = analyze(grid, fire_times.times(), &fuel, ignition, wind);
    info!(
        direction = %summary.direction,
        steps = summary.records.len(),
        "derived spread series"
    );
    Ok(summary)
}
