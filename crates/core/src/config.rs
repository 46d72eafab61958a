//! Declarative run-input parsing.
//!
//! A run directory carries three text inputs: `QU_simparams.inp` (the
//! air-flow grid), `QUIC_fire.inp` (times, fire grid, ignition geometry
//! and output flags) and `QU_metparams.inp` (the wind-sensor file name).
//! The format is line-oriented: each meaningful line holds one numeric
//! value followed by a free-text comment, and block layout is fixed, so
//! parsing walks the lines in order and plucks the leading numeric
//! tokens. Unparseable tokens within a line are ignored; a line with no
//! parseable token where one is required is a fatal config error.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PostError, Result};
use crate::grid::{FireGrid, GridShape, TimeBase};
use crate::ignition::{read_point_file, IgnitionSpec};
use crate::wind::WindSample;

/// Line-oriented numeric token scanner over one input file.
struct InputLines {
    lines: Lines<BufReader<File>>,
    path: PathBuf,
    line_no: usize,
}

impl InputLines {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PostError::io(path, e))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            path: path.to_path_buf(),
            line_no: 0,
        })
    }

    fn raw_line(&mut self) -> Result<String> {
        self.line_no += 1;
        match self.lines.next() {
            Some(line) => line.map_err(|e| PostError::io(&self.path, e)),
            None => Err(PostError::config(
                &self.path,
                format!("unexpected end of file at line {}", self.line_no),
            )),
        }
    }

    fn skip_lines(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.raw_line()?;
        }
        Ok(())
    }

    /// First integer-parseable token on the next line.
    fn next_int(&mut self) -> Result<i64> {
        let line = self.raw_line()?;
        line.split_whitespace()
            .find_map(|t| t.parse::<i64>().ok())
            .ok_or_else(|| {
                PostError::config(
                    &self.path,
                    format!("line {}: expected an integer, got {line:?}", self.line_no),
                )
            })
    }

    fn next_unsigned(&mut self) -> Result<u32> {
        let value = self.next_int()?;
        u32::try_from(value).map_err(|_| {
            PostError::config(
                &self.path,
                format!("line {}: expected a non-negative value, got {value}", self.line_no),
            )
        })
    }

    /// First float-parseable token on the next line.
    fn next_float(&mut self) -> Result<f32> {
        let line = self.raw_line()?;
        line.split_whitespace()
            .find_map(|t| t.parse::<f32>().ok())
            .ok_or_else(|| {
                PostError::config(
                    &self.path,
                    format!("line {}: expected a number, got {line:?}", self.line_no),
                )
            })
    }

    /// First three float-parseable tokens on the next line.
    fn next_floats3(&mut self) -> Result<[f32; 3]> {
        let line = self.raw_line()?;
        let mut out = [0.0_f32; 3];
        let mut found = 0;
        for t in line.split_whitespace() {
            if let Ok(v) = t.parse::<f32>() {
                out[found] = v;
                found += 1;
                if found == 3 {
                    return Ok(out);
                }
            }
        }
        Err(PostError::config(
            &self.path,
            format!(
                "line {}: expected three numbers, found {found} in {line:?}",
                self.line_no
            ),
        ))
    }

    fn next_bool_flag(&mut self) -> Result<bool> {
        Ok(self.next_int()? == 1)
    }
}

/// Air-flow model parameters from `QU_simparams.inp`.
#[derive(Debug, Clone)]
pub struct SimParams {
    /// Air-flow grid geometry
    pub grid: FireGrid,
    /// Number of wind-sensor observations the run was driven with
    pub num_wind_inputs: usize,
}

/// Parse `QU_simparams.inp` under `root`.
pub fn read_sim_params(root: &Path) -> Result<SimParams> {
    let path = root.join("QU_simparams.inp");
    let mut input = InputLines::open(&path)?;

    input.skip_lines(1)?; // file header
    let nx = input.next_unsigned()? as usize;
    let ny = input.next_unsigned()? as usize;
    let nz = input.next_unsigned()? as usize;
    let dx = input.next_float()?;
    let dy = input.next_float()?;

    // 0 selects a uniform vertical spacing; anything else a per-layer
    // profile behind three descriptive lines.
    let dz = if input.next_int()? == 0 {
        vec![input.next_float()?; nz]
    } else {
        input.skip_lines(3)?;
        let mut profile = Vec::with_capacity(nz);
        for _ in 0..nz {
            profile.push(input.next_float()?);
        }
        profile
    };
    let num_wind_inputs = input.next_unsigned()? as usize;

    let grid = FireGrid::new(GridShape { nx, ny, nz }, dx, dy, dz);
    debug!(nx, ny, nz, "parsed air-flow grid");
    Ok(SimParams {
        grid,
        num_wind_inputs,
    })
}

/// Which output variables the run was configured to write.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutputFlags {
    pub firebrands: bool,
    pub energy_to_atmosphere: bool,
    pub reaction_rate: bool,
    pub fuel_density: bool,
    pub fire_winds: bool,
    pub qu_winds_instant: bool,
    pub qu_winds_averaged: bool,
    pub moisture: bool,
    pub percent_mass_burnt: bool,
    pub emissions: bool,
    pub thermal_radiation: bool,
}

/// Everything `QUIC_fire.inp` declares about a run.
#[derive(Debug, Clone)]
pub struct FireInputs {
    /// Fire-model grid geometry (a refinement of the air-flow grid)
    pub grid: FireGrid,
    /// Fire-variable print time base
    pub fire_times: TimeBase,
    /// Air-flow-variable print time base
    pub qu_times: TimeBase,
    /// Coarser base for time-averaged fire variables
    pub fire_times_averaged: TimeBase,
    /// Coarser base for time-averaged air-flow variables
    pub qu_times_averaged: TimeBase,
    /// Directory the model wrote its binary outputs to
    pub output_dir: PathBuf,
    pub ignition: IgnitionSpec,
    pub flags: OutputFlags,
}

/// Parse `QUIC_fire.inp` under `root` against the air-flow grid.
///
/// A run whose fire stage is disabled carries no fire grid, ignition or
/// output block, leaving nothing to post-process; that is a config
/// error here rather than a silently empty result.
pub fn read_fire_inputs(root: &Path, qu: &SimParams) -> Result<FireInputs> {
    let path = root.join("QUIC_fire.inp");
    let mut input = InputLines::open(&path)?;

    // --- times block
    let fire_enabled = input.next_bool_flag()?;
    if !fire_enabled {
        return Err(PostError::config(&path, "fire stage is disabled in this run"));
    }
    input.skip_lines(3)?;
    let sim_time = input.next_unsigned()?;
    let fire_dt = input.next_unsigned()?;
    let qu_dt = input.next_unsigned()? * fire_dt;
    let fire_dt_print = input.next_unsigned()? * fire_dt;
    let qu_dt_print = input.next_unsigned()? * qu_dt;
    let fire_dt_print_ave = input.next_unsigned()? * fire_dt;
    let qu_dt_print_ave = input.next_unsigned()? * qu_dt;
    if fire_dt == 0
        || qu_dt == 0
        || fire_dt_print == 0
        || qu_dt_print == 0
        || fire_dt_print_ave == 0
        || qu_dt_print_ave == 0
    {
        return Err(PostError::config(&path, "time step or print interval is zero"));
    }

    // --- fire grid block
    input.skip_lines(1)?;
    let nz = input.next_unsigned()? as usize;
    let ratio_x = input.next_unsigned()? as usize;
    let ratio_y = input.next_unsigned()? as usize;
    if ratio_x == 0 || ratio_y == 0 {
        return Err(PostError::config(&path, "fire grid refinement ratio is zero"));
    }
    let shape = GridShape {
        nx: qu.grid.shape.nx * ratio_x,
        ny: qu.grid.shape.ny * ratio_y,
        nz,
    };
    let dx = qu.grid.dx / ratio_x as f32;
    let dy = qu.grid.dy / ratio_y as f32;
    let dz = if input.next_int()? == 0 {
        vec![input.next_float()?; nz]
    } else {
        let mut profile = Vec::with_capacity(nz);
        for _ in 0..nz {
            profile.push(input.next_float()?);
        }
        profile
    };
    let grid = FireGrid::new(shape, dx, dy, dz);

    // --- output path block
    input.skip_lines(1)?;
    let raw_path = input.raw_line()?;
    let output_dir = root.join(raw_path.trim().trim_matches('"'));

    // --- fuel block: flags select how many detail lines follow
    input.skip_lines(3)?;
    let density_from_file = input.next_bool_flag()?;
    if density_from_file {
        input.skip_lines(1)?;
    }
    if input.next_bool_flag()? {
        input.skip_lines(1)?; // moisture detail
    }
    if density_from_file {
        input.skip_lines(2)?; // fuel height detail
    }

    // --- ignition block
    input.skip_lines(1)?;
    let ignition = read_ignition_geometry(&mut input, root, &path)?;

    // --- output-flag block
    input.skip_lines(1)?;
    let firebrands = input.next_bool_flag()?;
    input.skip_lines(1)?;
    let flags = OutputFlags {
        firebrands,
        energy_to_atmosphere: input.next_bool_flag()?,
        reaction_rate: input.next_bool_flag()?,
        fuel_density: input.next_bool_flag()?,
        fire_winds: input.next_bool_flag()?,
        qu_winds_instant: input.next_bool_flag()?,
        qu_winds_averaged: {
            let v = input.next_bool_flag()?;
            input.skip_lines(1)?;
            v
        },
        moisture: input.next_bool_flag()?,
        percent_mass_burnt: {
            let v = input.next_bool_flag()?;
            input.skip_lines(1)?;
            v
        },
        emissions: input.next_bool_flag()?,
        thermal_radiation: input.next_bool_flag()?,
    };

    debug!(
        sim_time,
        fire_dt_print,
        nx = shape.nx,
        ny = shape.ny,
        nz = shape.nz,
        "parsed fire inputs"
    );
    Ok(FireInputs {
        grid,
        fire_times: TimeBase::new(sim_time, fire_dt_print),
        qu_times: TimeBase::new(sim_time, qu_dt_print),
        fire_times_averaged: TimeBase::new(sim_time, fire_dt_print_ave),
        qu_times_averaged: TimeBase::new(sim_time, qu_dt_print_ave),
        output_dir,
        ignition,
        flags,
    })
}

/// Decode one ignition geometry selection.
///
/// Flags 1-3 carry their parameters inline, one value per line, plus one
/// trailing detail line. Flags 4 and 5 point at the explicit point files
/// and carry nothing inline. Flag 6 selects the binary cell list.
fn read_ignition_geometry(
    input: &mut InputLines,
    root: &Path,
    path: &Path,
) -> Result<IgnitionSpec> {
    let flag = input.next_int()?;
    let spec = match flag {
        1 => {
            let spec = IgnitionSpec::Line {
                x0: input.next_float()?,
                y0: input.next_float()?,
                len_x: input.next_float()?,
                len_y: input.next_float()?,
            };
            input.skip_lines(1)?;
            spec
        }
        2 => {
            let spec = IgnitionSpec::SquareRing {
                x0: input.next_float()?,
                y0: input.next_float()?,
                len_x: input.next_float()?,
                len_y: input.next_float()?,
                width_x: input.next_float()?,
                width_y: input.next_float()?,
            };
            input.skip_lines(1)?;
            spec
        }
        3 => {
            let spec = IgnitionSpec::Circle {
                x0: input.next_float()?,
                y0: input.next_float()?,
                diameter: input.next_float()?,
                ring_width: input.next_float()?,
            };
            input.skip_lines(1)?;
            spec
        }
        4 | 5 => {
            let file = if flag == 4 {
                "QF_Ignitions.inp"
            } else {
                "QF_IgnitionPattern.inp"
            };
            let (points, scale) = read_point_file(&root.join(file))?;
            IgnitionSpec::ExplicitPoints { points, scale }
        }
        6 => {
            let spec = IgnitionSpec::SparseCellFile {
                path: root.join("ignite_selected.dat"),
            };
            input.skip_lines(1)?;
            spec
        }
        other => {
            return Err(PostError::config(
                path,
                format!("unsupported ignition flag {other}"),
            ))
        }
    };
    Ok(spec)
}

/// Wind-sensor file name from `QU_metparams.inp` (six header lines, then
/// the name terminated by an inline comment).
pub fn read_sensor_name(root: &Path) -> Result<String> {
    let path = root.join("QU_metparams.inp");
    let mut input = InputLines::open(&path)?;
    input.skip_lines(6)?;
    let line = input.raw_line()?;
    let name = line.split('!').next().unwrap_or("").trim();
    if name.is_empty() {
        return Err(PostError::config(&path, "sensor file name is empty"));
    }
    Ok(name.to_string())
}

/// Read the run's wind observations from its sensor file.
///
/// Each observation spans six lines: the timestamp, four descriptive
/// lines, then a data row whose second and third numeric fields are the
/// speed and bearing.
pub fn read_wind_samples(root: &Path, num_inputs: usize) -> Result<Vec<WindSample>> {
    let sensor_name = read_sensor_name(root)?;
    let path = root.join(&sensor_name);
    let mut input = InputLines::open(&path)?;
    input.skip_lines(6)?;

    let mut samples = Vec::with_capacity(num_inputs);
    for _ in 0..num_inputs {
        let time = input.next_unsigned()?;
        input.skip_lines(4)?;
        let row = input.next_floats3()?;
        samples.push(WindSample {
            time,
            speed: row[1],
            direction: row[2],
        });
    }
    Ok(samples)
}

/// Which optional post-processing products to compute.
///
/// Every product is an explicit opt-in; nothing is silently skipped or
/// implicitly enabled by the presence of files on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Derive the rate-of-spread and burned-area series.
    pub compute_spread: bool,
    /// Aggregate per-second surface energy into a peak-power field.
    pub aggregate_max_power: bool,
    /// Keep only the ground layer of decoded fuel snapshots.
    pub surface_only: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            compute_spread: true,
            aggregate_max_power: false,
            surface_only: true,
        }
    }
}
