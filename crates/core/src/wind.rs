//! Wind-sensor resampling onto the fire-model time base.
//!
//! Sensors report `(time, speed, direction)` at arbitrary irregular
//! cadence; analytics and overlays need one value per fire print step.
//! The resampler expands the samples onto a one-second step timeline
//! (most recent sample wins), holds the last observation to the end of
//! the run if the sensor stops early, truncates data past run end, and
//! then averages each print interval. Compass bearings get a wraparound
//! correction so that a window straddling due north averages near 0°
//! instead of 180°.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One raw sensor observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindSample {
    /// Sensor timestamp (s); strictly increasing across a file.
    pub time: u32,
    /// Wind speed (m/s)
    pub speed: f32,
    /// Bearing the wind blows from (degrees, `[0, 360)`)
    pub direction: f32,
}

/// Resampled wind state for one fire print step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WindStep {
    pub speed: f32,
    pub direction: f32,
}

/// Resample sensor observations onto the fire print-interval grid.
///
/// Output length always equals `fire_times.len()`: entry 0 is the state
/// at time zero, entry `i` the mean over `[t_{i-1}, t_i)`.
#[must_use]
pub fn resample(samples: &[WindSample], fire_times: &[u32]) -> Vec<WindStep> {
    let Some(&run_end) = fire_times.last() else {
        return Vec::new();
    };
    if samples.is_empty() {
        warn!("no wind samples supplied; resampled series is zero");
        return vec![WindStep::default(); fire_times.len()];
    }

    let speed_per_sec = expand_per_second(samples, run_end, |s| s.speed);
    let dir_per_sec = expand_per_second(samples, run_end, |s| s.direction);

    let mut out = Vec::with_capacity(fire_times.len());
    out.push(WindStep {
        speed: speed_per_sec.first().copied().unwrap_or(samples[0].speed),
        direction: dir_per_sec
            .first()
            .copied()
            .unwrap_or(samples[0].direction),
    });
    for pair in fire_times.windows(2) {
        let (lo, hi) = (pair[0] as usize, pair[1] as usize);
        let speed = mean(&speed_per_sec[lo..hi]);
        let direction = mean_direction(&dir_per_sec[lo..hi]);
        out.push(WindStep { speed, direction });
    }
    out
}

/// Step-interpolate samples onto a per-second timeline of `run_end`
/// entries, rebased so the first sample defines time zero.
fn expand_per_second(
    samples: &[WindSample],
    run_end: u32,
    attr: impl Fn(&WindSample) -> f32,
) -> Vec<f32> {
    let t0 = samples[0].time;
    let mut boundaries: Vec<u32> = samples
        .iter()
        .map(|s| s.time - t0)
        .filter(|&t| t < run_end)
        .collect();
    boundaries.push(run_end);

    let mut per_sec = vec![0.0_f32; run_end as usize];
    for (i, window) in boundaries.windows(2).enumerate() {
        let value = attr(&samples[i]);
        for slot in &mut per_sec[window[0] as usize..window[1] as usize] {
            *slot = value;
        }
    }
    per_sec
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Arithmetic mean of compass bearings with northern wraparound.
///
/// If the window contains bearings on both sides of due north (some
/// ≥ 180°, some below), the low side is lifted by 360° before averaging
/// and the result reduced back into `[0, 360)`. A naive mean of
/// `{355°, 5°}` would otherwise report a southerly 180°.
fn mean_direction(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let crosses_north = values.iter().any(|&d| d >= 180.0);
    let sum: f32 = values
        .iter()
        .map(|&d| {
            if crosses_north && d < 180.0 {
                d + 360.0
            } else {
                d
            }
        })
        .sum();
    let avg = sum / values.len() as f32;
    if avg >= 360.0 {
        avg - 360.0
    } else {
        avg
    }
}

/// Mean direction across a whole resampled series (arithmetic, matching
/// the spread analyzer's whole-run bucketing).
#[must_use]
pub fn run_mean_direction(series: &[WindStep]) -> f32 {
    mean(&series.iter().map(|s| s.direction).collect::<Vec<_>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(time: u32, speed: f32, direction: f32) -> WindSample {
        WindSample {
            time,
            speed,
            direction,
        }
    }

    #[test]
    fn test_output_length_matches_print_steps() {
        let samples = vec![sample(0, 1.0, 90.0)];
        let fire_times = [0, 100, 200, 300];
        assert_eq!(resample(&samples, &fire_times).len(), 4);

        // dense sampling changes nothing about the output length
        let dense: Vec<WindSample> = (0..300).map(|t| sample(t, 1.0, 90.0)).collect();
        assert_eq!(resample(&dense, &fire_times).len(), 4);
    }

    #[test]
    fn test_first_entry_is_time_zero_value() {
        let samples = vec![sample(500, 3.0, 45.0), sample(600, 7.0, 45.0)];
        let steps = resample(&samples, &[0, 50, 100]);
        // sensor times are rebased to the run start
        assert_relative_eq!(steps[0].speed, 3.0);
    }

    #[test]
    fn test_interval_mean_of_step_interpolation() {
        // 2 m/s for the first 50 s, 4 m/s afterwards
        let samples = vec![sample(0, 2.0, 90.0), sample(50, 4.0, 90.0)];
        let steps = resample(&samples, &[0, 100]);
        assert_relative_eq!(steps[1].speed, 3.0);
    }

    #[test]
    fn test_last_sample_held_to_run_end() {
        let samples = vec![sample(0, 2.0, 10.0), sample(30, 6.0, 20.0)];
        let steps = resample(&samples, &[0, 100, 200]);
        // 0-30s at 2, 30-100s at 6 → (30*2 + 70*6)/100 = 4.8
        assert_relative_eq!(steps[1].speed, 4.8, epsilon = 1e-5);
        // second interval entirely covered by the held last sample
        assert_relative_eq!(steps[2].speed, 6.0);
        assert_relative_eq!(steps[2].direction, 20.0);
    }

    #[test]
    fn test_samples_past_run_end_truncated() {
        let samples = vec![sample(0, 2.0, 10.0), sample(500, 9.0, 10.0)];
        let steps = resample(&samples, &[0, 100]);
        assert_relative_eq!(steps[1].speed, 2.0);
    }

    #[test]
    fn test_northerly_window_averages_near_zero() {
        // half the window at 355°, half at 5°
        let samples = vec![sample(0, 1.0, 355.0), sample(50, 1.0, 5.0)];
        let steps = resample(&samples, &[0, 100]);
        let dir = steps[1].direction;
        assert!(
            !(90.0..=270.0).contains(&dir),
            "mean direction {dir} should sit near due north"
        );
        assert_relative_eq!(dir, 0.0, epsilon = 0.5);
    }

    #[test]
    fn test_southerly_window_unaffected_by_correction() {
        let samples = vec![sample(0, 1.0, 170.0), sample(50, 1.0, 175.0)];
        let steps = resample(&samples, &[0, 100]);
        assert_relative_eq!(steps[1].direction, 172.5, epsilon = 0.01);
    }

    #[test]
    fn test_empty_time_grid_yields_empty_series() {
        assert!(resample(&[sample(0, 1.0, 0.0)], &[]).is_empty());
    }
}
