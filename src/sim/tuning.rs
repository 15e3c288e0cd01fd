use std::ops::RangeInclusive;

use nalgebra::DVector;
use serde::Deserialize;

use crate::error::{check_len, SimError, SimResult};
use crate::io::TableSink;
use super::runner::Simulator;

// ---------------------------------------------------------------------------
// Gain search space
// ---------------------------------------------------------------------------

/// Inclusive range of integer grid indices; gain = index * resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GainAxis {
    pub start: i32,
    pub end: i32,
}

impl GainAxis {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn indices(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }

    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive grid over the P, I and D gains of one controller channel.
/// The other channels keep the base gains.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GainSearch {
    pub channel: usize,
    pub base_proportional: Vec<f64>,
    pub base_integral: Vec<f64>,
    pub base_derivative: Vec<f64>,
    pub resolution: f64,
    pub proportional: GainAxis,
    pub integral: GainAxis,
    pub derivative: GainAxis,
    pub target: f64,     // apogee, m
    pub duration: f64,   // s per cell
}

impl Default for GainSearch {
    fn default() -> Self {
        Self {
            channel: 1,
            base_proportional: vec![-3.0, -3.0],
            base_integral: vec![0.0, 0.0],
            base_derivative: vec![-7.0, -7.0],
            resolution: 0.1,
            proportional: GainAxis::new(-20, 20),
            integral: GainAxis::new(0, 0),
            derivative: GainAxis::new(-20, 20),
            target: 3500.0,
            duration: 20.0,
        }
    }
}

impl GainSearch {
    pub fn cells(&self) -> usize {
        self.proportional.len() * self.integral.len() * self.derivative.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TuningResult {
    /// Smallest `|target - peak|`; infinite if no cell ran.
    pub best_deviation: f64,
    /// `[p, i, d]` for the tuned channel at the best cell.
    pub best_gains: Option<[f64; 3]>,
    pub cells: usize,
}

// ---------------------------------------------------------------------------
// Grid search
// ---------------------------------------------------------------------------

impl<S: TableSink> Simulator<S> {
    /// [`tune_with`](Self::tune_with) over the default search space.
    pub fn tune(&mut self) -> SimResult<TuningResult> {
        self.tune_with(&GainSearch::default())
    }

    /// Run every cell of `search` from a clean reset and keep the gains
    /// whose peak lands closest to the target. The controller is left with
    /// the last cell's gains.
    pub fn tune_with(&mut self, search: &GainSearch) -> SimResult<TuningResult> {
        let n = self.controller().n_inputs();
        if search.channel >= n {
            return Err(SimError::Index { index: search.channel, len: n });
        }
        check_len("base proportional gains", n, search.base_proportional.len())?;
        check_len("base integral gains", n, search.base_integral.len())?;
        check_len("base derivative gains", n, search.base_derivative.len())?;

        let total = search.cells();
        tracing::info!(cells = total, channel = search.channel, "starting gain search");

        let mut best = TuningResult { best_deviation: f64::INFINITY, best_gains: None, cells: 0 };
        let res = search.resolution;

        for i in search.proportional.indices() {
            for ii in search.integral.indices() {
                for iii in search.derivative.indices() {
                    self.reset_all(None)?;

                    let gains = [i as f64 * res, ii as f64 * res, iii as f64 * res];
                    let mut p = DVector::from_vec(search.base_proportional.clone());
                    let mut ki = DVector::from_vec(search.base_integral.clone());
                    let mut d = DVector::from_vec(search.base_derivative.clone());
                    p[search.channel] = gains[0];
                    ki[search.channel] = gains[1];
                    d[search.channel] = gains[2];
                    let pid = self.controller_mut();
                    pid.set_proportional_gains(p)?;
                    pid.set_integral_gains(ki)?;
                    pid.set_derivative_gains(d)?;

                    let run = self.simulate(search.duration, false)?;
                    let deviation = (search.target - run.peak).abs();
                    best.cells += 1;

                    tracing::debug!(
                        cell = best.cells,
                        of = total,
                        p = gains[0],
                        i = gains[1],
                        d = gains[2],
                        deviation,
                        "gain cell"
                    );

                    if deviation < best.best_deviation {
                        best.best_deviation = deviation;
                        best.best_gains = Some(gains);
                    }
                }
            }
        }

        tracing::info!(
            best_deviation = best.best_deviation,
            best_gains = ?best.best_gains,
            "gain search finished"
        );
        Ok(best)
    }
}
