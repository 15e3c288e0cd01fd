use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nalgebra::DVector;
use serde::Deserialize;

use crate::dynamics::{RocketDynamics, RocketParams, StateLayout};
use crate::error::{SimError, SimResult};
use crate::gnc::{PidController, PolynomialReference};
use crate::io::TableSink;
use crate::noise::NoiseSource;
use crate::sim::{GainSearch, RobustnessGrid, Simulator};

// ---------------------------------------------------------------------------
// Run configuration (TOML)
// ---------------------------------------------------------------------------

/// Everything needed to assemble a simulator. Missing keys fall back to the
/// reference airbrake setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AirbrakeConfig {
    /// Base seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
    pub duration: f64,
    pub controller: ControllerConfig,
    pub plant: PlantConfig,
    pub tuning: GainSearch,
    pub robustness: RobustnessGrid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub sampling_time: f64,
    pub n_inputs: usize,
    pub n_outputs: usize,
    pub proportional: Vec<f64>,
    pub integral: Vec<f64>,
    pub derivative: Vec<f64>,
    pub lower_limit: Vec<f64>,
    pub upper_limit: Vec<f64>,
    pub lower_rate_limit: Vec<f64>,
    pub upper_rate_limit: Vec<f64>,
    pub bias: Vec<f64>,
    pub noise: Vec<f64>,
    /// Polynomial coefficients per input, highest power first.
    pub reference: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlantConfig {
    pub layout: StateLayout,
    pub n_inputs: usize,
    pub n_outputs: usize,
    pub sampling_time: f64,
    pub init_state: Vec<f64>,
    pub init_time: f64,   // burnout time, s
    pub output_bias: Vec<f64>,
    pub output_noise: Vec<f64>,
    pub params: RocketParams,
}

impl Default for AirbrakeConfig {
    fn default() -> Self {
        Self {
            seed: Some(0),
            output_dir: PathBuf::from("data"),
            duration: 20.0,
            controller: ControllerConfig::default(),
            plant: PlantConfig::default(),
            tuning: GainSearch::default(),
            robustness: RobustnessGrid::default(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sampling_time: 0.05,
            n_inputs: 2,
            n_outputs: 1,
            proportional: vec![-3.0, -3.0],
            integral: vec![0.0, 0.0],
            derivative: vec![-7.0, -7.0],
            lower_limit: vec![0.0],
            upper_limit: vec![0.05],
            lower_rate_limit: vec![-0.05],
            upper_rate_limit: vec![0.05],
            bias: vec![0.0],
            noise: vec![0.0],
            reference: vec![
                // altitude, m
                vec![
                    0.000552959959483582,
                    -0.0536167708516457,
                    2.11969221432553,
                    -48.1791794728476,
                    707.049841776998,
                    -1640.19371969719,
                ],
                // vertical velocity, m/s
                vec![
                    -1.78444699910487e-05,
                    0.00365544263025656,
                    -0.225186229775288,
                    6.27114893267685,
                    -94.0507177583389,
                    696.642796048007,
                ],
            ],
        }
    }
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            layout: StateLayout::Planar,
            n_inputs: 1,
            n_outputs: 2,
            sampling_time: 0.05,
            init_state: vec![171.9, 1098.5, 54.14, 332.26],
            init_time: 5.5,
            output_bias: vec![0.0, 0.0],
            output_noise: vec![0.0, 0.0],
            params: RocketParams::default(),
        }
    }
}

impl FromStr for AirbrakeConfig {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl AirbrakeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    fn noise(&self, stream: u64) -> NoiseSource {
        match self.seed {
            Some(seed) => NoiseSource::seeded(seed.wrapping_add(stream)),
            None => NoiseSource::from_entropy(),
        }
    }

    pub fn build_controller(&self) -> SimResult<PidController> {
        let c = &self.controller;
        let mut pid =
            PidController::new(c.n_inputs, c.n_outputs, c.sampling_time)?.with_noise(self.noise(0));

        pid.set_proportional_gains(DVector::from_vec(c.proportional.clone()))?;
        pid.set_integral_gains(DVector::from_vec(c.integral.clone()))?;
        pid.set_derivative_gains(DVector::from_vec(c.derivative.clone()))?;
        if !c.reference.is_empty() {
            pid.set_polynomial_reference(PolynomialReference::from_rows(&c.reference)?)?;
        }

        let sat = pid.saturator_mut();
        sat.set_lower_limit(DVector::from_vec(c.lower_limit.clone()))?;
        sat.set_upper_limit(DVector::from_vec(c.upper_limit.clone()))?;
        sat.set_lower_rate_limit(DVector::from_vec(c.lower_rate_limit.clone()))?;
        sat.set_upper_rate_limit(DVector::from_vec(c.upper_rate_limit.clone()))?;
        sat.set_bias(DVector::from_vec(c.bias.clone()))?;
        sat.set_noise(DVector::from_vec(c.noise.clone()))?;
        Ok(pid)
    }

    pub fn build_dynamics(&self) -> SimResult<RocketDynamics> {
        let p = &self.plant;
        let mut plant = RocketDynamics::new(
            p.layout,
            p.n_inputs,
            p.n_outputs,
            self.init_state(),
            p.sampling_time,
            p.init_time,
        )?
        .with_params(p.params.clone())
        .with_noise(self.noise(1));

        plant.set_output_bias(DVector::from_vec(p.output_bias.clone()))?;
        plant.set_output_noise(DVector::from_vec(p.output_noise.clone()))?;
        Ok(plant)
    }

    pub fn build_simulator<S: TableSink>(&self, sink: S) -> SimResult<Simulator<S>> {
        Simulator::new(self.build_controller()?, self.build_dynamics()?, sink)
    }

    pub fn init_state(&self) -> DVector<f64> {
        DVector::from_vec(self.plant.init_state.clone())
    }
}
