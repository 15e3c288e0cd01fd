use nalgebra::DVector;
use serde::Deserialize;

use crate::dynamics::params::RocketParams;
use crate::error::{check_len, check_sampling_time, SimError, SimResult};
use crate::noise::NoiseSource;
use crate::physics::drag_accel;
use crate::sim::integrator::rk4_step;

// ---------------------------------------------------------------------------
// State layout
// ---------------------------------------------------------------------------

/// Planar: `[x, altitude, Vx, Vy]`. Vertical: `[altitude, Vy]`, the 1-D
/// ascent-only reduction of the same equations with `Vx = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateLayout {
    Planar,
    Vertical,
}

impl StateLayout {
    pub fn dim(self) -> usize {
        match self {
            StateLayout::Planar => 4,
            StateLayout::Vertical => 2,
        }
    }

    pub fn altitude_index(self) -> usize {
        match self {
            StateLayout::Planar => 1,
            StateLayout::Vertical => 0,
        }
    }

    pub fn vertical_velocity_index(self) -> usize {
        match self {
            StateLayout::Planar => 3,
            StateLayout::Vertical => 1,
        }
    }

    /// State components observed by the altimeter/velocity sensor, in output order.
    fn observed(self) -> [usize; 2] {
        [self.altitude_index(), self.vertical_velocity_index()]
    }
}

// ---------------------------------------------------------------------------
// Equations of motion (point mass, coast phase with airbrakes)
// ---------------------------------------------------------------------------

/// State derivatives for a given state and airbrake extension.
///
/// Forces modeled:
///   1. Gravity: constant, down
///   2. Drag:    `Cd(extension, Mach)` surface, opposing velocity
pub fn derivatives(
    params: &RocketParams,
    layout: StateLayout,
    state: &DVector<f64>,
    extension: f64,
) -> DVector<f64> {
    let (alt, vx, vy) = match layout {
        StateLayout::Planar => (state[1], state[2], state[3]),
        StateLayout::Vertical => (state[0], 0.0, state[1]),
    };

    let atm = params.atmosphere.at(alt);
    let speed = vx.hypot(vy);

    // Drag deceleration split along the velocity components
    let (ax, ay) = if speed > 1e-9 {
        let mach = speed / atm.sound_speed;
        let cd = params.drag.cd(extension, mach);
        let d = drag_accel(speed, &atm, cd, params.area, params.mass);
        (-d * vx / speed, -d * vy / speed)
    } else {
        (0.0, 0.0)
    };

    match layout {
        StateLayout::Planar => DVector::from_vec(vec![vx, vy, ax, -params.gravity + ay]),
        StateLayout::Vertical => DVector::from_vec(vec![vy, -params.gravity + ay]),
    }
}

// ---------------------------------------------------------------------------
// Discrete-time plant: RK4 over one sampling interval plus sensor model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RocketDynamics {
    params: RocketParams,
    layout: StateLayout,
    n_inputs: usize,
    n_outputs: usize,
    sampling_time: f64,
    init_state: DVector<f64>,
    init_time: f64,
    state: DVector<f64>,
    time: f64,
    last_u: DVector<f64>,
    omega: f64,
    output_bias: DVector<f64>,
    output_noise: DVector<f64>,
    noise: NoiseSource,
}

impl RocketDynamics {
    /// `n_outputs` selects the first one or two observed components
    /// (altitude, then vertical velocity). `u[0]` is always the airbrake
    /// extension; further control channels are carried but unused.
    pub fn new(
        layout: StateLayout,
        n_inputs: usize,
        n_outputs: usize,
        init_state: DVector<f64>,
        sampling_time: f64,
        init_time: f64,
    ) -> SimResult<Self> {
        check_len("initial state", layout.dim(), init_state.len())?;
        check_sampling_time(sampling_time)?;
        if n_inputs == 0 {
            return Err(SimError::Dimension { what: "dynamics inputs", expected: 1, actual: 0 });
        }
        if !(1..=2).contains(&n_outputs) {
            return Err(SimError::Dimension {
                what: "dynamics outputs",
                expected: 2,
                actual: n_outputs,
            });
        }

        Ok(Self {
            params: RocketParams::default(),
            layout,
            n_inputs,
            n_outputs,
            sampling_time,
            state: init_state.clone(),
            init_state,
            init_time,
            time: init_time,
            last_u: DVector::zeros(n_inputs),
            omega: 0.0,
            output_bias: DVector::zeros(n_outputs),
            output_noise: DVector::zeros(n_outputs),
            noise: NoiseSource::seeded(0),
        })
    }

    pub fn with_params(mut self, params: RocketParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_noise(mut self, noise: NoiseSource) -> Self {
        self.noise = noise;
        self
    }

    pub fn set_output_bias(&mut self, bias: DVector<f64>) -> SimResult<()> {
        check_len("output bias", self.n_outputs, bias.len())?;
        self.output_bias = bias;
        Ok(())
    }

    pub fn set_output_noise(&mut self, noise_level: DVector<f64>) -> SimResult<()> {
        check_len("output noise", self.n_outputs, noise_level.len())?;
        self.output_noise = noise_level;
        Ok(())
    }

    /// Advance one sampling interval under constant input `u` and return
    /// the measured output.
    pub fn step(&mut self, u: &DVector<f64>) -> SimResult<DVector<f64>> {
        check_len("control input", self.n_inputs, u.len())?;

        let extension = u[0];
        let params = &self.params;
        let layout = self.layout;
        let next = rk4_step(
            |_t, s| derivatives(params, layout, s, extension),
            self.time,
            &self.state,
            self.sampling_time,
        );

        // A failed step leaves the plant untouched
        let next_time = self.time + self.sampling_time;
        if next.iter().any(|v| !v.is_finite()) {
            return Err(SimError::NonFiniteState { time: next_time });
        }

        // Actuator rate proxy
        self.omega = (u[0] - self.last_u[0]) / (0.01 * self.sampling_time);
        self.last_u.copy_from(u);
        self.state = next;
        self.time = next_time;

        Ok(self.measure())
    }

    /// Noisy, biased measurement: multiplicative noise first, then bias.
    fn measure(&mut self) -> DVector<f64> {
        let idx = self.layout.observed();
        let mut y = DVector::zeros(self.n_outputs);
        for i in 0..self.n_outputs {
            let clean = self.state[idx[i]];
            y[i] = clean * self.noise.scale(self.output_noise[i]) + self.output_bias[i];
        }
        y
    }

    /// Noise-free observed components of the current state.
    pub fn observe(&self) -> DVector<f64> {
        let idx = self.layout.observed();
        DVector::from_fn(self.n_outputs, |i, _| self.state[idx[i]])
    }

    /// Restore `state = init_state .* (1 + offsets)`, rewind the clock and
    /// clear the input memory.
    pub fn reset_dynamics(&mut self, offsets: Option<&DVector<f64>>) -> SimResult<()> {
        match offsets {
            Some(o) => {
                check_len("state offsets", self.init_state.len(), o.len())?;
                self.state = self.init_state.zip_map(o, |s, d| s * (1.0 + d));
            }
            None => self.state.copy_from(&self.init_state),
        }
        self.time = self.init_time;
        self.last_u.fill(0.0);
        self.omega = 0.0;
        Ok(())
    }

    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }

    pub fn init_state(&self) -> &DVector<f64> {
        &self.init_state
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    pub fn last_u(&self) -> &DVector<f64> {
        &self.last_u
    }

    pub fn sampling_time(&self) -> f64 {
        self.sampling_time
    }

    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    pub fn params(&self) -> &RocketParams {
        &self.params
    }

    pub fn n_states(&self) -> usize {
        self.layout.dim()
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn coast_state() -> DVector<f64> {
        DVector::from_vec(vec![171.9, 1098.5, 54.14, 332.26])
    }

    fn rocket() -> RocketDynamics {
        RocketDynamics::new(StateLayout::Planar, 1, 2, coast_state(), 0.05, 5.5).unwrap()
    }

    fn run_to_apogee(mut r: RocketDynamics, extension: f64) -> f64 {
        let u = DVector::from_element(1, extension);
        let mut apogee = r.observe()[0];
        for _ in 0..1000 {
            let y = r.step(&u).unwrap();
            apogee = apogee.max(y[0]);
            if y[1] < 0.0 {
                break;
            }
        }
        apogee
    }

    #[test]
    fn constant_velocity_without_drag_or_gravity() {
        let mut r = rocket().with_params(RocketParams::ballistic_free());
        let s0 = r.state().clone();
        r.step(&DVector::zeros(1)).unwrap();
        let s1 = r.state();
        assert!((s1[0] - (s0[0] + s0[2] * 0.05)).abs() < 1e-9);
        assert!((s1[1] - (s0[1] + s0[3] * 0.05)).abs() < 1e-9);
        assert_eq!(s1[2], s0[2]);
        assert_eq!(s1[3], s0[3]);
    }

    #[test]
    fn vertical_free_fall_is_exact() {
        let params = RocketParams {
            atmosphere: RocketParams::ballistic_free().atmosphere,
            ..RocketParams::default()
        };
        let init = DVector::from_vec(vec![1000.0, 100.0]);
        let mut r = RocketDynamics::new(StateLayout::Vertical, 1, 2, init, 0.1, 0.0)
            .unwrap()
            .with_params(params);
        let y = r.step(&DVector::zeros(1)).unwrap();
        let expected_h = 1000.0 + 100.0 * 0.1 - 0.5 * 9.81 * 0.01;
        assert!((y[0] - expected_h).abs() < 1e-9);
        assert!((y[1] - (100.0 - 0.981)).abs() < 1e-9);
    }

    #[test]
    fn drag_and_gravity_decelerate_ascent() {
        let d = derivatives(&RocketParams::default(), StateLayout::Planar, &coast_state(), 0.0);
        assert_eq!(d[0], 54.14);
        assert_eq!(d[1], 332.26);
        assert!(d[2] < 0.0, "Drag should oppose horizontal velocity");
        assert!(d[3] < -9.81, "Vertical decel exceeds gravity while drag acts");
    }

    #[test]
    fn airbrake_lowers_apogee() {
        let clean = run_to_apogee(rocket(), 0.0);
        let braked = run_to_apogee(rocket(), 0.05);
        assert!(clean > 3_000.0 && clean < 5_000.0, "Unexpected clean apogee {clean}");
        assert!(braked < clean - 50.0, "Airbrake should cost apogee: {braked} vs {clean}");
    }

    #[test]
    fn step_advances_time_and_tracks_input_rate() {
        let mut r = rocket();
        r.step(&DVector::from_element(1, 0.01)).unwrap();
        assert!((r.time() - 5.55).abs() < 1e-12);
        assert!((r.omega() - 0.01 / (0.01 * 0.05)).abs() < 1e-9);
        assert_eq!(r.last_u()[0], 0.01);
        r.step(&DVector::from_element(1, 0.01)).unwrap();
        assert_eq!(r.omega(), 0.0);
    }

    #[test]
    fn output_noise_applied_before_bias() {
        let mut r = rocket().with_noise(NoiseSource::seeded(9));
        r.set_output_noise(DVector::from_vec(vec![0.1, 0.0])).unwrap();
        r.set_output_bias(DVector::from_vec(vec![5.0, -1.0])).unwrap();
        let y = r.step(&DVector::zeros(1)).unwrap();

        let mut reference = NoiseSource::seeded(9);
        let s = r.state();
        let expected0 = s[1] * reference.scale(0.1) + 5.0;
        let expected1 = s[3] * reference.scale(0.0) - 1.0;
        assert!((y[0] - expected0).abs() < 1e-9);
        assert!((y[1] - expected1).abs() < 1e-9);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut r = rocket();
        for _ in 0..10 {
            r.step(&DVector::from_element(1, 0.02)).unwrap();
        }
        r.reset_dynamics(None).unwrap();
        let first = r.state().clone();
        r.reset_dynamics(None).unwrap();
        assert_eq!(r.state(), &first);
        assert_eq!(r.state(), &coast_state());
        assert_eq!(r.time(), 5.5);
        assert_eq!(r.last_u()[0], 0.0);
    }

    #[test]
    fn reset_applies_relative_offsets() {
        let mut r = rocket();
        let offsets = DVector::from_vec(vec![0.0, 0.1, 0.0, -0.05]);
        r.reset_dynamics(Some(&offsets)).unwrap();
        assert!((r.state()[1] - 1098.5 * 1.1).abs() < 1e-9);
        assert!((r.state()[3] - 332.26 * 0.95).abs() < 1e-9);
        assert_eq!(r.state()[0], 171.9);
    }

    #[test]
    fn dimension_errors() {
        assert!(matches!(
            RocketDynamics::new(StateLayout::Planar, 1, 2, DVector::zeros(2), 0.05, 0.0),
            Err(SimError::Dimension { .. })
        ));
        assert!(matches!(
            RocketDynamics::new(StateLayout::Vertical, 1, 3, DVector::zeros(2), 0.05, 0.0),
            Err(SimError::Dimension { .. })
        ));
        let mut r = rocket();
        assert!(matches!(r.step(&DVector::zeros(2)), Err(SimError::Dimension { .. })));
        assert!(matches!(
            r.reset_dynamics(Some(&DVector::zeros(3))),
            Err(SimError::Dimension { .. })
        ));
        assert!(r.set_output_bias(DVector::zeros(1)).is_err());
    }

    #[test]
    fn zero_sampling_time_rejected() {
        assert!(matches!(
            RocketDynamics::new(StateLayout::Planar, 1, 2, coast_state(), 0.0, 0.0),
            Err(SimError::InvalidSamplingTime(_))
        ));
    }

    #[test]
    fn non_finite_state_is_reported() {
        let init = DVector::from_vec(vec![0.0, f64::NAN, 10.0, 10.0]);
        let mut r = RocketDynamics::new(StateLayout::Planar, 1, 2, init, 0.05, 0.0).unwrap();
        assert!(matches!(
            r.step(&DVector::zeros(1)),
            Err(SimError::NonFiniteState { .. })
        ));
    }

    #[test]
    fn non_finite_drag_coefficient_is_reported() {
        let mut params = RocketParams::default();
        params.drag.coeffs[0] = f64::INFINITY;
        let mut r = rocket().with_params(params);
        assert!(matches!(
            r.step(&DVector::zeros(1)),
            Err(SimError::NonFiniteState { .. })
        ));
    }

    #[test]
    fn failed_step_leaves_plant_unchanged() {
        let mut params = RocketParams::default();
        params.drag.coeffs[0] = f64::INFINITY;
        let mut r = rocket().with_params(params);
        let before = r.state().clone();
        let err = r.step(&DVector::from_element(1, 0.03)).unwrap_err();
        assert!(matches!(err, SimError::NonFiniteState { time } if (time - 5.55).abs() < 1e-12));
        assert_eq!(r.state(), &before);
        assert_eq!(r.time(), 5.5);
        assert_eq!(r.last_u()[0], 0.0);
        assert_eq!(r.omega(), 0.0);
    }
}
