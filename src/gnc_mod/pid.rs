use nalgebra::DVector;

use crate::error::{check_len, check_sampling_time, SimError, SimResult};
use crate::noise::NoiseSource;
use super::reference::PolynomialReference;
use super::saturator::Saturator;

// ---------------------------------------------------------------------------
// Multi-channel PID controller with output saturation
// ---------------------------------------------------------------------------

/// Independent PID terms per input channel.
///
/// With one output channel every per-input action is summed into that
/// single actuator command; otherwise inputs map one-to-one onto outputs.
/// The output passes through an owned [`Saturator`].
#[derive(Debug, Clone)]
pub struct PidController {
    n_inputs: usize,
    n_outputs: usize,
    sampling_time: f64,
    kp: DVector<f64>,
    ki: DVector<f64>,
    kd: DVector<f64>,
    integral: DVector<f64>,
    last_error: DVector<f64>,
    reference: Option<PolynomialReference>,
    u: DVector<f64>,
    saturator: Saturator,
}

impl PidController {
    pub fn new(n_inputs: usize, n_outputs: usize, sampling_time: f64) -> SimResult<Self> {
        check_sampling_time(sampling_time)?;
        if n_outputs != n_inputs && n_outputs != 1 {
            return Err(SimError::Dimension {
                what: "controller outputs (must equal inputs or be 1)",
                expected: n_inputs,
                actual: n_outputs,
            });
        }

        Ok(Self {
            n_inputs,
            n_outputs,
            sampling_time,
            kp: DVector::zeros(n_inputs),
            ki: DVector::zeros(n_inputs),
            kd: DVector::zeros(n_inputs),
            integral: DVector::zeros(n_inputs),
            last_error: DVector::zeros(n_inputs),
            reference: None,
            u: DVector::zeros(n_outputs),
            saturator: Saturator::new(n_outputs, sampling_time)?,
        })
    }

    /// Replace the saturator's noise stream.
    pub fn with_noise(mut self, noise: NoiseSource) -> Self {
        self.saturator = self.saturator.with_noise(noise);
        self
    }

    pub fn set_proportional_gains(&mut self, gains: DVector<f64>) -> SimResult<()> {
        check_len("proportional gains", self.n_inputs, gains.len())?;
        self.kp = gains;
        Ok(())
    }

    pub fn set_integral_gains(&mut self, gains: DVector<f64>) -> SimResult<()> {
        check_len("integral gains", self.n_inputs, gains.len())?;
        self.ki = gains;
        Ok(())
    }

    pub fn set_derivative_gains(&mut self, gains: DVector<f64>) -> SimResult<()> {
        check_len("derivative gains", self.n_inputs, gains.len())?;
        self.kd = gains;
        Ok(())
    }

    pub fn set_polynomial_reference(&mut self, reference: PolynomialReference) -> SimResult<()> {
        check_len("reference trajectories", self.n_inputs, reference.channels())?;
        self.reference = Some(reference);
        Ok(())
    }

    /// Reference at time `t`; zero when no polynomial was set.
    pub fn reference_at(&self, t: f64) -> DVector<f64> {
        match &self.reference {
            Some(r) => r.evaluate(t),
            None => DVector::zeros(self.n_inputs),
        }
    }

    fn error(&self, time: f64, x: &DVector<f64>, y_ref: Option<&DVector<f64>>) -> SimResult<DVector<f64>> {
        check_len("controller input", self.n_inputs, x.len())?;
        let reference = match y_ref {
            Some(r) => {
                check_len("reference", self.n_inputs, r.len())?;
                r.clone()
            }
            None => self.reference_at(time),
        };
        Ok(reference - x)
    }

    /// Prime the derivative memory with the initial error and zero the output.
    pub fn init(
        &mut self,
        x0: &DVector<f64>,
        y_ref: Option<&DVector<f64>>,
        start_time: f64,
    ) -> SimResult<()> {
        self.last_error = self.error(start_time, x0, y_ref)?;
        self.u.fill(0.0);
        Ok(())
    }

    /// Compute and saturate a new control action; read it with
    /// [`control_output`](Self::control_output).
    pub fn step(&mut self, time: f64, x: &DVector<f64>, y_ref: Option<&DVector<f64>>) -> SimResult<()> {
        let error = self.error(time, x, y_ref)?;
        let mut u = self.control_action(&error);
        self.saturator.saturate(&mut u)?;
        self.u = u;
        Ok(())
    }

    /// Unsaturated PID action; updates the integral and the error memory.
    fn control_action(&mut self, error: &DVector<f64>) -> DVector<f64> {
        let dt = self.sampling_time;
        self.integral += error * dt;

        let mut output = DVector::zeros(self.n_outputs);
        for i in 0..self.n_inputs {
            let action = self.kp[i] * error[i]
                + self.ki[i] * self.integral[i]
                + self.kd[i] * (error[i] - self.last_error[i]) / dt;

            if self.n_outputs > 1 {
                output[i] = action;
            } else {
                output[0] += action;
            }
        }

        self.last_error.copy_from(error);
        output
    }

    /// Most recent saturated control vector.
    pub fn control_output(&self) -> &DVector<f64> {
        &self.u
    }

    /// Zero the integral, error memory and output. The saturator's rate
    /// memory is left alone; see [`reset_saturator`](Self::reset_saturator).
    pub fn reset_controller(&mut self) {
        self.integral.fill(0.0);
        self.last_error.fill(0.0);
        self.u.fill(0.0);
    }

    pub fn reset_saturator(&mut self) {
        self.saturator.reset_saturator();
    }

    pub fn saturator(&self) -> &Saturator {
        &self.saturator
    }

    pub fn saturator_mut(&mut self) -> &mut Saturator {
        &mut self.saturator
    }

    pub fn proportional_gains(&self) -> &DVector<f64> {
        &self.kp
    }

    pub fn integral_gains(&self) -> &DVector<f64> {
        &self.ki
    }

    pub fn derivative_gains(&self) -> &DVector<f64> {
        &self.kd
    }

    pub fn integral(&self) -> &DVector<f64> {
        &self.integral
    }

    pub fn last_error(&self) -> &DVector<f64> {
        &self.last_error
    }

    pub fn sampling_time(&self) -> f64 {
        self.sampling_time
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }
}
