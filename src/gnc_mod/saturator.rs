use nalgebra::DVector;

use crate::error::{check_len, check_sampling_time, SimError, SimResult};
use crate::noise::NoiseSource;

/// Magnitude used for bounds that were never set.
pub const UNBOUNDED: f64 = 1.0e6;

// ---------------------------------------------------------------------------
// Actuator saturation: static limits, rate limits, bias and noise
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Saturator {
    n_u: usize,
    sampling_time: f64,
    lower: DVector<f64>,
    upper: DVector<f64>,
    lower_rate: DVector<f64>,   // per second, scaled by sampling_time
    upper_rate: DVector<f64>,
    bias: DVector<f64>,
    noise_level: DVector<f64>,  // relative, uniform in +-level
    last_u: DVector<f64>,       // last clipped command, before bias/noise
    noise: NoiseSource,
}

impl Saturator {
    pub fn new(n_u: usize, sampling_time: f64) -> SimResult<Self> {
        check_sampling_time(sampling_time)?;
        Ok(Self {
            n_u,
            sampling_time,
            lower: DVector::from_element(n_u, -UNBOUNDED),
            upper: DVector::from_element(n_u, UNBOUNDED),
            lower_rate: DVector::from_element(n_u, -UNBOUNDED),
            upper_rate: DVector::from_element(n_u, UNBOUNDED),
            bias: DVector::zeros(n_u),
            noise_level: DVector::zeros(n_u),
            last_u: DVector::zeros(n_u),
            noise: NoiseSource::seeded(0),
        })
    }

    pub fn with_noise(mut self, noise: NoiseSource) -> Self {
        self.noise = noise;
        self
    }

    pub fn set_lower_limit(&mut self, v: DVector<f64>) -> SimResult<()> {
        check_len("lower limit", self.n_u, v.len())?;
        self.lower = v;
        Ok(())
    }

    pub fn set_lower_limit_at(&mut self, idx: usize, v: f64) -> SimResult<()> {
        *channel(&mut self.lower, idx)? = v;
        Ok(())
    }

    pub fn set_upper_limit(&mut self, v: DVector<f64>) -> SimResult<()> {
        check_len("upper limit", self.n_u, v.len())?;
        self.upper = v;
        Ok(())
    }

    pub fn set_upper_limit_at(&mut self, idx: usize, v: f64) -> SimResult<()> {
        *channel(&mut self.upper, idx)? = v;
        Ok(())
    }

    pub fn set_lower_rate_limit(&mut self, v: DVector<f64>) -> SimResult<()> {
        check_len("lower rate limit", self.n_u, v.len())?;
        self.lower_rate = v;
        Ok(())
    }

    pub fn set_lower_rate_limit_at(&mut self, idx: usize, v: f64) -> SimResult<()> {
        *channel(&mut self.lower_rate, idx)? = v;
        Ok(())
    }

    pub fn set_upper_rate_limit(&mut self, v: DVector<f64>) -> SimResult<()> {
        check_len("upper rate limit", self.n_u, v.len())?;
        self.upper_rate = v;
        Ok(())
    }

    pub fn set_upper_rate_limit_at(&mut self, idx: usize, v: f64) -> SimResult<()> {
        *channel(&mut self.upper_rate, idx)? = v;
        Ok(())
    }

    pub fn set_bias(&mut self, v: DVector<f64>) -> SimResult<()> {
        check_len("bias", self.n_u, v.len())?;
        self.bias = v;
        Ok(())
    }

    pub fn set_noise(&mut self, v: DVector<f64>) -> SimResult<()> {
        check_len("noise level", self.n_u, v.len())?;
        self.noise_level = v;
        Ok(())
    }

    /// Clear the rate-limit memory; limits, bias and noise are kept.
    pub fn reset_saturator(&mut self) {
        self.last_u.fill(0.0);
    }

    /// Saturate `u` in place.
    ///
    /// 1. clip into the static bounds intersected with the rate window
    ///    around the previous command,
    /// 2. remember the clipped value for the next rate window,
    /// 3. add bias and re-clip into the static bounds only,
    /// 4. apply multiplicative noise.
    pub fn saturate(&mut self, u: &mut DVector<f64>) -> SimResult<()> {
        check_len("control signal", self.n_u, u.len())?;

        let dt = self.sampling_time;
        for i in 0..self.n_u {
            let ub = self.upper[i].min(self.last_u[i] + dt * self.upper_rate[i]);
            let lb = self.lower[i].max(self.last_u[i] + dt * self.lower_rate[i]);
            // Upper first, then lower: an empty window resolves to lb
            if u[i] > ub {
                u[i] = ub;
            }
            if u[i] < lb {
                u[i] = lb;
            }
        }
        self.last_u.copy_from(&*u);

        for i in 0..self.n_u {
            let mut v = u[i] + self.bias[i];
            if v < self.lower[i] {
                v = self.lower[i];
            }
            if v > self.upper[i] {
                v = self.upper[i];
            }
            u[i] = v * self.noise.scale(self.noise_level[i]);
        }
        Ok(())
    }

    pub fn n_channels(&self) -> usize {
        self.n_u
    }

    pub fn lower_limit(&self) -> &DVector<f64> {
        &self.lower
    }

    pub fn upper_limit(&self) -> &DVector<f64> {
        &self.upper
    }

    pub fn lower_rate_limit(&self) -> &DVector<f64> {
        &self.lower_rate
    }

    pub fn upper_rate_limit(&self) -> &DVector<f64> {
        &self.upper_rate
    }

    pub fn bias(&self) -> &DVector<f64> {
        &self.bias
    }

    pub fn noise_level(&self) -> &DVector<f64> {
        &self.noise_level
    }

    pub fn last_u(&self) -> &DVector<f64> {
        &self.last_u
    }
}

fn channel(v: &mut DVector<f64>, idx: usize) -> SimResult<&mut f64> {
    let len = v.len();
    v.get_mut(idx).ok_or(SimError::Index { index: idx, len })
}
