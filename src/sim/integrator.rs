use nalgebra::DVector;

// ---------------------------------------------------------------------------
// Classical 4th-order Runge-Kutta integrator
// ---------------------------------------------------------------------------

/// Single RK4 step of `dy/dt = f(t, y)`: stages at t, t+h/2, t+h/2, t+h,
/// weighted 1, 2, 2, 1 over 6.
pub fn rk4_step<F>(f: F, t: f64, y: &DVector<f64>, h: f64) -> DVector<f64>
where
    F: Fn(f64, &DVector<f64>) -> DVector<f64>,
{
    let k1 = f(t, y);
    let k2 = f(t + 0.5 * h, &(y + &k1 * (0.5 * h)));
    let k3 = f(t + 0.5 * h, &(y + &k2 * (0.5 * h)));
    let k4 = f(t + h, &(y + &k3 * h));

    y + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_decay_matches_analytic() {
        let f = |_t: f64, y: &DVector<f64>| -y;
        let mut y = DVector::from_vec(vec![1.0]);
        let h = 0.1;
        for i in 0..10 {
            y = rk4_step(f, i as f64 * h, &y, h);
        }
        let exact = (-1.0_f64).exp();
        assert!((y[0] - exact).abs() < 1e-6, "RK4 error too large: {}", y[0] - exact);
    }

    #[test]
    fn time_dependent_rhs_is_exact_for_cubic() {
        // dy/dt = 3t^2 -> y = t^3; RK4 integrates polynomials up to degree 3 exactly
        let f = |t: f64, _y: &DVector<f64>| DVector::from_vec(vec![3.0 * t * t]);
        let y = rk4_step(f, 1.0, &DVector::from_vec(vec![1.0]), 0.5);
        assert!((y[0] - 1.5_f64.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn constant_velocity_position_advance() {
        // [pos, vel] with zero acceleration
        let f = |_t: f64, y: &DVector<f64>| DVector::from_vec(vec![y[1], 0.0]);
        let y = rk4_step(f, 0.0, &DVector::from_vec(vec![10.0, 3.0]), 0.05);
        assert!((y[0] - 10.15).abs() < 1e-12);
        assert_eq!(y[1], 3.0);
    }
}
