use serde::Deserialize;

use crate::physics::atmosphere::Atmo;

// ---------------------------------------------------------------------------
// Drag coefficient surface: bivariate cubic in airbrake extension and Mach
// ---------------------------------------------------------------------------

/// `Cd(u, M) = sum p_ij * u^i * M^j` for `i + j <= 3`.
///
/// Coefficient order: p00, p10, p01, p20, p11, p02, p30, p21, p12, p03.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct DragSurface {
    pub coeffs: [f64; 10],
}

impl Default for DragSurface {
    fn default() -> Self {
        // Clean body ~0.55 subsonic with a transonic bump, airbrake adds up
        // to ~0.5 at full extension (0.05) near Mach 1.
        Self {
            coeffs: [0.55, 8.0, -0.12, 0.0, 2.0, 0.35, 0.0, 0.0, 0.0, -0.1],
        }
    }
}

impl DragSurface {
    pub fn cd(&self, u: f64, mach: f64) -> f64 {
        let [p00, p10, p01, p20, p11, p02, p30, p21, p12, p03] = self.coeffs;
        p00 + p10 * u
            + p01 * mach
            + p20 * u * u
            + p11 * u * mach
            + p02 * mach * mach
            + p30 * u * u * u
            + p21 * u * u * mach
            + p12 * u * mach * mach
            + p03 * mach * mach * mach
    }
}

/// Drag deceleration magnitude `0.5 * rho * V^2 * A * Cd / m` (m/s^2).
pub fn drag_accel(speed: f64, atm: &Atmo, cd: f64, area: f64, mass: f64) -> f64 {
    0.5 * atm.density * speed * speed * area * cd / mass
}
