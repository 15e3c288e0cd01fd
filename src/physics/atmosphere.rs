use serde::Deserialize;

// ---------------------------------------------------------------------------
// Exponential atmosphere with a tropospheric temperature profile
// ---------------------------------------------------------------------------

/// Atmospheric properties at a given geometric altitude.
#[derive(Debug, Clone, Copy)]
pub struct Atmo {
    pub density: f64,      // kg/m^3
    pub temperature: f64,  // K
    pub sound_speed: f64,  // m/s
}

/// Density decays exponentially with a fixed scale height; temperature
/// follows the ISA troposphere lapse down to the tropopause floor and is
/// only used for the speed of sound (Mach number).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Atmosphere {
    pub sea_level_density: f64,     // kg/m^3
    pub scale_height: f64,          // m
    pub sea_level_temperature: f64, // K
    pub lapse_rate: f64,            // K/m
    pub tropopause_temperature: f64,
    pub gas_constant: f64,          // J/(kg·K)
    pub gamma: f64,                 // ratio of specific heats
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self {
            sea_level_density: 1.225,
            scale_height: 8800.0,
            sea_level_temperature: 288.15,
            lapse_rate: 0.0065,
            tropopause_temperature: 216.65,
            gas_constant: 287.05,
            gamma: 1.4,
        }
    }
}

impl Atmosphere {
    /// Properties at `altitude_m`. Temperature is clamped to sea level below
    /// ground; density is not, matching the exponential fit.
    pub fn at(&self, altitude_m: f64) -> Atmo {
        let density = self.sea_level_density * (-altitude_m / self.scale_height).exp();
        let temperature = (self.sea_level_temperature - self.lapse_rate * altitude_m.max(0.0))
            .max(self.tropopause_temperature);

        Atmo {
            density,
            temperature,
            sound_speed: (self.gamma * self.gas_constant * temperature).sqrt(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sea_level_standard_values() {
        let a = Atmosphere::default().at(0.0);
        assert!((a.temperature - 288.15).abs() < 1e-9);
        assert!((a.density - 1.225).abs() < 1e-12);
        assert!((a.sound_speed - 340.29).abs() < 0.1);
    }

    #[test]
    fn density_at_one_scale_height() {
        let atm = Atmosphere::default();
        let a = atm.at(8800.0);
        assert!((a.density - 1.225 / std::f64::consts::E).abs() < 1e-9);
    }

    #[test]
    fn density_monotonically_decreases() {
        let atm = Atmosphere::default();
        let rho_0 = atm.at(0.0).density;
        let rho_2k = atm.at(2_000.0).density;
        let rho_4k = atm.at(4_000.0).density;
        assert!(rho_0 > rho_2k);
        assert!(rho_2k > rho_4k);
        assert!(rho_4k > 0.0);
    }

    #[test]
    fn temperature_floors_at_tropopause() {
        let a = Atmosphere::default().at(20_000.0);
        assert!((a.temperature - 216.65).abs() < 1e-9);
    }

    #[test]
    fn negative_altitude_clamps_temperature() {
        let a = Atmosphere::default().at(-500.0);
        assert!((a.temperature - 288.15).abs() < 1e-9);
        assert!(a.density > 1.225);
    }
}
