use serde::Deserialize;

use crate::physics::{Atmosphere, DragSurface};

// ---------------------------------------------------------------------------
// Vehicle and environment parameters for the coast phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RocketParams {
    pub gravity: f64,             // m/s^2
    pub area: f64,                // aerodynamic reference area, m^2
    pub mass: f64,                // kg, constant after burnout
    pub atmosphere: Atmosphere,
    pub drag: DragSurface,
}

impl Default for RocketParams {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            area: 0.0191,
            mass: 20.1,
            atmosphere: Atmosphere::default(),
            drag: DragSurface::default(),
        }
    }
}

impl RocketParams {
    /// Drag-free, gravity-free configuration; the vehicle moves in straight
    /// lines at constant speed.
    pub fn ballistic_free() -> Self {
        Self {
            gravity: 0.0,
            atmosphere: Atmosphere {
                sea_level_density: 0.0,
                ..Atmosphere::default()
            },
            ..Self::default()
        }
    }
}
