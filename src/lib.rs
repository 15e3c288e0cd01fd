pub mod error;
pub mod noise;
pub mod physics;
pub mod dynamics;
mod gnc_mod;
pub mod sim;
pub mod io;
pub mod config;

// The gnc module: expose gnc_mod as `gnc` publicly
pub mod gnc {
    pub use crate::gnc_mod::*;
}

pub use config::AirbrakeConfig;
pub use dynamics::{RocketDynamics, RocketParams, StateLayout};
pub use error::{SimError, SimResult};
pub use gnc::{PidController, PolynomialReference, Saturator};
pub use io::{CsvDirectory, MemorySink, TableSink};
pub use noise::NoiseSource;
pub use sim::{GainSearch, RobustnessGrid, RunSummary, Simulator};
