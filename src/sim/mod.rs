pub mod integrator;
pub mod record;
pub mod runner;
pub mod tuning;
pub mod robustness;

pub use integrator::rk4_step;
pub use record::{RunSummary, SimulationRecord};
pub use runner::{step_count, Simulator};
pub use tuning::{GainAxis, GainSearch, TuningResult};
pub use robustness::{RobustnessGrid, RobustnessMap};
