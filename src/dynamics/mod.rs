pub mod params;
pub mod rocket;

pub use params::RocketParams;
pub use rocket::{derivatives, RocketDynamics, StateLayout};
