pub mod saturator;
pub mod reference;
pub mod pid;

pub use saturator::{Saturator, UNBOUNDED};
pub use reference::PolynomialReference;
pub use pid::PidController;
