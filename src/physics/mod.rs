pub mod atmosphere;
pub mod aerodynamics;

pub use atmosphere::{Atmo, Atmosphere};
pub use aerodynamics::{drag_accel, DragSurface};
