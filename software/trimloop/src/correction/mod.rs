//! Feedback corrections that are run at each control cycle.
//!
//! Each controller owns its state exclusively and is advanced by exactly one
//! call per cycle from the [`CorrectionManager`]. Controllers are built from
//! validated configuration and reject out-of-range values at construction.

mod fuel_trim;
mod idle;
mod knock;
mod manager;
mod pid;

pub use fuel_trim::FuelTrimCorrection;
pub use idle::IdleCorrection;
pub use knock::KnockCorrection;
pub use manager::CorrectionManager;
pub use pid::PidUnit;
