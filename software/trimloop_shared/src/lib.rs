#![doc = include_str!("../README.md")]

pub mod record;
pub mod report;
pub mod sample;

pub use record::{CorrectionRecord, CycleOutcome, SkipReason};
pub use report::CycleReport;
pub use sample::{AuxChannels, EngineSample};

/// Knock level substituted when a sample carries no knock reading
pub const DEFAULT_KNOCK_LEVEL: f64 = 0.0;

/// Stoichiometric lambda
pub const LAMBDA_STOICH: f64 = 1.0;
