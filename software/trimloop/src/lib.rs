#![doc = include_str!("../README.md")]

pub mod config;
pub mod correction;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod injection;
pub mod logging;
pub mod sensor;

pub use config::EcuConfig;
pub use correction::CorrectionManager;
pub use dispatcher::{CsvDispatcher, Dispatcher, LatestValueDispatcher};
pub use driver::{Ecu, RunCtx, RunSummary, Simulation};
pub use error::{ConfigError, EcuError, EcuResult};

// Re-export shared types so plugins only need one dependency
pub use trimloop_shared;
pub use trimloop_shared::{CorrectionRecord, CycleOutcome, CycleReport, EngineSample};
