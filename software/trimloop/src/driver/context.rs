//! Information about the current run
//! that may be used by the driver's appendages.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

/// Run context shared with dispatchers and logging
#[derive(Serialize, Deserialize, Clone, Debug)]
#[non_exhaustive]
pub struct RunCtx {
    /// Time between control cycles
    pub interval_s: f64,

    /// Length of the run; the number of cycles is `duration_s / interval_s`, rounded down
    pub duration_s: f64,

    /// Pace cycles against the wall clock instead of running as fast as possible
    pub realtime: bool,

    /// Install terminal and file logging at the start of the run
    pub logging: bool,

    /// A name for this run, used as the name of log and data files,
    /// and must be compatible with that use.
    pub op_name: String,

    /// A directory to place outputs.
    pub op_dir: PathBuf,
}

impl RunCtx {
    /// Number of cycles in the run
    pub fn n_cycles(&self) -> u64 {
        if self.interval_s > 0.0 && self.duration_s > 0.0 {
            (self.duration_s / self.interval_s + 1e-9).floor() as u64
        } else {
            0
        }
    }
}

impl Default for RunCtx {
    fn default() -> Self {
        // Use current time with seconds as op name and use working directory as op dir,
        // replacing characters in the name that would be invalid on Windows.
        let op_name = DateTime::<Utc>::from(SystemTime::now())
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            .replace(":", "");
        Self {
            interval_s: 0.5,
            duration_s: 60.0,
            realtime: false,
            logging: true,
            op_name,
            op_dir: std::fs::canonicalize("./").unwrap_or_default(),
        }
    }
}
