//! A plain-text CSV data target

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::{Sender, channel};
use std::thread::{JoinHandle, spawn};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::driver::RunCtx;

use super::{Dispatcher, csv_header, csv_row};

/// Writes one CSV line per cycle to `<op_dir>/<op_name>.csv`.
///
/// Writes to disk on a separate thread to avoid blocking the control loop.
/// The file is flushed and closed on [`Dispatcher::terminate`].
#[derive(Serialize, Deserialize, Default)]
pub struct CsvDispatcher {
    /// Flush after every row so the log can be followed while the run is live
    flush_each_row: bool,

    #[serde(skip)]
    worker: Option<WorkerHandle>,
}

impl CsvDispatcher {
    pub fn new(flush_each_row: bool) -> Box<Self> {
        Box::new(Self {
            flush_each_row,
            worker: None,
        })
    }

    /// Path of the file being written, if initialized
    pub fn path(&self) -> Option<&PathBuf> {
        self.worker.as_ref().map(|w| &w.path)
    }
}

#[typetag::serde]
impl Dispatcher for CsvDispatcher {
    fn init(&mut self, ctx: &RunCtx, channel_names: &[String]) -> Result<(), String> {
        // Shut down any existing worker first
        self.terminate()?;

        fs::create_dir_all(&ctx.op_dir)
            .map_err(|e| format!("Failed to create output directory: {e}"))?;
        let path = ctx.op_dir.join(format!("{}.csv", ctx.op_name));
        let header = csv_header(channel_names);

        self.worker = Some(WorkerHandle::new(path, header, self.flush_each_row)?);
        Ok(())
    }

    fn consume(
        &mut self,
        time: SystemTime,
        timestamp: i64,
        channel_values: Vec<f64>,
    ) -> Result<(), String> {
        match &mut self.worker {
            Some(worker) => worker
                .tx
                .send((time, timestamp, channel_values))
                .map_err(|_| "CSV worker stopped unexpectedly".to_string()),
            None => Err("Dispatcher must be initialized before consuming data".to_string()),
        }
    }

    fn terminate(&mut self) -> Result<(), String> {
        match self.worker.take() {
            Some(worker) => worker.finish(),
            None => Ok(()),
        }
    }
}

type Msg = (SystemTime, i64, Vec<f64>);

struct WorkerHandle {
    tx: Sender<Msg>,
    path: PathBuf,
    thread: JoinHandle<Result<usize, String>>,
}

impl WorkerHandle {
    fn new(path: PathBuf, header: String, flush_each_row: bool) -> Result<Self, String> {
        let (tx, rx) = channel::<Msg>();

        let file = File::create(&path)
            .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(header.as_bytes())
            .map_err(|e| format!("Failed to write CSV header: {e}"))?;

        let thread = spawn(move || {
            // Single-line buffer that keeps the largest line length seen
            let mut stringbuf = String::new();
            let mut rows = 0;

            // Runs until the sender is dropped
            for (time, timestamp, vals) in rx {
                csv_row(&mut stringbuf, time, timestamp, &vals);
                writer
                    .write_all(stringbuf.as_bytes())
                    .map_err(|e| format!("Failed to write CSV row: {e}"))?;
                if flush_each_row {
                    writer
                        .flush()
                        .map_err(|e| format!("Failed to flush CSV file: {e}"))?;
                }
                rows += 1;
            }

            writer
                .flush()
                .map_err(|e| format!("Failed to flush CSV file: {e}"))?;
            Ok(rows)
        });

        Ok(Self { tx, path, thread })
    }

    /// Close the channel and wait for the worker to drain it
    fn finish(self) -> Result<(), String> {
        let Self { tx, path, thread } = self;
        drop(tx);
        let rows = thread
            .join()
            .map_err(|_| "CSV worker panicked".to_string())??;
        info!("Wrote {rows} rows to {}", path.display());
        Ok(())
    }
}
