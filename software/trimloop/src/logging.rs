//! Terminal logging plus one log file per run at `<op_dir>/logs/<op_name>.log`.
//!
//! The global subscriber is installed by the first run that asks for logging.
//! Each run then attaches its own file for as long as its [`RunLog`] lives;
//! between runs, file output is discarded and only the terminal sees events.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::{self, MakeWriter, time::ChronoUtc, writer::EitherWriter};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::driver::RunCtx;
use crate::error::{EcuError, EcuResult};

struct AttachedFile {
    path: PathBuf,
    writer: NonBlocking,
    _guard: WorkerGuard,
}

/// Hands the fmt layer a writer for whichever run file is attached
#[derive(Clone, Default)]
struct RunFileWriter {
    attached: Arc<Mutex<Option<AttachedFile>>>,
}

impl<'a> MakeWriter<'a> for RunFileWriter {
    type Writer = EitherWriter<NonBlocking, io::Sink>;

    fn make_writer(&'a self) -> Self::Writer {
        match self.attached.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(file) => EitherWriter::A(file.writer.clone()),
                None => EitherWriter::B(io::sink()),
            },
            Err(_) => EitherWriter::B(io::sink()),
        }
    }
}

struct Sinks {
    _terminal: WorkerGuard,
    run_file: RunFileWriter,
}

static SINKS: OnceLock<Sinks> = OnceLock::new();

fn install() -> EcuResult<&'static Sinks> {
    if let Some(sinks) = SINKS.get() {
        return Ok(sinks);
    }

    let (terminal_writer, terminal_guard) = tracing_appender::non_blocking(io::stdout());
    let run_file = RunFileWriter::default();

    // RUST_LOG, or info
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| EcuError::Logging(format!("bad log filter: {e}")))?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(terminal_writer)
                .with_target(false),
        )
        .with(
            fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(run_file.clone())
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| EcuError::Logging(format!("failed to install subscriber: {e}")))?;

    Ok(SINKS.get_or_init(|| Sinks {
        _terminal: terminal_guard,
        run_file,
    }))
}

/// The log file of one run. Dropping it flushes and detaches the file.
pub struct RunLog {
    path: PathBuf,
    run_file: &'static RunFileWriter,
}

impl RunLog {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.run_file.attached.lock() {
            // A later run may already have attached its own file
            if slot.as_ref().is_some_and(|f| f.path == self.path) {
                *slot = None;
            }
        }
    }
}

/// Start logging for the run described by `ctx`.
///
/// Appends to an existing file of the same op name.
pub fn init_logging(ctx: &RunCtx) -> EcuResult<RunLog> {
    let log_dir = ctx.op_dir.join("logs");
    fs::create_dir_all(&log_dir)?;
    let path = log_dir.join(format!("{}.log", ctx.op_name));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let sinks = install()?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let mut slot = sinks
        .run_file
        .attached
        .lock()
        .map_err(|_| EcuError::Logging("run log lock poisoned".to_owned()))?;
    *slot = Some(AttachedFile {
        path: path.clone(),
        writer,
        _guard: guard,
    });

    Ok(RunLog {
        path,
        run_file: &sinks.run_file,
    })
}
