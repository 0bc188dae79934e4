//! Run loop pacing the cycle driver and fanning its output to dispatchers

use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span};

use trimloop_shared::{CycleOutcome, CycleReport};

use super::{Ecu, RunCtx};
use crate::dispatcher::Dispatcher;
use crate::error::{EcuError, EcuResult};
use crate::logging::init_logging;

/// Counts of cycle outcomes over one run
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub computed: u64,
    pub warmup: u64,
    pub skipped: u64,
    pub last_report: Option<CycleReport>,
}

impl RunSummary {
    fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        match report.outcome {
            CycleOutcome::Warmup => self.warmup += 1,
            CycleOutcome::Computed(_) => self.computed += 1,
            CycleOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// A cycle driver plus its data targets, run for a fixed duration at a fixed interval
#[derive(Serialize, Deserialize)]
pub struct Simulation {
    ctx: RunCtx,
    ecu: Ecu,
    dispatchers: BTreeMap<String, Box<dyn Dispatcher>>,
}

impl Simulation {
    pub fn new(ctx: RunCtx, ecu: Ecu) -> Self {
        Self {
            ctx,
            ecu,
            dispatchers: BTreeMap::new(),
        }
    }

    /// Register a data pipeline dispatcher
    pub fn add_dispatcher(&mut self, name: &str, dispatcher: Box<dyn Dispatcher>) {
        self.dispatchers.insert(name.to_owned(), dispatcher);
    }

    pub fn ctx(&self) -> &RunCtx {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut RunCtx {
        &mut self.ctx
    }

    pub fn ecu(&self) -> &Ecu {
        &self.ecu
    }

    /// Run every cycle of the configured duration.
    ///
    /// Dispatchers are always terminated, also when a cycle fails; the first
    /// error encountered is returned.
    pub fn run(&mut self) -> EcuResult<RunSummary> {
        // Held until the end of the run so the file sees every event
        let run_log = if self.ctx.logging {
            Some(init_logging(&self.ctx)?)
        } else {
            None
        };
        let _span = info_span!("run", op = %self.ctx.op_name).entered();
        if let Some(log) = &run_log {
            info!("Logging to {}", log.path().display());
        }

        info!("Initializing dispatchers");
        let channel_names = CycleReport::channel_names();
        for (name, dispatcher) in self.dispatchers.iter_mut() {
            dispatcher
                .init(&self.ctx, &channel_names)
                .map_err(|e| EcuError::Dispatch(format!("{name}: {e}")))?;
        }

        let n_cycles = self.ctx.n_cycles();
        info!(
            "Running {n_cycles} cycles at {} s intervals",
            self.ctx.interval_s
        );
        let result = self.run_cycles(n_cycles);

        info!("Terminating dispatchers");
        let mut terminated = Ok(());
        for (name, dispatcher) in self.dispatchers.iter_mut() {
            if let Err(e) = dispatcher.terminate() {
                error!("Failed to terminate dispatcher {name}: {e}");
                terminated = Err(EcuError::Dispatch(format!("{name}: {e}")));
            }
        }

        let summary = result?;
        terminated?;
        info!(
            "Run complete: {} cycles, {} computed, {} skipped",
            summary.cycles, summary.computed, summary.skipped
        );
        Ok(summary)
    }

    fn run_cycles(&mut self, n_cycles: u64) -> EcuResult<RunSummary> {
        let mut summary = RunSummary::default();
        let start_time = SystemTime::now();
        let start_instant = Instant::now();
        let mut channel_values = vec![0.0; CycleReport::N_CHANNELS];

        for i in 0..n_cycles {
            let t = i as f64 * self.ctx.interval_s;
            let target = Duration::from_secs_f64(t);

            if self.ctx.realtime {
                let elapsed = start_instant.elapsed();
                if target > elapsed {
                    std::thread::sleep(target - elapsed);
                }
            }

            let report = self.ecu.cycle(t)?;
            summary.record(&report);

            //    Send to dispatchers
            report.write_vals(&mut channel_values);
            let time = start_time + target;
            let timestamp = report.timestamp_ns();
            for (name, dispatcher) in self.dispatchers.iter_mut() {
                dispatcher
                    .consume(time, timestamp, channel_values.clone())
                    .map_err(|e| EcuError::Dispatch(format!("{name}: {e}")))?;
            }

            summary.last_report = Some(report);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::EcuConfig;
    use crate::dispatcher::{CsvDispatcher, LatestValueDispatcher};
    use crate::injection::{ConstantInjection, SpeedDensity};
    use crate::sensor::{ReplaySource, SimulatedEngine};
    use trimloop_shared::EngineSample;

    fn quiet_ctx(name: &str, duration_s: f64, interval_s: f64) -> RunCtx {
        RunCtx {
            interval_s,
            duration_s,
            logging: false,
            op_name: name.to_owned(),
            op_dir: std::env::temp_dir().join("trimloop_simulation_test"),
            ..Default::default()
        }
    }

    #[test]
    fn test_simulated_run_writes_one_row_per_cycle() {
        let config = EcuConfig::default();
        let ecu = Ecu::new(
            config,
            Box::new(SimulatedEngine::new(&config, Some(11))),
            Box::new(SpeedDensity::new(&config.engine).unwrap()),
        )
        .unwrap();

        let mut sim = Simulation::new(quiet_ctx("sim_rows", 5.0, 0.5), ecu);
        let (latest, handle) = LatestValueDispatcher::new();
        sim.add_dispatcher("csv", CsvDispatcher::new(false));
        sim.add_dispatcher("latest", latest);

        let summary = sim.run().unwrap();
        assert_eq!(summary.cycles, 10);
        assert_eq!(summary.warmup, 1);
        assert_eq!(summary.computed, 9);
        assert_eq!(handle.rows_seen(), 10);

        let fuel = handle.get("fuel_correction").unwrap();
        assert!((0.8..=1.2).contains(&fuel));
        assert!(handle.get("inj_ms").unwrap() > 1.0);

        let path = sim.ctx().op_dir.join("sim_rows.csv");
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 11);
        assert!(text.lines().next().unwrap().contains("knock_retard_deg"));
    }

    #[test]
    fn test_skipped_cycles_are_counted() {
        let samples = vec![
            EngineSample::new(0.0, 800.0, 1.0, 1.0),
            EngineSample::new(1.0, 700.0, 1.0, 1.0),
            EngineSample::new(1.0, 700.0, 1.0, 1.0),
            EngineSample::new(2.0, 800.0, 1.0, 1.0),
        ];
        let ecu = Ecu::new(
            EcuConfig::default(),
            Box::new(ReplaySource::new(samples)),
            Box::new(ConstantInjection::default()),
        )
        .unwrap();

        let mut sim = Simulation::new(quiet_ctx("skips", 4.0, 1.0), ecu);
        let summary = sim.run().unwrap();
        assert_eq!(
            (summary.warmup, summary.computed, summary.skipped),
            (1, 2, 1)
        );
        assert!(summary.last_report.unwrap().outcome.is_computed());
    }

    #[test]
    fn test_exhausted_source_still_terminates_dispatchers() {
        let ecu = Ecu::new(
            EcuConfig::default(),
            Box::new(ReplaySource::new([EngineSample::new(0.0, 800.0, 1.0, 1.0)])),
            Box::new(ConstantInjection::default()),
        )
        .unwrap();

        let mut sim = Simulation::new(quiet_ctx("exhausted", 3.0, 1.0), ecu);
        sim.add_dispatcher("csv", CsvDispatcher::new(true));
        assert!(matches!(sim.run(), Err(EcuError::Sensor(_))));

        // The row written before the failure is on disk
        let path = sim.ctx().op_dir.join("exhausted.csv");
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_ser_roundtrip() {
        let config = EcuConfig::default();
        let ecu = Ecu::new(
            config,
            Box::new(SimulatedEngine::new(&config, Some(2))),
            Box::new(ConstantInjection::default()),
        )
        .unwrap();
        let mut sim = Simulation::new(quiet_ctx("ser", 1.0, 0.1), ecu);
        sim.add_dispatcher("csv", CsvDispatcher::new(false));

        let serialized = serde_json::to_string(&sim).unwrap();
        let deserialized = serde_json::from_str::<Simulation>(&serialized).unwrap();
        let reserialized = serde_json::to_string(&deserialized).unwrap();
        assert_eq!(serialized, reserialized);
    }
}
