//! Keeps the most recent row available to another thread, e.g. a dashboard

use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::driver::RunCtx;

use super::{Dispatcher, Row, fmt_time, header_columns};

#[derive(Default)]
struct Shared {
    row: Row,
    channel_names: Vec<String>,
    rows_seen: u64,
}

/// Cloneable handle for reading the latest row and its column names
#[derive(Clone, Default)]
pub struct LatestValueHandle {
    inner: Arc<RwLock<Shared>>,
}

impl LatestValueHandle {
    /// Latest row, or an empty row if the lock was poisoned
    pub fn latest_row(&self) -> Row {
        self.inner
            .read()
            .map(|s| s.row.clone())
            .unwrap_or_default()
    }

    /// Latest value of one named channel
    pub fn get(&self, channel: &str) -> Option<f64> {
        let s = self.inner.read().ok()?;
        let i = s.channel_names.iter().position(|n| n == channel)?;
        s.row.channel_values.get(i).copied()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|s| s.channel_names.clone())
            .unwrap_or_default()
    }

    /// Header strings including timestamp/time and channel names
    pub fn headers(&self) -> Vec<String> {
        header_columns(&self.channel_names())
    }

    /// Rows consumed since the last init
    pub fn rows_seen(&self) -> u64 {
        self.inner.read().map(|s| s.rows_seen).unwrap_or(0)
    }
}

/// Dispatcher that always keeps the latest row available via a shared handle
#[derive(Serialize, Deserialize, Default)]
pub struct LatestValueDispatcher {
    #[serde(skip)]
    handle: LatestValueHandle,
}

impl LatestValueDispatcher {
    pub fn new() -> (Box<Self>, LatestValueHandle) {
        let handle = LatestValueHandle::default();
        (
            Box::new(Self {
                handle: handle.clone(),
            }),
            handle,
        )
    }
}

#[typetag::serde]
impl Dispatcher for LatestValueDispatcher {
    fn init(&mut self, _ctx: &RunCtx, channel_names: &[String]) -> Result<(), String> {
        let mut s = self
            .handle
            .inner
            .write()
            .map_err(|_| "Latest value lock poisoned".to_string())?;

        // Placeholder row with the right shape so readers can rely on it
        s.channel_names = channel_names.to_vec();
        s.row = Row {
            system_time: fmt_time(SystemTime::UNIX_EPOCH),
            timestamp: 0,
            channel_values: vec![f64::NAN; channel_names.len()],
        };
        s.rows_seen = 0;
        Ok(())
    }

    fn consume(
        &mut self,
        time: SystemTime,
        timestamp: i64,
        channel_values: Vec<f64>,
    ) -> Result<(), String> {
        let mut s = self
            .handle
            .inner
            .write()
            .map_err(|_| "Latest value lock poisoned".to_string())?;
        s.row = Row {
            system_time: fmt_time(time),
            timestamp,
            channel_values,
        };
        s.rows_seen += 1;
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_handle_sees_latest_row() {
        let (mut d, handle) = LatestValueDispatcher::new();
        let names = vec!["rpm".to_owned(), "knock_retard_deg".to_owned()];
        d.init(&RunCtx::default(), &names).unwrap();

        assert!(handle.get("rpm").unwrap().is_nan());
        assert_eq!(handle.headers().len(), 4);

        d.consume(SystemTime::now(), 1, vec![800.0, 0.0]).unwrap();
        d.consume(SystemTime::now(), 2, vec![850.0, -2.0]).unwrap();

        assert_eq!(handle.get("rpm"), Some(850.0));
        assert_eq!(handle.get("knock_retard_deg"), Some(-2.0));
        assert_eq!(handle.get("missing"), None);
        assert_eq!(handle.latest_row().timestamp, 2);
        assert_eq!(handle.rows_seen(), 2);
    }
}
