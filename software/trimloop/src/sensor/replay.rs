//! Replays a fixed sequence of samples

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use trimloop_shared::EngineSample;

use super::SensorSource;

/// Yields stored samples in order, keeping their own timestamps.
/// Reading past the end is an error.
#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct ReplaySource {
    samples: VecDeque<EngineSample>,
}

impl ReplaySource {
    pub fn new(samples: impl IntoIterator<Item = EngineSample>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

#[typetag::serde]
impl SensorSource for ReplaySource {
    fn read(&mut self, t_s: f64) -> Result<EngineSample, String> {
        self.samples
            .pop_front()
            .ok_or_else(|| format!("Replay source exhausted at t = {t_s} s"))
    }
}
