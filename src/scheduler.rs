use std::time::Duration;

use anyhow::Result;
use tokio::time::{Instant, sleep_until};

/// Runs a job a fixed number of times, one after another, starting each run
/// on an interval tick. A run that takes longer than the interval delays the
/// next one instead of overlapping it.
pub struct Scheduler {
    interval: Duration,
    runs: u32,
}

impl Scheduler {
    pub fn new(interval_ms: u64, runs: u32) -> Result<Self> {
        if runs == 0 {
            return Err(anyhow::anyhow!("repeat count must be at least 1"));
        }
        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            runs,
        })
    }

    /// job: async closure for each tick, given the zero-based run index
    pub async fn run<J, F>(&self, mut job: J)
    where
        J: FnMut(u32) -> F,
        F: std::future::Future<Output = ()>,
    {
        let mut next = Instant::now();
        for run in 0..self.runs {
            next += self.interval;
            job(run).await;
            if run + 1 < self.runs {
                sleep_until(next).await;
            }
        }
    }
}
