use anyhow::{bail, Result};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Accepted bounds for the random progress step, in percent. Below 1 a
/// transfer would crawl; above 100 the bound means nothing.
pub const INCREMENT_RANGE: RangeInclusive<f64> = 1.0..=100.0;

fn check_increment(max_increment: f64) -> Result<()> {
    // NaN and infinities fall outside the range too
    if !INCREMENT_RANGE.contains(&max_increment) {
        bail!(
            "max increment must be in [{}, {}], got {}",
            INCREMENT_RANGE.start(),
            INCREMENT_RANGE.end(),
            max_increment
        );
    }
    Ok(())
}

/// Timing knobs for the fake transfer.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub tick: Duration,
    /// Upper bound (exclusive) of the random progress step, in percent.
    pub max_increment: f64,
    /// How long settled tasks stay on the board before being purged.
    pub settle: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick: Duration::from_millis(100),
            max_increment: 15.0,
            settle: Duration::from_millis(3000),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        check_increment(self.max_increment)
    }
}

/// One progress sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub progress: f64,
    /// Cosmetic transfer rate in MB/s, one decimal.
    pub speed: f64,
}

/// Drives one fake transfer from 0 to 100 percent.
///
/// Each `tick` waits one interval and then advances by a random step.
/// Emitted progress never decreases and the last sample is exactly 100;
/// after that `tick` returns `None` without waiting.
#[derive(Debug)]
pub struct ProgressTicker {
    progress: f64,
    interval: Duration,
    max_increment: f64,
    done: bool,
}

impl ProgressTicker {
    /// Fails when `max_increment` lies outside [`INCREMENT_RANGE`].
    pub fn new(interval: Duration, max_increment: f64) -> Result<Self> {
        check_increment(max_increment)?;
        Ok(Self::unchecked(interval, max_increment))
    }

    /// For configs already accepted by [`SimulationConfig::validate`].
    pub(crate) fn from_config(config: &SimulationConfig) -> Self {
        Self::unchecked(config.tick, config.max_increment)
    }

    fn unchecked(interval: Duration, max_increment: f64) -> Self {
        Self {
            progress: 0.0,
            interval,
            max_increment,
            done: false,
        }
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub async fn tick<R: RngCore + ?Sized>(&mut self, rng: &mut R) -> Option<Tick> {
        if self.done {
            return None;
        }

        tokio::time::sleep(self.interval).await;

        let step = rng.gen_range(0.0..self.max_increment);
        self.progress = (self.progress + step).min(100.0);
        let speed = (rng.gen_range(1.0..6.0_f64) * 10.0).round() / 10.0;

        if self.progress >= 100.0 {
            self.done = true;
        }

        Some(Tick {
            progress: self.progress,
            speed,
        })
    }
}
