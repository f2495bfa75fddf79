use anyhow::{anyhow, bail, Context, Result};
use dropzone_store::{Fixtures, LatencyConfig};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use crate::ticker::SimulationConfig;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClientConfig {
    /// Directory holding `files.json` / `folders.json` / `uploads.json`.
    pub fixtures_dir: Option<PathBuf>,
    /// Multiplier applied to every simulated service delay; 0 disables them.
    pub latency_scale: f64,
    pub tick_ms: u64,
    pub max_increment: f64,
    pub settle_ms: u64,
    /// Fixed seed for progress and speed samples; entropy when unset.
    pub seed: Option<u64>,
    pub log_level: String,
    /// Local files enqueued by the demo session.
    pub uploads: Vec<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let sim = SimulationConfig::default();
        ClientConfig {
            fixtures_dir: None,
            latency_scale: 1.0,
            tick_ms: sim.tick.as_millis() as u64,
            max_increment: sim.max_increment,
            settle_ms: sim.settle.as_millis() as u64,
            seed: None,
            log_level: "info".to_string(),
            uploads: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `DROPZONE_*` variables served by `lookup`; unset keys keep
    /// their defaults, malformed ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ClientConfig::default();

        if let Some(dir) = lookup("DROPZONE_FIXTURES").filter(|v| !v.is_empty()) {
            cfg.fixtures_dir = Some(PathBuf::from(dir));
        }
        if let Some(v) = parsed(&lookup, "DROPZONE_LATENCY_SCALE")? {
            cfg.latency_scale = v;
        }
        if let Some(v) = parsed(&lookup, "DROPZONE_TICK_MS")? {
            cfg.tick_ms = v;
        }
        if let Some(v) = parsed(&lookup, "DROPZONE_MAX_INCREMENT")? {
            cfg.max_increment = v;
        }
        if let Some(v) = parsed(&lookup, "DROPZONE_SETTLE_MS")? {
            cfg.settle_ms = v;
        }
        cfg.seed = parsed(&lookup, "DROPZONE_SEED")?;
        if let Some(level) = lookup("DROPZONE_LOG") {
            cfg.log_level = level;
        }
        if let Some(list) = lookup("DROPZONE_UPLOADS") {
            cfg.uploads = list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.latency_scale >= 0.0) {
            bail!("latency scale must be >= 0, got {}", self.latency_scale);
        }
        self.simulation().validate()?;
        self.level()?;
        Ok(())
    }

    pub fn level(&self) -> Result<Level> {
        Level::from_str(&self.log_level)
            .map_err(|_| anyhow!("unknown log level {:?}", self.log_level))
    }

    pub fn latency(&self) -> LatencyConfig {
        LatencyConfig::default().scaled(self.latency_scale)
    }

    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            tick: Duration::from_millis(self.tick_ms),
            max_increment: self.max_increment,
            settle: Duration::from_millis(self.settle_ms),
        }
    }

    pub fn rng(&self) -> Box<dyn RngCore + Send> {
        match self.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        }
    }

    pub fn fixtures(&self) -> Result<Fixtures> {
        let fixtures = match &self.fixtures_dir {
            Some(dir) => Fixtures::load_dir(dir)
                .with_context(|| format!("loading fixtures from {:?}", dir))?,
            None => Fixtures::builtin()?,
        };
        Ok(fixtures)
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow!("{}: invalid value {:?}", key, raw)),
    }
}
