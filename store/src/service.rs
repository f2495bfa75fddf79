use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::models::Record;
use crate::store::SharedState;

// -------------------------------------------
// Simulated latency
// -------------------------------------------

/// Delay in milliseconds applied before each operation resolves.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct OpLatency {
    pub get_all_ms: u64,
    pub get_by_id_ms: u64,
    pub create_ms: u64,
    pub update_ms: u64,
    pub delete_ms: u64,
}

impl OpLatency {
    pub const NONE: OpLatency = OpLatency {
        get_all_ms: 0,
        get_by_id_ms: 0,
        create_ms: 0,
        update_ms: 0,
        delete_ms: 0,
    };

    pub const FILES: OpLatency = OpLatency {
        get_all_ms: 300,
        get_by_id_ms: 200,
        create_ms: 400,
        update_ms: 300,
        delete_ms: 250,
    };

    pub const FOLDERS: OpLatency = OpLatency {
        get_all_ms: 250,
        get_by_id_ms: 200,
        create_ms: 300,
        update_ms: 300,
        delete_ms: 250,
    };

    pub const UPLOADS: OpLatency = OpLatency {
        get_all_ms: 200,
        get_by_id_ms: 150,
        create_ms: 300,
        update_ms: 200,
        delete_ms: 200,
    };

    pub fn scaled(self, factor: f64) -> Self {
        let f = factor.max(0.0);
        let s = |ms: u64| (ms as f64 * f).round() as u64;
        OpLatency {
            get_all_ms: s(self.get_all_ms),
            get_by_id_ms: s(self.get_by_id_ms),
            create_ms: s(self.create_ms),
            update_ms: s(self.update_ms),
            delete_ms: s(self.delete_ms),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct LatencyConfig {
    pub files: OpLatency,
    pub folders: OpLatency,
    pub uploads: OpLatency,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        LatencyConfig {
            files: OpLatency::FILES,
            folders: OpLatency::FOLDERS,
            uploads: OpLatency::UPLOADS,
        }
    }
}

impl LatencyConfig {
    pub fn none() -> Self {
        LatencyConfig {
            files: OpLatency::NONE,
            folders: OpLatency::NONE,
            uploads: OpLatency::NONE,
        }
    }

    pub fn scaled(self, factor: f64) -> Self {
        LatencyConfig {
            files: self.files.scaled(factor),
            folders: self.folders.scaled(factor),
            uploads: self.uploads.scaled(factor),
        }
    }
}

async fn simulate(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

// -------------------------------------------
// CRUD over one collection
// -------------------------------------------

/// Async CRUD over the collection selected by `R`. Every call sleeps for
/// its configured latency before touching the store; the lock is taken
/// only after the sleep.
#[derive(Debug)]
pub struct RecordService<R> {
    state: SharedState,
    latency: OpLatency,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for RecordService<R> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            latency: self.latency,
            _record: PhantomData,
        }
    }
}

impl<R: Record> RecordService<R> {
    pub fn new(state: SharedState, latency: OpLatency) -> Self {
        Self {
            state,
            latency,
            _record: PhantomData,
        }
    }

    /// Snapshot of every record, in insertion order.
    pub async fn get_all(&self) -> Vec<R> {
        simulate(self.latency.get_all_ms).await;
        let mut st = self.state.lock().await;
        let rows = R::rows(&mut st);
        debug!("{}: get_all -> {} rows", R::KIND, rows.len());
        rows.clone()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<R> {
        simulate(self.latency.get_by_id_ms).await;
        let mut st = self.state.lock().await;
        R::rows(&mut st)
            .iter()
            .find(|r| r.id() == id)
            .cloned()
            .ok_or_else(|| missing::<R>(id))
    }

    /// Append a new record with a fresh id and creation timestamp.
    pub async fn create(&self, draft: R::Draft) -> Result<R> {
        simulate(self.latency.create_ms).await;
        R::check(&draft)?;

        let mut st = self.state.lock().await;
        let rows = R::rows(&mut st);
        let id = next_id(rows);
        let rec = R::from_draft(id, Utc::now(), draft);
        rows.push(rec.clone());

        debug!("{}: created {}", R::KIND, rec.id());
        Ok(rec)
    }

    pub async fn update(&self, id: &str, patch: R::Patch) -> Result<R> {
        simulate(self.latency.update_ms).await;
        let mut st = self.state.lock().await;
        let rec = R::rows(&mut st)
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| missing::<R>(id))?;
        rec.apply(patch);

        debug!("{}: updated {}", R::KIND, id);
        Ok(rec.clone())
    }

    pub async fn delete(&self, id: &str) -> Result<R> {
        simulate(self.latency.delete_ms).await;
        let mut st = self.state.lock().await;
        let rows = R::rows(&mut st);
        let pos = rows
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| missing::<R>(id))?;

        debug!("{}: deleted {}", R::KIND, id);
        Ok(rows.remove(pos))
    }
}

fn missing<R: Record>(id: &str) -> StoreError {
    warn!("{} not found: {}", R::KIND, id);
    StoreError::not_found(R::KIND, id)
}

// Millisecond timestamp plus a random suffix, redrawn until no row in the
// collection carries it.
fn next_id<R: Record>(rows: &[R]) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!(
            "{}{:04}",
            Utc::now().timestamp_millis(),
            rng.gen_range(0..10_000)
        );
        if !rows.iter().any(|r| r.id() == candidate) {
            return candidate;
        }
    }
}
