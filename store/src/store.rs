use std::sync::Arc;
use tokio::sync::Mutex;

use crate::fixtures::Fixtures;
use crate::models::{FileRecord, FolderRecord, UploadRecord};
use crate::service::{LatencyConfig, RecordService};
use crate::{FileService, FolderService, UploadService};

/// Mutable collections owned by one store.
#[derive(Debug, Default)]
pub struct StoreState {
    pub files: Vec<FileRecord>,
    pub folders: Vec<FolderRecord>,
    pub uploads: Vec<UploadRecord>,
}

impl From<Fixtures> for StoreState {
    fn from(f: Fixtures) -> Self {
        StoreState {
            files: f.files,
            folders: f.folders,
            uploads: f.uploads,
        }
    }
}

pub type SharedState = Arc<Mutex<StoreState>>;

/// In-memory store seeded once from fixtures. Nothing is written back;
/// dropping the store discards every change.
#[derive(Debug, Clone)]
pub struct Store {
    state: SharedState,
    latency: LatencyConfig,
}

impl Store {
    pub fn new(fixtures: Fixtures, latency: LatencyConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(fixtures.into())),
            latency,
        }
    }

    /// Empty store without simulated latency.
    pub fn empty() -> Self {
        Self::new(Fixtures::default(), LatencyConfig::none())
    }

    pub fn latency(&self) -> &LatencyConfig {
        &self.latency
    }

    pub fn files(&self) -> FileService {
        RecordService::new(self.state.clone(), self.latency.files)
    }

    pub fn folders(&self) -> FolderService {
        RecordService::new(self.state.clone(), self.latency.folders)
    }

    pub fn uploads(&self) -> UploadService {
        RecordService::new(self.state.clone(), self.latency.uploads)
    }
}
