use chrono::Utc;
use dropzone_store::{FileRecord, FileService, NewFile, StoreError};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::display::{guess_mime, FileKind};
use crate::ticker::{ProgressTicker, SimulationConfig};

// -----------------------------------------------------------------------------
// Data Structures
// -----------------------------------------------------------------------------

/// Metadata of a file handed to the uploader. Contents are never read.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    /// Describe a local file from its metadata and extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self::new(name, meta.len(), guess_mime(path)))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Uploading,
    Completed,
    Error,
}

/// One row on the upload board.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UploadTask {
    pub id: String,
    pub source: SourceFile,
    pub progress: f64,
    pub status: TaskStatus,
    pub speed: f64,
}

/// What the uploader reports while it works.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Queued { task_id: String, name: String },
    Progress { task_id: String, progress: f64, speed: f64 },
    Completed { task_id: String, record: FileRecord },
    Failed { task_id: String, name: String, reason: String },
    Purged { removed: usize },
}

#[derive(Debug)]
pub struct FailedUpload {
    pub task_id: String,
    pub name: String,
    pub error: StoreError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub created: Vec<FileRecord>,
    pub failed: Vec<FailedUpload>,
}

// -----------------------------------------------------------------------------
// Upload board
// -----------------------------------------------------------------------------

/// The visible list of upload tasks, shared between the uploader and
/// whoever renders it.
#[derive(Debug, Clone, Default)]
pub struct UploadBoard {
    tasks: Arc<Mutex<Vec<UploadTask>>>,
}

impl UploadBoard {
    fn lock(&self) -> MutexGuard<'_, Vec<UploadTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<UploadTask> {
        self.lock().clone()
    }

    pub fn get(&self, task_id: &str) -> Option<UploadTask> {
        self.lock().iter().find(|t| t.id == task_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Tasks still transferring.
    pub fn in_flight(&self) -> usize {
        self.lock()
            .iter()
            .filter(|t| t.status == TaskStatus::Uploading)
            .count()
    }

    /// Remove one task. A transfer still running for it keeps going; its
    /// later updates are dropped.
    pub fn dismiss(&self, task_id: &str) -> bool {
        let mut tasks = self.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        tasks.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, task: UploadTask) {
        self.lock().push(task);
    }

    fn update<F: FnOnce(&mut UploadTask)>(&self, task_id: &str, f: F) -> bool {
        match self.lock().iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                f(task);
                true
            }
            None => false,
        }
    }

    fn purge_completed(&self) -> usize {
        let mut tasks = self.lock();
        let before = tasks.len();
        tasks.retain(|t| t.status != TaskStatus::Completed);
        before - tasks.len()
    }
}

// -----------------------------------------------------------------------------
// Uploader
// -----------------------------------------------------------------------------

/// Runs simulated uploads one file at a time and records each finished
/// file through the file service.
pub struct Uploader {
    files: FileService,
    board: UploadBoard,
    config: SimulationConfig,
    rng: Box<dyn RngCore + Send>,
    events: Option<UnboundedSender<UploadEvent>>,
    seq: u64,
}

impl Uploader {
    /// Fails when `config` does not pass [`SimulationConfig::validate`].
    pub fn new(
        files: FileService,
        config: SimulationConfig,
        rng: Box<dyn RngCore + Send>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            files,
            board: UploadBoard::default(),
            config,
            rng,
            events: None,
            seq: 0,
        })
    }

    pub fn with_events(mut self, tx: UnboundedSender<UploadEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn board(&self) -> UploadBoard {
        self.board.clone()
    }

    /// Upload `sources` into `folder_id` (root when `None`).
    ///
    /// Every file gets a task on the board up front; transfers then run
    /// sequentially. After the last one settles the uploader waits the
    /// settle period, purges completed tasks and calls `on_settled`.
    /// Failed tasks stay on the board until dismissed.
    pub async fn upload_all<F>(
        &mut self,
        sources: Vec<SourceFile>,
        folder_id: Option<String>,
        on_settled: F,
    ) -> BatchReport
    where
        F: FnOnce() + Send,
    {
        let queued: Vec<(String, SourceFile)> = sources
            .into_iter()
            .map(|source| {
                let id = self.next_task_id();
                self.board.push(UploadTask {
                    id: id.clone(),
                    source: source.clone(),
                    progress: 0.0,
                    status: TaskStatus::Uploading,
                    speed: 0.0,
                });
                self.emit(UploadEvent::Queued {
                    task_id: id.clone(),
                    name: source.name.clone(),
                });
                (id, source)
            })
            .collect();

        let mut report = BatchReport::default();

        for (task_id, source) in queued {
            match self.transfer(&task_id, &source, folder_id.clone()).await {
                Ok(record) => {
                    self.board
                        .update(&task_id, |t| t.status = TaskStatus::Completed);
                    info!("{} uploaded successfully", source.name);
                    self.emit(UploadEvent::Completed {
                        task_id,
                        record: record.clone(),
                    });
                    report.created.push(record);
                }
                Err(error) => {
                    self.board.update(&task_id, |t| t.status = TaskStatus::Error);
                    warn!("Failed to upload {}: {}", source.name, error);
                    self.emit(UploadEvent::Failed {
                        task_id: task_id.clone(),
                        name: source.name.clone(),
                        reason: error.to_string(),
                    });
                    report.failed.push(FailedUpload {
                        task_id,
                        name: source.name,
                        error,
                    });
                }
            }
        }

        tokio::time::sleep(self.config.settle).await;
        let removed = self.board.purge_completed();
        debug!("purged {} settled uploads", removed);
        self.emit(UploadEvent::Purged { removed });
        on_settled();

        report
    }

    async fn transfer(
        &mut self,
        task_id: &str,
        source: &SourceFile,
        folder_id: Option<String>,
    ) -> dropzone_store::Result<FileRecord> {
        let mut ticker = ProgressTicker::from_config(&self.config);
        while let Some(tick) = ticker.tick(&mut *self.rng).await {
            self.board.update(task_id, |t| {
                t.progress = tick.progress;
                t.speed = tick.speed;
            });
            self.emit(UploadEvent::Progress {
                task_id: task_id.to_string(),
                progress: tick.progress,
                speed: tick.speed,
            });
        }

        let thumbnail =
            FileKind::is_image(&source.mime_type).then(|| format!("preview://{}", task_id));
        self.files
            .create(NewFile {
                name: source.name.clone(),
                size: source.size,
                mime_type: source.mime_type.clone(),
                folder_id,
                thumbnail,
                download_url: format!("#download-{}", task_id),
            })
            .await
    }

    fn next_task_id(&mut self) -> String {
        self.seq += 1;
        format!("{}-{}", Utc::now().timestamp_millis(), self.seq)
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            // nobody listening is fine
            let _ = tx.send(event);
        }
    }
}
