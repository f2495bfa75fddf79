//! In-memory record store for DropZone.
//!
//! Three collections (files, folders, upload history) are seeded from JSON
//! fixtures and served through async CRUD services that pad every call with
//! a simulated network delay. Nothing is persisted.

pub mod error;
pub mod fixtures;
pub mod models;
pub mod service;
pub mod store;

pub use error::{Result, StoreError};
pub use fixtures::Fixtures;
pub use models::{
    FilePatch, FileRecord, FolderPatch, FolderRecord, NewFile, NewFolder, NewUpload, Record,
    RecordKind, UploadPatch, UploadRecord, UploadState,
};
pub use service::{LatencyConfig, OpLatency, RecordService};
pub use store::{SharedState, Store, StoreState};

pub type FileService = RecordService<FileRecord>;
pub type FolderService = RecordService<FolderRecord>;
pub type UploadService = RecordService<UploadRecord>;
