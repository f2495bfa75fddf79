use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, StoreError};
use crate::store::StoreState;

// -------------------------------------------
// Record plumbing shared by every collection
// -------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    File,
    Folder,
    Upload,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::File => "file",
            RecordKind::Folder => "folder",
            RecordKind::Upload => "upload",
        };
        f.write_str(s)
    }
}

/// A row in one of the store's collections.
///
/// `Draft` is what callers hand to `create`; `Patch` lists exactly the
/// fields `update` is allowed to touch. Ids and creation timestamps are
/// assigned by the store and never appear in either.
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: RecordKind;

    type Draft: Send;
    type Patch: Send;

    fn id(&self) -> &str;

    /// The collection this record lives in.
    fn rows(state: &mut StoreState) -> &mut Vec<Self>;

    fn check(_draft: &Self::Draft) -> Result<()> {
        Ok(())
    }

    fn from_draft(id: String, now: DateTime<Utc>, draft: Self::Draft) -> Self;

    fn apply(&mut self, patch: Self::Patch);
}

fn require_name(kind: RecordKind, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{} name is empty", kind)));
    }
    Ok(())
}

// -------------------------------------------
// Files
// -------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub download_url: String,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub folder_id: Option<String>,
    pub thumbnail: Option<String>,
    pub download_url: String,
}

/// Partial update for a file. `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub name: Option<String>,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
    pub folder_id: Option<Option<String>>,
    pub thumbnail: Option<Option<String>>,
    pub download_url: Option<String>,
}

impl Record for FileRecord {
    const KIND: RecordKind = RecordKind::File;

    type Draft = NewFile;
    type Patch = FilePatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn rows(state: &mut StoreState) -> &mut Vec<Self> {
        &mut state.files
    }

    fn check(draft: &NewFile) -> Result<()> {
        require_name(Self::KIND, &draft.name)
    }

    fn from_draft(id: String, now: DateTime<Utc>, draft: NewFile) -> Self {
        FileRecord {
            id,
            name: draft.name,
            size: draft.size,
            mime_type: draft.mime_type,
            folder_id: draft.folder_id,
            thumbnail: draft.thumbnail,
            download_url: draft.download_url,
            upload_date: now,
        }
    }

    fn apply(&mut self, patch: FilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(mime_type) = patch.mime_type {
            self.mime_type = mime_type;
        }
        if let Some(folder_id) = patch.folder_id {
            self.folder_id = folder_id;
        }
        if let Some(thumbnail) = patch.thumbnail {
            self.thumbnail = thumbnail;
        }
        if let Some(url) = patch.download_url {
            self.download_url = url;
        }
    }
}

// -------------------------------------------
// Folders
// -------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Stored value is not maintained by any write path; listings
    /// recompute it from the file collection.
    #[serde(default)]
    pub file_count: u64,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewFolder {
    pub name: String,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FolderPatch {
    pub name: Option<String>,
    pub parent_id: Option<Option<String>>,
}

impl Record for FolderRecord {
    const KIND: RecordKind = RecordKind::Folder;

    type Draft = NewFolder;
    type Patch = FolderPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn rows(state: &mut StoreState) -> &mut Vec<Self> {
        &mut state.folders
    }

    fn check(draft: &NewFolder) -> Result<()> {
        require_name(Self::KIND, &draft.name)
    }

    fn from_draft(id: String, now: DateTime<Utc>, draft: NewFolder) -> Self {
        FolderRecord {
            id,
            name: draft.name,
            parent_id: draft.parent_id,
            file_count: 0,
            created_date: now,
        }
    }

    fn apply(&mut self, patch: FolderPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = parent_id;
        }
    }
}

// -------------------------------------------
// Upload history
// -------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Pending,
    Uploading,
    Completed,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub status: UploadState,
    pub progress: f64,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUpload {
    pub file_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct UploadPatch {
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub status: Option<UploadState>,
    pub progress: Option<f64>,
}

impl Record for UploadRecord {
    const KIND: RecordKind = RecordKind::Upload;

    type Draft = NewUpload;
    type Patch = UploadPatch;

    fn id(&self) -> &str {
        &self.id
    }

    fn rows(state: &mut StoreState) -> &mut Vec<Self> {
        &mut state.uploads
    }

    // New uploads always start pending at zero.
    fn from_draft(id: String, now: DateTime<Utc>, draft: NewUpload) -> Self {
        UploadRecord {
            id,
            file_name: draft.file_name,
            file_size: draft.file_size,
            status: UploadState::Pending,
            progress: 0.0,
            start_time: now,
        }
    }

    fn apply(&mut self, patch: UploadPatch) {
        if let Some(name) = patch.file_name {
            self.file_name = name;
        }
        if let Some(size) = patch.file_size {
            self.file_size = size;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress.clamp(0.0, 100.0);
        }
    }
}
