use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::models::{FileRecord, FolderRecord, UploadRecord};

const FILES_JSON: &str = include_str!("../fixtures/files.json");
const FOLDERS_JSON: &str = include_str!("../fixtures/folders.json");
const UPLOADS_JSON: &str = include_str!("../fixtures/uploads.json");

/// Seed data for a store: one ordered array per collection.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    pub files: Vec<FileRecord>,
    pub folders: Vec<FolderRecord>,
    pub uploads: Vec<UploadRecord>,
}

impl Fixtures {
    /// The fixtures compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Ok(Fixtures {
            files: parse("files.json", FILES_JSON)?,
            folders: parse("folders.json", FOLDERS_JSON)?,
            uploads: parse("uploads.json", UPLOADS_JSON)?,
        })
    }

    /// Load `files.json`, `folders.json` and `uploads.json` from `dir`.
    /// A file missing from the directory falls back to the built-in copy.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let fixtures = Fixtures {
            files: load_one(dir, "files.json", FILES_JSON)?,
            folders: load_one(dir, "folders.json", FOLDERS_JSON)?,
            uploads: load_one(dir, "uploads.json", UPLOADS_JSON)?,
        };
        info!(
            "loaded fixtures from {:?}: {} files, {} folders, {} uploads",
            dir,
            fixtures.files.len(),
            fixtures.folders.len(),
            fixtures.uploads.len()
        );
        Ok(fixtures)
    }
}

fn load_one<T: DeserializeOwned>(dir: &Path, name: &str, fallback: &str) -> Result<Vec<T>> {
    let path = dir.join(name);
    if !path.exists() {
        debug!("{:?} missing; using built-in {}", path, name);
        return parse(name, fallback);
    }
    let raw = std::fs::read_to_string(&path)?;
    parse(name, &raw)
}

fn parse<T: DeserializeOwned>(name: &str, raw: &str) -> Result<Vec<T>> {
    serde_json::from_str(raw).map_err(|source| StoreError::Fixture {
        name: name.to_string(),
        source,
    })
}
