use dropzone_store::{
    FileRecord, FileService, FolderRecord, FolderService, NewFolder, Result, StoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Grid => ViewMode::List,
            ViewMode::List => ViewMode::Grid,
        }
    }
}

/// Contents of one directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub folders: Vec<FolderRecord>,
    pub files: Vec<FileRecord>,
}

/// Where `navigate_up` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UpOutcome {
    Root,
    Parent(FolderRecord),
    /// The current folder names a parent that does not exist.
    OrphanedToRoot { missing_parent: String },
}

/// Select the direct children of `folder_id` (root when `None`).
///
/// Folder `file_count` is recomputed from `files`.
pub fn filter_listing(
    folder_id: Option<&str>,
    folders: &[FolderRecord],
    files: &[FileRecord],
) -> Listing {
    let folders = folders
        .iter()
        .filter(|f| f.parent_id.as_deref() == folder_id)
        .map(|f| FolderRecord {
            file_count: files
                .iter()
                .filter(|file| file.folder_id.as_deref() == Some(f.id.as_str()))
                .count() as u64,
            ..f.clone()
        })
        .collect();

    let files = files
        .iter()
        .filter(|f| f.folder_id.as_deref() == folder_id)
        .cloned()
        .collect();

    Listing { folders, files }
}

/// Navigation state over the folder tree: the current folder, its
/// listing and the view mode.
pub struct Explorer {
    files: FileService,
    folders: FolderService,
    current: Option<FolderRecord>,
    listing: Listing,
    known_folders: Vec<FolderRecord>,
    view: ViewMode,
    last_error: Option<String>,
    stale: Arc<AtomicBool>,
}

impl Explorer {
    pub fn new(files: FileService, folders: FolderService) -> Self {
        Self {
            files,
            folders,
            current: None,
            listing: Listing::default(),
            known_folders: Vec::new(),
            view: ViewMode::default(),
            last_error: None,
            stale: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn current_folder(&self) -> Option<&FolderRecord> {
        self.current.as_ref()
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|f| f.id.as_str())
    }

    /// Fetch both collections and filter them against the current folder.
    pub async fn load(&mut self) -> &Listing {
        let (folders, files) = tokio::join!(self.folders.get_all(), self.files.get_all());

        self.listing = filter_listing(self.current_id(), &folders, &files);
        self.known_folders = folders;
        self.stale.store(false, Ordering::SeqCst);

        debug!(
            "loaded {:?}: {} folders, {} files",
            self.current_id(),
            self.listing.folders.len(),
            self.listing.files.len()
        );
        &self.listing
    }

    /// Enter `folder`. Existence is not checked.
    pub async fn open_folder(&mut self, folder: FolderRecord) -> &Listing {
        self.current = Some(folder);
        self.load().await
    }

    pub async fn go_home(&mut self) -> &Listing {
        self.current = None;
        self.load().await
    }

    /// Move to the parent of the current folder and reload.
    ///
    /// The parent is taken from the last loaded folder set, else fetched
    /// by id. Only a parent that does not exist at all sends us to root.
    pub async fn navigate_up(&mut self) -> Result<UpOutcome> {
        let parent_id = match self.current.as_ref().and_then(|f| f.parent_id.clone()) {
            Some(id) => id,
            None => {
                self.go_home().await;
                return Ok(UpOutcome::Root);
            }
        };

        let known = self
            .known_folders
            .iter()
            .find(|f| f.id == parent_id)
            .cloned();

        let parent = match known {
            Some(f) => Some(f),
            None => match self.folders.get_by_id(&parent_id).await {
                Ok(f) => Some(f),
                Err(e) if e.is_not_found() => None,
                Err(e) => {
                    self.last_error = Some(e.to_string());
                    return Err(e);
                }
            },
        };

        match parent {
            Some(f) => {
                self.open_folder(f.clone()).await;
                Ok(UpOutcome::Parent(f))
            }
            None => {
                warn!("parent folder {} is missing; returning to root", parent_id);
                self.go_home().await;
                Ok(UpOutcome::OrphanedToRoot {
                    missing_parent: parent_id,
                })
            }
        }
    }

    /// Folders from root down to the current one, as far as the last
    /// loaded folder set can resolve them.
    pub fn breadcrumb(&self) -> Vec<FolderRecord> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = self.current.clone();

        while let Some(folder) = cursor {
            if !seen.insert(folder.id.clone()) {
                break;
            }
            cursor = folder
                .parent_id
                .as_deref()
                .and_then(|pid| self.known_folders.iter().find(|f| f.id == pid))
                .cloned();
            chain.push(folder);
        }

        chain.reverse();
        chain
    }

    pub fn toggle_view(&mut self) -> ViewMode {
        self.view = self.view.toggled();
        self.view
    }

    /// Create a folder inside the current one and reload.
    pub async fn create_folder(&mut self, name: &str) -> Result<FolderRecord> {
        let name = name.trim();
        if name.is_empty() {
            let err = StoreError::InvalidInput("folder name is empty".into());
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        let draft = NewFolder {
            name: name.to_string(),
            parent_id: self.current_id().map(String::from),
        };
        match self.folders.create(draft).await {
            Ok(folder) => {
                info!("Folder {} created", folder.name);
                self.last_error = None;
                self.load().await;
                Ok(folder)
            }
            Err(e) => {
                warn!("Failed to create folder {}: {}", name, e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Callback for the uploader: marks the listing as stale.
    pub fn refresh_hook(&self) -> impl FnOnce() + Send + 'static {
        let stale = self.stale.clone();
        move || stale.store(true, Ordering::SeqCst)
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Reload if a refresh hook fired since the last load.
    pub async fn reload_if_stale(&mut self) -> bool {
        if !self.is_stale() {
            return false;
        }
        self.load().await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticker::SimulationConfig;
    use crate::uploader::{SourceFile, Uploader};
    use dropzone_store::{FolderPatch, Fixtures, LatencyConfig, NewFile, Store};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn explorer(store: &Store) -> Explorer {
        Explorer::new(store.files(), store.folders())
    }

    async fn folder(store: &Store, name: &str, parent: Option<&str>) -> FolderRecord {
        store
            .folders()
            .create(NewFolder {
                name: name.into(),
                parent_id: parent.map(String::from),
            })
            .await
            .unwrap()
    }

    async fn file(store: &Store, name: &str, folder_id: Option<&str>) -> FileRecord {
        store
            .files()
            .create(NewFile {
                name: name.into(),
                size: 1,
                mime_type: "text/plain".into(),
                folder_id: folder_id.map(String::from),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn docs_folder_lists_only_its_file() {
        let store = Store::empty();
        let docs = folder(&store, "Docs", None).await;
        let a = file(&store, "a.txt", Some(&docs.id)).await;

        let mut ex = explorer(&store);
        let listing = ex.open_folder(docs).await;
        assert_eq!(listing.files, vec![a]);
        assert!(listing.folders.is_empty());
    }

    #[tokio::test]
    async fn listing_matches_exact_subset() {
        let store = Store::new(Fixtures::builtin().unwrap(), LatencyConfig::none());
        let all_files = store.files().get_all().await;
        let all_folders = store.folders().get_all().await;

        let mut ex = explorer(&store);
        let root = ex.load().await.clone();
        assert_eq!(
            root.files,
            all_files
                .iter()
                .filter(|f| f.folder_id.is_none())
                .cloned()
                .collect::<Vec<_>>()
        );

        for f in &all_folders {
            let listing = ex.open_folder(f.clone()).await;
            let want: Vec<&str> = all_files
                .iter()
                .filter(|x| x.folder_id.as_deref() == Some(f.id.as_str()))
                .map(|x| x.id.as_str())
                .collect();
            let got: Vec<&str> = listing.files.iter().map(|x| x.id.as_str()).collect();
            assert_eq!(got, want);

            let sub: Vec<&str> = listing.folders.iter().map(|x| x.id.as_str()).collect();
            let want_sub: Vec<&str> = all_folders
                .iter()
                .filter(|x| x.parent_id.as_deref() == Some(f.id.as_str()))
                .map(|x| x.id.as_str())
                .collect();
            assert_eq!(sub, want_sub);
        }
    }

    #[tokio::test]
    async fn file_counts_are_computed() {
        let store = Store::empty();
        let docs = folder(&store, "Docs", None).await;
        file(&store, "a.txt", Some(&docs.id)).await;
        file(&store, "b.txt", Some(&docs.id)).await;
        file(&store, "c.txt", None).await;

        let mut ex = explorer(&store);
        let listing = ex.load().await;
        assert_eq!(listing.folders[0].file_count, 2);
        assert_eq!(listing.files.len(), 1);
    }

    #[tokio::test]
    async fn navigate_up_walks_to_parent_then_root() {
        let store = Store::empty();
        let docs = folder(&store, "Docs", None).await;
        let inner = folder(&store, "Inner", Some(&docs.id)).await;

        let mut ex = explorer(&store);
        ex.load().await;
        ex.open_folder(docs.clone()).await;
        ex.open_folder(inner.clone()).await;
        assert_eq!(
            ex.breadcrumb().iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["Docs", "Inner"]
        );

        assert_eq!(ex.navigate_up().await.unwrap(), UpOutcome::Parent(docs.clone()));
        assert_eq!(ex.current_folder(), Some(&docs));
        assert_eq!(ex.listing().folders.len(), 1);

        assert_eq!(ex.navigate_up().await.unwrap(), UpOutcome::Root);
        assert_eq!(ex.current_folder(), None);
    }

    #[tokio::test]
    async fn go_home_jumps_to_root_from_any_depth() {
        let store = Store::empty();
        let docs = folder(&store, "Docs", None).await;
        let inner = folder(&store, "Inner", Some(&docs.id)).await;
        let top = file(&store, "top.txt", None).await;
        file(&store, "deep.txt", Some(&inner.id)).await;

        let mut ex = explorer(&store);
        ex.open_folder(inner).await;
        assert_eq!(ex.breadcrumb().len(), 2);

        let listing = ex.go_home().await;
        assert_eq!(listing.files, vec![top]);
        assert_eq!(listing.folders.len(), 1);
        assert_eq!(listing.folders[0].id, docs.id);
        assert_eq!(ex.current_folder(), None);
        assert!(ex.breadcrumb().is_empty());
    }

    #[tokio::test]
    async fn navigate_up_fetches_parent_not_yet_loaded() {
        let store = Store::empty();
        let mut ex = explorer(&store);
        ex.load().await;

        // parent created after the last load
        let top = folder(&store, "Top", None).await;
        let child = FolderRecord {
            id: "detached".into(),
            name: "Child".into(),
            parent_id: Some(top.id.clone()),
            file_count: 0,
            created_date: top.created_date,
        };
        ex.current = Some(child);

        assert_eq!(ex.navigate_up().await.unwrap(), UpOutcome::Parent(top));
    }

    #[tokio::test]
    async fn navigate_up_with_missing_parent_is_flagged() {
        let store = Store::empty();
        let docs = folder(&store, "Docs", None).await;
        let inner = folder(&store, "Inner", Some(&docs.id)).await;
        store.folders().delete(&docs.id).await.unwrap();

        let mut ex = explorer(&store);
        ex.open_folder(inner).await;
        let out = ex.navigate_up().await.unwrap();
        assert_eq!(
            out,
            UpOutcome::OrphanedToRoot {
                missing_parent: docs.id
            }
        );
        assert_eq!(ex.current_folder(), None);
    }

    #[tokio::test]
    async fn breadcrumb_stops_on_cycles() {
        let store = Store::empty();
        let a = folder(&store, "A", None).await;
        let b = folder(&store, "B", Some(&a.id)).await;
        store
            .folders()
            .update(
                &a.id,
                FolderPatch {
                    parent_id: Some(Some(b.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut ex = explorer(&store);
        ex.open_folder(b).await;
        assert_eq!(ex.breadcrumb().len(), 2);
    }

    #[tokio::test]
    async fn create_folder_in_current_and_reject_blank() {
        let store = Store::empty();
        let docs = folder(&store, "Docs", None).await;
        let mut ex = explorer(&store);
        ex.open_folder(docs.clone()).await;

        let err = ex.create_folder("   ").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
        assert!(ex.last_error().is_some());

        let made = ex.create_folder("  Reports ").await.unwrap();
        assert_eq!(made.name, "Reports");
        assert_eq!(made.parent_id.as_deref(), Some(docs.id.as_str()));
        assert_eq!(ex.listing().folders, vec![made]);
        assert!(ex.last_error().is_none());
    }

    #[test]
    fn view_mode_toggles() {
        let store = Store::empty();
        let mut ex = explorer(&store);
        assert_eq!(ex.view_mode(), ViewMode::Grid);
        assert_eq!(ex.toggle_view(), ViewMode::List);
        assert_eq!(ex.toggle_view(), ViewMode::Grid);
    }

    #[tokio::test(start_paused = true)]
    async fn upload_into_current_folder_then_refresh() {
        let store = Store::new(Fixtures::default(), LatencyConfig::default());
        let docs = folder(&store, "Docs", None).await;

        let mut ex = explorer(&store);
        ex.open_folder(docs.clone()).await;
        assert!(ex.listing().files.is_empty());

        let mut up = Uploader::new(
            store.files(),
            SimulationConfig::default(),
            Box::new(StdRng::seed_from_u64(21)),
        )
        .unwrap();
        up.upload_all(
            vec![SourceFile::new("a.txt", 3, "text/plain")],
            ex.current_folder().map(|f| f.id.clone()),
            ex.refresh_hook(),
        )
        .await;

        assert!(ex.is_stale());
        assert!(ex.reload_if_stale().await);
        assert!(!ex.reload_if_stale().await);
        assert_eq!(ex.listing().files.len(), 1);
        assert_eq!(ex.listing().files[0].name, "a.txt");
    }
}
