use dropzone_client::display::{format_size, FileKind};
use dropzone_client::{ClientConfig, Explorer, SourceFile, UploadEvent, Uploader};
use dropzone_store::Store;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info, warn};
use tracing_subscriber::FmtSubscriber;

// -----------------------------------------------------------------------------
// Main entry
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ClientConfig::from_env()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cfg.level()?)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store = Store::new(cfg.fixtures()?, cfg.latency());
    let mut explorer = Explorer::new(store.files(), store.folders());

    explorer.load().await;
    show(&explorer);

    let sources: Vec<SourceFile> = cfg
        .uploads
        .iter()
        .filter_map(|path| match SourceFile::from_path(path) {
            Ok(src) => Some(src),
            Err(e) => {
                warn!("skipping {:?}: {}", path, e);
                None
            }
        })
        .collect();

    if sources.is_empty() {
        info!("nothing to upload (set DROPZONE_UPLOADS to enqueue local files)");
        return Ok(());
    }

    let (tx, mut rx) = unbounded_channel();
    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                UploadEvent::Queued { name, .. } => info!("queued {}", name),
                UploadEvent::Progress {
                    task_id,
                    progress,
                    speed,
                } => debug!("[{}] {:.0}% at {:.1} MB/s", task_id, progress, speed),
                UploadEvent::Completed { record, .. } => {
                    info!("stored {} as {}", record.name, record.id)
                }
                UploadEvent::Failed { name, reason, .. } => warn!("{} failed: {}", name, reason),
                UploadEvent::Purged { removed } => debug!("cleared {} finished uploads", removed),
            }
        }
    });

    let mut uploader =
        Uploader::new(store.files(), cfg.simulation(), cfg.rng())?.with_events(tx);
    let target = explorer.current_folder().map(|f| f.id.clone());
    let report = uploader
        .upload_all(sources, target, explorer.refresh_hook())
        .await;
    drop(uploader);
    reporter.await?;

    info!(
        "batch finished: {} stored, {} failed",
        report.created.len(),
        report.failed.len()
    );

    explorer.reload_if_stale().await;
    show(&explorer);

    Ok(())
}

fn show(explorer: &Explorer) {
    let here = explorer
        .breadcrumb()
        .iter()
        .map(|f| f.name.clone())
        .collect::<Vec<_>>()
        .join(" / ");
    info!("/{} ({:?} view)", here, explorer.view_mode());

    let listing = explorer.listing();
    for folder in &listing.folders {
        info!("  [dir]  {}  ({} files)", folder.name, folder.file_count);
    }
    for file in &listing.files {
        info!(
            "  [{:?}]  {}  {}",
            FileKind::from_mime(&file.mime_type),
            file.name,
            format_size(file.size)
        );
    }
}
