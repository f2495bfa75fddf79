//! Client-side state for DropZone: the simulated upload pipeline and the
//! folder explorer, both driving the record services of `dropzone-store`.

pub mod config;
pub mod display;
pub mod explorer;
pub mod ticker;
pub mod uploader;

pub use config::ClientConfig;
pub use explorer::{filter_listing, Explorer, Listing, UpOutcome, ViewMode};
pub use ticker::{ProgressTicker, SimulationConfig, Tick};
pub use uploader::{
    BatchReport, SourceFile, TaskStatus, UploadBoard, UploadEvent, UploadTask, Uploader,
};
