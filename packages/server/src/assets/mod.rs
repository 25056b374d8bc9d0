//! Business media asset manager.
//!
//! Keeps the object store and the catalog consistent while images are
//! uploaded, promoted, edited and deleted, and upholds the rule that a
//! business has at most one primary image.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod report;
pub mod sweep;

pub use catalog::{AssetCatalog, NewAsset, SwapOutcome};
pub use coordinator::{AssetManager, UploadFile};
pub use error::AssetError;
pub use report::{AssetListing, BatchReport, ItemFailure, OperationStage};
pub use sweep::{SweepReport, run_orphan_sweeper, sweep_orphans};
