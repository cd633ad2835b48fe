//! Asset upload pipeline

pub mod content_type;
pub mod sequencer;
pub mod transfer;

pub use content_type::content_type_for;
pub use sequencer::AssetUploadSequencer;
pub use transfer::{AssetTransfer, AssetUploadTask, PROGRESS_INTERVAL, TransferOutcome};
