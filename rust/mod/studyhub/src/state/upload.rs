//! Upload state, stored at `upload/state`.

use super::State;

#[derive(Debug, Clone, PartialEq)]
pub enum UploadPhase {
    Idle,
    Transferring,
    /// Bytes stored, writing the material record.
    Saving,
    Done { material_id: String },
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadState {
    /// Sequence number of the upload this state describes.
    pub upload: u64,
    pub file_name: String,
    pub phase: UploadPhase,
    /// Whole percent, never decreasing within one upload.
    pub percent: u8,
}

impl UploadState {
    pub fn busy(&self) -> bool {
        matches!(self.phase, UploadPhase::Transferring | UploadPhase::Saving)
    }
}

impl State for UploadState {
    const PATH: &'static str = "upload/state";
}
