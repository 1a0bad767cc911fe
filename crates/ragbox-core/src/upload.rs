use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a single in-flight upload.
///
/// `Success` and `Error` are terminal: every transition method below is a
/// no-op once either is reached, so callbacks that race their item's
/// completion cannot resurrect it. Progress only exists while `Uploading`,
/// which makes "progress > 0 while idle" unrepresentable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum UploadState {
    Idle,
    Uploading { progress: u8 },
    Success,
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadItem {
    pub id: Uuid,
    pub file_name: String,
    pub size: u64,
    pub state: UploadState,
}

impl UploadItem {
    pub fn new(file_name: impl Into<String>, size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            size,
            state: UploadState::Idle,
        }
    }

    /// `Idle -> Uploading`, fired on dispatch rather than on first byte.
    pub fn begin(&mut self) {
        if let UploadState::Idle = self.state {
            self.state = UploadState::Uploading { progress: 0 };
        }
    }

    /// Updates byte-level progress. Clamped to 0..=100 and monotone
    /// non-decreasing while uploading; ignored in any other state.
    pub fn set_progress(&mut self, percent: u8) {
        if let UploadState::Uploading { progress } = self.state {
            self.state = UploadState::Uploading {
                progress: percent.min(100).max(progress),
            };
        }
    }

    pub fn succeed(&mut self) {
        if !self.is_terminal() {
            self.state = UploadState::Success;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.is_terminal() {
            self.state = UploadState::Error {
                message: message.into(),
            };
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, UploadState::Success | UploadState::Error { .. })
    }

    /// Display progress: 0 while idle, 100 once succeeded.
    pub fn progress(&self) -> u8 {
        match &self.state {
            UploadState::Idle => 0,
            UploadState::Uploading { progress } => *progress,
            UploadState::Success => 100,
            UploadState::Error { .. } => 0,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            UploadState::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// Extensions accepted at the file-selection boundary. Validation happens
/// here, before items are created; the upload manager itself does not filter.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "pdf", "doc", "docx", "txt", "md", "rtf", "mp3", "wav",
    "m4a", "aac", "flac", "ogg", "webm", "mkv", "mp4",
];

pub fn is_accepted_file(file_name: &str, accepted: &[String]) -> bool {
    let extension = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return false,
    };
    accepted.iter().any(|entry| *entry == extension)
}
