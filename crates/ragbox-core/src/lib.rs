pub mod chat;
pub mod engine;
pub mod notice;
pub mod upload;

pub use chat::{ChatMessage, MessageRole};
pub use engine::Engine;
pub use notice::{Notice, NoticeLevel};
pub use upload::{UploadItem, UploadState};
