pub mod answer;
mod client;

pub use client::{BackendClient, BackendError, UploadSource};
