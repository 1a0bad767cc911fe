use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use config::AppConfig;
use parking_lot::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use ragbox_backend::{BackendClient, BackendError, UploadSource};
use ragbox_core::upload::is_accepted_file;
use ragbox_core::{ChatMessage, Engine, Notice, UploadItem};
use ragbox_store::MessageStore;

use crate::notice::{LogSink, NoticeSink};

/// Assistant text used when the backend answered with nothing displayable.
const NO_CONTENT_FALLBACK: &str = "(No content returned)";
/// Assistant text appended when a turn fails; the log still receives exactly
/// one reply per accepted submission.
const TURN_FAILURE_REPLY: &str = "Sorry, I ran into an error processing that request.";

const MISSING_BACKEND_TITLE: &str = "Missing backend URL";
const MISSING_BACKEND_DETAIL: &str =
    "Set backend_url in the config file (or RAGBOX_BACKEND_URL) to enable uploads and chat.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct SessionBuilder {
    config: AppConfig,
    db_path: Option<PathBuf>,
    sink: Option<Arc<dyn NoticeSink>>,
}

impl SessionBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            db_path: None,
            sink: None,
        }
    }

    /// Persist the message log at `path`. Without this the session keeps the
    /// log in an in-memory store that dies with the process.
    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn with_notice_sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Session> {
        let store = match &self.db_path {
            Some(path) => MessageStore::open(path)?,
            None => MessageStore::open_in_memory()?,
        };
        let messages = store.load_messages()?;
        let backend = self.config.resolve_backend_url().map(BackendClient::new);

        Ok(Session {
            store: Arc::new(store),
            backend,
            accepted_extensions: self.config.accepted_extensions,
            engine: Mutex::new(Engine::default()),
            messages: Mutex::new(messages),
            uploads: Arc::new(Mutex::new(Vec::new())),
            pending: AtomicBool::new(false),
            active_batches: AtomicUsize::new(0),
            notices: self.sink.unwrap_or_else(|| Arc::new(LogSink)),
        })
    }
}

/// The chat-with-upload session controller: owns the conversation log, the
/// upload list, the engine selector, the one-outstanding-turn guard, and the
/// batch settlement barrier. All mutation goes through interior locks, so a
/// shared `Session` can be driven from any task; callbacks only ever write
/// their own identity-keyed slot.
pub struct Session {
    store: Arc<MessageStore>,
    backend: Option<BackendClient>,
    accepted_extensions: Vec<String>,
    engine: Mutex<Engine>,
    messages: Mutex<Vec<ChatMessage>>,
    uploads: Arc<Mutex<Vec<UploadItem>>>,
    pending: AtomicBool,
    active_batches: AtomicUsize,
    notices: Arc<dyn NoticeSink>,
}

impl Session {
    pub fn backend_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn engine(&self) -> Engine {
        *self.engine.lock()
    }

    pub fn select_engine(&self, engine: Engine) {
        *self.engine.lock() = engine;
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    pub fn uploads(&self) -> Vec<UploadItem> {
        self.uploads.lock().clone()
    }

    /// True while a chat turn is outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// True while at least one upload batch has unsettled items.
    pub fn is_processing(&self) -> bool {
        self.active_batches.load(Ordering::SeqCst) > 0
    }

    /// File-type validation at the selection boundary; the upload manager
    /// itself does not filter.
    pub fn accepts(&self, file_name: &str) -> bool {
        is_accepted_file(file_name, &self.accepted_extensions)
    }

    /// Submits one chat turn. Returns `Ok(None)` when the submission was
    /// ignored (blank input, or a turn already outstanding); `Ok(Some)`
    /// carries the assistant reply, which on backend failure is the fixed
    /// apology message rather than an error.
    pub async fn send(&self, input: &str) -> Result<Option<ChatMessage>> {
        let Some(backend) = self.backend.as_ref() else {
            self.notices
                .push(Notice::warning(MISSING_BACKEND_TITLE, MISSING_BACKEND_DETAIL));
            return Err(anyhow!("backend url is not configured"));
        };

        let query = input.trim();
        if query.is_empty() {
            return Ok(None);
        }

        // At most one outstanding turn; a rejected submission is dropped,
        // not queued.
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(None);
        }

        let result = self.run_turn(backend, query).await;
        self.pending.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    async fn run_turn(&self, backend: &BackendClient, query: &str) -> Result<ChatMessage> {
        // Optimistic append before the network resolves.
        self.append_message(ChatMessage::user(query))?;

        // Engine is read here, at dispatch time, not snapshotted earlier.
        let engine = self.engine();

        let reply = match backend.query(engine, query).await {
            Ok(text) => {
                let content = if text.is_empty() {
                    NO_CONTENT_FALLBACK.to_owned()
                } else {
                    text
                };
                ChatMessage::assistant(engine, content)
            }
            Err(error) => {
                self.notices
                    .push(Notice::warning("Chat error", error.to_string()));
                ChatMessage::assistant(engine, TURN_FAILURE_REPLY)
            }
        };

        self.append_message(reply.clone())?;
        info!(engine = %engine, "chat turn completed");
        Ok(reply)
    }

    /// Uploads a batch. Every file uploads concurrently and independently;
    /// the batch counter stays raised until all of them are terminal, and
    /// the aggregate notices fire once per batch on settlement.
    pub async fn upload_batch(&self, sources: Vec<UploadSource>) -> Result<BatchReport> {
        let Some(backend) = self.backend.as_ref() else {
            self.notices
                .push(Notice::warning(MISSING_BACKEND_TITLE, MISSING_BACKEND_DETAIL));
            return Err(anyhow!("backend url is not configured"));
        };

        if sources.is_empty() {
            return Ok(BatchReport::default());
        }

        let mut ids = Vec::with_capacity(sources.len());
        {
            let mut uploads = self.uploads.lock();
            for source in &sources {
                let item = UploadItem::new(source.file_name.clone(), source.size());
                ids.push(item.id);
                uploads.push(item);
            }
        }

        self.active_batches.fetch_add(1, Ordering::SeqCst);

        let tasks = sources
            .into_iter()
            .zip(ids)
            .map(|(source, item_id)| {
                let uploads = Arc::clone(&self.uploads);
                let backend = backend.clone();
                async move {
                    mark(&uploads, item_id, UploadItem::begin);

                    let progress_uploads = Arc::clone(&uploads);
                    let outcome = backend
                        .upload(source, move |percent| {
                            mark(&progress_uploads, item_id, |item| item.set_progress(percent));
                        })
                        .await;

                    match outcome {
                        Ok(()) => {
                            mark(&uploads, item_id, UploadItem::succeed);
                            true
                        }
                        Err(error) => {
                            mark(&uploads, item_id, |item| {
                                item.fail(upload_failure_text(&error))
                            });
                            false
                        }
                    }
                }
            })
            .collect::<Vec<_>>();

        let outcomes = futures::future::join_all(tasks).await;
        self.active_batches.fetch_sub(1, Ordering::SeqCst);

        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        let failed = outcomes.len() - succeeded;

        if succeeded > 0 {
            let detail = if succeeded == 1 {
                "Your file was uploaded successfully.".to_owned()
            } else {
                format!("{succeeded} files uploaded successfully.")
            };
            self.notices.push(Notice::success("Upload complete", detail));
        }
        if failed > 0 {
            self.notices.push(Notice::warning(
                "Some uploads failed",
                format!("{failed} file(s) failed to upload."),
            ));
        }

        info!(succeeded, failed, "upload batch settled");
        Ok(BatchReport { succeeded, failed })
    }

    /// Convenience wrapper over [`Session::upload_batch`] that applies the
    /// selection-boundary type filter and reads the files.
    pub async fn upload_paths<P: AsRef<Path>>(&self, paths: &[P]) -> Result<BatchReport> {
        let mut sources = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let file_name = path
                .file_name()
                .map(|value| value.to_string_lossy().to_string())
                .unwrap_or_default();
            if !self.accepts(&file_name) {
                warn!(file = %path.display(), "skipping file outside the accepted types");
                continue;
            }
            let source = UploadSource::from_path(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            sources.push(source);
        }
        self.upload_batch(sources).await
    }

    fn append_message(&self, message: ChatMessage) -> Result<()> {
        let mut messages = self.messages.lock();
        messages.push(message);
        self.store.save_messages(&messages)
    }
}

fn mark(uploads: &Mutex<Vec<UploadItem>>, id: Uuid, update: impl FnOnce(&mut UploadItem)) {
    let mut uploads = uploads.lock();
    if let Some(item) = uploads.iter_mut().find(|item| item.id == id) {
        update(item);
    }
}

fn upload_failure_text(error: &BackendError) -> String {
    match error {
        BackendError::Transport(_) => "Network error".to_owned(),
        BackendError::Server { message, .. } => message.clone(),
    }
}
