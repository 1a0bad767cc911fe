use parking_lot::Mutex;
use tracing::{info, warn};

use ragbox_core::{Notice, NoticeLevel};

/// Where the session delivers transient user-facing notifications. The
/// rendering layer supplies its own sink; the session never blocks on one.
pub trait NoticeSink: Send + Sync {
    fn push(&self, notice: Notice);
}

/// Default sink: forwards notices to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NoticeSink for LogSink {
    fn push(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Warning => {
                warn!(title = %notice.title, detail = %notice.detail, "notice")
            }
            NoticeLevel::Info | NoticeLevel::Success => {
                info!(title = %notice.title, detail = %notice.detail, "notice")
            }
        }
    }
}

/// Records notices for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    notices: Mutex<Vec<Notice>>,
}

impl MemorySink {
    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

impl NoticeSink for MemorySink {
    fn push(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
