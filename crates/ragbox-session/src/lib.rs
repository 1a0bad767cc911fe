mod notice;
mod session;

pub use notice::{LogSink, MemorySink, NoticeSink};
pub use session::{BatchReport, Session, SessionBuilder};
