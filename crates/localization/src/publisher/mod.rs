//! Publisher implementations
//!
//! Contains LogPublisher, JsonLinesPublisher, RecordingPublisher and
//! FanoutPublisher.

mod fanout;
mod jsonl;
mod log;
mod recording;

pub use self::fanout::FanoutPublisher;
pub use self::jsonl::JsonLinesPublisher;
pub use self::log::LogPublisher;
pub use self::recording::{PublishedEvent, RecordingPublisher};
