pub mod config;
pub mod engine;
pub mod error;
pub mod poll;
pub mod push;
pub mod wire;

pub use config::WallConfig;
pub use engine::{ChannelMessage, RunOptions, RunSummary, Source, build_driver, run};
pub use error::{ErrorKind, Result, SyncError};
pub use poll::{PollChannel, PollOutcome};
pub use push::PushChannel;
pub use wire::{ParsedIdeas, PushEvent, parse_event, parse_header, parse_ideas};
