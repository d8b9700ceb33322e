pub mod bridge;
pub mod config;
pub mod journal;
pub mod oracle;
pub mod pipeline;

pub use bridge::{BridgeCommand, FileBridge};
pub use config::PipelineConfig;
pub use journal::{DecisionJournal, JournalEntry, MIGRATOR};
pub use oracle::GeminiClient;
pub use pipeline::DecisionPipeline;
