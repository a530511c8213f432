pub mod config_store;
pub mod digest;
pub mod process_transcriber;
pub mod sqlite_store;

pub use config_store::TomlConfigStore;
pub use digest::{digest_file, digest_file_async};
pub use process_transcriber::ProcessTranscriber;
pub use sqlite_store::SqliteResultStore;
