pub mod clock;
pub mod config;
pub mod result_store;
pub mod transcriber;

pub use clock::{Clock, SystemClock};
pub use config::ConfigStore;
pub use result_store::ResultStore;
pub use transcriber::Transcriber;
