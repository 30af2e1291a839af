pub mod client;
pub mod config;
pub mod discover;
pub mod error;
pub mod relay;
pub mod result;
pub mod scheduler;
pub mod shutdown;
pub mod urls;

pub use client::FetchClient;
pub use config::FetchConfig;
pub use error::{Result, ScanError};
pub use relay::RelayProfile;
pub use result::{Document, ResourceRecord, ResourceType};
pub use scheduler::{BatchScheduler, FetchOutcome, FetchState, SizeSource};
pub use shutdown::Shutdown;
