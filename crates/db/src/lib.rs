pub mod connection;
pub mod desk;
pub mod error;
pub mod fixtures;
pub mod integrity;
pub mod migrations;
pub mod repositories;

mod admin;
mod dashboard;
mod engine;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use desk::LineDesk;
pub use error::OperationError;
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use integrity::{CounterDrift, IntegrityReport};
