// Portfolio Sync - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod db;
pub mod gateway;
pub mod models;
pub mod reconciler;
pub mod sync;
pub mod validator;

// Re-export commonly used types
pub use db::{fetch_all, replace_all, setup_database, verify_count};
pub use gateway::{HttpGateway, SourceGateway};
pub use models::{
    AllocationTree, AssetClass, FlattenedAllocation, PairingOutcome, PairingVerdict,
    ReconciledEntity, Region, Security, Summary, SyncOutcome,
};
pub use reconciler::{flatten, reconcile};
pub use sync::SyncService;
pub use validator::{CategorySet, ValidationError, ValidationResult, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
