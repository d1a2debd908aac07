//! Vehicle History Ledger Library

pub mod chain;
pub mod config;
pub mod history;
pub mod ledger;
pub mod pipeline;
pub mod roles;

pub use config::schema::LedgerConfig;
pub use ledger::store::LedgerStore;
pub use pipeline::executor::MutationPipeline;
