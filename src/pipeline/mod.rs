//! Mutation pipeline subsystem.
//!
//! Ties intents, key custody, signing, and submission into one
//! cancellable flow with advisory capability checks up front and
//! authoritative enforcement left to the ledger backend.

pub mod executor;
pub mod intent;

pub use executor::{MutationPipeline, Outcome, PipelineError};
pub use intent::{MutationIntent, Requirement};
