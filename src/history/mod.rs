//! History reconstruction subsystem.

pub mod reader;

pub use reader::{HistoryReader, LedgerRead};
