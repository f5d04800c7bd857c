// Core modules
pub mod engine;
pub mod error;
pub mod execution;
pub mod feed;
pub mod models;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use engine::{run_backtest, run_live, Interrupt, RunOutcome};
pub use error::LoopError;
pub use models::*;
pub use strategy::{BacktestStrategy, LiveStrategy};

// Error handling
pub type Result<T> = std::result::Result<T, LoopError>;
