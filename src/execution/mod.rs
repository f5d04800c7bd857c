// Per-run state the loops hand to strategies
pub mod context;
pub mod ledger;
pub mod rolling_buffer;

pub use context::{ContextSettings, ExecutionContext, SymbolReport};
pub use ledger::{Fill, InMemoryLedger, Ledger, Mark, RollingLedger, Side};
pub use rolling_buffer::{RollingBuffer, Window};
