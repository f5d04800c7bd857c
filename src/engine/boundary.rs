use crate::error::LoopError;
use crate::Result;
use std::future::Future;

/// How a guarded run ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Completed(T),
    /// Stopped by an operator interrupt
    Interrupted,
}

impl<T> RunOutcome<T> {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunOutcome::Interrupted)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            RunOutcome::Completed(value) => Some(value),
            RunOutcome::Interrupted => None,
        }
    }
}

/// Outermost error handling around a strategy run
///
/// An interrupt is logged at error level and swallowed. Every other error
/// is logged with the strategy name and handed back unchanged.
#[derive(Debug, Clone)]
pub struct FailureBoundary {
    strategy: String,
}

impl FailureBoundary {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
        }
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn settle<T>(&self, result: Result<T>) -> Result<RunOutcome<T>> {
        match result {
            Ok(value) => Ok(RunOutcome::Completed(value)),
            Err(LoopError::Interrupted) => {
                tracing::error!(strategy = %self.strategy, "User's interrupt stopped {}", self.strategy);
                Ok(RunOutcome::Interrupted)
            }
            Err(e) if e.is_pre_loop() => {
                tracing::error!(strategy = %self.strategy, error = %e, "Run rejected before streaming");
                Err(e)
            }
            Err(e) => {
                tracing::error!(strategy = %self.strategy, error = %e, "Exiting {}", self.strategy);
                Err(e)
            }
        }
    }

    pub fn guard<T, F>(&self, run: F) -> Result<RunOutcome<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        self.settle(run())
    }

    pub async fn guard_async<T, Fut>(&self, run: Fut) -> Result<RunOutcome<T>>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.settle(run.await)
    }
}
