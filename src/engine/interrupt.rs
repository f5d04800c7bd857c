use crate::error::LoopError;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cooperative stop request shared between a run and whoever may stop it
///
/// Loops call [`Interrupt::check`] between steps; the live pacing sleep
/// also wakes on [`Interrupt::triggered`]. Nothing is preempted mid-fetch.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the run to stop at its next step
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fail with [`LoopError::Interrupted`] once triggered
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() {
            return Err(LoopError::Interrupted);
        }
        Ok(())
    }

    /// Resolve once the interrupt has been triggered
    pub async fn triggered(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Trigger this interrupt on Ctrl-C
    ///
    /// Spawns a listener on the current tokio runtime.
    pub fn trigger_on_ctrl_c(&self) {
        let interrupt = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("⚠️  Received Ctrl+C, stopping at next step...");
                    interrupt.trigger();
                }
                Err(e) => {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
            }
        });
    }
}
