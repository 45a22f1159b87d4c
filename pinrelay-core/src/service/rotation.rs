//! Background rotation task
//!
//! One task per running relay. It sleeps for the configured interval,
//! advances the shared round-robin cursor and runs one rotation step.
//! Cancellation is observed while sleeping; a step that has started runs to
//! completion. A step that fails or panics restarts the loop after a fixed
//! backoff, resuming at the turn that did not complete.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::engine::RelayEngine;
use crate::Result;

pub struct RotationTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RotationTask {
    /// Spawn the rotation loop.
    ///
    /// With `step_first` the loop publishes the feed in turn right away,
    /// otherwise the first step happens one `interval` from now.
    #[must_use]
    pub fn spawn(
        engine: Arc<RelayEngine>,
        cursor: Arc<AtomicUsize>,
        interval: Duration,
        backoff: Duration,
        step_first: bool,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervise(engine, cursor, interval, backoff, step_first, cancel.clone()));

        Self { cancel, handle }
    }

    /// Request cancellation and wait for the loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Rotation task ended abnormally");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Runs the loop in its own task so that a panicking step is restarted
/// like a failing one.
async fn supervise(
    engine: Arc<RelayEngine>,
    cursor: Arc<AtomicUsize>,
    interval: Duration,
    backoff: Duration,
    mut step_first: bool,
    cancel: CancellationToken,
) {
    loop {
        let attempt = tokio::spawn(run(engine.clone(), cursor.clone(), interval, step_first, cancel.clone()));
        match attempt.await {
            Ok(Ok(())) => {
                info!("Rotation task cancelled");
                return;
            }
            Ok(Err(e)) => {
                error!(error = ?e, backoff = ?backoff, "Rotation task failed, restarting after backoff");
            }
            Err(e) if e.is_panic() => {
                error!(error = %e, backoff = ?backoff, "Rotation task panicked, restarting after backoff");
            }
            Err(e) => {
                warn!(error = %e, "Rotation loop aborted");
                return;
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!("Rotation task cancelled during restart backoff");
                return;
            }
            () = tokio::time::sleep(backoff) => {}
        }
        step_first = true;
    }
}

async fn run(
    engine: Arc<RelayEngine>,
    cursor: Arc<AtomicUsize>,
    interval: Duration,
    step_first: bool,
    cancel: CancellationToken,
) -> Result<()> {
    if step_first {
        step(&engine, cursor.load(Ordering::SeqCst)).await?;
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            () = tokio::time::sleep(interval) => {}
        }

        let turn = cursor.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        step(&engine, turn).await?;
    }
}

async fn step(engine: &RelayEngine, turn: usize) -> Result<()> {
    let outcome = engine.rotation_step(turn).await?;
    debug!(turn, outcome = ?outcome, "Rotation step finished");
    Ok(())
}
