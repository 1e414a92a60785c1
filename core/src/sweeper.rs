// storefront_reservations/src/sweeper.rs

//! Periodic release of lapsed holds, so abandoned carts do not keep products
//! reserved when nobody calls `unreserve` or re-reserves them.

use crate::config::ReservationConfig;
use crate::error::ReservationResult;
use crate::manager::ReservationManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{event, instrument, Level};

/// Totals accumulated by a spawned sweeper over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub runs: u64,
  pub released: u64,
  pub failures: u64,
}

#[derive(Debug, Clone)]
pub struct ExpirySweeper {
  manager: Arc<ReservationManager>,
  interval: Duration,
}

impl ExpirySweeper {
  pub fn new(manager: Arc<ReservationManager>, interval: Duration) -> Self {
    Self { manager, interval }
  }

  pub fn from_config(manager: Arc<ReservationManager>, config: &ReservationConfig) -> Self {
    Self::new(manager, config.sweep_interval)
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// One sweep. Safe to call from any timer, including overlapping ones.
  #[instrument(name = "ExpirySweeper::sweep_once", skip_all, err(Display))]
  pub async fn sweep_once(&self) -> ReservationResult<usize> {
    self.manager.clean_expired_reservations().await
  }

  /// Runs [`sweep_once`](Self::sweep_once) every `interval` on the current
  /// tokio runtime until the returned handle is shut down. The first sweep
  /// runs immediately. A failed sweep is logged and the next tick proceeds.
  pub fn spawn(self) -> SweeperHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    event!(Level::INFO, interval_ms = self.interval.as_millis() as u64, "Starting expiry sweeper.");

    let join = tokio::spawn(async move {
      let mut report = SweepReport::default();
      let mut ticker = tokio::time::interval(self.interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

      loop {
        tokio::select! {
          _ = token.cancelled() => break,
          _ = ticker.tick() => {
            report.runs += 1;
            match self.sweep_once().await {
              Ok(released) => report.released += released as u64,
              Err(e) => {
                report.failures += 1;
                event!(Level::ERROR, error = %e, "Expiry sweep failed; will retry on next tick.");
              }
            }
          }
        }
      }

      event!(Level::INFO, runs = report.runs, released = report.released, failures = report.failures, "Expiry sweeper stopped.");
      report
    });

    SweeperHandle { cancel, join }
  }
}

/// Owner of a spawned sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
  cancel: CancellationToken,
  join: JoinHandle<SweepReport>,
}

impl SweeperHandle {
  /// Token that stops the sweeper when cancelled, e.g. tied to server shutdown.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn is_running(&self) -> bool {
    !self.join.is_finished()
  }

  /// Stops the loop and waits for an in-flight sweep to finish.
  pub async fn shutdown(self) -> Result<SweepReport, JoinError> {
    self.cancel.cancel();
    self.join.await
  }
}
