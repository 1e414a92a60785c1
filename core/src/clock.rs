// storefront_reservations/src/clock.rs

//! Time source for hold expiry. Production code uses [`SystemClock`]; tests and
//! demos drive a [`ManualClock`] to simulate the 20-minute window passing.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A shareable clock that only moves when told to.
///
/// Clones observe the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<RwLock<DateTime<Utc>>>);

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    ManualClock(Arc::new(RwLock::new(start)))
  }

  /// Starts at the current wall-clock time.
  pub fn starting_now() -> Self {
    Self::new(Utc::now())
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.0.write();
    *now += by;
  }

  pub fn set(&self, to: DateTime<Utc>) {
    *self.0.write() = to;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.0.read()
  }
}
