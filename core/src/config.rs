// storefront_reservations/src/config.rs

use crate::error::{ReservationError, ReservationResult};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

pub const DEFAULT_HOLD_DURATION: Duration = Duration::from_secs(20 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_RESERVE_ATTEMPTS: u32 = 8;

const HOLD_SECS_VAR: &str = "RESERVATION_HOLD_SECS";
const SWEEP_INTERVAL_SECS_VAR: &str = "RESERVATION_SWEEP_INTERVAL_SECS";
const MAX_ATTEMPTS_VAR: &str = "RESERVATION_MAX_ATTEMPTS";

/// Tunables for the reservation manager and the expiry sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationConfig {
  /// Length of a hold, applied from "now" on every reserve or refresh.
  pub hold_duration: Duration,
  /// Period of the background sweep. Only bounds how stale a lapsed hold can get.
  pub sweep_interval: Duration,
  /// Compare-and-swap attempts before `reserve` gives up with `Contention`.
  pub max_reserve_attempts: u32,
}

impl Default for ReservationConfig {
  fn default() -> Self {
    Self {
      hold_duration: DEFAULT_HOLD_DURATION,
      sweep_interval: DEFAULT_SWEEP_INTERVAL,
      max_reserve_attempts: DEFAULT_MAX_RESERVE_ATTEMPTS,
    }
  }
}

impl ReservationConfig {
  /// Loads `.env` if present, then reads the `RESERVATION_*` variables.
  /// Unset variables keep their defaults.
  pub fn from_env() -> ReservationResult<Self> {
    dotenv().ok();
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Same as [`from_env`](Self::from_env) but reads values through `lookup`.
  pub fn from_lookup<F>(lookup: F) -> ReservationResult<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let defaults = Self::default();

    let hold_duration = match lookup(HOLD_SECS_VAR) {
      Some(raw) => Duration::from_secs(parse_positive(HOLD_SECS_VAR, &raw)?),
      None => defaults.hold_duration,
    };
    let sweep_interval = match lookup(SWEEP_INTERVAL_SECS_VAR) {
      Some(raw) => Duration::from_secs(parse_positive(SWEEP_INTERVAL_SECS_VAR, &raw)?),
      None => defaults.sweep_interval,
    };
    let max_reserve_attempts = match lookup(MAX_ATTEMPTS_VAR) {
      Some(raw) => {
        let n = parse_positive(MAX_ATTEMPTS_VAR, &raw)?;
        u32::try_from(n).map_err(|e| ReservationError::Configuration {
          key: MAX_ATTEMPTS_VAR.to_string(),
          message: e.to_string(),
        })?
      }
      None => defaults.max_reserve_attempts,
    };

    tracing::info!(
      hold_secs = hold_duration.as_secs(),
      sweep_interval_secs = sweep_interval.as_secs(),
      max_reserve_attempts,
      "Reservation configuration loaded."
    );

    Ok(Self {
      hold_duration,
      sweep_interval,
      max_reserve_attempts,
    })
  }

  pub fn with_hold_duration(mut self, hold_duration: Duration) -> Self {
    self.hold_duration = hold_duration;
    self
  }

  pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
    self.sweep_interval = sweep_interval;
    self
  }

  pub fn with_max_reserve_attempts(mut self, attempts: u32) -> Self {
    self.max_reserve_attempts = attempts;
    self
  }
}

fn parse_positive(key: &str, raw: &str) -> ReservationResult<u64> {
  let value = raw.trim().parse::<u64>().map_err(|e| ReservationError::Configuration {
    key: key.to_string(),
    message: format!("invalid value '{}': {}", raw, e),
  })?;
  if value == 0 {
    return Err(ReservationError::Configuration {
      key: key.to_string(),
      message: "must be greater than zero".to_string(),
    });
  }
  Ok(value)
}
