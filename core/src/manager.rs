// storefront_reservations/src/manager.rs

//! The reservation state machine for a single product.
//!
//! ```text
//! FREE      --reserve(h)-------------------------> HELD(h, now+hold)
//! HELD(h,t) --reserve(h)-------------------------> HELD(h, now+hold)
//! HELD(h,t) --reserve(h2), h2 != h, t > now------> Conflict
//! HELD(h,t) --reserve(h2), h2 != h, t <= now-----> HELD(h2, now+hold)
//! HELD(h,t) --unreserve | sweep with t < now-----> FREE
//! HELD(h,t) --complete_sale----------------------> product deleted
//! HELD(h,t) --complete_sale_for(h), t > now------> product deleted
//! ```
//!
//! Every write goes through [`ProductStore::atomic_update`] conditioned on the
//! hold observed by the preceding read, so two racing `reserve` calls on a free
//! product cannot both win: the loser re-reads, sees the winner's hold and
//! takes the `Conflict` branch.

use crate::clock::Clock;
use crate::config::ReservationConfig;
use crate::error::{ReservationError, ReservationResult};
use crate::model::{HolderId, Hold, Product, ProductId, ReservationState};
use crate::store::{ProductStore, UpdateOutcome};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// What a successful `reserve` does to the stored hold.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Transition {
  Acquire,
  Refresh,
  Takeover { previous: HolderId },
}

fn decide(current: Option<&Hold>, holder: &HolderId, now: DateTime<Utc>, product_id: &ProductId) -> ReservationResult<Transition> {
  match current {
    None => Ok(Transition::Acquire),
    Some(hold) if hold.is_held_by(holder) => Ok(Transition::Refresh),
    Some(hold) if hold.is_active_at(now) => Err(ReservationError::Conflict {
      product_id: product_id.clone(),
    }),
    Some(hold) => Ok(Transition::Takeover {
      previous: hold.reserved_by.clone(),
    }),
  }
}

fn not_found(product_id: &ProductId) -> ReservationError {
  ReservationError::NotFound {
    product_id: product_id.clone(),
  }
}

pub struct ReservationManager {
  store: Arc<dyn ProductStore>,
  clock: Arc<dyn Clock>,
  hold_duration: Duration,
  max_attempts: u32,
}

impl std::fmt::Debug for ReservationManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ReservationManager")
      .field("hold_duration", &self.hold_duration)
      .field("max_attempts", &self.max_attempts)
      .finish()
  }
}

impl ReservationManager {
  pub fn new(
    store: Arc<dyn ProductStore>,
    clock: Arc<dyn Clock>,
    config: &ReservationConfig,
  ) -> ReservationResult<Self> {
    let hold_duration = Duration::from_std(config.hold_duration).map_err(|e| ReservationError::Configuration {
      key: "hold_duration".to_string(),
      message: e.to_string(),
    })?;
    if config.max_reserve_attempts == 0 {
      return Err(ReservationError::Configuration {
        key: "max_reserve_attempts".to_string(),
        message: "must be greater than zero".to_string(),
      });
    }
    Ok(Self {
      store,
      clock,
      hold_duration,
      max_attempts: config.max_reserve_attempts,
    })
  }

  pub fn store(&self) -> &Arc<dyn ProductStore> {
    &self.store
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  pub fn hold_duration(&self) -> Duration {
    self.hold_duration
  }

  /// Acquires, refreshes or takes over the hold on `product_id` for `holder`.
  ///
  /// Fails with `NotFound` for unknown products and `Conflict` while another
  /// holder's hold is still active. The new expiry is always `now + hold`.
  #[instrument(
    name = "ReservationManager::reserve",
    skip_all,
    fields(product_id = %product_id, holder = %holder),
    err(Display)
  )]
  pub async fn reserve(&self, product_id: &ProductId, holder: &HolderId) -> ReservationResult<ReservationState> {
    if holder.is_empty() {
      return Err(ReservationError::InvalidHolder);
    }

    let mut observed = self
      .store
      .find_by_id(product_id)
      .await?
      .ok_or_else(|| not_found(product_id))?;

    for attempt in 1..=self.max_attempts {
      let now = self.clock.now();
      let transition = decide(observed.hold.as_ref(), holder, now, product_id)?;
      let new_hold = Hold::new(holder.clone(), now + self.hold_duration);
      let reserved_until = new_hold.reserved_until;

      match self.store.atomic_update(product_id, &observed.hold, Some(new_hold)).await? {
        UpdateOutcome::Applied(product) => {
          match &transition {
            Transition::Acquire => event!(Level::INFO, %reserved_until, "Product reserved."),
            Transition::Refresh => event!(Level::DEBUG, %reserved_until, "Reservation extended by its holder."),
            Transition::Takeover { previous } => {
              event!(Level::INFO, previous_holder = %previous, %reserved_until, "Lapsed hold taken over.")
            }
          }
          return Ok(product.reservation_state());
        }
        UpdateOutcome::PredicateFailed(current) => {
          event!(Level::DEBUG, attempt, "Product changed since it was read; re-evaluating.");
          observed = current;
        }
        UpdateOutcome::NotFound => return Err(not_found(product_id)),
      }
    }

    event!(Level::WARN, attempts = self.max_attempts, "Giving up on contended reservation.");
    Err(ReservationError::Contention {
      product_id: product_id.clone(),
      attempts: self.max_attempts,
    })
  }

  /// Clears any hold on `product_id`, whoever owns it. Idempotent.
  ///
  /// The clear is unconditional at the store, so there is no retry loop and no
  /// `Contention` outcome: the only failures are `NotFound` and `Storage`.
  #[instrument(name = "ReservationManager::unreserve", skip_all, fields(product_id = %product_id), err(Display))]
  pub async fn unreserve(&self, product_id: &ProductId) -> ReservationResult<ReservationState> {
    let before = self
      .store
      .clear_hold(product_id)
      .await?
      .ok_or_else(|| not_found(product_id))?;

    match &before.hold {
      Some(previous) => event!(Level::INFO, previous_holder = %previous.reserved_by, "Reservation released."),
      None => event!(Level::DEBUG, "Product was not reserved; nothing to release."),
    }
    Ok(Product { hold: None, ..before }.reservation_state())
  }

  /// Clears the hold on `product_id` only while `holder` still owns it.
  ///
  /// Returns `false` when the product is free or held by someone else, in which
  /// case nothing is written.
  #[instrument(
    name = "ReservationManager::release_held_by",
    skip_all,
    fields(product_id = %product_id, holder = %holder),
    err(Display)
  )]
  pub async fn release_held_by(&self, product_id: &ProductId, holder: &HolderId) -> ReservationResult<bool> {
    let mut observed = self
      .store
      .find_by_id(product_id)
      .await?
      .ok_or_else(|| not_found(product_id))?;

    for attempt in 1..=self.max_attempts {
      match &observed.hold {
        Some(hold) if hold.is_held_by(holder) => {}
        other => {
          event!(Level::DEBUG, current_holder = ?other.as_ref().map(|h| &h.reserved_by), "Hold not owned by caller; left alone.");
          return Ok(false);
        }
      }

      match self.store.atomic_update(product_id, &observed.hold, None).await? {
        UpdateOutcome::Applied(_) => {
          event!(Level::INFO, "Own reservation released.");
          return Ok(true);
        }
        UpdateOutcome::PredicateFailed(current) => {
          event!(Level::DEBUG, attempt, "Product changed since it was read; re-checking owner.");
          observed = current;
        }
        UpdateOutcome::NotFound => return Err(not_found(product_id)),
      }
    }

    Err(ReservationError::Contention {
      product_id: product_id.clone(),
      attempts: self.max_attempts,
    })
  }

  /// Reads `product_id` and checks that `holder` owns an active hold on it.
  ///
  /// `Conflict` if another holder's hold is active, `HoldLost` if the product
  /// is free or the caller's hold has run out.
  pub async fn ensure_held_by(&self, product_id: &ProductId, holder: &HolderId) -> ReservationResult<Product> {
    let product = self
      .store
      .find_by_id(product_id)
      .await?
      .ok_or_else(|| not_found(product_id))?;
    check_owner(&product, holder, self.clock.now())?;
    Ok(product)
  }

  /// Releases every hold that lapsed before now and returns how many were released.
  ///
  /// Each product is cleared only if its hold is still the lapsed one that was
  /// scanned, so holds refreshed or taken over in the meantime survive and
  /// overlapping sweeps never count the same release twice. A storage failure
  /// on one product is logged and the sweep moves on to the next.
  #[instrument(name = "ReservationManager::clean_expired_reservations", skip_all, err(Display))]
  pub async fn clean_expired_reservations(&self) -> ReservationResult<usize> {
    let now = self.clock.now();
    let lapsed = self.store.scan_reserved_expired(now).await?;
    event!(Level::TRACE, candidates = lapsed.len(), "Scanned for lapsed holds.");

    let mut released = 0usize;
    let mut failed = 0usize;
    for product in lapsed {
      match self.store.atomic_update(&product.id, &product.hold, None).await {
        Ok(UpdateOutcome::Applied(_)) => {
          released += 1;
          event!(
            Level::DEBUG,
            product_id = %product.id,
            previous_holder = ?product.reserved_by(),
            "Lapsed hold released."
          );
        }
        Ok(UpdateOutcome::PredicateFailed(_)) | Ok(UpdateOutcome::NotFound) => {
          event!(Level::TRACE, product_id = %product.id, "Hold changed or product removed before release; skipped.");
        }
        Err(e) => {
          failed += 1;
          event!(Level::ERROR, product_id = %product.id, error = %e, "Failed to release lapsed hold.");
        }
      }
    }

    if failed > 0 {
      event!(Level::WARN, released, failed, "Expired reservations partially cleaned.");
    } else if released > 0 {
      event!(Level::INFO, released, "Expired reservations cleaned.");
    }
    Ok(released)
  }

  /// Current reservation sub-state of a product, as stored.
  pub async fn reservation(&self, product_id: &ProductId) -> ReservationResult<ReservationState> {
    self
      .store
      .find_by_id(product_id)
      .await?
      .map(|p| p.reservation_state())
      .ok_or_else(|| not_found(product_id))
  }

  /// Every product that currently carries a hold, lapsed ones included.
  pub async fn reserved_products(&self) -> ReservationResult<Vec<Product>> {
    let all = self.store.list().await?;
    Ok(all.into_iter().filter(Product::is_reserved).collect())
  }

  /// Removes a sold product; its hold, if any, goes with it.
  #[instrument(name = "ReservationManager::complete_sale", skip_all, fields(product_id = %product_id), err(Display))]
  pub async fn complete_sale(&self, product_id: &ProductId) -> ReservationResult<Product> {
    let sold = self.store.delete(product_id).await?.ok_or_else(|| not_found(product_id))?;
    event!(Level::INFO, holder = ?sold.reserved_by(), "Product sold and removed.");
    Ok(sold)
  }

  /// Removes a sold product, but only while `holder` still owns an active hold.
  ///
  /// The delete is conditioned on the hold that was checked, so a takeover
  /// racing with the sale makes it fail instead of deleting the new holder's item.
  #[instrument(
    name = "ReservationManager::complete_sale_for",
    skip_all,
    fields(product_id = %product_id, holder = %holder),
    err(Display)
  )]
  pub async fn complete_sale_for(&self, product_id: &ProductId, holder: &HolderId) -> ReservationResult<Product> {
    let checked = self.ensure_held_by(product_id, holder).await?;
    match self.store.atomic_delete(product_id, &checked.hold).await? {
      UpdateOutcome::Applied(sold) => {
        event!(Level::INFO, "Product sold to its holder and removed.");
        Ok(sold)
      }
      UpdateOutcome::PredicateFailed(current) => {
        check_owner(&current, holder, self.clock.now())?;
        // Same owner but a refreshed expiry: the hold moved, not the product.
        Err(ReservationError::HoldLost {
          product_id: product_id.clone(),
          holder: holder.clone(),
        })
      }
      UpdateOutcome::NotFound => Err(not_found(product_id)),
    }
  }
}

fn check_owner(product: &Product, holder: &HolderId, now: DateTime<Utc>) -> ReservationResult<()> {
  match &product.hold {
    Some(hold) if hold.is_held_by(holder) && hold.is_active_at(now) => Ok(()),
    Some(hold) if hold.is_active_at(now) => Err(ReservationError::Conflict {
      product_id: product.id.clone(),
    }),
    _ => Err(ReservationError::HoldLost {
      product_id: product.id.clone(),
      holder: holder.clone(),
    }),
  }
}
