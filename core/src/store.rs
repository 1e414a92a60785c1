// storefront_reservations/src/store.rs

//! The persistence boundary consumed by the reservation manager and the sweeper.
//!
//! Implementations must make [`ProductStore::atomic_update`] atomic per document:
//! the comparison against `expected` and the write of `new_hold` happen as one
//! step relative to every other update of the same product. Nothing else is
//! required of the store; operations on different products need no ordering.

use crate::error::ReservationResult;
use crate::model::{Hold, Product, ProductId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
  /// The stored hold matched `expected` and was replaced. Carries the new document.
  Applied(Product),
  /// Another writer got there first. Carries the document as currently stored.
  PredicateFailed(Product),
  NotFound,
}

#[async_trait]
pub trait ProductStore: Send + Sync + 'static {
  async fn find_by_id(&self, id: &ProductId) -> ReservationResult<Option<Product>>;

  /// Compare-and-swap on the reservation sub-state of one product.
  async fn atomic_update(
    &self,
    id: &ProductId,
    expected: &Option<Hold>,
    new_hold: Option<Hold>,
  ) -> ReservationResult<UpdateOutcome>;

  /// Clears the hold whatever it is. Returns the document as it was before
  /// clearing, or `None` if the product does not exist.
  async fn clear_hold(&self, id: &ProductId) -> ReservationResult<Option<Product>>;

  /// Deletes the product only if its hold still equals `expected`.
  /// `Applied` carries the removed document.
  async fn atomic_delete(&self, id: &ProductId, expected: &Option<Hold>) -> ReservationResult<UpdateOutcome>;

  /// Every product whose hold lapsed strictly before `now`.
  async fn scan_reserved_expired(&self, now: DateTime<Utc>) -> ReservationResult<Vec<Product>>;

  async fn list(&self) -> ReservationResult<Vec<Product>>;

  async fn insert(&self, product: Product) -> ReservationResult<Product>;

  /// Removes the product, returning it if it existed.
  async fn delete(&self, id: &ProductId) -> ReservationResult<Option<Product>>;
}
