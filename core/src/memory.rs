// storefront_reservations/src/memory.rs

use crate::error::{ReservationError, ReservationResult};
use crate::model::{Hold, Product, ProductId};
use crate::store::{ProductStore, UpdateOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, Level};

/// A process-local product store.
///
/// All documents sit behind one `parking_lot::RwLock`; `atomic_update` compares
/// and writes under a single write guard. Guards never live across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductStore {
  products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryProductStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a store pre-filled with `products`.
  pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
    let map: HashMap<ProductId, Product> = products.into_iter().map(|p| (p.id.clone(), p)).collect();
    Self {
      products: Arc::new(RwLock::new(map)),
    }
  }

  /// Synchronous read, for seeding and inspection outside async code.
  pub fn get(&self, id: &ProductId) -> Option<Product> {
    self.products.read().get(id).cloned()
  }

  /// Inserts or replaces a whole document, as a catalog edit would.
  pub fn upsert(&self, product: Product) {
    self.products.write().insert(product.id.clone(), product);
  }

  /// Synchronous removal, the counterpart of [`upsert`](Self::upsert).
  pub fn delete_now(&self, id: &ProductId) -> Option<Product> {
    self.products.write().remove(id)
  }

  /// Snapshot of every document, in no particular order.
  pub fn scan_all(&self) -> Vec<Product> {
    self.products.read().values().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.products.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.products.read().is_empty()
  }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
  async fn find_by_id(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    Ok(self.products.read().get(id).cloned())
  }

  async fn atomic_update(
    &self,
    id: &ProductId,
    expected: &Option<Hold>,
    new_hold: Option<Hold>,
  ) -> ReservationResult<UpdateOutcome> {
    let mut products = self.products.write();
    let Some(product) = products.get_mut(id) else {
      return Ok(UpdateOutcome::NotFound);
    };
    if &product.hold != expected {
      event!(Level::TRACE, product_id = %id, "Conditional update lost the race.");
      return Ok(UpdateOutcome::PredicateFailed(product.clone()));
    }
    product.hold = new_hold;
    Ok(UpdateOutcome::Applied(product.clone()))
  }

  async fn clear_hold(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    let mut products = self.products.write();
    Ok(products.get_mut(id).map(|product| {
      let before = product.clone();
      product.hold = None;
      before
    }))
  }

  async fn atomic_delete(&self, id: &ProductId, expected: &Option<Hold>) -> ReservationResult<UpdateOutcome> {
    let mut products = self.products.write();
    let Some(product) = products.get(id) else {
      return Ok(UpdateOutcome::NotFound);
    };
    if &product.hold != expected {
      return Ok(UpdateOutcome::PredicateFailed(product.clone()));
    }
    Ok(products.remove(id).map_or(UpdateOutcome::NotFound, UpdateOutcome::Applied))
  }

  async fn scan_reserved_expired(&self, now: DateTime<Utc>) -> ReservationResult<Vec<Product>> {
    Ok(
      self
        .products
        .read()
        .values()
        .filter(|p| p.hold.as_ref().is_some_and(|h| h.is_lapsed_at(now)))
        .cloned()
        .collect(),
    )
  }

  async fn list(&self) -> ReservationResult<Vec<Product>> {
    let mut all: Vec<Product> = self.products.read().values().cloned().collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(all)
  }

  async fn insert(&self, product: Product) -> ReservationResult<Product> {
    let mut products = self.products.write();
    if products.contains_key(&product.id) {
      return Err(ReservationError::Storage {
        source: anyhow::anyhow!("duplicate product id '{}'", product.id),
      });
    }
    products.insert(product.id.clone(), product.clone());
    Ok(product)
  }

  async fn delete(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    Ok(self.products.write().remove(id))
  }
}
