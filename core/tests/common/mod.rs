// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use storefront_reservations::{
  Hold, HolderId, InMemoryProductStore, ManualClock, Product, ProductId, ProductStore, ReservationConfig,
  ReservationError, ReservationManager, ReservationResult, UpdateOutcome,
};
use tracing::Level;

// --- Fixtures ---

pub fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
}

pub fn pid(s: &str) -> ProductId {
  ProductId::new(s)
}

pub fn holder(s: &str) -> HolderId {
  HolderId::new(s)
}

pub fn catalog() -> Vec<Product> {
  vec![
    Product::new("scarf", "Hand-knit scarf", 4_500),
    Product::new("mug", "Glazed mug", 2_200),
    Product::new("tote", "Linen tote", 3_100),
  ]
}

pub struct Harness {
  pub store: InMemoryProductStore,
  pub clock: ManualClock,
  pub manager: Arc<ReservationManager>,
}

pub fn harness() -> Harness {
  harness_with(ReservationConfig::default())
}

pub fn harness_with(config: ReservationConfig) -> Harness {
  let store = InMemoryProductStore::with_products(catalog());
  let clock = ManualClock::new(t0());
  let manager = ReservationManager::new(Arc::new(store.clone()), Arc::new(clock.clone()), &config).unwrap();
  Harness {
    store,
    clock,
    manager: Arc::new(manager),
  }
}

pub fn manager_over(store: Arc<dyn ProductStore>, clock: &ManualClock) -> ReservationManager {
  ReservationManager::new(store, Arc::new(clock.clone()), &ReservationConfig::default()).unwrap()
}

// --- Stores with injected behaviour ---

/// Every call fails as if the database were unreachable.
#[derive(Debug, Default)]
pub struct FailingStore;

fn unreachable_db() -> ReservationError {
  anyhow::anyhow!("connection refused").into()
}

#[async_trait]
impl ProductStore for FailingStore {
  async fn find_by_id(&self, _id: &ProductId) -> ReservationResult<Option<Product>> {
    Err(unreachable_db())
  }
  async fn atomic_update(&self, _id: &ProductId, _e: &Option<Hold>, _n: Option<Hold>) -> ReservationResult<UpdateOutcome> {
    Err(unreachable_db())
  }
  async fn scan_reserved_expired(&self, _now: DateTime<Utc>) -> ReservationResult<Vec<Product>> {
    Err(unreachable_db())
  }
  async fn list(&self) -> ReservationResult<Vec<Product>> {
    Err(unreachable_db())
  }
  async fn insert(&self, _product: Product) -> ReservationResult<Product> {
    Err(unreachable_db())
  }
  async fn delete(&self, _id: &ProductId) -> ReservationResult<Option<Product>> {
    Err(unreachable_db())
  }
  async fn clear_hold(&self, _id: &ProductId) -> ReservationResult<Option<Product>> {
    Err(unreachable_db())
  }
  async fn atomic_delete(&self, _id: &ProductId, _e: &Option<Hold>) -> ReservationResult<UpdateOutcome> {
    Err(unreachable_db())
  }
}

/// Reads work, but conditional writes on one product fail as a storage error.
/// Every other product behaves like the in-memory store.
pub struct FaultyStore {
  pub inner: InMemoryProductStore,
  pub broken: ProductId,
}

impl FaultyStore {
  pub fn new(inner: InMemoryProductStore, broken: ProductId) -> Self {
    Self { inner, broken }
  }

  fn check(&self, id: &ProductId) -> ReservationResult<()> {
    if id == &self.broken {
      return Err(anyhow::anyhow!("write to {} timed out", id).into());
    }
    Ok(())
  }
}

#[async_trait]
impl ProductStore for FaultyStore {
  async fn find_by_id(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    self.inner.find_by_id(id).await
  }
  async fn atomic_update(&self, id: &ProductId, expected: &Option<Hold>, new_hold: Option<Hold>) -> ReservationResult<UpdateOutcome> {
    self.check(id)?;
    self.inner.atomic_update(id, expected, new_hold).await
  }
  async fn scan_reserved_expired(&self, now: DateTime<Utc>) -> ReservationResult<Vec<Product>> {
    self.inner.scan_reserved_expired(now).await
  }
  async fn list(&self) -> ReservationResult<Vec<Product>> {
    self.inner.list().await
  }
  async fn insert(&self, product: Product) -> ReservationResult<Product> {
    self.inner.insert(product).await
  }
  async fn delete(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    self.check(id)?;
    self.inner.delete(id).await
  }
  async fn clear_hold(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    self.check(id)?;
    self.inner.clear_hold(id).await
  }
  async fn atomic_delete(&self, id: &ProductId, expected: &Option<Hold>) -> ReservationResult<UpdateOutcome> {
    self.check(id)?;
    self.inner.atomic_delete(id, expected).await
  }
}

/// Runs `rival` against the inner store right before the first write it
/// forwards, simulating a competing writer that slipped in between a caller's
/// read and its write. `updates` counts forwarded `atomic_update` calls.
pub struct InterleavingStore {
  pub inner: InMemoryProductStore,
  rival: Mutex<Option<Box<dyn FnOnce(&InMemoryProductStore) + Send>>>,
  pub updates: AtomicUsize,
}

impl InterleavingStore {
  pub fn new(inner: InMemoryProductStore, rival: impl FnOnce(&InMemoryProductStore) + Send + 'static) -> Self {
    Self {
      inner,
      rival: Mutex::new(Some(Box::new(rival))),
      updates: AtomicUsize::new(0),
    }
  }

  fn let_rival_in(&self) {
    let rival = self.rival.lock().take();
    if let Some(rival) = rival {
      rival(&self.inner);
    }
  }
}

#[async_trait]
impl ProductStore for InterleavingStore {
  async fn find_by_id(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    self.inner.find_by_id(id).await
  }
  async fn atomic_update(&self, id: &ProductId, expected: &Option<Hold>, new_hold: Option<Hold>) -> ReservationResult<UpdateOutcome> {
    self.let_rival_in();
    self.updates.fetch_add(1, Ordering::SeqCst);
    self.inner.atomic_update(id, expected, new_hold).await
  }
  async fn scan_reserved_expired(&self, now: DateTime<Utc>) -> ReservationResult<Vec<Product>> {
    self.inner.scan_reserved_expired(now).await
  }
  async fn list(&self) -> ReservationResult<Vec<Product>> {
    self.inner.list().await
  }
  async fn insert(&self, product: Product) -> ReservationResult<Product> {
    self.inner.insert(product).await
  }
  async fn delete(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    self.inner.delete(id).await
  }
  async fn clear_hold(&self, id: &ProductId) -> ReservationResult<Option<Product>> {
    self.let_rival_in();
    self.inner.clear_hold(id).await
  }
  async fn atomic_delete(&self, id: &ProductId, expected: &Option<Hold>) -> ReservationResult<UpdateOutcome> {
    self.let_rival_in();
    self.inner.atomic_delete(id, expected).await
  }
}

/// Overwrites a product's hold directly, bypassing the manager.
pub fn force_hold(store: &InMemoryProductStore, id: &ProductId, hold: Option<Hold>) {
  let mut product = store.get(id).expect("fixture product exists");
  product.hold = hold;
  store.upsert(product);
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
