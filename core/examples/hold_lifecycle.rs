// storefront_reservations/examples/hold_lifecycle.rs

use chrono::Duration;
use std::sync::Arc;
use storefront_reservations::{
  HolderId, InMemoryProductStore, ManualClock, Product, ProductId, ReservationConfig, ReservationError,
  ReservationManager, ReservationResult,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ReservationResult<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  info!("--- Hold Lifecycle Example ---");

  // 1. A one-item catalog and a clock we can move by hand.
  let store = InMemoryProductStore::with_products([Product::new("vase", "Stoneware vase", 5_900)]);
  let clock = ManualClock::starting_now();
  let manager = ReservationManager::new(Arc::new(store), Arc::new(clock.clone()), &ReservationConfig::default())?;

  let vase = ProductId::new("vase");
  let u1 = HolderId::new("u1");
  let u2 = HolderId::new("u2");

  // 2. u1 puts the vase in their cart.
  let state = manager.reserve(&vase, &u1).await?;
  info!(holder = ?state.reserved_by, until = ?state.reserved_until, "u1 holds the vase");

  // 3. u2 tries too and is turned away.
  match manager.reserve(&vase, &u2).await {
    Err(ReservationError::Conflict { .. }) => info!("u2: item unavailable"),
    other => info!(?other, "unexpected outcome for u2"),
  }

  // 4. u1 abandons the cart; twenty minutes pass without a sweep.
  clock.advance(Duration::minutes(20));
  let state = manager.reserve(&vase, &u2).await?;
  info!(holder = ?state.reserved_by, "u2 took over the lapsed hold");

  // 5. u2 cancels payment.
  let state = manager.unreserve(&vase).await?;
  info!(reserved = state.is_reserved, "vase is free again");

  Ok(())
}
