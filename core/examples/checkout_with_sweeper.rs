// storefront_reservations/examples/checkout_with_sweeper.rs

use std::sync::Arc;
use std::time::Duration;
use storefront_reservations::{
  Checkout, ExpirySweeper, HolderId, InMemoryProductStore, Product, ProductId, ProductStore, ReservationConfig,
  ReservationManager, SystemClock,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  info!("--- Checkout With Sweeper Example ---");

  // Short windows so the demo finishes quickly; RESERVATION_* variables override them.
  let config = ReservationConfig::from_env()?
    .with_hold_duration(Duration::from_secs(2))
    .with_sweep_interval(Duration::from_millis(500));

  let store = Arc::new(InMemoryProductStore::new());
  for (title, price) in [("Felt slippers", 3_900), ("Beeswax candle", 1_200), ("Woven basket", 4_400)] {
    store.insert(Product::new(ProductId::generate(), title, price)).await?;
  }
  let items: Vec<ProductId> = store.list().await?.into_iter().map(|p| p.id).collect();

  let manager = Arc::new(ReservationManager::new(store.clone(), Arc::new(SystemClock), &config)?);
  let sweeper = ExpirySweeper::from_config(manager.clone(), &config).spawn();
  let checkout = Checkout::new(manager.clone());

  // Shopper A pays in time for the first two items.
  let session = checkout.begin(&HolderId::new("shopper-a"), &items[..2]).await?;
  let sold = checkout.confirm_payment(session).await?;
  info!(sold = sold.len(), remaining = store.len(), "shopper A completed the order");

  // Shopper B walks away from the last item; the sweeper frees it.
  checkout.begin(&HolderId::new("shopper-b"), &items[2..]).await?;
  tokio::time::sleep(Duration::from_secs(3)).await;
  match manager.reserved_products().await?.len() {
    0 => info!("abandoned hold was released by the sweeper"),
    n => warn!(n, "holds still present"),
  }

  let report = sweeper.shutdown().await?;
  info!(?report, "sweeper stopped");
  Ok(())
}
