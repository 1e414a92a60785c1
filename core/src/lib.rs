// src/lib.rs

//! Time-boxed product holds for a small storefront.
//!
//! A shopper who adds an item to the cart or starts checkout takes a hold on
//! the product for a fixed window (20 minutes by default). While the hold is
//! active, nobody else can reserve the item. Holds end when:
//!  - the holder or the checkout flow releases them (`unreserve`),
//!  - the product is sold and removed (`complete_sale`),
//!  - another shopper reserves after expiry (lazy takeover),
//!  - or the background [`ExpirySweeper`] clears them.
//!
//! All coordination happens through the stored product document; the store
//! only has to offer an atomic compare-and-swap per document
//! ([`ProductStore::atomic_update`]).

pub mod checkout;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod memory;
pub mod model;
pub mod store;
pub mod sweeper;

// --- Re-exports for the Public API ---

pub use crate::checkout::{Checkout, CheckoutSession};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::ReservationConfig;
pub use crate::error::{ReservationError, ReservationResult};
pub use crate::manager::ReservationManager;
pub use crate::memory::InMemoryProductStore;
pub use crate::model::{Hold, HolderId, Product, ProductId, ReservationState};
pub use crate::store::{ProductStore, UpdateOutcome};
pub use crate::sweeper::{ExpirySweeper, SweepReport, SweeperHandle};

/*
    Typical wiring in a host process:
    1. Build a store (`InMemoryProductStore` or a database-backed `ProductStore`).
    2. Load `ReservationConfig::from_env()`.
    3. Create `Arc<ReservationManager>` with the store, `SystemClock` and config.
    4. `ExpirySweeper::from_config(manager.clone(), &config).spawn()` and keep the
       handle; call `.shutdown().await` when the server stops.
    5. Route "reserve"/"unreserve" requests to the manager, and the checkout
       page to `Checkout`.
*/
