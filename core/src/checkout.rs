// storefront_reservations/src/checkout.rs

//! Cart-level checkout on top of the reservation manager.
//!
//! The storefront reserves (or re-reserves) every cart item before showing the
//! payment step, then either sells the items once payment is confirmed or
//! releases them when payment is cancelled or its timer runs out. Payment
//! itself is simulated by the caller; this module only moves holds.

use crate::error::{ReservationError, ReservationResult};
use crate::manager::ReservationManager;
use crate::model::{HolderId, Product, ProductId, ReservationState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Items held for one holder while payment is pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
  pub holder: HolderId,
  pub items: Vec<ProductId>,
  /// The payment step must be confirmed before this instant.
  pub payment_deadline: DateTime<Utc>,
  pub reservations: Vec<ReservationState>,
}

#[derive(Debug, Clone)]
pub struct Checkout {
  manager: Arc<ReservationManager>,
}

impl Checkout {
  pub fn new(manager: Arc<ReservationManager>) -> Self {
    Self { manager }
  }

  /// Reserves every item for `holder`, in cart order.
  ///
  /// The first item that cannot be held aborts the checkout with its error
  /// (`NotFound`, `Conflict`, ...). Items already reserved by this call keep
  /// their holds; they lapse on their own or are dropped by [`cancel`](Self::cancel).
  #[instrument(name = "Checkout::begin", skip_all, fields(holder = %holder, items = items.len()), err(Display))]
  pub async fn begin(&self, holder: &HolderId, items: &[ProductId]) -> ReservationResult<CheckoutSession> {
    let mut reservations = Vec::with_capacity(items.len());
    for product_id in items {
      let state = self.manager.reserve(product_id, holder).await.map_err(|e| {
        event!(Level::WARN, product_id = %product_id, error = %e, "Cart item unavailable.");
        e
      })?;
      reservations.push(state);
    }

    let payment_deadline = self.manager.clock().now() + self.manager.hold_duration();
    event!(Level::INFO, %payment_deadline, "All cart items held; awaiting payment.");
    Ok(CheckoutSession {
      holder: holder.clone(),
      items: items.to_vec(),
      payment_deadline,
      reservations,
    })
  }

  /// Releases the items of the session that `session.holder` still holds.
  ///
  /// Items whose hold has passed to another holder are left alone, and items
  /// that no longer exist are skipped. Returns how many holds were released.
  #[instrument(name = "Checkout::cancel", skip_all, fields(holder = %session.holder), err(Display))]
  pub async fn cancel(&self, session: &CheckoutSession) -> ReservationResult<usize> {
    let mut released = 0usize;
    for product_id in &session.items {
      match self.manager.release_held_by(product_id, &session.holder).await {
        Ok(true) => released += 1,
        Ok(false) => {
          event!(Level::DEBUG, product_id = %product_id, "Item no longer held by this checkout; skipped.");
        }
        Err(ReservationError::NotFound { .. }) => {
          event!(Level::DEBUG, product_id = %product_id, "Item vanished before release.");
        }
        Err(e) => return Err(e),
      }
    }
    event!(Level::INFO, released, "Checkout cancelled.");
    Ok(released)
  }

  /// Completes the order: every item is removed from the catalog as sold.
  ///
  /// The deadline is exclusive: at `payment_deadline` the holds are already
  /// open to takeover, so the session is cancelled and `PaymentWindowElapsed`
  /// returned. Every item must still be actively held by the session's holder
  /// before any of them is sold. If a sale fails after others went through,
  /// `SaleIncomplete` names the products that were removed.
  #[instrument(name = "Checkout::confirm_payment", skip_all, fields(holder = %session.holder), err(Display))]
  pub async fn confirm_payment(&self, session: CheckoutSession) -> ReservationResult<Vec<Product>> {
    let now = self.manager.clock().now();
    if now >= session.payment_deadline {
      event!(Level::WARN, deadline = %session.payment_deadline, "Payment confirmed too late; releasing items.");
      self.cancel(&session).await?;
      return Err(ReservationError::PaymentWindowElapsed { holder: session.holder });
    }

    for product_id in &session.items {
      self.manager.ensure_held_by(product_id, &session.holder).await.map_err(|e| {
        event!(Level::WARN, product_id = %product_id, error = %e, "Cart item no longer held; nothing sold.");
        e
      })?;
    }

    let mut sold: Vec<Product> = Vec::with_capacity(session.items.len());
    for product_id in &session.items {
      match self.manager.complete_sale_for(product_id, &session.holder).await {
        Ok(product) => sold.push(product),
        Err(e) if sold.is_empty() => return Err(e),
        Err(e) => {
          event!(Level::ERROR, product_id = %product_id, sold = sold.len(), error = %e, "Order stopped part way through.");
          return Err(ReservationError::SaleIncomplete {
            sold: sold.into_iter().map(|p| p.id).collect(),
            failed: product_id.clone(),
            source: Box::new(e),
          });
        }
      }
    }
    event!(Level::INFO, sold = sold.len(), "Order completed.");
    Ok(sold)
  }
}
