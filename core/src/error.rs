// storefront_reservations/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

use crate::model::{HolderId, ProductId};

#[derive(Debug, Error)]
pub enum ReservationError {
  #[error("Product not found: {product_id}")]
  NotFound { product_id: ProductId },

  #[error("Product {product_id} is already reserved by another user")]
  Conflict { product_id: ProductId },

  #[error("Holder id must be a non-empty string")]
  InvalidHolder,

  /// The compare-and-swap on the product kept losing to concurrent writers.
  #[error("Reservation of product {product_id} abandoned after {attempts} contended attempts")]
  Contention { product_id: ProductId, attempts: u32 },

  #[error("Hold on product {product_id} is no longer owned by '{holder}'")]
  HoldLost { product_id: ProductId, holder: HolderId },

  /// Some items were already removed as sold when a later one failed.
  #[error("Sale stopped at product {failed} after {} item(s) were sold. Source: {source}", .sold.len())]
  SaleIncomplete {
    sold: Vec<ProductId>,
    failed: ProductId,
    #[source]
    source: Box<ReservationError>,
  },

  #[error("Payment window for holder '{holder}' has elapsed")]
  PaymentWindowElapsed { holder: HolderId },

  #[error("Configuration error for '{key}': {message}")]
  Configuration { key: String, message: String },

  #[error("Storage failure. Source: {source}")]
  Storage {
    #[source]
    source: AnyhowError,
  },
}

impl ReservationError {
  /// True for failures the caller may resolve by retrying later or picking another item.
  pub fn is_unavailable(&self) -> bool {
    matches!(
      self,
      ReservationError::Conflict { .. } | ReservationError::Contention { .. } | ReservationError::HoldLost { .. }
    )
  }
}

// Store implementations report their own failures through anyhow.
impl From<AnyhowError> for ReservationError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<ReservationError>() {
      Ok(inner) => inner,
      Err(source) => ReservationError::Storage { source },
    }
  }
}

pub type ReservationResult<T, E = ReservationError> = std::result::Result<T, E>;
