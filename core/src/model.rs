// storefront_reservations/src/model.rs

//! Product documents and the reservation sub-state carried on them.
//!
//! A product is either free (`hold == None`) or held by exactly one holder until
//! an absolute expiry. The document form keeps the storefront's field names
//! (`isReserved`, `reservedBy`, `reservedUntil`), but in memory the three fields
//! collapse into a single `Option<Hold>` so a half-set reservation cannot exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, immutable product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
  pub fn new(id: impl Into<String>) -> Self {
    ProductId(id.into())
  }

  /// A fresh random id, used when the store assigns one.
  pub fn generate() -> Self {
    ProductId(uuid::Uuid::new_v4().simple().to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ProductId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for ProductId {
  fn from(s: &str) -> Self {
    ProductId(s.to_string())
  }
}

impl From<String> for ProductId {
  fn from(s: String) -> Self {
    ProductId(s)
  }
}

/// Client-supplied identifier of whoever owns a hold. Never verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
  pub fn new(id: impl Into<String>) -> Self {
    HolderId(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for HolderId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for HolderId {
  fn from(s: &str) -> Self {
    HolderId(s.to_string())
  }
}

impl From<String> for HolderId {
  fn from(s: String) -> Self {
    HolderId(s)
  }
}

/// An active or lapsed claim on a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
  pub reserved_by: HolderId,
  pub reserved_until: DateTime<Utc>,
}

impl Hold {
  pub fn new(reserved_by: HolderId, reserved_until: DateTime<Utc>) -> Self {
    Self {
      reserved_by,
      reserved_until,
    }
  }

  /// Still blocks other holders at `now`.
  pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
    self.reserved_until > now
  }

  /// Eligible for the sweep: strictly past its expiry.
  pub fn is_lapsed_at(&self, now: DateTime<Utc>) -> bool {
    self.reserved_until < now
  }

  pub fn is_held_by(&self, holder: &HolderId) -> bool {
    &self.reserved_by == holder
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProductDocument", into = "ProductDocument")]
pub struct Product {
  pub id: ProductId,
  pub title: String,
  /// Price in minor currency units.
  pub price: u64,
  pub hold: Option<Hold>,
}

impl Product {
  /// A reservation-free product.
  pub fn new(id: impl Into<ProductId>, title: impl Into<String>, price: u64) -> Self {
    Self {
      id: id.into(),
      title: title.into(),
      price,
      hold: None,
    }
  }

  pub fn is_reserved(&self) -> bool {
    self.hold.is_some()
  }

  pub fn reserved_by(&self) -> Option<&HolderId> {
    self.hold.as_ref().map(|h| &h.reserved_by)
  }

  pub fn reserved_until(&self) -> Option<DateTime<Utc>> {
    self.hold.as_ref().map(|h| h.reserved_until)
  }

  pub fn reservation_state(&self) -> ReservationState {
    ReservationState::from(self)
  }
}

// Stored document layout.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDocument {
  id: ProductId,
  title: String,
  price: u64,
  #[serde(default)]
  is_reserved: bool,
  #[serde(default)]
  reserved_by: Option<HolderId>,
  #[serde(default)]
  reserved_until: Option<DateTime<Utc>>,
}

impl TryFrom<ProductDocument> for Product {
  type Error = String;

  fn try_from(doc: ProductDocument) -> Result<Self, Self::Error> {
    let hold = match (doc.is_reserved, doc.reserved_by, doc.reserved_until) {
      (false, _, _) => None,
      (true, Some(reserved_by), Some(reserved_until)) => Some(Hold::new(reserved_by, reserved_until)),
      (true, _, _) => {
        return Err(format!(
          "product {} is marked reserved without both reservedBy and reservedUntil",
          doc.id
        ))
      }
    };
    Ok(Product {
      id: doc.id,
      title: doc.title,
      price: doc.price,
      hold,
    })
  }
}

impl From<Product> for ProductDocument {
  fn from(p: Product) -> Self {
    let (reserved_by, reserved_until) = match p.hold {
      Some(h) => (Some(h.reserved_by), Some(h.reserved_until)),
      None => (None, None),
    };
    ProductDocument {
      id: p.id,
      is_reserved: reserved_by.is_some(),
      title: p.title,
      price: p.price,
      reserved_by,
      reserved_until,
    }
  }
}

/// Reservation sub-state returned by the manager's operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationState {
  pub product_id: ProductId,
  pub is_reserved: bool,
  pub reserved_by: Option<HolderId>,
  pub reserved_until: Option<DateTime<Utc>>,
}

impl From<&Product> for ReservationState {
  fn from(p: &Product) -> Self {
    ReservationState {
      product_id: p.id.clone(),
      is_reserved: p.is_reserved(),
      reserved_by: p.reserved_by().cloned(),
      reserved_until: p.reserved_until(),
    }
  }
}
