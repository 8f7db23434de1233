//! OpenSASE Cart
//!
//! Storefront shopping cart with two persistence modes.
//!
//! ## Features
//! - Server-backed carts for signed-in shoppers, local slots for guests
//! - Merge-by-slug for guest adds
//! - Per-line tax by category, loyalty coins on the total
//! - One serialized actor per cart, best-effort analytics events
//! - HTTP gateway for the storefront UI

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod service;
pub mod telemetry;

use thiserror::Error;

pub use domain::aggregates::{Cart, CartSnapshot, LineItem, ProductInput};
pub use service::{AuthContext, CartCommand, CartHandle, CartRegistry, CartStore, CartView, LineRef};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CartServiceError {
    #[error(transparent)]
    Remote(#[from] infrastructure::RemoteError),

    #[error(transparent)]
    Local(#[from] infrastructure::LocalStoreError),

    #[error(transparent)]
    Cart(#[from] domain::aggregates::CartError),

    #[error("Invalid product: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Line reference {0} does not match the active cart mode")]
    LineRefMismatch(LineRef),

    #[error("Cart is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, CartServiceError>;
