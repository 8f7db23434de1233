//! Aggregates module
pub mod cart;
pub mod line_item;

pub use cart::{Cart, CartError, CartSnapshot};
pub use line_item::{resolve_unit_price, LineItem, ProductInput};
