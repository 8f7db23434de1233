//! Cart tracking events
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartAction {
    Add,
    Remove,
    Update,
    Clear,
}

/// What the storefront reports to analytics for each cart mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEvent {
    pub event_id: Uuid,
    pub cart_id: String,
    pub action: CartAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    pub occurred_at: DateTime<Utc>,
}

impl CartEvent {
    fn new(cart_id: &str, action: CartAction) -> Self {
        Self {
            event_id: Uuid::now_v7(), cart_id: cart_id.to_string(), action,
            product_id: None, product_name: None, quantity: None, item_count: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn added(cart_id: &str, product_id: Option<i64>, product_name: &str, quantity: u32) -> Self {
        Self { product_id, product_name: Some(product_name.to_string()), quantity: Some(quantity), ..Self::new(cart_id, CartAction::Add) }
    }

    pub fn removed(cart_id: &str, product_id: Option<i64>, product_name: Option<String>) -> Self {
        Self { product_id, product_name, ..Self::new(cart_id, CartAction::Remove) }
    }

    pub fn updated(cart_id: &str, product_id: Option<i64>, product_name: Option<String>, quantity: u32) -> Self {
        Self { product_id, product_name, quantity: Some(quantity), ..Self::new(cart_id, CartAction::Update) }
    }

    pub fn cleared(cart_id: &str, item_count: usize) -> Self {
        Self { item_count: Some(item_count), ..Self::new(cart_id, CartAction::Clear) }
    }
}
