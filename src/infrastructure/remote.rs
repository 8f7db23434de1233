//! Remote Cart Service client
//!
//! The authenticated backend owns one row per cart line. Every call carries the
//! caller's bearer token; whether that token is valid is the backend's problem.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use crate::domain::aggregates::{resolve_unit_price, LineItem};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Cart service unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cart service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid cart service response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The backend cart API.
#[async_trait]
pub trait RemoteCart: Send + Sync + 'static {
    async fn fetch(&self, token: &str) -> Result<Vec<RemoteCartRow>, RemoteError>;
    async fn add(&self, token: &str, product_id: i64, quantity: u32) -> Result<(), RemoteError>;
    async fn update(&self, token: &str, item_id: i64, quantity: u32) -> Result<(), RemoteError>;
    async fn remove(&self, token: &str, item_id: i64) -> Result<(), RemoteError>;
    async fn clear(&self, token: &str) -> Result<(), RemoteError>;
}

/// One line as the backend returns it. Prices arrive as strings or numbers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCartRow {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, alias = "name")]
    pub title: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "price_field")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "price_field")]
    pub mrp: Option<String>,
    #[serde(default, alias = "website_price", deserialize_with = "price_field")]
    pub discounted_price: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RemoteCartRow {
    /// `None` for rows that would violate the quantity invariant.
    pub fn into_line_item(self) -> Option<LineItem> {
        let quantity = u32::try_from(self.quantity).ok().filter(|q| *q > 0)?;
        let unit_price = resolve_unit_price(self.price.as_deref(), self.mrp.as_deref(), self.discounted_price.as_deref());
        Some(LineItem {
            item_id: Some(self.id),
            product_id: self.product_id,
            product_slug: self.slug.unwrap_or_else(|| format!("product-{}", self.product_id)),
            title: self.title.unwrap_or_default(),
            image_url: self.image_url,
            unit_price,
            quantity,
            category: self.category,
            mrp: self.mrp,
            discounted_price: self.discounted_price,
        })
    }
}

fn price_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `GET /cart` answers with a bare array or an envelope, depending on the deployment.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CartListing {
    Rows(Vec<RemoteCartRow>),
    Wrapped {
        #[serde(alias = "data")]
        items: Vec<RemoteCartRow>,
    },
}

impl CartListing {
    fn into_rows(self) -> Vec<RemoteCartRow> {
        match self { Self::Rows(rows) | Self::Wrapped { items: rows } => rows }
    }
}

#[derive(Serialize)]
struct AddRequest { product_id: i64, quantity: u32 }

#[derive(Serialize)]
struct UpdateRequest { quantity: u32 }

/// reqwest-backed [`RemoteCart`].
#[derive(Debug, Clone)]
pub struct HttpRemoteCart {
    client: Client,
    base_url: String,
}

impl HttpRemoteCart {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String { format!("{}/{}", self.base_url, path.trim_start_matches('/')) }

    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() { return Ok(response); }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl RemoteCart for HttpRemoteCart {
    async fn fetch(&self, token: &str) -> Result<Vec<RemoteCartRow>, RemoteError> {
        let response = self.client.get(self.url("cart")).bearer_auth(token).send().await?;
        let body = Self::check(response).await?.bytes().await?;
        let listing: CartListing = serde_json::from_slice(&body)?;
        Ok(listing.into_rows())
    }

    async fn add(&self, token: &str, product_id: i64, quantity: u32) -> Result<(), RemoteError> {
        let response = self.client.post(self.url("cart")).bearer_auth(token).json(&AddRequest { product_id, quantity }).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn update(&self, token: &str, item_id: i64, quantity: u32) -> Result<(), RemoteError> {
        let response = self.client.put(self.url(&format!("cart/{item_id}"))).bearer_auth(token).json(&UpdateRequest { quantity }).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn remove(&self, token: &str, item_id: i64) -> Result<(), RemoteError> {
        let response = self.client.delete(self.url(&format!("cart/{item_id}"))).bearer_auth(token).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn clear(&self, token: &str) -> Result<(), RemoteError> {
        let response = self.client.delete(self.url("cart")).bearer_auth(token).send().await?;
        Self::check(response).await.map(drop)
    }
}
