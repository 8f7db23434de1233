//! Cart Store
//!
//! Owns one cart's lines and decides which backend is authoritative. A cart is
//! either remote-backed (signed-in shopper, server rows) or local-backed (guest,
//! local slot). Switching between the two reloads from the newly active side;
//! the two are never merged.
//!
//! No operation fails outright. Each one resolves to a [`CartView`], with
//! `last_error` set when something went wrong along the way.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use validator::Validate;
use crate::domain::aggregates::{Cart, CartError, CartSnapshot, LineItem, ProductInput};
use crate::domain::events::CartEvent;
use crate::domain::loyalty::LoyaltyFormula;
use crate::domain::value_objects::Quantity;
use crate::infrastructure::local::{read_lines, write_lines, SlotContents};
use crate::infrastructure::{LocalStore, RemoteCart, RemoteCartRow};
use crate::telemetry::Tracker;
use crate::CartServiceError;

/// Who is shopping, as far as the cart needs to know.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthContext {
    Anonymous,
    Bearer(String),
}

/// Which side holds the durable copy of the cart.
#[derive(Clone, PartialEq, Eq)]
pub enum Backing {
    RemoteBacked { token: String },
    LocalBacked,
}

impl Backing {
    pub fn mode(&self) -> CartMode {
        match self { Self::RemoteBacked { .. } => CartMode::Remote, Self::LocalBacked => CartMode::Local }
    }

    fn token(&self) -> Option<&str> {
        match self { Self::RemoteBacked { token } => Some(token), Self::LocalBacked => None }
    }
}

impl From<AuthContext> for Backing {
    fn from(auth: AuthContext) -> Self {
        match auth { AuthContext::Bearer(token) => Self::RemoteBacked { token }, AuthContext::Anonymous => Self::LocalBacked }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:?}", self.mode()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CartMode {
    Remote,
    Local,
}

/// How callers point at a line. Server ids in remote mode, positions in local mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineRef {
    Server(i64),
    Local(usize),
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Server(id) => write!(f, "item #{id}"), Self::Local(index) => write!(f, "position {index}") }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_id: String,
    pub mode: CartMode,
    #[serde(flatten)]
    pub snapshot: CartSnapshot,
    /// Views are taken between operations, so this is normally `false`. Watch
    /// [`CartStore::loading`] to see a reload while it runs.
    pub is_loading: bool,
    pub last_error: Option<String>,
}

pub struct CartStore<R, L> {
    cart_id: String,
    slot: String,
    backing: Backing,
    cart: Cart,
    loading: watch::Sender<bool>,
    last_error: Option<String>,
    remote: Arc<R>,
    local: Arc<L>,
    tracker: Tracker,
    loyalty: Arc<dyn LoyaltyFormula>,
}

impl<R: RemoteCart, L: LocalStore> CartStore<R, L> {
    /// Starts empty; call [`CartStore::load`] to pull the durable copy.
    pub fn new(
        cart_id: impl Into<String>,
        auth: AuthContext,
        remote: Arc<R>,
        local: Arc<L>,
        tracker: Tracker,
        loyalty: Arc<dyn LoyaltyFormula>,
    ) -> Self {
        let cart_id = cart_id.into();
        Self {
            slot: format!("cart:{cart_id}"),
            cart_id,
            backing: auth.into(),
            cart: Cart::new(),
            loading: watch::channel(false).0,
            last_error: None,
            remote,
            local,
            tracker,
            loyalty,
        }
    }

    pub fn cart_id(&self) -> &str { &self.cart_id }
    pub fn mode(&self) -> CartMode { self.backing.mode() }
    pub fn items(&self) -> &[LineItem] { self.cart.items() }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }
    /// Flips to `true` for the duration of every reload.
    pub fn loading(&self) -> watch::Receiver<bool> { self.loading.subscribe() }

    pub fn view(&self) -> CartView {
        CartView {
            cart_id: self.cart_id.clone(),
            mode: self.backing.mode(),
            snapshot: self.cart.snapshot(self.loyalty.as_ref()),
            is_loading: *self.loading.borrow(),
            last_error: self.last_error.clone(),
        }
    }

    /// Replaces the lines with whatever the active backend holds.
    pub async fn load(&mut self) -> CartView {
        let outcome = self.refresh().await;
        self.settle(outcome)
    }

    /// Swaps the backend when the shopper signs in or out, then reloads.
    /// A guest cart is not carried over into the account cart.
    pub async fn set_auth(&mut self, auth: AuthContext) -> CartView {
        let backing = Backing::from(auth);
        if backing == self.backing { return self.view(); }

        tracing::info!(cart_id = %self.cart_id, from = ?self.backing, to = ?backing, "Cart backing changed, reloading");
        self.backing = backing;
        self.cart.clear();
        self.load().await
    }

    pub async fn add_item(&mut self, product: ProductInput, quantity: u32) -> CartView {
        let outcome = self.try_add_item(product, quantity).await;
        self.settle(outcome)
    }

    pub async fn remove_item(&mut self, line: LineRef) -> CartView {
        let outcome = self.try_remove_item(line).await;
        self.settle(outcome)
    }

    /// A quantity below one removes the line.
    pub async fn update_quantity(&mut self, line: LineRef, quantity: i64) -> CartView {
        let Some(quantity) = Quantity::from_signed(quantity) else { return self.remove_item(line).await };
        let outcome = self.try_update_quantity(line, quantity).await;
        self.settle(outcome)
    }

    /// Empties the cart and always purges the local slot, whichever mode is active.
    pub async fn clear(&mut self) -> CartView {
        let outcome = self.try_clear().await;
        self.settle(outcome)
    }

    async fn refresh(&mut self) -> Result<(), CartServiceError> {
        self.loading.send_replace(true);
        let outcome = match self.backing.token().map(str::to_owned) {
            Some(token) => match self.remote.fetch(&token).await {
                Ok(rows) => {
                    self.cart.replace(rows.into_iter().filter_map(RemoteCartRow::into_line_item).collect());
                    if let Err(e) = self.purge_local() {
                        tracing::warn!(cart_id = %self.cart_id, error = %e, "Failed to purge stale local cart");
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(cart_id = %self.cart_id, error = %e, "Cart service unavailable, serving local copy");
                    let lines = self.read_local();
                    self.cart.replace(lines);
                    Err(e.into())
                }
            },
            None => {
                let lines = self.read_local();
                self.cart.replace(lines);
                Ok(())
            }
        };
        self.loading.send_replace(false);
        outcome
    }

    async fn try_add_item(&mut self, product: ProductInput, quantity: u32) -> Result<(), CartServiceError> {
        let quantity = Quantity::new(quantity).ok_or(CartServiceError::InvalidQuantity)?;
        product.validate()?;
        self.tracker.track(CartEvent::added(&self.cart_id, product.remote_id(), &product.title, quantity.value()));

        if let (Some(token), Some(product_id)) = (self.backing.token().map(str::to_owned), product.remote_id()) {
            return match self.remote.add(&token, product_id, quantity.value()).await {
                Ok(()) => self.refresh().await,
                Err(e) => {
                    // Degraded add: keep the shopper's line locally.
                    self.cart.merge_by_slug(LineItem::from_product(&product, quantity));
                    if let Err(pe) = self.persist_local() {
                        tracing::warn!(cart_id = %self.cart_id, error = %pe, "Failed to persist degraded cart");
                    }
                    Err(e.into())
                }
            };
        }

        self.cart.merge_by_slug(LineItem::from_product(&product, quantity));
        self.persist_local()
    }

    async fn try_remove_item(&mut self, line: LineRef) -> Result<(), CartServiceError> {
        match (self.backing.token().map(str::to_owned), line) {
            (Some(token), LineRef::Server(item_id)) => {
                let (product_id, product_name) = identity(self.cart.find_by_item_id(item_id));
                self.tracker.track(CartEvent::removed(&self.cart_id, product_id, product_name));
                self.remote.remove(&token, item_id).await?;
                self.refresh().await
            }
            (None, LineRef::Local(index)) => {
                let found = self.cart.get(index).ok_or(CartError::LineNotFound(index))?;
                let (product_id, product_name) = identity(Some(found));
                self.tracker.track(CartEvent::removed(&self.cart_id, product_id, product_name));
                self.cart.remove_at(index)?;
                self.persist_local()
            }
            (_, line) => Err(CartServiceError::LineRefMismatch(line)),
        }
    }

    async fn try_update_quantity(&mut self, line: LineRef, quantity: Quantity) -> Result<(), CartServiceError> {
        match (self.backing.token().map(str::to_owned), line) {
            (Some(token), LineRef::Server(item_id)) => {
                let (product_id, product_name) = identity(self.cart.find_by_item_id(item_id));
                self.tracker.track(CartEvent::updated(&self.cart_id, product_id, product_name, quantity.value()));
                self.remote.update(&token, item_id, quantity.value()).await?;
                self.refresh().await
            }
            (None, LineRef::Local(index)) => {
                let found = self.cart.get(index).ok_or(CartError::LineNotFound(index))?;
                let (product_id, product_name) = identity(Some(found));
                self.tracker.track(CartEvent::updated(&self.cart_id, product_id, product_name, quantity.value()));
                self.cart.set_quantity_at(index, quantity)?;
                self.persist_local()
            }
            (_, line) => Err(CartServiceError::LineRefMismatch(line)),
        }
    }

    async fn try_clear(&mut self) -> Result<(), CartServiceError> {
        self.tracker.track(CartEvent::cleared(&self.cart_id, self.cart.line_count()));

        let remote = match self.backing.token().map(str::to_owned) {
            Some(token) => self.remote.clear(&token).await.map_err(CartServiceError::from),
            None => Ok(()),
        };
        if remote.is_ok() { self.cart.clear(); }

        let purged = self.purge_local();
        remote.and(purged)
    }

    /// Malformed or unreadable slots load as an empty cart without surfacing an error.
    fn read_local(&self) -> Vec<LineItem> {
        match read_lines(self.local.as_ref(), &self.slot) {
            Ok(SlotContents::Malformed(reason)) => {
                tracing::warn!(cart_id = %self.cart_id, %reason, "Discarding malformed local cart");
                Vec::new()
            }
            Ok(contents) => contents.into_lines(),
            Err(e) => {
                tracing::warn!(cart_id = %self.cart_id, error = %e, "Failed to read local cart");
                Vec::new()
            }
        }
    }

    fn persist_local(&self) -> Result<(), CartServiceError> {
        Ok(write_lines(self.local.as_ref(), &self.slot, self.cart.items())?)
    }

    fn purge_local(&self) -> Result<(), CartServiceError> {
        Ok(self.local.remove(&self.slot)?)
    }

    fn settle(&mut self, outcome: Result<(), CartServiceError>) -> CartView {
        self.last_error = match outcome {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(cart_id = %self.cart_id, mode = ?self.backing, error = %e, "Cart operation degraded");
                Some(e.to_string())
            }
        };
        self.view()
    }
}

fn identity(line: Option<&LineItem>) -> (Option<i64>, Option<String>) {
    match line {
        Some(line) => (Some(line.product_id).filter(|id| *id > 0), Some(line.title.clone())),
        None => (None, None),
    }
}
