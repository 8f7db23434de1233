//! In-memory Remote Cart Service for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use crate::domain::aggregates::ProductInput;
use crate::infrastructure::{RemoteCart, RemoteCartRow, RemoteError};

pub fn product(id: i64, slug: &str, price: &str, category: Option<&str>) -> ProductInput {
    ProductInput {
        id: (id > 0).then_some(id),
        slug: slug.into(),
        title: slug.to_uppercase(),
        price: Some(price.into()),
        category: category.map(Into::into),
        ..Default::default()
    }
}

/// Behaves like the backend: one row per product, adds increment.
#[derive(Debug, Default)]
pub struct FakeRemote {
    rows: Mutex<Vec<RemoteCartRow>>,
    catalog: Mutex<HashMap<i64, ProductInput>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicI64,
    failing: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
}

impl FakeRemote {
    pub fn new() -> Self { Self { next_id: AtomicI64::new(100), ..Default::default() } }

    pub fn set_failing(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }
    pub fn set_fetch_delay(&self, delay: Duration) { *self.fetch_delay.lock().unwrap() = Some(delay); }
    pub fn rows(&self) -> Vec<RemoteCartRow> { self.rows.lock().unwrap().clone() }
    pub fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }

    /// Puts a product in the server cart without going through the API.
    pub fn seed(&self, product: ProductInput, quantity: i64) {
        let product_id = product.id.unwrap_or(0);
        self.catalog.lock().unwrap().insert(product_id, product);
        self.upsert(product_id, quantity);
    }

    fn upsert(&self, product_id: i64, quantity: i64) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.product_id == product_id) {
            row.quantity += quantity;
            return;
        }
        let known = self.catalog.lock().unwrap().get(&product_id).cloned().unwrap_or_default();
        rows.push(RemoteCartRow {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            product_id,
            quantity,
            slug: (!known.slug.is_empty()).then_some(known.slug),
            title: (!known.title.is_empty()).then_some(known.title),
            price: known.price,
            category: known.category,
            ..Default::default()
        });
    }

    fn record(&self, call: &str) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Status { status: 503, body: "unavailable".into() });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCart for FakeRemote {
    async fn fetch(&self, _token: &str) -> Result<Vec<RemoteCartRow>, RemoteError> {
        self.record("fetch")?;
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay { tokio::time::sleep(delay).await; }
        Ok(self.rows())
    }

    async fn add(&self, _token: &str, product_id: i64, quantity: u32) -> Result<(), RemoteError> {
        self.record("add")?;
        self.upsert(product_id, i64::from(quantity));
        Ok(())
    }

    async fn update(&self, _token: &str, item_id: i64, quantity: u32) -> Result<(), RemoteError> {
        self.record("update")?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|r| r.id == item_id).ok_or(RemoteError::Status { status: 404, body: "no such item".into() })?;
        row.quantity = i64::from(quantity);
        Ok(())
    }

    async fn remove(&self, _token: &str, item_id: i64) -> Result<(), RemoteError> {
        self.record("remove")?;
        self.rows.lock().unwrap().retain(|r| r.id != item_id);
        Ok(())
    }

    async fn clear(&self, _token: &str) -> Result<(), RemoteError> {
        self.record("clear")?;
        self.rows.lock().unwrap().clear();
        Ok(())
    }
}
