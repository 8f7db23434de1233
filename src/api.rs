//! Storefront HTTP gateway
//!
//! Each request carries its own credentials into the session's cart together
//! with the operation, so a sign-in or sign-out is noticed on the next call and
//! the cart reloads from the matching backend before the operation runs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use validator::Validate;
use crate::domain::aggregates::ProductInput;
use crate::infrastructure::{LocalStore, RemoteCart};
use crate::service::{AuthContext, CartCommand, CartRegistry, CartView, LineRef};
use crate::CartServiceError;

type ApiResult = Result<Json<CartView>, (StatusCode, String)>;

pub fn router<R: RemoteCart, L: LocalStore>(registry: Arc<CartRegistry<R, L>>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-cart"})) }))
        .route("/api/v1/carts/:session", get(get_cart::<R, L>).delete(clear_cart::<R, L>))
        .route("/api/v1/carts/:session/reload", post(reload_cart::<R, L>))
        .route("/api/v1/carts/:session/items", post(add_item::<R, L>))
        .route("/api/v1/carts/:session/items/:line", put(update_item::<R, L>).delete(remove_item::<R, L>))
        .with_state(registry)
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product: ProductInput,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest { pub quantity: i64 }

/// `Authorization: Bearer <token>` means signed in; anything else is a guest.
pub fn auth_from_headers(headers: &HeaderMap) -> AuthContext {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| AuthContext::Bearer(token.to_string()))
        .unwrap_or(AuthContext::Anonymous)
}

/// Signed-in callers address lines by server id, guests by position.
fn line_ref(auth: &AuthContext, line: u64) -> Result<LineRef, (StatusCode, String)> {
    match auth {
        AuthContext::Bearer(_) => i64::try_from(line).map(LineRef::Server).map_err(|_| (StatusCode::BAD_REQUEST, "line id out of range".to_string())),
        AuthContext::Anonymous => usize::try_from(line).map(LineRef::Local).map_err(|_| (StatusCode::BAD_REQUEST, "line index out of range".to_string())),
    }
}

fn service_error(e: CartServiceError) -> (StatusCode, String) {
    match e {
        CartServiceError::Closed => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn run<R: RemoteCart, L: LocalStore>(registry: &CartRegistry<R, L>, session: &str, auth: AuthContext, command: CartCommand) -> ApiResult {
    registry.execute(session, auth, command).await.map(Json).map_err(service_error)
}

async fn get_cart<R: RemoteCart, L: LocalStore>(State(s): State<Arc<CartRegistry<R, L>>>, Path(session): Path<String>, headers: HeaderMap) -> ApiResult {
    run(&s, &session, auth_from_headers(&headers), CartCommand::View).await
}

async fn reload_cart<R: RemoteCart, L: LocalStore>(State(s): State<Arc<CartRegistry<R, L>>>, Path(session): Path<String>, headers: HeaderMap) -> ApiResult {
    run(&s, &session, auth_from_headers(&headers), CartCommand::Load).await
}

async fn add_item<R: RemoteCart, L: LocalStore>(State(s): State<Arc<CartRegistry<R, L>>>, Path(session): Path<String>, headers: HeaderMap, Json(r): Json<AddItemRequest>) -> ApiResult {
    r.validate().map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    r.product.validate().map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    run(&s, &session, auth_from_headers(&headers), CartCommand::Add { product: r.product, quantity: r.quantity.unwrap_or(1) }).await
}

async fn update_item<R: RemoteCart, L: LocalStore>(State(s): State<Arc<CartRegistry<R, L>>>, Path((session, line)): Path<(String, u64)>, headers: HeaderMap, Json(r): Json<UpdateItemRequest>) -> ApiResult {
    let auth = auth_from_headers(&headers);
    let line = line_ref(&auth, line)?;
    run(&s, &session, auth, CartCommand::Update { line, quantity: r.quantity }).await
}

async fn remove_item<R: RemoteCart, L: LocalStore>(State(s): State<Arc<CartRegistry<R, L>>>, Path((session, line)): Path<(String, u64)>, headers: HeaderMap) -> ApiResult {
    let auth = auth_from_headers(&headers);
    let line = line_ref(&auth, line)?;
    run(&s, &session, auth, CartCommand::Remove(line)).await
}

async fn clear_cart<R: RemoteCart, L: LocalStore>(State(s): State<Arc<CartRegistry<R, L>>>, Path(session): Path<String>, headers: HeaderMap) -> ApiResult {
    run(&s, &session, auth_from_headers(&headers), CartCommand::Clear).await
}
