//! One cart actor per session.
//!
//! Actors stop after sitting idle; their entries are pruned when new sessions
//! arrive, and the next request for a pruned session starts a fresh actor that
//! reloads the durable copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use crate::domain::loyalty::LoyaltyFormula;
use crate::infrastructure::{LocalStore, RemoteCart};
use crate::service::actor::{CartCommand, CartHandle};
use crate::service::store::{AuthContext, CartStore, CartView};
use crate::CartServiceError;
use crate::telemetry::Tracker;

pub struct CartRegistry<R, L> {
    remote: Arc<R>,
    local: Arc<L>,
    tracker: Tracker,
    loyalty: Arc<dyn LoyaltyFormula>,
    mailbox: usize,
    idle_timeout: Duration,
    shutdown: CancellationToken,
    carts: Mutex<HashMap<String, CartHandle>>,
}

impl<R: RemoteCart, L: LocalStore> CartRegistry<R, L> {
    pub fn new(remote: Arc<R>, local: Arc<L>, tracker: Tracker, loyalty: Arc<dyn LoyaltyFormula>, mailbox: usize, idle_timeout: Duration, shutdown: CancellationToken) -> Self {
        Self { remote, local, tracker, loyalty, mailbox, idle_timeout, shutdown, carts: Mutex::default() }
    }

    /// Handle for `session`, starting its actor on first use.
    ///
    /// New carts start as guests; callers apply the request's credentials with
    /// [`CartHandle::set_auth`].
    pub fn handle(&self, session: &str) -> CartHandle {
        let mut carts = self.carts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = carts.get(session).filter(|h| !h.is_closed()) {
            return handle.clone();
        }

        let before = carts.len();
        carts.retain(|_, h| !h.is_closed());
        if carts.len() < before {
            tracing::debug!(pruned = before - carts.len(), "Pruned stopped cart actors");
        }

        let store = CartStore::new(session, AuthContext::Anonymous, self.remote.clone(), self.local.clone(), self.tracker.clone(), self.loyalty.clone());
        let (handle, _task) = CartHandle::spawn(store, self.mailbox, self.idle_timeout, self.shutdown.child_token());
        tracing::debug!(session, "Cart actor registered");
        carts.insert(session.to_string(), handle.clone());
        handle
    }

    /// Runs one request against `session` with the caller's credentials.
    ///
    /// An actor that idled out between lookup and delivery never applied the
    /// command, so it is sent once more to a fresh actor.
    pub async fn execute(&self, session: &str, auth: AuthContext, command: CartCommand) -> Result<CartView, CartServiceError> {
        let handle = self.handle(session);
        match handle.execute(auth.clone(), command.clone()).await {
            Err(CartServiceError::Closed) if handle.is_idle_closed() && !self.shutdown.is_cancelled() => {
                self.handle(session).execute(auth, command).await
            }
            outcome => outcome,
        }
    }

    /// Stops and forgets one cart. Its durable copy is untouched.
    pub fn evict(&self, session: &str) -> bool {
        let removed = self.carts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(session);
        match removed {
            Some(handle) => { handle.shutdown(); true }
            None => false,
        }
    }

    pub fn len(&self) -> usize { self.carts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.carts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    }
}
