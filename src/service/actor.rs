//! Cart actor
//!
//! Every operation on a cart goes through one mailbox, so overlapping
//! mutations apply in the order they were issued instead of racing on reload
//! completion. A command may carry the caller's credentials; they are applied
//! in the same turn as the command, so no other request can switch the
//! backend in between. Cancelling the actor's token drops whatever command is
//! in flight, including its pending remote call. An actor with an empty
//! mailbox for longer than its idle timeout stops on its own.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use crate::domain::aggregates::ProductInput;
use crate::infrastructure::{LocalStore, RemoteCart};
use crate::service::store::{AuthContext, CartStore, CartView, LineRef};
use crate::CartServiceError;

/// One cart operation.
#[derive(Clone, Debug)]
pub enum CartCommand {
    View,
    Load,
    Add { product: ProductInput, quantity: u32 },
    Remove(LineRef),
    Update { line: LineRef, quantity: i64 },
    Clear,
}

struct Envelope {
    auth: Option<AuthContext>,
    command: CartCommand,
    reply: oneshot::Sender<CartView>,
}

/// Cloneable front of a running cart actor.
#[derive(Debug, Clone)]
pub struct CartHandle {
    tx: mpsc::Sender<Envelope>,
    loading: watch::Receiver<bool>,
    shutdown: CancellationToken,
}

impl CartHandle {
    /// Spawns the actor. It loads the cart before serving any command.
    pub fn spawn<R: RemoteCart, L: LocalStore>(store: CartStore<R, L>, mailbox: usize, idle_timeout: Duration, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox.max(1));
        let loading = store.loading();
        let task = tokio::spawn(run(store, rx, idle_timeout, shutdown.clone()));
        (Self { tx, loading, shutdown }, task)
    }

    /// Applies `auth` and then runs `command`, with nothing in between.
    pub async fn execute(&self, auth: AuthContext, command: CartCommand) -> Result<CartView, CartServiceError> {
        self.send(Some(auth), command).await
    }

    pub async fn view(&self) -> Result<CartView, CartServiceError> { self.send(None, CartCommand::View).await }
    pub async fn load(&self) -> Result<CartView, CartServiceError> { self.send(None, CartCommand::Load).await }
    pub async fn set_auth(&self, auth: AuthContext) -> Result<CartView, CartServiceError> { self.execute(auth, CartCommand::View).await }

    pub async fn add_item(&self, product: ProductInput, quantity: u32) -> Result<CartView, CartServiceError> {
        self.send(None, CartCommand::Add { product, quantity }).await
    }

    pub async fn remove_item(&self, line: LineRef) -> Result<CartView, CartServiceError> { self.send(None, CartCommand::Remove(line)).await }

    pub async fn update_quantity(&self, line: LineRef, quantity: i64) -> Result<CartView, CartServiceError> {
        self.send(None, CartCommand::Update { line, quantity }).await
    }

    pub async fn clear(&self) -> Result<CartView, CartServiceError> { self.send(None, CartCommand::Clear).await }

    /// Whether the cart is reloading right now. Does not wait for the mailbox.
    pub fn is_loading(&self) -> bool { *self.loading.borrow() }

    /// Stops the actor and aborts the command it is running.
    pub fn shutdown(&self) { self.shutdown.cancel(); }
    pub fn is_closed(&self) -> bool { self.shutdown.is_cancelled() || self.tx.is_closed() }
    /// Closed because it sat idle, not because it was shut down.
    pub fn is_idle_closed(&self) -> bool { !self.shutdown.is_cancelled() && self.tx.is_closed() }

    async fn send(&self, auth: Option<AuthContext>, command: CartCommand) -> Result<CartView, CartServiceError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx.send(Envelope { auth, command, reply }).await.map_err(|_| CartServiceError::Closed)?;
        reply_rx.await.map_err(|_| CartServiceError::Closed)
    }
}

async fn run<R: RemoteCart, L: LocalStore>(mut store: CartStore<R, L>, mut rx: mpsc::Receiver<Envelope>, idle_timeout: Duration, shutdown: CancellationToken) {
    let cart_id = store.cart_id().to_string();
    tracing::debug!(%cart_id, "Cart actor started");

    tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::debug!(%cart_id, "Cart actor cancelled during initial load");
            return;
        }
        _ = store.load() => {}
    }

    loop {
        let envelope = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            envelope = rx.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
            _ = tokio::time::sleep(idle_timeout) => {
                tracing::debug!(%cart_id, "Cart actor idle, stopping");
                break;
            }
        };

        let view = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            view = apply(&mut store, envelope.auth, envelope.command) => view,
        };
        // The caller may have given up waiting; the cart state is already settled.
        let _ = envelope.reply.send(view);
    }

    // Commands still queued are dropped unapplied; their callers see `Closed`.
    rx.close();
    tracing::debug!(%cart_id, "Cart actor stopped");
}

async fn apply<R: RemoteCart, L: LocalStore>(store: &mut CartStore<R, L>, auth: Option<AuthContext>, command: CartCommand) -> CartView {
    if let Some(auth) = auth {
        store.set_auth(auth).await;
    }
    match command {
        CartCommand::View => store.view(),
        CartCommand::Load => store.load().await,
        CartCommand::Add { product, quantity } => store.add_item(product, quantity).await,
        CartCommand::Remove(line) => store.remove_item(line).await,
        CartCommand::Update { line, quantity } => store.update_quantity(line, quantity).await,
        CartCommand::Clear => store.clear().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::domain::loyalty::SpendPerCoin;
    use crate::infrastructure::MemoryStore;
    use crate::service::store::CartMode;
    use crate::service::test_support::{product, FakeRemote};
    use crate::telemetry::Tracker;

    fn spawn(auth: AuthContext, remote: Arc<FakeRemote>) -> (CartHandle, JoinHandle<()>) {
        let store = CartStore::new("s1", auth, remote, Arc::new(MemoryStore::new()), Tracker::disabled(), Arc::new(SpendPerCoin::default()));
        CartHandle::spawn(store, 8, Duration::from_secs(60), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_overlapping_adds_apply_in_order() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_fetch_delay(Duration::from_millis(20));
        let (handle, _task) = spawn(AuthContext::Bearer("tok".into()), remote.clone());

        let (a, b) = tokio::join!(
            handle.add_item(product(1, "comb", "99", None), 1),
            handle.add_item(product(2, "oil", "450", Some("Hair Oil")), 2),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.snapshot.items.len(), 1);
        assert_eq!(b.snapshot.items.len(), 2);
        assert_eq!(remote.calls(), vec!["fetch", "add", "fetch", "add", "fetch"]);
    }

    #[tokio::test]
    async fn test_credentials_apply_with_their_command() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_fetch_delay(Duration::from_millis(100));
        let (handle, _task) = spawn(AuthContext::Anonymous, remote.clone());
        handle.view().await.unwrap();

        let signed_in = tokio::spawn({
            let handle = handle.clone();
            async move { handle.execute(AuthContext::Bearer("tok".into()), CartCommand::Add { product: product(7, "kajal", "250", None), quantity: 1 }).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let guest = handle.execute(AuthContext::Anonymous, CartCommand::View).await.unwrap();

        let signed_in = signed_in.await.unwrap().unwrap();
        assert_eq!(signed_in.mode, CartMode::Remote);
        assert_eq!(signed_in.snapshot.items.len(), 1);
        assert!(signed_in.snapshot.items[0].item_id.is_some());
        assert_eq!(guest.mode, CartMode::Local);
        assert!(guest.snapshot.items.is_empty());
        assert_eq!(remote.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_loading_is_visible_while_reloading() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_fetch_delay(Duration::from_millis(100));
        let (handle, _task) = spawn(AuthContext::Bearer("tok".into()), remote);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.is_loading());
        let view = handle.view().await.unwrap();
        assert!(!view.is_loading);
        assert!(!handle.is_loading());
    }

    #[tokio::test]
    async fn test_idle_actor_stops() {
        let store = CartStore::new("s1", AuthContext::Anonymous, Arc::new(FakeRemote::new()), Arc::new(MemoryStore::new()), Tracker::disabled(), Arc::new(SpendPerCoin::default()));
        let (handle, task) = CartHandle::spawn(store, 8, Duration::from_millis(30), CancellationToken::new());
        handle.view().await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(handle.is_closed());
        assert!(handle.is_idle_closed());
        assert!(matches!(handle.view().await, Err(CartServiceError::Closed)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let remote = Arc::new(FakeRemote::new());
        let (handle, task) = spawn(AuthContext::Anonymous, remote);
        handle.add_item(product(0, "comb", "99", None), 1).await.unwrap();

        handle.shutdown();
        task.await.unwrap();
        assert!(handle.is_closed());
        assert!(!handle.is_idle_closed());
        assert!(matches!(handle.view().await, Err(CartServiceError::Closed)));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_in_flight_reload() {
        let remote = Arc::new(FakeRemote::new());
        let (handle, task) = spawn(AuthContext::Anonymous, remote.clone());
        handle.view().await.unwrap();

        remote.set_fetch_delay(Duration::from_secs(30));
        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.set_auth(AuthContext::Bearer("tok".into())).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown();

        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(matches!(pending.await.unwrap(), Err(CartServiceError::Closed)));
    }
}
