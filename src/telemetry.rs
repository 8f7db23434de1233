//! Best-effort cart analytics
//!
//! Mutations hand events to a [`Tracker`] which never blocks: when the buffer is
//! full the event is dropped and counted. A [`TelemetryWorker`] drains the
//! buffer, logging each event and publishing it to NATS when a client is set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use crate::domain::events::CartEvent;

#[derive(Debug, Clone, Default)]
pub struct Tracker {
    tx: Option<mpsc::Sender<CartEvent>>,
    dropped: Arc<AtomicU64>,
}

impl Tracker {
    /// Tracker plus the receiving end for a [`TelemetryWorker`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CartEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx), dropped: Arc::default() }, rx)
    }

    pub fn disabled() -> Self { Self::default() }

    pub fn track(&self, event: CartEvent) {
        let Some(tx) = &self.tx else { return };
        if let Err(e) = tx.try_send(event) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(dropped, reason = %e, "Cart event dropped");
        }
    }

    pub fn dropped(&self) -> u64 { self.dropped.load(Ordering::Relaxed) }
}

pub struct TelemetryWorker {
    nats: Option<async_nats::Client>,
    subject: String,
}

impl TelemetryWorker {
    pub fn new(nats: Option<async_nats::Client>, subject: impl Into<String>) -> Self {
        Self { nats, subject: subject.into() }
    }

    /// Runs until the channel closes or shutdown is requested.
    pub async fn run(self, mut rx: mpsc::Receiver<CartEvent>, shutdown: CancellationToken) {
        tracing::info!(subject = %self.subject, nats = self.nats.is_some(), "Cart telemetry worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Cart telemetry worker received shutdown signal");
                    break;
                }
                event = rx.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Telemetry channel closed, worker stopping");
                        break;
                    };
                    self.handle(&event).await;
                }
            }
        }
    }

    async fn handle(&self, event: &CartEvent) {
        tracing::info!(
            cart_id = %event.cart_id,
            action = ?event.action,
            product_id = ?event.product_id,
            quantity = ?event.quantity,
            item_count = ?event.item_count,
            "Cart event"
        );

        let Some(nats) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode cart event");
                return;
            }
        };
        if let Err(e) = nats.publish(self.subject.clone(), payload.into()).await {
            tracing::warn!(event_id = %event.event_id, error = %e, "Failed to publish cart event");
        }
    }
}
