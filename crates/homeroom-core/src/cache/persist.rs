//! Background write-through of the cached bundle.
//!
//! All durable writes for one cache go through a single task, so they land
//! in the order they were issued. Failures are logged and dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::models::UserBundle;

use super::KeyValueStore;

enum PersistOp {
    Save(Box<UserBundle>),
    Remove,
    /// Completes once everything queued before it has been applied.
    Flush,
}

struct PersistRequest {
    op: PersistOp,
    ack: Option<oneshot::Sender<()>>,
}

pub(crate) struct Persister {
    tx: mpsc::UnboundedSender<PersistRequest>,
}

impl Persister {
    /// Start the writer task. Must be called from within a Tokio runtime.
    pub(crate) fn spawn(store: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, key, rx));
        Self { tx }
    }

    pub(crate) fn save_in_background(&self, bundle: UserBundle) {
        self.send(PersistOp::Save(Box::new(bundle)), None);
    }

    pub(crate) fn remove_in_background(&self) {
        self.send(PersistOp::Remove, None);
    }

    /// Queue a save and wait for it to be attempted.
    pub(crate) async fn save(&self, bundle: UserBundle) {
        self.send_and_wait(PersistOp::Save(Box::new(bundle))).await;
    }

    pub(crate) async fn flush(&self) {
        self.send_and_wait(PersistOp::Flush).await;
    }

    async fn send_and_wait(&self, op: PersistOp) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(op, Some(ack_tx));
        if ack_rx.await.is_err() {
            error!("Persistence task stopped before acknowledging");
        }
    }

    fn send(&self, op: PersistOp, ack: Option<oneshot::Sender<()>>) {
        if self.tx.send(PersistRequest { op, ack }).is_err() {
            error!("Failed to queue cache write - persistence task stopped");
        }
    }
}

async fn run(
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
    mut rx: mpsc::UnboundedReceiver<PersistRequest>,
) {
    while let Some(request) = rx.recv().await {
        match request.op {
            PersistOp::Save(bundle) => match serde_json::to_string(&bundle) {
                Ok(json) => {
                    if let Err(e) = store.set(key, &json).await {
                        warn!(key, error = %e, "Failed to save bundle to storage");
                    } else {
                        debug!(key, cache_timestamp = bundle.cache_timestamp, "Bundle saved to storage");
                    }
                }
                Err(e) => warn!(key, error = %e, "Failed to serialize bundle"),
            },
            PersistOp::Remove => {
                if let Err(e) = store.remove(key).await {
                    warn!(key, error = %e, "Failed to remove bundle from storage");
                }
            }
            PersistOp::Flush => {}
        }

        if let Some(ack) = request.ack {
            // The waiter may have been dropped; nothing to do then
            let _ = ack.send(());
        }
    }
    debug!(key, "Persistence task finished");
}
