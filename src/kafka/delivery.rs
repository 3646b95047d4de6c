//! Routing of asynchronous delivery reports back to waiting publish calls.
//!
//! Every connection owns one [`DeliveryDispatcher`]. A publish call
//! registers before it enqueues its message, passes the returned
//! [`DeliveryId`] along as the message opaque, and then awaits its
//! [`PendingDelivery`]. The producer's delivery callback resolves the id.

use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::debug;

pub type DeliveryId = u64;

/// Where the broker stored an acknowledged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

impl fmt::Display for DeliveryReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]@{}", self.topic, self.partition, self.offset)
    }
}

/// Terminal result for one submitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The broker acknowledged the message.
    Delivered(DeliveryReceipt),
    /// The broker rejected this message.
    Rejected(String),
    /// The client hit an unrecoverable error.
    Fatal(String),
}

#[derive(Default)]
pub struct DeliveryDispatcher {
    next_id: AtomicU64,
    pending: Mutex<HashMap<DeliveryId, oneshot::Sender<DeliveryOutcome>>>,
}

impl DeliveryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a listener for one message.
    pub fn register(self: &Arc<Self>) -> PendingDelivery {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        PendingDelivery {
            id,
            rx,
            dispatcher: Arc::clone(self),
        }
    }

    /// Routes an outcome to the call waiting on `id`.
    ///
    /// Returns `false` if nobody is waiting any more, for example because
    /// the call timed out.
    pub fn resolve(&self, id: DeliveryId, outcome: DeliveryOutcome) -> bool {
        let Some(tx) = self.pending().remove(&id) else {
            debug!(delivery_id = id, "Delivery report without a waiting call");
            return false;
        };
        tx.send(outcome).is_ok()
    }

    /// Fails every in-flight call with a fatal outcome.
    pub fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = self.pending().drain().collect();
        let count = drained.len();
        for (_, tx) in drained {
            let _ = tx.send(DeliveryOutcome::Fatal(reason.to_string()));
        }
        count
    }

    pub fn in_flight(&self) -> usize {
        self.pending().len()
    }

    fn cancel(&self, id: DeliveryId) {
        self.pending().remove(&id);
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<DeliveryId, oneshot::Sender<DeliveryOutcome>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A registered listener for one message.
///
/// Dropping it removes the registration, so an abandoned wait never leaks
/// a dispatch table entry.
pub struct PendingDelivery {
    id: DeliveryId,
    rx: oneshot::Receiver<DeliveryOutcome>,
    dispatcher: Arc<DeliveryDispatcher>,
}

impl PendingDelivery {
    pub fn id(&self) -> DeliveryId {
        self.id
    }

    /// Waits for the outcome and classifies it.
    pub async fn wait(mut self) -> Result<DeliveryReceipt> {
        match (&mut self.rx).await {
            Ok(DeliveryOutcome::Delivered(receipt)) => Ok(receipt),
            Ok(DeliveryOutcome::Rejected(reason)) => Err(Error::Delivery(reason)),
            Ok(DeliveryOutcome::Fatal(reason)) => Err(Error::FatalClient(reason)),
            Err(_) => Err(Error::FatalClient("delivery listener closed".to_string())),
        }
    }
}

impl Drop for PendingDelivery {
    fn drop(&mut self) {
        self.dispatcher.cancel(self.id);
    }
}
