//! Change notifications for record collections.
//!
//! Payloads are not interpreted beyond "this collection of this mess
//! changed"; subscribers recompute from scratch.

use std::fmt;
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Members,
    Meals,
    Transactions,
    GuestMeals,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collection::Members => "members",
            Collection::Meals => "meals",
            Collection::Transactions => "transactions",
            Collection::GuestMeals => "guestMeals",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub mess_id: String,
    pub collection: Collection,
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(FEED_CAPACITY)
    }

    /// Receivers that fall more than `capacity` events behind see a lag.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Fire and forget. Having no subscribers is not an error.
    pub fn publish(&self, mess_id: &str, collection: Collection) {
        let event = ChangeEvent {
            mess_id: mess_id.to_string(),
            collection,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(%collection, "change event dropped, no subscribers");
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
