//! Repository and change-feed contracts implemented by the backend crate.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::errors::Result;

use super::model::{Notification, RowEvent};

/// CRUD surface the notification store needs from the hosted backend.
#[async_trait]
pub trait NotificationsRepository: Send + Sync {
    /// Most-recent-first page, bounded by `limit`.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Notification>>;

    async fn mark_read(&self, id: &str) -> Result<()>;

    /// One batched update for the whole id set.
    async fn mark_read_many(&self, ids: &[String]) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Push/subscribe primitive: given a table name, yields row change events.
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    async fn subscribe(&self, table: &str) -> Result<RealtimeChannel>;
}

/// Live handle onto a table's change feed.
///
/// Must be closed (or dropped) when the owning scope ends; otherwise the
/// reader task keeps the subscription alive.
#[derive(Debug)]
pub struct RealtimeChannel {
    events: UnboundedReceiver<RowEvent>,
    reader: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    /// `reader` is the background task feeding `events`, if any; it is
    /// aborted on close.
    pub fn new(events: UnboundedReceiver<RowEvent>, reader: Option<JoinHandle<()>>) -> Self {
        Self {
            events,
            reader,
        }
    }

    /// Next event, or `None` once the channel is closed and drained.
    pub async fn recv(&mut self) -> Option<RowEvent> {
        self.events.recv().await
    }

    /// Release the subscription. Idempotent.
    pub fn close(&mut self) {
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        self.events.close();
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::model::RowEvent;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn close_stops_delivery_and_aborts_reader() {
        let (tx, rx) = mpsc::unbounded_channel();
        let feeder = tokio::spawn(async move {
            loop {
                if tx.send(RowEvent::Deleted { id: "x".into() }).is_err() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        });
        let mut channel = RealtimeChannel::new(rx, Some(feeder));

        assert!(channel.recv().await.is_some());
        channel.close();

        // Drains anything already buffered, then terminates.
        while channel.recv().await.is_some() {}
        assert!(channel.recv().await.is_none());
    }
}
