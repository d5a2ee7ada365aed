//! Client-local mirror of the server notification table.
//!
//! The store seeds itself with one bounded fetch, then layers change-feed
//! events on top. Events are applied by entity id, last-update-wins; the
//! backend's send order is the only ordering guarantee. All cache mutation
//! happens through the store's own methods and its single event-application
//! task, so the unread counter stays paired with the status transitions that
//! justify it.

use std::sync::{Arc, Mutex, RwLock};

use log::{debug, error};
use tokio::task::JoinHandle;

use crate::errors::Result;
use crate::toast::{ToastMessage, ToastSink};

use super::model::{Notification, NotificationStatus, RowEvent, NOTIFICATIONS_TABLE};
use super::traits::{NotificationsRepository, RealtimeSource};

/// Tunables for the notification store.
#[derive(Debug, Clone, Copy)]
pub struct NotificationStoreConfig {
    /// Row cap for the initial seed fetch, newest first.
    pub initial_fetch_limit: usize,
}

impl Default for NotificationStoreConfig {
    fn default() -> Self {
        Self {
            initial_fetch_limit: 100,
        }
    }
}

/// Store lifecycle: starts disconnected, subscribed after the push channel
/// opens successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLifecycle {
    Disconnected,
    Subscribed,
}

#[derive(Debug)]
struct StoreState {
    cache: Vec<Notification>,
    unread: usize,
    lifecycle: StoreLifecycle,
}

impl StoreState {
    fn new() -> Self {
        Self {
            cache: Vec::new(),
            unread: 0,
            lifecycle: StoreLifecycle::Disconnected,
        }
    }
}

/// Eventually-consistent notification cache with read/unread operations.
pub struct NotificationStore {
    repository: Arc<dyn NotificationsRepository>,
    realtime: Arc<dyn RealtimeSource>,
    toasts: Arc<dyn ToastSink>,
    config: NotificationStoreConfig,
    state: Arc<RwLock<StoreState>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationStore {
    pub fn new(
        repository: Arc<dyn NotificationsRepository>,
        realtime: Arc<dyn RealtimeSource>,
        toasts: Arc<dyn ToastSink>,
        config: NotificationStoreConfig,
    ) -> Self {
        Self {
            repository,
            realtime,
            toasts,
            config,
            state: Arc::new(RwLock::new(StoreState::new())),
            worker: Mutex::new(None),
        }
    }

    /// Seed the cache with a bounded newest-first fetch, then open the push
    /// channel for insert/update/delete events.
    ///
    /// A fetch failure is logged and leaves the cache in its last-known state
    /// (empty on first call); the subscription is still attempted so live
    /// events can flow. The store only reaches `Subscribed` when the channel
    /// opens successfully.
    pub async fn initialize(&self) -> Result<()> {
        if self.lifecycle() == StoreLifecycle::Subscribed {
            debug!("notification store already subscribed");
            return Ok(());
        }

        match self
            .repository
            .list_recent(self.config.initial_fetch_limit)
            .await
        {
            Ok(rows) => {
                let mut state = self.state.write().unwrap();
                state.unread = rows.iter().filter(|n| n.is_unread()).count();
                state.cache = rows;
            }
            Err(err) => {
                error!("notification seed fetch failed ({}): {}", err.code(), err);
            }
        }

        let mut channel = self.realtime.subscribe(NOTIFICATIONS_TABLE).await?;

        let state = Arc::clone(&self.state);
        let toasts = Arc::clone(&self.toasts);
        let handle = tokio::spawn(async move {
            while let Some(event) = channel.recv().await {
                Self::apply_event(&state, toasts.as_ref(), event);
            }
        });
        *self.worker.lock().unwrap() = Some(handle);
        self.state.write().unwrap().lifecycle = StoreLifecycle::Subscribed;
        Ok(())
    }

    /// Release the push channel. Mandatory when the owning scope ends.
    pub fn close(&self) {
        if let Some(handle) = self.worker.lock().unwrap().take() {
            handle.abort();
        }
        self.state.write().unwrap().lifecycle = StoreLifecycle::Disconnected;
    }

    fn apply_event(state: &RwLock<StoreState>, toasts: &dyn ToastSink, event: RowEvent) {
        match event {
            RowEvent::Inserted(notification) => {
                let toast = ToastMessage::new(
                    notification.title.clone(),
                    notification.description.clone(),
                    notification.kind.toast_variant(),
                );
                let first_sighting = {
                    let mut state = state.write().unwrap();
                    match state.cache.iter().position(|n| n.id == notification.id) {
                        Some(existing) => {
                            // Replayed insert for a row we already hold; treat
                            // as an update so the counter cannot double-count
                            // and the user is not toasted twice.
                            Self::replace_entry(&mut state, existing, notification);
                            false
                        }
                        None => {
                            if notification.is_unread() {
                                state.unread += 1;
                            }
                            state.cache.insert(0, notification);
                            true
                        }
                    }
                };
                if first_sighting {
                    toasts.push(toast);
                }
            }
            RowEvent::Updated(notification) => {
                let mut state = state.write().unwrap();
                match state.cache.iter().position(|n| n.id == notification.id) {
                    Some(index) => Self::replace_entry(&mut state, index, notification),
                    None => debug!("update for unknown notification {}", notification.id),
                }
            }
            RowEvent::Deleted { id } => {
                let mut state = state.write().unwrap();
                if let Some(index) = state.cache.iter().position(|n| n.id == id) {
                    let removed = state.cache.remove(index);
                    if removed.is_unread() {
                        state.unread = state.unread.saturating_sub(1);
                    }
                }
            }
        }
    }

    fn replace_entry(state: &mut StoreState, index: usize, incoming: Notification) {
        let previous = state.cache[index].status;
        match (previous, incoming.status) {
            (NotificationStatus::Unread, NotificationStatus::Read) => {
                state.unread = state.unread.saturating_sub(1);
            }
            (NotificationStatus::Read, NotificationStatus::Unread) => {
                state.unread += 1;
            }
            _ => {}
        }
        state.cache[index] = incoming;
    }

    /// Optimistically flip the local entry to read, then confirm remotely.
    ///
    /// Remote failure is logged and not rolled back; the next update event
    /// for the row reconciles the mirror.
    pub async fn mark_as_read(&self, id: &str) {
        {
            let mut state = self.state.write().unwrap();
            if let Some(entry) = state.cache.iter_mut().find(|n| n.id == id) {
                if entry.is_unread() {
                    entry.status = NotificationStatus::Read;
                    state.unread = state.unread.saturating_sub(1);
                }
            }
        }
        if let Err(err) = self.repository.mark_read(id).await {
            error!("mark_as_read({}) failed ({}): {}", id, err.code(), err);
        }
    }

    /// One batched remote update for the current unread id set, then flip the
    /// matching local entries. A second call with nothing unread is a no-op.
    pub async fn mark_all_as_read(&self) {
        let unread_ids: Vec<String> = {
            let state = self.state.read().unwrap();
            state
                .cache
                .iter()
                .filter(|n| n.is_unread())
                .map(|n| n.id.clone())
                .collect()
        };
        if unread_ids.is_empty() {
            return;
        }

        match self.repository.mark_read_many(&unread_ids).await {
            Ok(()) => {
                let mut state = self.state.write().unwrap();
                for entry in state
                    .cache
                    .iter_mut()
                    .filter(|n| unread_ids.contains(&n.id))
                {
                    entry.status = NotificationStatus::Read;
                }
                state.unread = state.cache.iter().filter(|n| n.is_unread()).count();
            }
            Err(err) => {
                error!("mark_all_as_read failed ({}): {}", err.code(), err);
            }
        }
    }

    /// Remote delete first; the local entry goes away only on success.
    pub async fn remove(&self, id: &str) {
        match self.repository.delete(id).await {
            Ok(()) => {
                let mut state = self.state.write().unwrap();
                if let Some(index) = state.cache.iter().position(|n| n.id == id) {
                    let removed = state.cache.remove(index);
                    if removed.is_unread() {
                        state.unread = state.unread.saturating_sub(1);
                    }
                }
            }
            Err(err) => {
                error!("remove({}) failed ({}): {}", id, err.code(), err);
            }
        }
    }

    pub fn unread_count(&self) -> usize {
        self.state.read().unwrap().unread
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.state.read().unwrap().cache.clone()
    }

    pub fn lifecycle(&self) -> StoreLifecycle {
        self.state.read().unwrap().lifecycle
    }
}

impl Drop for NotificationStore {
    fn drop(&mut self) {
        self.close();
    }
}
