//! Composition root for the client subsystem.
//!
//! Services are constructed explicitly here and handed to consumers by
//! reference; there is no hidden global state. The host application owns the
//! context for the lifetime of the signed-in session and must call
//! [`AppContext::shutdown`] when that scope ends.

use std::sync::Arc;

use crate::autosave::{AutoSaveConfig, AutoSaveController, AutoSaveRepository};
use crate::notifications::{
    NotificationStore, NotificationStoreConfig, NotificationsRepository, RealtimeSource,
};
use crate::toast::ToastSink;

pub struct AppContext {
    pub notification_store: Arc<NotificationStore>,
    pub autosave: Arc<AutoSaveController>,
    pub toasts: Arc<dyn ToastSink>,
}

impl AppContext {
    pub fn new(
        notifications_repository: Arc<dyn NotificationsRepository>,
        autosave_repository: Arc<dyn AutoSaveRepository>,
        realtime: Arc<dyn RealtimeSource>,
        toasts: Arc<dyn ToastSink>,
        owner_id: impl Into<String>,
    ) -> Self {
        let notification_store = Arc::new(NotificationStore::new(
            notifications_repository,
            realtime,
            Arc::clone(&toasts),
            NotificationStoreConfig::default(),
        ));
        let autosave = Arc::new(AutoSaveController::new(
            autosave_repository,
            Arc::clone(&toasts),
            owner_id,
            AutoSaveConfig::default(),
        ));
        Self {
            notification_store,
            autosave,
            toasts,
        }
    }

    pub fn notification_store(&self) -> Arc<NotificationStore> {
        Arc::clone(&self.notification_store)
    }

    pub fn autosave(&self) -> Arc<AutoSaveController> {
        Arc::clone(&self.autosave)
    }

    /// Release live subscriptions. Safe to call more than once.
    pub fn shutdown(&self) {
        self.notification_store.close();
    }
}
