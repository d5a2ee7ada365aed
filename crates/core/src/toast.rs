//! Toast side-effect sink.
//!
//! Stores and controllers report user-visible outcomes through this trait;
//! the host UI supplies the real implementation.

use serde::{Deserialize, Serialize};

/// Visual variant accepted by the host toast surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastVariant {
    Default,
    Success,
    Warning,
    Destructive,
}

/// A transient notice: title, optional body, visual variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastMessage {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
}

impl ToastMessage {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        variant: ToastVariant,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant,
        }
    }
}

/// Sink for transient notices. Implementations must not block.
pub trait ToastSink: Send + Sync {
    fn push(&self, message: ToastMessage);
}

/// Fallback sink that writes toasts through the `log` facade.
#[derive(Debug, Default)]
pub struct LogToastSink;

impl ToastSink for LogToastSink {
    fn push(&self, message: ToastMessage) {
        match message.variant {
            ToastVariant::Destructive | ToastVariant::Warning => {
                log::warn!("[toast] {}: {}", message.title, message.description)
            }
            _ => log::info!("[toast] {}: {}", message.title, message.description),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records pushed toasts for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingToastSink {
        pub messages: Mutex<Vec<ToastMessage>>,
    }

    impl ToastSink for RecordingToastSink {
        fn push(&self, message: ToastMessage) {
            self.messages.lock().unwrap().push(message);
        }
    }
}
