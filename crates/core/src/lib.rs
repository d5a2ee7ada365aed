//! Core client subsystem for the Mizan ERP frontend: the realtime
//! notification mirror and the debounced auto-save controller, plus the
//! contracts (`*Repository`, `RealtimeSource`, `ToastSink`) the backend
//! crate implements.

pub mod autosave;
pub mod context;
pub mod errors;
pub mod notifications;
pub mod retry;
pub mod toast;

pub use context::AppContext;
pub use errors::{Result, ServiceError};
