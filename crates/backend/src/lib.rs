//! Hosted-backend client for the Mizan ERP frontend.
//!
//! Implements the persistence and change-feed contracts declared in
//! `mizan-core` over the backend's REST, realtime, and storage APIs.

mod client;
mod config;
mod error;
mod realtime;
mod repository;
mod storage;

pub use client::BackendClient;
pub use config::BackendConfig;
pub use error::{ApiRetryClass, BackendError, Result};
pub use repository::{
    BackendAutoSaveRepository, BackendNotificationsRepository, BackendRealtimeSource,
};
