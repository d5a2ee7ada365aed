//! Persistence contract for the auto-save controller.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;

use super::model::AutoSaveRecord;

/// CRUD surface the controller needs from the hosted backend.
#[async_trait]
pub trait AutoSaveRepository: Send + Sync {
    /// Insert a fresh record; the backend assigns the id when absent.
    async fn insert(&self, record: AutoSaveRecord) -> Result<AutoSaveRecord>;

    /// Patch `form_data` (and `updated_at`) on a known record.
    async fn update_by_id(&self, id: &str, form_data: &Value) -> Result<()>;

    /// Upsert with `(owner_id, form_type)` as the conflict target.
    async fn upsert_keyed(&self, record: AutoSaveRecord) -> Result<()>;
}
