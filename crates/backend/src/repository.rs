//! Backend-backed implementations of the core persistence contracts.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use mizan_core::autosave::{AutoSaveRecord, AutoSaveRepository, AUTO_SAVES_TABLE};
use mizan_core::notifications::{
    Notification, NotificationsRepository, RealtimeChannel, RealtimeSource, NOTIFICATIONS_TABLE,
};
use mizan_core::{Result, ServiceError};

use crate::client::BackendClient;

/// Conflict target enforcing one draft per `(owner_id, form_type)`.
const AUTO_SAVE_CONFLICT_TARGET: &str = "owner_id,form_type";

pub struct BackendNotificationsRepository {
    client: Arc<BackendClient>,
}

impl BackendNotificationsRepository {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NotificationsRepository for BackendNotificationsRepository {
    async fn list_recent(&self, limit: usize) -> Result<Vec<Notification>> {
        self.client
            .select(NOTIFICATIONS_TABLE, "created_at", limit)
            .await
            .map_err(ServiceError::from)
    }

    async fn mark_read(&self, id: &str) -> Result<()> {
        self.client
            .update_by_id(NOTIFICATIONS_TABLE, id, &json!({ "status": "read" }))
            .await
            .map_err(ServiceError::from)
    }

    async fn mark_read_many(&self, ids: &[String]) -> Result<()> {
        self.client
            .update_by_ids(NOTIFICATIONS_TABLE, ids, &json!({ "status": "read" }))
            .await
            .map_err(ServiceError::from)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete_by_id(NOTIFICATIONS_TABLE, id)
            .await
            .map_err(ServiceError::from)
    }
}

pub struct BackendAutoSaveRepository {
    client: Arc<BackendClient>,
}

impl BackendAutoSaveRepository {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AutoSaveRepository for BackendAutoSaveRepository {
    async fn insert(&self, mut record: AutoSaveRecord) -> Result<AutoSaveRecord> {
        if record.id.is_none() {
            record.id = Some(Uuid::new_v4().to_string());
        }
        self.client
            .insert(AUTO_SAVES_TABLE, &record)
            .await
            .map_err(ServiceError::from)
    }

    async fn update_by_id(&self, id: &str, form_data: &Value) -> Result<()> {
        self.client
            .update_by_id(
                AUTO_SAVES_TABLE,
                id,
                &json!({
                    "form_data": form_data,
                    "updated_at": Utc::now(),
                }),
            )
            .await
            .map_err(ServiceError::from)
    }

    async fn upsert_keyed(&self, record: AutoSaveRecord) -> Result<()> {
        self.client
            .upsert(AUTO_SAVES_TABLE, &record, AUTO_SAVE_CONFLICT_TARGET)
            .await
            .map_err(ServiceError::from)
    }
}

pub struct BackendRealtimeSource {
    client: Arc<BackendClient>,
}

impl BackendRealtimeSource {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RealtimeSource for BackendRealtimeSource {
    async fn subscribe(&self, table: &str) -> Result<RealtimeChannel> {
        self.client
            .subscribe_table(table)
            .await
            .map_err(ServiceError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{start_mock_server, ScriptedResponse};
    use crate::config::BackendConfig;

    #[tokio::test]
    async fn insert_assigns_client_side_id_before_posting() {
        let (base_url, captured, server) = start_mock_server(vec![ScriptedResponse::json(
            201,
            r#"[{"id":"ignored","owner_id":"user-1","form_type":"draft-A","form_data":{},"updated_at":"2026-02-01T08:30:00Z"}]"#,
        )])
        .await;

        let client = Arc::new(BackendClient::new(BackendConfig::new(&base_url, "anon-key")));
        let repository = BackendAutoSaveRepository::new(client);
        repository
            .insert(AutoSaveRecord {
                id: None,
                owner_id: "user-1".to_string(),
                form_type: "draft-A".to_string(),
                form_data: serde_json::json!({}),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let requests = captured.lock().await.clone();
        let posted: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert!(posted.get("id").and_then(|v| v.as_str()).is_some());
        assert!(Uuid::parse_str(posted["id"].as_str().unwrap()).is_ok());

        server.abort();
    }

    #[tokio::test]
    async fn permission_failures_normalize_to_the_core_taxonomy() {
        let (base_url, _captured, server) = start_mock_server(vec![ScriptedResponse::json(
            401,
            r#"{"message":"JWT expired"}"#,
        )])
        .await;

        let client = Arc::new(BackendClient::new(BackendConfig::new(&base_url, "anon-key")));
        let repository = BackendNotificationsRepository::new(client);
        let result = repository.mark_read("n-1").await;
        assert!(matches!(result, Err(ServiceError::PermissionDenied(_))));

        server.abort();
    }
}
