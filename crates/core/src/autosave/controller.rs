//! Debounced auto-save controller.
//!
//! Rapid `schedule` calls for one key collapse into a single persisted write
//! once the key stays quiet for the configured period. Keys are independent;
//! each holds its own pending payload and timer. A superseding call cancels
//! the pending timer but never an already-dispatched persistence call, so
//! the last write observed by the backend is whichever flight completes
//! last, not necessarily whichever was scheduled last.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{debug, error};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::toast::{ToastMessage, ToastSink, ToastVariant};

use super::model::{AutoSaveConfig, AutoSaveRecord};
use super::traits::AutoSaveRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveAction {
    /// Update-by-id when the key's record id is known, insert otherwise.
    Record,
    /// Upsert keyed by `(owner_id, form_type)`; draft-style, no entity yet.
    Keyed,
}

/// Per-key pending state: the payload that will win the quiet period, plus
/// the timer that fires it. `seq` guards against a stale timer consuming an
/// entry that a newer `schedule` already replaced.
struct PendingSave {
    seq: u64,
    action: SaveAction,
    payload: Value,
    timer: JoinHandle<()>,
}

/// Collapses bursts of save requests into one write per key per quiet period.
pub struct AutoSaveController {
    repository: Arc<dyn AutoSaveRepository>,
    toasts: Arc<dyn ToastSink>,
    owner_id: String,
    config: AutoSaveConfig,
    pending: Arc<Mutex<HashMap<String, PendingSave>>>,
    /// Record ids learned from inserts, so later flushes patch in place.
    records: Arc<Mutex<HashMap<String, String>>>,
    next_seq: Mutex<u64>,
}

impl AutoSaveController {
    pub fn new(
        repository: Arc<dyn AutoSaveRepository>,
        toasts: Arc<dyn ToastSink>,
        owner_id: impl Into<String>,
        config: AutoSaveConfig,
    ) -> Self {
        Self {
            repository,
            toasts,
            owner_id: owner_id.into(),
            config,
            pending: Arc::new(Mutex::new(HashMap::new())),
            records: Arc::new(Mutex::new(HashMap::new())),
            next_seq: Mutex::new(0),
        }
    }

    /// Record `payload` as the pending value for `target_key` and (re)start
    /// its quiet-period timer. The newest call always wins the debounce.
    pub fn schedule(&self, target_key: impl Into<String>, payload: Value) {
        self.arm(target_key.into(), SaveAction::Record, payload);
    }

    /// Draft-style variant: persists via upsert keyed by
    /// `(owner_id, form_type)` instead of by record id.
    pub fn save_keyed(&self, form_type: impl Into<String>, payload: Value) {
        self.arm(form_type.into(), SaveAction::Keyed, payload);
    }

    fn arm(&self, key: String, action: SaveAction, payload: Value) {
        let seq = {
            let mut next = self.next_seq.lock().unwrap();
            *next += 1;
            *next
        };

        let timer = {
            let pending = Arc::clone(&self.pending);
            let records = Arc::clone(&self.records);
            let repository = Arc::clone(&self.repository);
            let toasts = Arc::clone(&self.toasts);
            let owner_id = self.owner_id.clone();
            let quiet_period = self.config.quiet_period;
            let key = key.clone();
            tokio::spawn(async move {
                tokio::time::sleep(quiet_period).await;
                let taken = {
                    let mut map = pending.lock().unwrap();
                    match map.get(&key) {
                        Some(entry) if entry.seq == seq => map.remove(&key),
                        _ => None, // superseded while this poll was in flight
                    }
                };
                if let Some(entry) = taken {
                    // Detached so a later schedule can never cancel a
                    // persistence call that already left the gate.
                    tokio::spawn(Self::persist(
                        repository,
                        toasts,
                        records,
                        owner_id,
                        key,
                        entry.action,
                        entry.payload,
                    ));
                }
            })
        };

        let mut map = self.pending.lock().unwrap();
        if let Some(previous) = map.insert(
            key,
            PendingSave {
                seq,
                action,
                payload,
                timer,
            },
        ) {
            previous.timer.abort();
        }
    }

    /// Persist the pending payload for `target_key` immediately, if any,
    /// cancelling its timer. Used on form unmount.
    pub async fn flush(&self, target_key: &str) {
        let taken = {
            let mut map = self.pending.lock().unwrap();
            map.remove(target_key)
        };
        if let Some(entry) = taken {
            entry.timer.abort();
            Self::persist(
                Arc::clone(&self.repository),
                Arc::clone(&self.toasts),
                Arc::clone(&self.records),
                self.owner_id.clone(),
                target_key.to_string(),
                entry.action,
                entry.payload,
            )
            .await;
        }
    }

    async fn persist(
        repository: Arc<dyn AutoSaveRepository>,
        toasts: Arc<dyn ToastSink>,
        records: Arc<Mutex<HashMap<String, String>>>,
        owner_id: String,
        key: String,
        action: SaveAction,
        payload: Value,
    ) {
        let result = match action {
            SaveAction::Record => {
                let known_id = records.lock().unwrap().get(&key).cloned();
                match known_id {
                    Some(id) => repository.update_by_id(&id, &payload).await,
                    None => repository
                        .insert(AutoSaveRecord {
                            id: None,
                            owner_id,
                            form_type: key.clone(),
                            form_data: payload,
                            updated_at: Utc::now(),
                        })
                        .await
                        .map(|saved| {
                            if let Some(id) = saved.id {
                                records.lock().unwrap().insert(key.clone(), id);
                            }
                        }),
                }
            }
            SaveAction::Keyed => {
                repository
                    .upsert_keyed(AutoSaveRecord {
                        id: None,
                        owner_id,
                        form_type: key.clone(),
                        form_data: payload,
                        updated_at: Utc::now(),
                    })
                    .await
            }
        };

        match result {
            Ok(()) => debug!("auto-save persisted for {}", key),
            Err(err) => {
                error!("auto-save for {} failed ({}): {}", key, err.code(), err);
                toasts.push(ToastMessage::new(
                    "فشل الحفظ التلقائي",
                    err.to_string(),
                    ToastVariant::Destructive,
                ));
            }
        }
    }

    pub fn has_pending(&self, target_key: &str) -> bool {
        self.pending.lock().unwrap().contains_key(target_key)
    }
}

impl Drop for AutoSaveController {
    fn drop(&mut self) {
        // Pending timers hold no resources beyond the spawned task; abort
        // them so they do not fire against a dropped owner's repository.
        for (_, entry) in self.pending.lock().unwrap().drain() {
            entry.timer.abort();
        }
    }
}
