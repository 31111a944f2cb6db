use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::registry::{Registry, RoomRecord, StreamerSnapshot};
use crate::sidekick::StatusSource;

/// Projection of a room record for one subscriber, as served by `/list`
/// and the management api.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomStatus {
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "isLive")]
    pub is_live: bool,
    #[serde(rename = "lastChecked")]
    pub last_checked: DateTime<Utc>,
    #[serde(rename = "streamerInfo")]
    pub streamer_info: StreamerSnapshot,
}

#[derive(Debug, PartialEq)]
pub enum Toggle {
    Added(StreamerSnapshot),
    Removed(StreamerSnapshot),
}

#[derive(Clone)]
pub struct SubscriptionManager {
    registry: Registry,
    source: Arc<dyn StatusSource>,
}

impl SubscriptionManager {
    pub fn new(registry: Registry, source: Arc<dyn StatusSource>) -> Self {
        SubscriptionManager { registry, source }
    }

    /// "Send the same link twice" semantics: first time subscribes, second
    /// time unsubscribes. Subscribing to an unknown room bootstraps its
    /// record from a fresh status fetch; if that fetch fails nothing is
    /// persisted.
    pub async fn toggle(&self, chat_id: &str, room_id: &str) -> Result<Toggle> {
        match self.registry.get(room_id).await? {
            Some(record) if record.subscribers.contains(chat_id) => {
                let info = record.streamer_info.clone();
                self.unsubscribe(record, chat_id, room_id).await?;
                Ok(Toggle::Removed(info))
            }
            existing => {
                let info = self.source.fetch_status(room_id).await?;
                let mut record = match existing {
                    Some(record) => record,
                    None => RoomRecord::bootstrap(&info),
                };
                record.subscribers.insert(chat_id.to_string());
                self.registry.put(room_id, &record).await?;
                Ok(Toggle::Added(info))
            }
        }
    }

    /// Management api add, idempotent: re-adding an existing subscriber is a
    /// plain success.
    pub async fn add(&self, chat_id: &str, room_id: &str) -> Result<StreamerSnapshot> {
        let mut record = match self.registry.get(room_id).await? {
            Some(record) => record,
            None => RoomRecord::bootstrap(&self.source.fetch_status(room_id).await?),
        };
        record.subscribers.insert(chat_id.to_string());
        self.registry.put(room_id, &record).await?;
        Ok(record.streamer_info)
    }

    /// Management api remove. Unlike `toggle` this fails on an unmonitored
    /// room instead of subscribing.
    pub async fn remove(&self, chat_id: &str, room_id: &str) -> Result<()> {
        match self.registry.get(room_id).await? {
            None => Err(Error::RecordNotFound(room_id.to_string())),
            Some(record) => self.unsubscribe(record, chat_id, room_id).await,
        }
    }

    pub async fn list_for_subscriber(&self, chat_id: &str) -> Result<Vec<RoomStatus>> {
        Ok(self
            .registry
            .get_all()
            .await?
            .into_iter()
            .filter(|(_, record)| record.subscribers.contains(chat_id))
            .map(|(room_id, record)| RoomStatus {
                room_id,
                is_live: record.is_live,
                last_checked: record.last_checked,
                streamer_info: record.streamer_info,
            })
            .collect())
    }

    // A record with no subscribers left is deleted, never written back:
    // zero-subscriber tombstones must not exist in the store.
    async fn unsubscribe(&self, mut record: RoomRecord, chat_id: &str, room_id: &str) -> Result<()> {
        record.subscribers.remove(chat_id);
        if record.subscribers.is_empty() {
            self.registry.delete(room_id).await
        } else {
            self.registry.put(room_id, &record).await
        }
    }
}
