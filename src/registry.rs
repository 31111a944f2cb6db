use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::RoomStore;

/// Opaque telegram chat identifier, compared by value.
pub type ChatId = String;

/// Streamer metadata as returned by the sidekick status api. Stored verbatim
/// inside the room record, so the field names follow the upstream wire
/// format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamerSnapshot {
    pub username: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub viewer: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    pub uid: String,
    pub live_status: bool,
}

/// One monitored room. Lives in the store under its room id for as long as
/// it has at least one subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    #[serde(rename = "isLive")]
    pub is_live: bool,
    #[serde(rename = "lastChecked")]
    pub last_checked: DateTime<Utc>,
    pub subscribers: BTreeSet<ChatId>,
    #[serde(rename = "streamerInfo")]
    pub streamer_info: StreamerSnapshot,
}

impl RoomRecord {
    /// Initial record for a room seen for the first time. The bootstrap poll
    /// result becomes the initial state, no notification is sent for it.
    pub fn bootstrap(info: &StreamerSnapshot) -> Self {
        RoomRecord {
            is_live: info.live_status,
            last_checked: Utc::now(),
            subscribers: BTreeSet::new(),
            streamer_info: info.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn RoomStore>,
}

impl Registry {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Registry { store }
    }

    /// Enumerate every stored room, following list cursors until exhausted.
    /// A key whose value cannot be read or decoded is logged and skipped, a
    /// single corrupt record must not hide the others.
    pub async fn get_all(&self) -> Result<BTreeMap<String, RoomRecord>> {
        let mut rooms = BTreeMap::new();
        let mut cursor = None;
        loop {
            let page = self.store.list(cursor).await.map_err(Error::Store)?;
            for key in page.keys {
                match self.store.get(&key).await {
                    Ok(Some(raw)) => match serde_json::from_str::<RoomRecord>(&raw) {
                        Ok(record) => {
                            rooms.insert(key, record);
                        }
                        Err(err) => {
                            log::warn!("skipping room {}: cannot decode record: {}", key, err)
                        }
                    },
                    // deleted between list and get
                    Ok(None) => (),
                    Err(err) => log::warn!("skipping room {}: {:#}", key, err),
                }
            }
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(rooms)
    }

    pub async fn get(&self, room_id: &str) -> Result<Option<RoomRecord>> {
        let raw = self.store.get(room_id).await.map_err(Error::Store)?;
        match raw {
            None => Ok(None),
            Some(raw) => {
                let record = serde_json::from_str(&raw).map_err(|e| Error::Store(e.into()))?;
                Ok(Some(record))
            }
        }
    }

    pub async fn put(&self, room_id: &str, record: &RoomRecord) -> Result<()> {
        let raw = serde_json::to_string(record).map_err(|e| Error::Store(e.into()))?;
        self.store.put(room_id, raw).await.map_err(Error::Store)
    }

    pub async fn delete(&self, room_id: &str) -> Result<()> {
        self.store.delete(room_id).await.map_err(Error::Store)
    }
}
