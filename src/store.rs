use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// One page of a key listing. A `None` cursor means the listing is exhausted.
#[derive(Debug, PartialEq)]
pub struct Page {
    pub keys: Vec<String>,
    pub cursor: Option<String>,
}

/// The durable key-value map holding one JSON-encoded room record per room id.
/// Listing is paginated, callers must follow cursors until exhaustion.
/// No guarantee across keys, concurrent writers to the same key are
/// last-write-wins.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn list(&self, cursor: Option<String>) -> Result<Page>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: String) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Ephemeral store, used when running without a database file and as the
/// workhorse for tests (a tiny page size there keeps the pagination path
/// exercised).
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        MemoryStore {
            entries: Mutex::new(BTreeMap::new()),
            page_size,
        }
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn list(&self, cursor: Option<String>) -> Result<Page> {
        let entries = self.entries.lock().expect("memory store lock");
        let mut keys: Vec<String> = match cursor {
            // the cursor is the last key of the previous page, resume
            // strictly after it
            Some(cursor) => entries
                .range::<String, _>((
                    std::ops::Bound::Excluded(&cursor),
                    std::ops::Bound::Unbounded,
                ))
                .map(|(k, _)| k.clone())
                .take(self.page_size + 1)
                .collect(),
            None => entries.keys().take(self.page_size + 1).cloned().collect(),
        };
        let cursor = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };
        Ok(Page { keys, cursor })
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().expect("memory store lock");
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.lock().expect("memory store lock");
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("memory store lock");
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn list_follows_cursors_without_dupes_or_omissions() {
        let store = MemoryStore::with_page_size(2);
        for key in ["r1", "r2", "r3", "r4", "r5"] {
            store.put(key, format!("value-{}", key)).await.unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        let mut pages = 0;
        loop {
            let page = store.list(cursor).await.unwrap();
            seen.extend(page.keys);
            pages += 1;
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }

        assert_eq!(seen, vec!["r1", "r2", "r3", "r4", "r5"]);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn list_of_empty_store_is_a_single_empty_page() {
        let store = MemoryStore::new();
        let page = store.list(None).await.unwrap();
        assert_eq!(
            page,
            Page {
                keys: vec![],
                cursor: None
            }
        );
    }

    #[tokio::test]
    async fn delete_then_get_returns_nothing() {
        let store = MemoryStore::new();
        store.put("r1", "{}".to_string()).await.unwrap();
        store.delete("r1").await.unwrap();
        assert_eq!(store.get("r1").await.unwrap(), None);
    }
}
