use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::Connection;
use std::sync::Arc;
use tokio::task;

use crate::schema::rooms::dsl;
use crate::store::{Page, RoomStore};

diesel_migrations::embed_migrations!("./migrations/");

const PAGE_SIZE: i64 = 100;

pub fn establish_connection(db_path: &str) -> Result<SqliteConnection> {
    SqliteConnection::establish(db_path)
        .with_context(|| format!("cannot connect to db at {}", db_path))
}

pub fn run_migrations(connection: &SqliteConnection) -> Result<()> {
    embedded_migrations::run(connection)
        .context("Cannot run migration")
        .map_err(|e| e.into())
}

/// Sqlite-backed [`RoomStore`]. Connections are opened per operation inside
/// `spawn_blocking`, sqlite is plenty fast for the handful of rooms a bot
/// instance watches.
pub struct SqliteStore {
    db_path: Arc<String>,
}

impl SqliteStore {
    pub fn new(db_path: &str) -> Self {
        SqliteStore {
            db_path: Arc::new(db_path.to_string()),
        }
    }
}

#[async_trait]
impl RoomStore for SqliteStore {
    async fn list(&self, cursor: Option<String>) -> Result<Page> {
        let db_path = self.db_path.clone();
        task::spawn_blocking(move || {
            let conn = establish_connection(&db_path)?;
            let mut query = dsl::rooms
                .select(dsl::room_id)
                .order(dsl::room_id.asc())
                // one extra row to know whether another page follows
                .limit(PAGE_SIZE + 1)
                .into_boxed();
            if let Some(cursor) = cursor {
                query = query.filter(dsl::room_id.gt(cursor));
            }
            let mut keys: Vec<String> = query.load(&conn).context("cannot list room keys")?;
            let cursor = if keys.len() as i64 > PAGE_SIZE {
                keys.truncate(PAGE_SIZE as usize);
                keys.last().cloned()
            } else {
                None
            };
            Ok(Page { keys, cursor })
        })
        .await?
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let db_path = self.db_path.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = establish_connection(&db_path)?;
            dsl::rooms
                .filter(dsl::room_id.eq(&key))
                .select(dsl::record)
                .first::<String>(&conn)
                .optional()
                .with_context(|| format!("cannot read room {}", key))
        })
        .await?
    }

    async fn put(&self, key: &str, value: String) -> Result<()> {
        let db_path = self.db_path.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = establish_connection(&db_path)?;
            diesel::replace_into(dsl::rooms)
                .values((dsl::room_id.eq(&key), dsl::record.eq(&value)))
                .execute(&conn)
                .with_context(|| format!("cannot store room {}", key))?;
            Ok(())
        })
        .await?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let db_path = self.db_path.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = establish_connection(&db_path)?;
            diesel::delete(dsl::rooms.filter(dsl::room_id.eq(&key)))
                .execute(&conn)
                .with_context(|| format!("cannot delete room {}", key))?;
            Ok(())
        })
        .await?
    }
}
