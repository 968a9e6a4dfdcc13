//! # rf-db-sqlite Implementation
//!
//! This module maps the key/value object model of `rf-core` onto three
//! SQLite tables: object fields, sorted-set members, and set members.
//! Field values are stored as JSON text so numbers, strings, and booleans
//! come back with the type they were written with.

use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use rf_core::models::Fields;
use rf_core::traits::ObjectStore;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS objects (
        key   TEXT NOT NULL,
        field TEXT NOT NULL,
        value TEXT NOT NULL,
        PRIMARY KEY (key, field)
    )",
    "CREATE TABLE IF NOT EXISTS sorted_sets (
        key    TEXT NOT NULL,
        member TEXT NOT NULL,
        score  INTEGER NOT NULL,
        PRIMARY KEY (key, member)
    )",
    "CREATE TABLE IF NOT EXISTS sets (
        key    TEXT NOT NULL,
        member TEXT NOT NULL,
        PRIMARY KEY (key, member)
    )",
];

pub struct SqliteObjectStore {
    pool: SqlitePool,
}

impl SqliteObjectStore {
    /// Connects to `url` (e.g. `sqlite://rusty_forum.db` or `sqlite::memory:`),
    /// creating the database file and tables if they are missing.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `:memory:` opens a separate database, so an
        // in-memory store must live on exactly one connection that never expires.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!(url, "sqlite object store ready");
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn encode(value: &Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode(raw: &str) -> anyhow::Result<Value> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    /// Upserts every field in one transaction so readers never see half an object.
    async fn set_object(&self, key: &str, fields: &Fields) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for (field, value) in fields {
            sqlx::query(
                "INSERT INTO objects (key, field, value) VALUES (?, ?, ?)
                 ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(field.as_str())
            .bind(encode(value)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_object_field(&self, key: &str, field: &str, value: Value) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO objects (key, field, value) VALUES (?, ?, ?)
             ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(field)
        .bind(encode(&value)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Fields>> {
        let rows = sqlx::query("SELECT field, value FROM objects WHERE key = ?")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut object = Fields::new();
        for row in rows {
            let field: String = row.try_get("field")?;
            let raw: String = row.try_get("value")?;
            object.insert(field, decode(&raw)?);
        }
        Ok(Some(object))
    }

    async fn get_object_fields(&self, key: &str, fields: &[&str]) -> anyhow::Result<Fields> {
        let mut object = self.get_object(key).await?.unwrap_or_default();
        object.retain(|field, _| fields.contains(&field.as_str()));
        Ok(object)
    }

    /// A single upsert statement, so concurrent increments never observe the
    /// same starting value. Numeric strings written as JSON (`"4"`) count too.
    async fn increment_object_field_by(&self, key: &str, field: &str, by: i64) -> anyhow::Result<i64> {
        let row = sqlx::query(
            "INSERT INTO objects (key, field, value) VALUES (?, ?, ?)
             ON CONFLICT(key, field) DO UPDATE
                SET value = CAST(TRIM(objects.value, '\"') AS INTEGER) + CAST(excluded.value AS INTEGER)
                WHERE TRIM(objects.value, '\"') GLOB '[0-9]*'
                   OR TRIM(objects.value, '\"') GLOB '-[0-9]*'
             RETURNING CAST(value AS INTEGER) AS value",
        )
        .bind(key)
        .bind(field)
        .bind(by.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("value")?),
            None => Err(anyhow!("field {field} of {key} is not an integer")),
        }
    }

    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO sorted_sets (key, member, score) VALUES (?, ?, ?)
             ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
        )
        .bind(key)
        .bind(member)
        .bind(score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sorted_sets WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn sorted_set_members(&self, key: &str) -> anyhow::Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT member, score FROM sorted_sets WHERE key = ? ORDER BY score ASC, member ASC",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> anyhow::Result<(String, i64)> {
                Ok((row.try_get("member")?, row.try_get("score")?))
            })
            .collect()
    }

    async fn sorted_set_score(&self, key: &str, member: &str) -> anyhow::Result<Option<i64>> {
        let row = sqlx::query("SELECT score FROM sorted_sets WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("score")?)),
            None => Ok(None),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT OR IGNORE INTO sets (key, member) VALUES (?, ?)")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query("SELECT member FROM sets WHERE key = ? ORDER BY member ASC")
            .bind(key)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> anyhow::Result<String> { Ok(row.try_get("member")?) })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    async fn store() -> SqliteObjectStore {
        SqliteObjectStore::new("sqlite::memory:").await.expect("Failed to open in-memory SQLite")
    }

    #[tokio::test]
    async fn test_objects_keep_value_types() {
        let store = store().await;

        let mut fields = Fields::new();
        fields.insert("pid".into(), json!(1));
        fields.insert("content".into(), json!("OP"));
        fields.insert("pinned".into(), json!(true));
        store.set_object("post:1", &fields).await.unwrap();
        store.set_object_field("post:1", "content", json!("edited")).await.unwrap();

        let object = store.get_object("post:1").await.unwrap().expect("object exists");
        assert_eq!(object["pid"], json!(1));
        assert_eq!(object["content"], json!("edited"));
        assert_eq!(object["pinned"], json!(true));

        let picked = store.get_object_fields("post:1", &["pid", "nope"]).await.unwrap();
        assert_eq!(picked.len(), 1);
        assert!(store.get_object("post:2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_counts_from_zero() {
        let store = store().await;
        assert_eq!(store.increment_object_field("global", "nextPid").await.unwrap(), 1);
        assert_eq!(store.increment_object_field("global", "nextPid").await.unwrap(), 2);
        assert_eq!(store.increment_object_field_by("global", "nextPid", 5).await.unwrap(), 7);

        let object = store.get_object("global").await.unwrap().unwrap();
        assert_eq!(object["nextPid"], json!(7));
    }

    #[tokio::test]
    async fn test_increment_rejects_non_integer_fields() {
        let store = store().await;
        store.set_object_field("user:1", "username", json!("bob")).await.unwrap();
        assert!(store.increment_object_field("user:1", "username").await.is_err());

        store.set_object_field("user:1", "postcount", json!("4")).await.unwrap();
        assert_eq!(store.increment_object_field("user:1", "postcount").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_unique() {
        let store = Arc::new(store().await);
        let tasks = (0..20).map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.increment_object_field("global", "nextPid").await })
        });

        let mut ids: Vec<i64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_sorted_sets_and_sets() {
        let store = store().await;
        store.sorted_set_add("pid:1:replies", 200, "3").await.unwrap();
        store.sorted_set_add("pid:1:replies", 100, "2").await.unwrap();
        store.sorted_set_add("pid:1:replies", 150, "3").await.unwrap();

        let members = store.sorted_set_members("pid:1:replies").await.unwrap();
        assert_eq!(members, vec![("2".to_string(), 100), ("3".to_string(), 150)]);
        assert_eq!(store.sorted_set_score("pid:1:replies", "2").await.unwrap(), Some(100));

        store.sorted_set_remove("pid:1:replies", "2").await.unwrap();
        assert_eq!(store.sorted_set_score("pid:1:replies", "2").await.unwrap(), None);

        store.set_add("uid:5:groups", "mods").await.unwrap();
        store.set_add("uid:5:groups", "admins").await.unwrap();
        store.set_add("uid:5:groups", "mods").await.unwrap();
        assert_eq!(store.set_members("uid:5:groups").await.unwrap(), vec!["admins", "mods"]);
    }
}
