//! # rf-db-memory
//!
//! In-process implementation of `ObjectStore` backed by `DashMap`s.
//! Nothing survives a restart; intended for tests, demos, and single-node
//! setups that do not need durability.

use std::collections::{BTreeSet, HashMap};

use anyhow::anyhow;
use async_trait::async_trait;
use dashmap::DashMap;
use rf_core::models::Fields;
use rf_core::traits::ObjectStore;
use serde_json::Value;

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<String, Fields>,
    sorted_sets: DashMap<String, HashMap<String, i64>>,
    sets: DashMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Counters may have been written as numbers or numeric strings.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn set_object(&self, key: &str, fields: &Fields) -> anyhow::Result<()> {
        let mut object = self.objects.entry(key.to_string()).or_default();
        for (field, value) in fields {
            object.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn set_object_field(&self, key: &str, field: &str, value: Value) -> anyhow::Result<()> {
        self.objects
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Fields>> {
        Ok(self.objects.get(key).map(|object| object.clone()))
    }

    async fn get_object_fields(&self, key: &str, fields: &[&str]) -> anyhow::Result<Fields> {
        let Some(object) = self.objects.get(key) else {
            return Ok(Fields::new());
        };
        Ok(fields
            .iter()
            .filter_map(|field| object.get(*field).map(|v| (field.to_string(), v.clone())))
            .collect())
    }

    /// The entry guard holds the shard lock for the read-modify-write.
    async fn increment_object_field_by(&self, key: &str, field: &str, by: i64) -> anyhow::Result<i64> {
        let mut object = self.objects.entry(key.to_string()).or_default();
        let current = match object.get(field) {
            Some(value) => as_integer(value)
                .ok_or_else(|| anyhow!("field {field} of {key} is not an integer"))?,
            None => 0,
        };
        let next = current + by;
        object.insert(field.to_string(), Value::from(next));
        Ok(next)
    }

    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> anyhow::Result<()> {
        self.sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn sorted_set_remove(&self, key: &str, member: &str) -> anyhow::Result<()> {
        if let Some(mut set) = self.sorted_sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn sorted_set_members(&self, key: &str) -> anyhow::Result<Vec<(String, i64)>> {
        let mut members: Vec<(String, i64)> = match self.sorted_sets.get(key) {
            Some(set) => set.iter().map(|(m, s)| (m.clone(), *s)).collect(),
            None => return Ok(Vec::new()),
        };
        members.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(members)
    }

    async fn sorted_set_score(&self, key: &str, member: &str) -> anyhow::Result<Option<i64>> {
        Ok(self
            .sorted_sets
            .get(key)
            .and_then(|set| set.get(member).copied()))
    }

    async fn set_add(&self, key: &str, member: &str) -> anyhow::Result<()> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}
