use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    compare_values, into_object, prepare_insert, Collection, DataAccess, Query, SortDirection,
    StoreError, StoreResult,
};
use crate::models::RequestContext;

/// In-process store with the same uniqueness rules as the Postgres schema.
///
/// Used when `STORE_BACKEND=memory` and as the backing store in tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Collection, Vec<Map<String, Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in `collection`
    pub async fn count(&self, collection: Collection) -> usize {
        self.tables
            .read()
            .await
            .get(&collection)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    fn find_conflict(
        collection: Collection,
        rows: &[Map<String, Value>],
        candidate: &Map<String, Value>,
    ) -> Option<String> {
        for key in collection.unique_keys() {
            let clash = rows.iter().any(|row| {
                key.iter()
                    .all(|field| candidate.get(*field).is_some() && row.get(*field) == candidate.get(*field))
            });
            if clash {
                return Some(format!(
                    "duplicate key ({}) on {}",
                    key.join(", "),
                    collection.name()
                ));
            }
        }
        None
    }
}

#[async_trait]
impl DataAccess for MemoryStore {
    async fn find(
        &self,
        _ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<Value>> {
        query.check_fields(collection)?;

        let tables = self.tables.read().await;
        let mut rows: Vec<Map<String, Value>> = tables
            .get(&collection)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();
        drop(tables);

        if let Some((field, direction)) = &query.order {
            rows.sort_by(|a, b| {
                let a = a.get(field).unwrap_or(&Value::Null);
                let b = b.get(field).unwrap_or(&Value::Null);
                match direction {
                    SortDirection::Ascending => compare_values(a, b),
                    SortDirection::Descending => compare_values(b, a),
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows.into_iter().map(Value::Object).collect())
    }

    async fn insert(
        &self,
        _ctx: &RequestContext,
        collection: Collection,
        record: Value,
    ) -> StoreResult<Value> {
        let record = prepare_insert(collection, record)?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();
        if let Some(conflict) = Self::find_conflict(collection, rows, &record) {
            return Err(StoreError::Conflict(conflict));
        }
        rows.push(record.clone());

        Ok(Value::Object(record))
    }

    async fn update(
        &self,
        _ctx: &RequestContext,
        collection: Collection,
        query: &Query,
        patch: Value,
    ) -> StoreResult<Value> {
        query.check_fields(collection)?;
        let patch = into_object(patch)?;
        for field in patch.keys() {
            collection.check_field(field)?;
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();

        let mut first = None;
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            for (field, value) in &patch {
                row.insert(field.clone(), value.clone());
            }
            if first.is_none() {
                first = Some(row.clone());
            }
        }

        first
            .map(Value::Object)
            .ok_or_else(|| StoreError::NotFound(format!("no matching record in {}", collection.name())))
    }

    async fn delete(
        &self,
        _ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<u64> {
        query.check_fields(collection)?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(collection).or_default();
        let before = rows.len();
        rows.retain(|row| !query.matches(row));

        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_find_by_filter() {
        let store = MemoryStore::new();
        let ctx = RequestContext::anonymous();

        let tag = store
            .insert(&ctx, Collection::Tags, json!({ "name": "rust" }))
            .await
            .unwrap();
        store
            .insert(&ctx, Collection::Tags, json!({ "name": "ai" }))
            .await
            .unwrap();

        let found = store
            .find_one(&ctx, Collection::Tags, &Query::new().eq("name", "rust"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["id"], tag["id"]);
        assert_eq!(store.count(Collection::Tags).await, 2);
    }

    #[tokio::test]
    async fn test_unique_keys_reject_duplicates() {
        let store = MemoryStore::new();
        let ctx = RequestContext::anonymous();

        store
            .insert(&ctx, Collection::Likes, json!({ "user_id": "u1", "project_id": "p1" }))
            .await
            .unwrap();
        let err = store
            .insert(&ctx, Collection::Likes, json!({ "user_id": "u1", "project_id": "p1" }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // A different pair is fine
        store
            .insert(&ctx, Collection::Likes, json!({ "user_id": "u2", "project_id": "p1" }))
            .await
            .unwrap();
        assert_eq!(store.count(Collection::Likes).await, 2);
    }

    #[tokio::test]
    async fn test_find_orders_and_limits() {
        let store = MemoryStore::new();
        let ctx = RequestContext::anonymous();

        for (title, created_at) in [("old", 10), ("new", 30), ("mid", 20)] {
            store
                .insert(
                    &ctx,
                    Collection::Projects,
                    json!({ "title": title, "author_id": "u1", "created_at": created_at }),
                )
                .await
                .unwrap();
        }

        let rows = store
            .find(
                &ctx,
                Collection::Projects,
                &Query::new().order_by("created_at", SortDirection::Descending),
            )
            .await
            .unwrap();
        let titles: Vec<&str> = rows.iter().map(|r| r["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);

        let rows = store
            .find(
                &ctx,
                Collection::Projects,
                &Query::new()
                    .order_by("created_at", SortDirection::Ascending)
                    .limit(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "old");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::new();
        let ctx = RequestContext::anonymous();

        let project = store
            .insert(&ctx, Collection::Projects, json!({ "title": "Demo", "author_id": "u1" }))
            .await
            .unwrap();
        let id = project["id"].as_str().unwrap().to_string();

        let updated = store
            .update(
                &ctx,
                Collection::Projects,
                &Query::new().eq("id", id.as_str()),
                json!({ "likes_count": 3 }),
            )
            .await
            .unwrap();
        assert_eq!(updated["likes_count"], 3);
        assert_eq!(updated["title"], "Demo");

        let missing = store
            .update(
                &ctx,
                Collection::Projects,
                &Query::new().eq("id", "nope"),
                json!({ "likes_count": 1 }),
            )
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::NotFound(_)));

        let removed = store
            .delete(&ctx, Collection::Projects, &Query::new().eq("id", id.as_str()))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Collection::Projects).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_filter_field_is_rejected() {
        let store = MemoryStore::new();
        let ctx = RequestContext::anonymous();

        let err = store
            .find(&ctx, Collection::Likes, &Query::new().eq("score", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }
}
