pub mod factory;
pub mod memory;
pub mod postgres;
#[cfg(test)]
pub mod testing;

pub use factory::{StoreBackend, StoreFactory};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{RequestContext, Session};
use crate::utils::time::current_timestamp_millis;

/// Named collections reachable through the data access port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Projects,
    Tags,
    ProjectTags,
    Likes,
    Profiles,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Tags => "tags",
            Collection::ProjectTags => "project_tags",
            Collection::Likes => "likes",
            Collection::Profiles => "profiles",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Collection::Projects => &[
                "id",
                "title",
                "description",
                "image_url",
                "github_url",
                "bolt_url",
                "author_id",
                "featured",
                "likes_count",
                "created_at",
                "updated_at",
            ],
            Collection::Tags => &["id", "name", "created_at"],
            Collection::ProjectTags => &["project_id", "tag_id"],
            Collection::Likes => &["user_id", "project_id", "created_at"],
            Collection::Profiles => &["id", "username", "avatar_url", "created_at", "updated_at"],
        }
    }

    /// Field sets that identify at most one record each
    pub fn unique_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            Collection::Projects => &[&["id"]],
            Collection::Tags => &[&["id"], &["name"]],
            Collection::ProjectTags => &[&["project_id", "tag_id"]],
            Collection::Likes => &[&["user_id", "project_id"]],
            Collection::Profiles => &[&["id"]],
        }
    }

    fn generates_id(&self) -> bool {
        matches!(self, Collection::Projects | Collection::Tags)
    }

    pub fn check_field(&self, field: &str) -> StoreResult<()> {
        if self.columns().contains(&field) {
            Ok(())
        } else {
            Err(StoreError::UnknownField {
                collection: self.name(),
                field: field.to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Equality filters plus optional ordering and limit
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Map<String, Value>) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| record.get(field).unwrap_or(&Value::Null) == expected)
    }

    pub fn check_fields(&self, collection: Collection) -> StoreResult<()> {
        for (field, _) in &self.filters {
            collection.check_field(field)?;
        }
        if let Some((field, _)) = &self.order {
            collection.check_field(field)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown field '{field}' on {collection}")]
    UnknownField {
        collection: &'static str,
        field: String,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.message().to_string());
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract access to the remote structured store.
///
/// Every call carries the request context so implementations can apply
/// per-actor rules without reaching for ambient session state.
#[async_trait]
pub trait DataAccess: Send + Sync {
    async fn find(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<Value>>;

    async fn find_one(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Option<Value>> {
        let query = query.clone().limit(1);
        Ok(self.find(ctx, collection, &query).await?.into_iter().next())
    }

    /// Insert a record; identity and timestamps are assigned by the store
    async fn insert(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        record: Value,
    ) -> StoreResult<Value>;

    /// Patch every matching record and return the first; `NotFound` if none match
    async fn update(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        query: &Query,
        patch: Value,
    ) -> StoreResult<Value>;

    /// Delete every matching record and return how many were removed
    async fn delete(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<u64>;

    fn current_session<'a>(&self, ctx: &'a RequestContext) -> Option<&'a Session> {
        ctx.session()
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Fill in server-assigned fields and reject columns the collection lacks
pub fn prepare_insert(collection: Collection, record: Value) -> StoreResult<Map<String, Value>> {
    let mut record = into_object(record)?;
    for field in record.keys() {
        collection.check_field(field)?;
    }

    if collection.generates_id() && !record.contains_key("id") {
        record.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }

    let now = current_timestamp_millis();
    for field in ["created_at", "updated_at"] {
        if collection.columns().contains(&field) && !record.contains_key(field) {
            record.insert(field.to_string(), Value::from(now));
        }
    }

    if collection == Collection::Projects {
        record.entry("likes_count").or_insert(Value::from(0));
        record.entry("featured").or_insert(Value::Bool(false));
    }

    Ok(record)
}

pub fn into_object(value: Value) -> StoreResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidRecord(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

pub fn decode<T: DeserializeOwned>(record: Value) -> StoreResult<T> {
    Ok(serde_json::from_value(record)?)
}

/// Ordering used for sorted reads; nulls sort first
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_insert_assigns_identity_and_defaults() {
        let record = prepare_insert(
            Collection::Projects,
            json!({ "title": "Demo", "author_id": "user-1" }),
        )
        .unwrap();

        assert!(record.get("id").and_then(|v| v.as_str()).is_some());
        assert_eq!(record.get("likes_count"), Some(&json!(0)));
        assert_eq!(record.get("featured"), Some(&json!(false)));
        assert!(record.contains_key("created_at"));
    }

    #[test]
    fn test_prepare_insert_rejects_unknown_fields() {
        let err = prepare_insert(Collection::Tags, json!({ "name": "ai", "color": "red" }))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }

    #[test]
    fn test_association_rows_get_no_generated_id() {
        let record = prepare_insert(
            Collection::ProjectTags,
            json!({ "project_id": "p1", "tag_id": "t1" }),
        )
        .unwrap();
        assert!(!record.contains_key("id"));
        assert!(!record.contains_key("created_at"));
    }

    #[test]
    fn test_query_matches_all_filters() {
        let record = into_object(json!({ "user_id": "u1", "project_id": "p1" })).unwrap();
        assert!(Query::new().eq("user_id", "u1").eq("project_id", "p1").matches(&record));
        assert!(!Query::new().eq("user_id", "u2").matches(&record));
        assert!(!Query::new().eq("missing", "x").matches(&record));
    }

    #[test]
    fn test_current_session_comes_from_request_context() {
        let store = MemoryStore::new();
        assert!(store.current_session(&RequestContext::anonymous()).is_none());

        let ctx = RequestContext::authenticated(Session {
            user_id: "u1".to_string(),
            email: None,
            display_name: None,
            avatar_url: None,
        });
        assert_eq!(store.current_session(&ctx).map(|s| s.user_id.as_str()), Some("u1"));
    }
}
