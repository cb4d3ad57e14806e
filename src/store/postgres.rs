use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    postgres::{PgArguments, Postgres},
    query::QueryScalar,
    types::Json,
};

use super::{
    into_object, prepare_insert, Collection, DataAccess, Query, SortDirection, StoreError,
    StoreResult,
};
use crate::db::Database;
use crate::models::RequestContext;

/// Data access port backed by the Postgres schema in `migrations/postgres`.
///
/// Field names are checked against the collection's column list before
/// they are spliced into SQL; values are always bound.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        PgStore { db }
    }
}

fn bind_value<'q, O>(
    query: QueryScalar<'q, Postgres, O, PgArguments>,
    value: &Value,
) -> QueryScalar<'q, Postgres, O, PgArguments>
where
    O: Send + Unpin,
{
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(Json(other.clone())),
    }
}

/// Append a WHERE clause for the query's filters, numbering placeholders from `start`
fn push_where(sql: &mut String, binds: &mut Vec<Value>, query: &Query, start: usize) {
    for (i, (field, value)) in query.filters.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(&format!("t.{} = ${}", field, start + i));
        binds.push(value.clone());
    }
}

#[async_trait]
impl DataAccess for PgStore {
    async fn find(
        &self,
        _ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<Value>> {
        query.check_fields(collection)?;

        let mut sql = format!("SELECT to_jsonb(t.*) FROM {} AS t", collection.name());
        let mut binds = Vec::new();
        push_where(&mut sql, &mut binds, query, 1);

        if let Some((field, direction)) = &query.order {
            let direction = match direction {
                SortDirection::Ascending => "ASC",
                SortDirection::Descending => "DESC",
            };
            sql.push_str(&format!(" ORDER BY t.{} {}", field, direction));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        tracing::debug!("find on {}: {}", collection.name(), sql);

        let mut q = sqlx::query_scalar::<_, Json<Value>>(&sql);
        for value in &binds {
            q = bind_value(q, value);
        }
        let rows = q.fetch_all(self.db.pool()).await?;

        Ok(rows.into_iter().map(|Json(row)| row).collect())
    }

    async fn insert(
        &self,
        _ctx: &RequestContext,
        collection: Collection,
        record: Value,
    ) -> StoreResult<Value> {
        let record = prepare_insert(collection, record)?;
        let columns: Vec<&String> = record.keys().collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();

        let sql = format!(
            "INSERT INTO {} AS t ({}) VALUES ({}) RETURNING to_jsonb(t.*)",
            collection.name(),
            columns
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            placeholders.join(", ")
        );

        let mut q = sqlx::query_scalar::<_, Json<Value>>(&sql);
        for value in record.values() {
            q = bind_value(q, value);
        }
        let Json(row) = q.fetch_one(self.db.pool()).await?;

        Ok(row)
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
        if patch.is_empty() {
            return Err(StoreError::InvalidRecord("empty patch".to_string()));
        }

        let mut sql = format!("UPDATE {} AS t SET ", collection.name());
        let mut binds = Vec::new();
        for (i, (field, value)) in patch.iter().enumerate() {
            collection.check_field(field)?;
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("{} = ${}", field, i + 1));
            binds.push(value.clone());
        }
        push_where(&mut sql, &mut binds, query, patch.len() + 1);
        sql.push_str(" RETURNING to_jsonb(t.*)");

        let mut q = sqlx::query_scalar::<_, Json<Value>>(&sql);
        for value in &binds {
            q = bind_value(q, value);
        }
        let rows = q.fetch_all(self.db.pool()).await?;

        rows.into_iter()
            .next()
            .map(|Json(row)| row)
            .ok_or_else(|| StoreError::NotFound(format!("no matching record in {}", collection.name())))
    }

    async fn delete(
        &self,
        _ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<u64> {
        query.check_fields(collection)?;

        let mut sql = format!("WITH removed AS (DELETE FROM {} AS t", collection.name());
        let mut binds = Vec::new();
        push_where(&mut sql, &mut binds, query, 1);
        sql.push_str(" RETURNING 1) SELECT COUNT(*) FROM removed");

        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for value in &binds {
            q = bind_value(q, value);
        }
        let removed = q.fetch_one(self.db.pool()).await?;

        Ok(removed as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.db.pool()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_where_numbers_placeholders() {
        let mut sql = String::from("DELETE FROM likes AS t");
        let mut binds = Vec::new();
        let query = Query::new().eq("user_id", "u1").eq("project_id", "p1");

        push_where(&mut sql, &mut binds, &query, 3);

        assert_eq!(
            sql,
            "DELETE FROM likes AS t WHERE t.user_id = $3 AND t.project_id = $4"
        );
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn test_push_where_without_filters_is_noop() {
        let mut sql = String::from("SELECT to_jsonb(t.*) FROM tags AS t");
        let mut binds = Vec::new();

        push_where(&mut sql, &mut binds, &Query::new(), 1);

        assert_eq!(sql, "SELECT to_jsonb(t.*) FROM tags AS t");
        assert!(binds.is_empty());
    }
}
