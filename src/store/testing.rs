//! Store wrappers for exercising failure paths in tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{Collection, DataAccess, MemoryStore, Query, StoreError, StoreResult};
use crate::models::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Find,
    Insert,
    Update,
    Delete,
}

struct FailRule {
    op: Op,
    collection: Collection,
    field: Option<(String, Value)>,
}

impl FailRule {
    fn applies(&self, op: Op, collection: Collection, record: Option<&Value>, query: Option<&Query>) -> bool {
        if self.op != op || self.collection != collection {
            return false;
        }
        match &self.field {
            None => true,
            Some((field, expected)) => {
                let in_record = record.and_then(|r| r.get(field)) == Some(expected);
                let in_query = query
                    .map(|q| q.filters.iter().any(|(f, v)| f == field && v == expected))
                    .unwrap_or(false);
                in_record || in_query
            }
        }
    }
}

/// `MemoryStore` that counts calls and fails on demand
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    calls: AtomicUsize,
    rules: Mutex<Vec<FailRule>>,
    hidden: Mutex<HashSet<Collection>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Total port calls made through this store
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, op: Op, collection: Collection) {
        self.rules.lock().unwrap().push(FailRule {
            op,
            collection,
            field: None,
        });
    }

    /// Fail `op` when the record or filter carries `field == value`
    pub fn fail_when(&self, op: Op, collection: Collection, field: &str, value: impl Into<Value>) {
        self.rules.lock().unwrap().push(FailRule {
            op,
            collection,
            field: Some((field.to_string(), value.into())),
        });
    }

    /// Make the next read of `collection` come back empty
    pub fn hide_next_find(&self, collection: Collection) {
        self.hidden.lock().unwrap().insert(collection);
    }

    fn check(&self, op: Op, collection: Collection, record: Option<&Value>, query: Option<&Query>) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rules = self.rules.lock().unwrap();
        if rules.iter().any(|rule| rule.applies(op, collection, record, query)) {
            return Err(StoreError::Unavailable(format!(
                "injected {:?} failure on {}",
                op,
                collection.name()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DataAccess for FlakyStore {
    async fn find(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<Vec<Value>> {
        self.check(Op::Find, collection, None, Some(query))?;
        if self.hidden.lock().unwrap().remove(&collection) {
            return Ok(Vec::new());
        }
        self.inner.find(ctx, collection, query).await
    }

    async fn insert(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        record: Value,
    ) -> StoreResult<Value> {
        self.check(Op::Insert, collection, Some(&record), None)?;
        self.inner.insert(ctx, collection, record).await
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        query: &Query,
        patch: Value,
    ) -> StoreResult<Value> {
        self.check(Op::Update, collection, Some(&patch), Some(query))?;
        self.inner.update(ctx, collection, query, patch).await
    }

    async fn delete(
        &self,
        ctx: &RequestContext,
        collection: Collection,
        query: &Query,
    ) -> StoreResult<u64> {
        self.check(Op::Delete, collection, None, Some(query))?;
        self.inner.delete(ctx, collection, query).await
    }
}
