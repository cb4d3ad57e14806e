use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{ProjectTag, RequestContext, Tag};
use crate::store::{decode, Collection, DataAccess, Query, SortDirection, StoreError};

/// Split the comma-separated tag field into trimmed, non-empty names
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect()
}

/// Trim, drop empties and keep the first occurrence of each name, in input order
fn normalize_names(tag_names: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(tag_names.len());
    for name in tag_names {
        let name = name.trim();
        if !name.is_empty() && !names.iter().any(|seen| seen == name) {
            names.push(name.to_string());
        }
    }
    names
}

pub struct TagService<'a> {
    store: &'a dyn DataAccess,
}

impl<'a> TagService<'a> {
    pub fn new(store: &'a dyn DataAccess) -> Self {
        TagService { store }
    }

    /// Link each named tag to `project_id`, creating missing tags on the way.
    ///
    /// The project must already exist. A failure stops at the offending tag and
    /// reports it as `PartialApplication`; tags linked before it stay linked.
    pub async fn attach_tags(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        tag_names: &[String],
    ) -> AppResult<Vec<Tag>> {
        let names = normalize_names(tag_names);
        let mut linked: Vec<Tag> = Vec::with_capacity(names.len());

        for name in names {
            match self.attach_one(ctx, project_id, &name).await {
                Ok(tag) => linked.push(tag),
                Err(e) => {
                    tracing::error!(
                        "Failed to attach tag '{}' to project {}: {}",
                        name,
                        project_id,
                        e
                    );
                    return Err(AppError::PartialApplication {
                        tag: name,
                        linked: linked.into_iter().map(|t| t.name).collect(),
                        source: Box::new(e),
                    });
                }
            }
        }

        tracing::debug!("Attached {} tag(s) to project {}", linked.len(), project_id);
        Ok(linked)
    }

    async fn attach_one(&self, ctx: &RequestContext, project_id: &str, name: &str) -> AppResult<Tag> {
        let tag = self.find_or_create(ctx, name).await?;
        self.link(ctx, project_id, &tag.id).await?;
        Ok(tag)
    }

    /// Canonical tag for `name`.
    ///
    /// Tag names are unique in the store, so when a concurrent submission
    /// creates the same new name first, the insert conflicts and the winner's
    /// record is returned instead of a duplicate.
    pub async fn find_or_create(&self, ctx: &RequestContext, name: &str) -> AppResult<Tag> {
        if let Some(tag) = self.get_tag_by_name(ctx, name).await? {
            return Ok(tag);
        }

        match self
            .store
            .insert(ctx, Collection::Tags, json!({ "name": name }))
            .await
        {
            Ok(record) => {
                let tag: Tag = decode(record)?;
                tracing::info!("Created tag '{}' ({})", tag.name, tag.id);
                Ok(tag)
            }
            Err(StoreError::Conflict(_)) => {
                tracing::debug!("Tag '{}' was created concurrently, reusing it", name);
                self.get_tag_by_name(ctx, name).await?.ok_or_else(|| {
                    AppError::Internal(format!("Tag '{}' conflicted but cannot be read", name))
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the (project, tag) association unless it already exists
    async fn link(&self, ctx: &RequestContext, project_id: &str, tag_id: &str) -> AppResult<()> {
        let query = Query::new()
            .eq("project_id", project_id)
            .eq("tag_id", tag_id);

        if self
            .store
            .find_one(ctx, Collection::ProjectTags, &query)
            .await?
            .is_some()
        {
            return Ok(());
        }

        match self
            .store
            .insert(
                ctx,
                Collection::ProjectTags,
                json!({ "project_id": project_id, "tag_id": tag_id }),
            )
            .await
        {
            Ok(_) | Err(StoreError::Conflict(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_tag_by_name(&self, ctx: &RequestContext, name: &str) -> AppResult<Option<Tag>> {
        let record = self
            .store
            .find_one(ctx, Collection::Tags, &Query::new().eq("name", name))
            .await?;
        Ok(record.map(decode::<Tag>).transpose()?)
    }

    pub async fn get_tag_by_id(&self, ctx: &RequestContext, id: &str) -> AppResult<Option<Tag>> {
        let record = self
            .store
            .find_one(ctx, Collection::Tags, &Query::new().eq("id", id))
            .await?;
        Ok(record.map(decode::<Tag>).transpose()?)
    }

    pub async fn list_tags(&self, ctx: &RequestContext) -> AppResult<Vec<Tag>> {
        let records = self
            .store
            .find(
                ctx,
                Collection::Tags,
                &Query::new().order_by("name", SortDirection::Ascending),
            )
            .await?;
        Ok(records
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<Tag>, _>>()?)
    }

    /// Names of the tags linked to a project
    pub async fn tags_for_project(&self, ctx: &RequestContext, project_id: &str) -> AppResult<Vec<String>> {
        let links = self
            .store
            .find(
                ctx,
                Collection::ProjectTags,
                &Query::new().eq("project_id", project_id),
            )
            .await?;

        let mut names = Vec::with_capacity(links.len());
        for link in links {
            let link: ProjectTag = decode(link)?;
            match self.get_tag_by_id(ctx, &link.tag_id).await? {
                Some(tag) => names.push(tag.name),
                None => tracing::warn!("Project {} links missing tag {}", project_id, link.tag_id),
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{FlakyStore, Op};
    use crate::store::MemoryStore;

    fn ctx() -> RequestContext {
        RequestContext::anonymous()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn links_for(store: &dyn DataAccess, project_id: &str) -> usize {
        store
            .find(
                &ctx(),
                Collection::ProjectTags,
                &Query::new().eq("project_id", project_id),
            )
            .await
            .unwrap()
            .len()
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(parse_tag_list("react, typescript ,, "), names(&["react", "typescript"]));
        assert!(parse_tag_list("").is_empty());
        assert!(parse_tag_list(" , ").is_empty());
    }

    #[test]
    fn test_normalize_names_keeps_first_occurrence() {
        assert_eq!(
            normalize_names(&names(&["react", " vue", "react", "", "React"])),
            names(&["react", "vue", "React"])
        );
    }

    #[tokio::test]
    async fn test_duplicate_names_link_once() {
        let store = MemoryStore::new();
        let service = TagService::new(&store);

        let tags = service
            .attach_tags(&ctx(), "p1", &names(&["react", "react"]))
            .await
            .unwrap();

        assert_eq!(tags.len(), 1);
        assert_eq!(links_for(&store, "p1").await, 1);
        assert_eq!(store.count(Collection::Tags).await, 1);
    }

    #[tokio::test]
    async fn test_existing_tag_is_reused() {
        let store = MemoryStore::new();
        let service = TagService::new(&store);

        let first = service
            .attach_tags(&ctx(), "p1", &names(&["typescript"]))
            .await
            .unwrap();
        let second = service
            .attach_tags(&ctx(), "p2", &names(&["typescript"]))
            .await
            .unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(store.count(Collection::Tags).await, 1);
        assert_eq!(links_for(&store, "p2").await, 1);
    }

    #[tokio::test]
    async fn test_reattaching_is_idempotent() {
        let store = MemoryStore::new();
        let service = TagService::new(&store);

        service.attach_tags(&ctx(), "p1", &names(&["ai"])).await.unwrap();
        service.attach_tags(&ctx(), "p1", &names(&["ai"])).await.unwrap();

        assert_eq!(links_for(&store, "p1").await, 1);
    }

    #[tokio::test]
    async fn test_names_are_case_sensitive() {
        let store = MemoryStore::new();
        let service = TagService::new(&store);

        service
            .attach_tags(&ctx(), "p1", &names(&["Rust", "rust"]))
            .await
            .unwrap();

        assert_eq!(store.count(Collection::Tags).await, 2);
        assert_eq!(
            service.tags_for_project(&ctx(), "p1").await.unwrap(),
            names(&["Rust", "rust"])
        );
    }

    #[tokio::test]
    async fn test_conflicting_create_reuses_winner() {
        let store = FlakyStore::new();
        let winner = store
            .inner()
            .insert(&ctx(), Collection::Tags, json!({ "name": "wasm" }))
            .await
            .unwrap();
        // The lookup misses, as if the other submission committed right after it
        store.hide_next_find(Collection::Tags);

        let tag = TagService::new(&store)
            .find_or_create(&ctx(), "wasm")
            .await
            .unwrap();

        assert_eq!(Some(tag.id.as_str()), winner["id"].as_str());
        assert_eq!(store.inner().count(Collection::Tags).await, 1);
    }

    #[tokio::test]
    async fn test_failure_reports_partial_application() {
        let store = FlakyStore::new();
        store.fail_when(Op::Insert, Collection::Tags, "name", "broken");
        let service = TagService::new(&store);

        let err = service
            .attach_tags(&ctx(), "p1", &names(&["ok", "broken", "later"]))
            .await
            .unwrap_err();

        match err {
            AppError::PartialApplication { tag, linked, source } => {
                assert_eq!(tag, "broken");
                assert_eq!(linked, names(&["ok"]));
                assert!(matches!(*source, AppError::Backend(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Earlier links survive; nothing after the failure was attempted
        assert_eq!(links_for(&store, "p1").await, 1);
        assert!(service.get_tag_by_name(&ctx(), "later").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_tags_sorted_by_name() {
        let store = MemoryStore::new();
        let service = TagService::new(&store);

        service
            .attach_tags(&ctx(), "p1", &names(&["web", "ai", "game"]))
            .await
            .unwrap();

        let listed: Vec<String> = service
            .list_tags(&ctx())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(listed, names(&["ai", "game", "web"]));
    }
}
