use serde_json::{json, Map, Value};
use std::collections::HashSet;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::project::{is_blank, ProjectListResponse};
use crate::models::{
    Project, ProjectForm, ProjectResponse, ProjectTag, ProjectUpdateForm, ProfileSummary,
    RequestContext, Session,
};
use crate::services::{like::LikeService, profile::ProfileService, tag::TagService};
use crate::store::{decode, Collection, DataAccess, Query, SortDirection};
use crate::utils::time::current_timestamp_millis;

pub struct ProjectService<'a> {
    store: &'a dyn DataAccess,
}

impl<'a> ProjectService<'a> {
    pub fn new(store: &'a dyn DataAccess) -> Self {
        ProjectService { store }
    }

    /// Create a project owned by the session user, then attach its tags.
    ///
    /// If tagging fails the project stays created and the error reports which
    /// tag stopped the run.
    pub async fn submit_project(&self, ctx: &RequestContext, form: ProjectForm) -> AppResult<ProjectResponse> {
        let session = self
            .store
            .current_session(ctx)
            .ok_or(AppError::Unauthenticated)?;
        form.validate()?;

        let profile = ProfileService::new(self.store)
            .ensure_profile(ctx, session)
            .await?;

        let record = json!({
            "title": form.title,
            "description": form.description,
            "image_url": form.image_url,
            "github_url": form.github_url,
            "bolt_url": form.bolt_url(),
            "author_id": session.user_id,
        });
        let project: Project = decode(self.store.insert(ctx, Collection::Projects, record).await?)?;
        tracing::info!("User {} submitted project {}", session.user_id, project.id);

        let names = form.tags.into_names();
        let tags = TagService::new(self.store)
            .attach_tags(ctx, &project.id, &names)
            .await?;

        Ok(ProjectResponse::from_parts(
            project,
            Some(ProfileSummary::from(profile)),
            tags.into_iter().map(|t| t.name).collect(),
            0,
            false,
        ))
    }

    pub async fn get_project_by_id(&self, ctx: &RequestContext, id: &str) -> AppResult<Option<Project>> {
        let record = self
            .store
            .find_one(ctx, Collection::Projects, &Query::new().eq("id", id))
            .await?;
        Ok(record.map(decode::<Project>).transpose()?)
    }

    pub async fn get_project(&self, ctx: &RequestContext, id: &str) -> AppResult<ProjectResponse> {
        let project = self
            .get_project_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
        self.with_details(ctx, project).await
    }

    /// Load a project the session user is allowed to modify
    pub async fn get_owned_project(&self, ctx: &RequestContext, id: &str) -> AppResult<(Project, Session)> {
        let session = self
            .store
            .current_session(ctx)
            .ok_or(AppError::Unauthenticated)?
            .clone();
        let project = self
            .get_project_by_id(ctx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        if project.author_id != session.user_id {
            return Err(AppError::Forbidden(
                "Only the author can modify this project".to_string(),
            ));
        }
        Ok((project, session))
    }

    pub async fn update_project(
        &self,
        ctx: &RequestContext,
        id: &str,
        form: &ProjectUpdateForm,
    ) -> AppResult<Project> {
        form.validate()?;
        if form.is_empty() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }
        let (project, _) = self.get_owned_project(ctx, id).await?;

        let mut patch = Map::new();
        let fields = [
            ("title", &form.title),
            ("description", &form.description),
            ("image_url", &form.image_url),
            ("github_url", &form.github_url),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                patch.insert(field.to_string(), Value::String(value.clone()));
            }
        }
        if let Some(bolt_url) = &form.bolt_url {
            let value = if is_blank(bolt_url) {
                Value::Null
            } else {
                Value::String(bolt_url.clone())
            };
            patch.insert("bolt_url".to_string(), value);
        }
        patch.insert("updated_at".to_string(), Value::from(current_timestamp_millis()));

        let record = self
            .store
            .update(
                ctx,
                Collection::Projects,
                &Query::new().eq("id", project.id.as_str()),
                Value::Object(patch),
            )
            .await?;
        Ok(decode(record)?)
    }

    /// Remove a project and its association rows.
    ///
    /// Tag links and likes go first so no association outlives its project.
    pub async fn delete_project(&self, ctx: &RequestContext, id: &str) -> AppResult<()> {
        let (project, session) = self.get_owned_project(ctx, id).await?;
        let by_project = Query::new().eq("project_id", project.id.as_str());

        let tag_links = self
            .store
            .delete(ctx, Collection::ProjectTags, &by_project)
            .await?;
        let likes = self.store.delete(ctx, Collection::Likes, &by_project).await?;
        self.store
            .delete(
                ctx,
                Collection::Projects,
                &Query::new().eq("id", project.id.as_str()),
            )
            .await?;

        tracing::info!(
            "User {} deleted project {} ({} tag links, {} likes)",
            session.user_id,
            project.id,
            tag_links,
            likes
        );
        Ok(())
    }

    /// Attach tags to an existing project owned by the session user
    pub async fn add_tags(&self, ctx: &RequestContext, id: &str, tag_names: &[String]) -> AppResult<Vec<String>> {
        let (project, _) = self.get_owned_project(ctx, id).await?;
        TagService::new(self.store)
            .attach_tags(ctx, &project.id, tag_names)
            .await?;
        TagService::new(self.store)
            .tags_for_project(ctx, &project.id)
            .await
    }

    /// All projects, newest first, optionally filtered by a search term
    pub async fn list_projects(&self, ctx: &RequestContext, search: Option<&str>) -> AppResult<Vec<ProjectResponse>> {
        let records = self
            .store
            .find(
                ctx,
                Collection::Projects,
                &Query::new().order_by("created_at", SortDirection::Descending),
            )
            .await?;

        let term = search
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty());
        let tagged = match &term {
            Some(term) => self.projects_tagged_with(ctx, term).await?,
            None => HashSet::new(),
        };

        let mut projects = Vec::with_capacity(records.len());
        for record in records {
            let project: Project = decode(record)?;
            let wanted = term
                .as_deref()
                .map_or(true, |term| project.matches_text(term) || tagged.contains(&project.id));
            if wanted {
                projects.push(self.with_details(ctx, project).await?);
            }
        }
        Ok(projects)
    }

    /// Ids of projects carrying a tag whose name contains `term` (already lowercased)
    async fn projects_tagged_with(&self, ctx: &RequestContext, term: &str) -> AppResult<HashSet<String>> {
        let tags = TagService::new(self.store).list_tags(ctx).await?;

        let mut project_ids = HashSet::new();
        for tag in tags.iter().filter(|tag| tag.name.to_lowercase().contains(term)) {
            let links = self
                .store
                .find(
                    ctx,
                    Collection::ProjectTags,
                    &Query::new().eq("tag_id", tag.id.as_str()),
                )
                .await?;
            for link in links {
                let link: ProjectTag = decode(link)?;
                project_ids.insert(link.project_id);
            }
        }
        Ok(project_ids)
    }

    /// The directory view: the session user's projects apart from everyone else's
    pub async fn directory(&self, ctx: &RequestContext, search: Option<&str>) -> AppResult<ProjectListResponse> {
        let projects = self.list_projects(ctx, search).await?;
        let (user_projects, projects) = match ctx.user_id() {
            Some(user_id) => projects
                .into_iter()
                .partition(|project| project.author_id == user_id),
            None => (Vec::new(), projects),
        };
        Ok(ProjectListResponse {
            user_projects,
            projects,
        })
    }

    async fn with_details(&self, ctx: &RequestContext, project: Project) -> AppResult<ProjectResponse> {
        let profile = ProfileService::new(self.store)
            .get_profile(ctx, &project.author_id)
            .await?
            .map(ProfileSummary::from);
        let tags = TagService::new(self.store)
            .tags_for_project(ctx, &project.id)
            .await?;
        let likes = LikeService::new(self.store)
            .likes_for_project(ctx, &project.id)
            .await?;

        let user_has_liked = ctx
            .user_id()
            .map_or(false, |user_id| likes.iter().any(|like| like.user_id == user_id));

        Ok(ProjectResponse::from_parts(
            project,
            profile,
            tags,
            likes.len() as i64,
            user_has_liked,
        ))
    }
}
