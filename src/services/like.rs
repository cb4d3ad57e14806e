use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{Like, LikeOutcome, RequestContext};
use crate::store::{decode, Collection, DataAccess, Query, StoreError};

pub struct LikeService<'a> {
    store: &'a dyn DataAccess,
}

impl<'a> LikeService<'a> {
    pub fn new(store: &'a dyn DataAccess) -> Self {
        LikeService { store }
    }

    /// Flip the session user's like on a project and return the authoritative count.
    ///
    /// Without a session nothing is sent to the store. The current state is read
    /// before writing, so two toggles racing from the same user resolve as last
    /// write wins; a duplicate insert is treated as already liked.
    pub async fn toggle_like(&self, ctx: &RequestContext, project_id: &str) -> AppResult<LikeOutcome> {
        let user_id = self
            .store
            .current_session(ctx)
            .ok_or(AppError::Unauthenticated)?
            .user_id
            .clone();

        if self
            .store
            .find_one(ctx, Collection::Projects, &Query::new().eq("id", project_id))
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Project not found".to_string()));
        }

        let key = Query::new()
            .eq("user_id", user_id.as_str())
            .eq("project_id", project_id);

        let liked = match self.store.find_one(ctx, Collection::Likes, &key).await? {
            Some(_) => {
                self.store.delete(ctx, Collection::Likes, &key).await?;
                false
            }
            None => {
                match self
                    .store
                    .insert(
                        ctx,
                        Collection::Likes,
                        json!({ "user_id": user_id, "project_id": project_id }),
                    )
                    .await
                {
                    Ok(_) => true,
                    Err(StoreError::Conflict(_)) => {
                        tracing::debug!("Like by {} on {} already recorded", user_id, project_id);
                        true
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let new_count = self.refresh_count(ctx, project_id).await?;
        tracing::info!(
            "User {} {} project {} ({} likes)",
            user_id,
            if liked { "liked" } else { "unliked" },
            project_id,
            new_count
        );

        Ok(LikeOutcome { liked, new_count })
    }

    /// Recount a project's likes and store the result in `likes_count`
    pub async fn refresh_count(&self, ctx: &RequestContext, project_id: &str) -> AppResult<i64> {
        let count = self.likes_for_project(ctx, project_id).await?.len() as i64;
        self.store
            .update(
                ctx,
                Collection::Projects,
                &Query::new().eq("id", project_id),
                json!({ "likes_count": count }),
            )
            .await?;
        Ok(count)
    }

    pub async fn likes_for_project(&self, ctx: &RequestContext, project_id: &str) -> AppResult<Vec<Like>> {
        let records = self
            .store
            .find(ctx, Collection::Likes, &Query::new().eq("project_id", project_id))
            .await?;
        Ok(records
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<Like>, _>>()?)
    }
}
