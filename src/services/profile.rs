use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{Profile, RequestContext, Session};
use crate::store::{decode, Collection, DataAccess, Query, StoreError};

pub struct ProfileService<'a> {
    store: &'a dyn DataAccess,
}

impl<'a> ProfileService<'a> {
    pub fn new(store: &'a dyn DataAccess) -> Self {
        ProfileService { store }
    }

    pub async fn get_profile(&self, ctx: &RequestContext, id: &str) -> AppResult<Option<Profile>> {
        let record = self
            .store
            .find_one(ctx, Collection::Profiles, &Query::new().eq("id", id))
            .await?;
        Ok(record.map(decode::<Profile>).transpose()?)
    }

    /// Profile row for the session user, created from the token's identity on first use
    pub async fn ensure_profile(&self, ctx: &RequestContext, session: &Session) -> AppResult<Profile> {
        if let Some(profile) = self.get_profile(ctx, &session.user_id).await? {
            return Ok(profile);
        }

        let record = json!({
            "id": session.user_id,
            "username": display_name(session),
            "avatar_url": session.avatar_url,
        });

        match self.store.insert(ctx, Collection::Profiles, record).await {
            Ok(record) => {
                tracing::info!("Created profile for user {}", session.user_id);
                Ok(decode(record)?)
            }
            Err(StoreError::Conflict(_)) => self
                .get_profile(ctx, &session.user_id)
                .await?
                .ok_or_else(|| AppError::Internal("Profile conflicted but cannot be read".to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

/// Provider username, else the email's local part, else the user id
fn display_name(session: &Session) -> String {
    session
        .display_name
        .clone()
        .or_else(|| {
            session
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
                .map(|local| local.to_string())
        })
        .unwrap_or_else(|| session.user_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn session(display_name: Option<&str>, email: Option<&str>) -> Session {
        Session {
            user_id: "u1".to_string(),
            email: email.map(|e| e.to_string()),
            display_name: display_name.map(|n| n.to_string()),
            avatar_url: Some("https://avatars.example.com/u1".to_string()),
        }
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(display_name(&session(Some("octocat"), None)), "octocat");
        assert_eq!(display_name(&session(None, Some("dev@example.com"))), "dev");
        assert_eq!(display_name(&session(None, None)), "u1");
    }

    #[tokio::test]
    async fn test_ensure_profile_creates_once() {
        let store = MemoryStore::new();
        let service = ProfileService::new(&store);
        let session = session(Some("octocat"), None);
        let ctx = RequestContext::authenticated(session.clone());

        let created = service.ensure_profile(&ctx, &session).await.unwrap();
        let again = service.ensure_profile(&ctx, &session).await.unwrap();

        assert_eq!(created, again);
        assert_eq!(created.username, "octocat");
        assert_eq!(store.count(Collection::Profiles).await, 1);
    }
}
