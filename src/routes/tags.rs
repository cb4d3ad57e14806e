use actix_web::{web, HttpResponse};

use crate::{
    error::AppResult,
    middleware::SessionMiddleware,
    models::{tag::TagResponse, RequestContext},
    services::tag::TagService,
    AppState,
};

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .wrap(SessionMiddleware)
            .route(web::get().to(get_tags)),
    );
}

/// GET / - All tags, sorted by name
async fn get_tags(state: web::Data<AppState>, ctx: RequestContext) -> AppResult<HttpResponse> {
    let tag_service = TagService::new(state.store.as_ref());
    let tags: Vec<TagResponse> = tag_service
        .list_tags(&ctx)
        .await?
        .into_iter()
        .map(TagResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryStore;
    use actix_web::{test, App};
    use serde_json::Value;
    use std::sync::{Arc, RwLock};

    #[actix_web::test]
    async fn test_lists_tags_by_name() {
        let store = Arc::new(MemoryStore::new());
        let tag_service = TagService::new(store.as_ref());
        for name in ["web", "ai", "cli"] {
            tag_service
                .find_or_create(&RequestContext::anonymous(), name)
                .await
                .unwrap();
        }

        let state = web::Data::new(AppState {
            store,
            config: Arc::new(RwLock::new(Config::default())),
        });
        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/tags").configure(create_routes)),
        )
        .await;

        let req = test::TestRequest::get().uri("/tags").to_request();
        let tags: Vec<Value> = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = tags.iter().filter_map(|t| t["name"].as_str()).collect();
        assert_eq!(names, vec!["ai", "cli", "web"]);
    }
}
