use actix_web::{web, HttpResponse};

use crate::{
    error::{AppError, AppResult},
    middleware::SessionMiddleware,
    models::RequestContext,
    services::profile::ProfileService,
    AppState,
};

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/me")
            .wrap(SessionMiddleware)
            .route(web::get().to(get_session_profile)),
    )
    .service(
        web::resource("/{id}")
            .wrap(SessionMiddleware)
            .route(web::get().to(get_profile_by_id)),
    );
}

/// GET /me - Profile of the session user, created on first visit
async fn get_session_profile(
    state: web::Data<AppState>,
    ctx: RequestContext,
) -> AppResult<HttpResponse> {
    let session = ctx.require_session()?;
    let profile_service = ProfileService::new(state.store.as_ref());
    let profile = profile_service.ensure_profile(&ctx, session).await?;

    Ok(HttpResponse::Ok().json(profile))
}

/// GET /{id} - Public profile lookup
async fn get_profile_by_id(
    state: web::Data<AppState>,
    ctx: RequestContext,
    id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let profile_service = ProfileService::new(state.store.as_ref());
    let profile = profile_service
        .get_profile(&ctx, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(HttpResponse::Ok().json(profile))
}
