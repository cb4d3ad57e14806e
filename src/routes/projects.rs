use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{
    error::AppResult,
    middleware::SessionMiddleware,
    models::{tag::AttachTagsForm, ProjectForm, ProjectUpdateForm, RequestContext},
    services::{like::LikeService, project::ProjectService},
    AppState,
};

pub fn create_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .wrap(SessionMiddleware)
            .route(web::get().to(get_projects)),
    )
    .service(
        web::resource("/create")
            .wrap(SessionMiddleware)
            .route(web::post().to(create_new_project)),
    )
    .service(
        web::resource("/{id}")
            .wrap(SessionMiddleware)
            .route(web::get().to(get_project_by_id)),
    )
    .service(
        web::resource("/{id}/update")
            .wrap(SessionMiddleware)
            .route(web::post().to(update_project_by_id)),
    )
    .service(
        web::resource("/{id}/delete")
            .wrap(SessionMiddleware)
            .route(web::delete().to(delete_project_by_id)),
    )
    .service(
        web::resource("/{id}/tags")
            .wrap(SessionMiddleware)
            .route(web::post().to(add_project_tags)),
    )
    .service(
        web::resource("/{id}/like")
            .wrap(SessionMiddleware)
            .route(web::post().to(toggle_project_like)),
    );
}

#[derive(Debug, Deserialize)]
struct ProjectSearch {
    q: Option<String>,
}

/// GET / - Project directory, split into the caller's projects and the rest
async fn get_projects(
    state: web::Data<AppState>,
    ctx: RequestContext,
    search: web::Query<ProjectSearch>,
) -> AppResult<HttpResponse> {
    let project_service = ProjectService::new(state.store.as_ref());
    let directory = project_service
        .directory(&ctx, search.q.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(directory))
}

/// POST /create - Submit a new project
async fn create_new_project(
    state: web::Data<AppState>,
    ctx: RequestContext,
    form_data: web::Json<ProjectForm>,
) -> AppResult<HttpResponse> {
    let project_service = ProjectService::new(state.store.as_ref());
    let project = project_service
        .submit_project(&ctx, form_data.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(project))
}

/// GET /{id} - Get a single project
async fn get_project_by_id(
    state: web::Data<AppState>,
    ctx: RequestContext,
    id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let project_service = ProjectService::new(state.store.as_ref());
    let project = project_service.get_project(&ctx, &id).await?;

    Ok(HttpResponse::Ok().json(project))
}

/// POST /{id}/update - Update a project (author only)
async fn update_project_by_id(
    state: web::Data<AppState>,
    ctx: RequestContext,
    id: web::Path<String>,
    form_data: web::Json<ProjectUpdateForm>,
) -> AppResult<HttpResponse> {
    let project_service = ProjectService::new(state.store.as_ref());
    project_service
        .update_project(&ctx, &id, &form_data)
        .await?;

    let project = project_service.get_project(&ctx, &id).await?;
    Ok(HttpResponse::Ok().json(project))
}

/// DELETE /{id}/delete - Delete a project with its tag links and likes (author only)
async fn delete_project_by_id(
    state: web::Data<AppState>,
    ctx: RequestContext,
    id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let project_service = ProjectService::new(state.store.as_ref());
    project_service.delete_project(&ctx, &id).await?;

    Ok(HttpResponse::Ok().json(true))
}

/// POST /{id}/tags - Attach tags to a project (author only)
async fn add_project_tags(
    state: web::Data<AppState>,
    ctx: RequestContext,
    id: web::Path<String>,
    form_data: web::Json<AttachTagsForm>,
) -> AppResult<HttpResponse> {
    let project_service = ProjectService::new(state.store.as_ref());
    let tags = project_service
        .add_tags(&ctx, &id, &form_data.tags)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "tags": tags })))
}

/// POST /{id}/like - Toggle the caller's like
async fn toggle_project_like(
    state: web::Data<AppState>,
    ctx: RequestContext,
    id: web::Path<String>,
) -> AppResult<HttpResponse> {
    let like_service = LikeService::new(state.store.as_ref());
    let outcome = like_service.toggle_like(&ctx, &id).await?;

    Ok(HttpResponse::Ok().json(outcome))
}
