use crate::error::AppError;
use crate::models::RequestContext;
use crate::utils::auth::{extract_bearer_token, session_from_token};
use crate::AppState;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::Error as ActixError,
    http::header,
    web, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

// Extractor for the request context; requests the middleware never saw are anonymous
impl FromRequest for RequestContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let ctx = req
            .extensions()
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();

        ready(Ok(ctx))
    }
}

fn request_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
        .or_else(|| {
            req.cookie("token")
                .map(|c| c.value().to_string())
                .filter(|token| !token.is_empty())
        })
}

/// Resolves the optional session for every request in its scope.
///
/// No token means an anonymous context. A token that fails verification is
/// rejected rather than silently downgraded.
pub struct SessionMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let ctx = match request_token(&req) {
                None => RequestContext::anonymous(),
                Some(token) => {
                    let state = req
                        .app_data::<web::Data<AppState>>()
                        .ok_or_else(|| AppError::Internal("App state not found".to_string()))?;

                    let (secret, audience) = {
                        let config = state
                            .config
                            .read()
                            .map_err(|_| AppError::Internal("Config lock poisoned".to_string()))?;
                        (config.jwt_secret.clone(), config.jwt_audience.clone())
                    };

                    let session = session_from_token(&token, &secret, &audience).map_err(|e| {
                        tracing::debug!("JWT verification failed: {:?}", e);
                        AppError::Unauthorized("Invalid or expired token".to_string())
                    })?;
                    RequestContext::authenticated(session)
                }
            };

            req.extensions_mut().insert(ctx);

            let res = service.call(req).await?;
            Ok(res)
        })
    }
}
