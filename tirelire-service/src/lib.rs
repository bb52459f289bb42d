pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimit},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Environment, SwaggerMode, TirelireConfig};
use crate::services::{
    AuthService, AuthSettings, Datastore, EmailProvider, FaceMatcher, GroupService,
    ImageStorage, JwtService, KycService,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::registration::register,
        handlers::auth::registration::verify_email,
        handlers::auth::registration::request_email_validation,
        handlers::auth::session::login,
        handlers::auth::password::request_password_reset,
        handlers::auth::password::reset_password,
        handlers::kyc::submit_kyc,
        handlers::kyc::self_validate,
        handlers::kyc::get_kyc,
        handlers::kyc::list_kyc,
        handlers::kyc::admin_review,
        handlers::group::create_group,
        handlers::group::list_groups,
        handlers::group::get_group,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::RegisterRequest,
            dtos::auth::RegisterResponse,
            dtos::auth::LoginRequest,
            dtos::auth::AuthResponse,
            dtos::auth::VerifyEmailRequest,
            dtos::auth::EmailRequest,
            dtos::auth::ResetPasswordRequest,
            dtos::kyc::KycSubmissionForm,
            dtos::kyc::SelfieForm,
            dtos::kyc::AdminReviewForm,
            dtos::group::CreateGroupRequest,
            models::SanitizedUser,
            models::Role,
            models::KycStatus,
            models::KycResponse,
            models::Address,
            models::ReviewedBy,
            models::ReviewSource,
            models::GroupResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Accounts, email verification and password reset"),
        (name = "KYC", description = "Identity verification"),
        (name = "KYC Admin", description = "Manual review of identity cases"),
        (name = "Groups", description = "Savings groups"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: TirelireConfig,
    pub auth: AuthService,
    pub kyc: KycService,
    pub groups: GroupService,
    pub store: Arc<dyn Datastore>,
    pub login_rate_limiter: IpRateLimit,
    pub register_rate_limiter: IpRateLimit,
    pub password_reset_rate_limiter: IpRateLimit,
    pub ip_rate_limiter: IpRateLimit,
}

impl AppState {
    /// Wire the workflows over one backing store and the external collaborators.
    pub fn build<S: Datastore>(
        config: TirelireConfig,
        store: Arc<S>,
        email: Arc<dyn EmailProvider>,
        matcher: Arc<dyn FaceMatcher>,
        storage: Arc<dyn ImageStorage>,
        jwt: JwtService,
    ) -> Self {
        let settings = AuthSettings {
            frontend_url: config.urls.frontend_url.clone(),
            email_token_ttl: Duration::hours(config.jwt.email_token_expiry_hours),
            reset_token_ttl: Duration::minutes(config.jwt.reset_token_expiry_minutes),
        };

        let auth = AuthService::new(store.clone(), store.clone(), email, jwt, settings);
        let kyc = KycService::new(store.clone(), store.clone(), matcher, storage);
        let groups = GroupService::new(store.clone());

        let limits = &config.rate_limit;
        let proxies = &config.security.trusted_proxies;
        let login_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds),
            proxies,
        );
        let register_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(limits.register_attempts, limits.register_window_seconds),
            proxies,
        );
        let password_reset_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(
                limits.password_reset_attempts,
                limits.password_reset_window_seconds,
            ),
            proxies,
        );
        let ip_rate_limiter = IpRateLimit::new(
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds),
            proxies,
        );
        let store: Arc<dyn Datastore> = store;

        Self {
            config,
            auth,
            kyc,
            groups,
            store,
            login_rate_limiter,
            register_rate_limiter,
            password_reset_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Admin routes: the role guard runs after authentication.
    let admin_routes = Router::new()
        .route("/service/kyc/admin", get(handlers::kyc::list_kyc))
        .route(
            "/service/kyc/admin/validate",
            post(handlers::kyc::admin_review),
        )
        .route_layer(from_fn(middleware::require_admin));

    let protected_routes = Router::new()
        .route(
            "/service/kyc",
            post(handlers::kyc::submit_kyc).get(handlers::kyc::get_kyc),
        )
        .route("/service/kyc/validate", post(handlers::kyc::self_validate))
        .route(
            "/api/group",
            post(handlers::group::create_group).get(handlers::group::list_groups),
        )
        .route("/api/group/:slug", get(handlers::group::get_group))
        .merge(admin_routes)
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let login_route = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // Both mail-sending endpoints share one budget.
    let mail_request_routes = Router::new()
        .route(
            "/api/auth/message/validate",
            post(handlers::auth::request_email_validation),
        )
        .route(
            "/api/auth/message/reset",
            post(handlers::auth::request_password_reset),
        )
        .layer(from_fn_with_state(
            state.password_reset_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .nest_service("/uploads", ServeDir::new(&state.config.uploads.dir));

    let swagger_enabled = match state.config.environment {
        Environment::Dev => true,
        Environment::Prod => state.config.swagger.enabled == SwaggerMode::Public,
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    }

    app.route("/api/auth/validate", post(handlers::auth::verify_email))
        .route("/api/auth/reset", post(handlers::auth::reset_password))
        .merge(login_route)
        .merge(register_route)
        .merge(mail_request_routes)
        .merge(protected_routes)
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(state.config.common.body_limit_bytes))
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-request-id"),
        ])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Datastore unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Datastore health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "datastore": "up"
        }
    })))
}
