//! API router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use super::common::ApiResponse;
use super::middleware::{admin_middleware, auth_middleware, AuthState};
use super::modules::{health, metrics, request_id, users};
use crate::application::AuthService;
use crate::infrastructure::crypto::TokenIssuer;

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
                        .description(Some("JWT Bearer token from /api/users/login"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        users::register,
        users::login,
        users::list_users,
        users::get_user,
        users::assign_role,
    ),
    components(schemas(
        health::HealthResponse,
        health::ComponentHealth,
        users::RegistrationRequest,
        users::LoginRequest,
        users::AssignRoleRequest,
        users::UserDto,
        users::AuthResponse,
        ApiResponse<users::AuthResponse>,
        ApiResponse<users::UserDto>,
        ApiResponse<Vec<users::UserDto>>,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Users", description = "Registration, login and user administration"),
    ),
    info(
        title = "Identity Service API",
        version = "0.1.0",
        description = "User registration, login and role management with JWT bearer tokens"
    )
)]
pub struct ApiDoc;

/// Create the API router.
///
/// `/metrics` is only mounted when a Prometheus handle is supplied.
pub fn create_api_router(
    auth_service: Arc<AuthService>,
    tokens: TokenIssuer,
    db: DatabaseConnection,
    prometheus: Option<PrometheusHandle>,
) -> Router {
    let auth_state = AuthState { tokens };
    let user_state = users::UserHandlerState { auth_service };

    // route_layer only wraps routes registered before it: the first two need
    // Admin, the listing needs any valid token, registration and login are open.
    let user_routes = Router::new()
        .route("/{id}", get(users::get_user))
        .route("/{id}/roles", post(users::assign_role))
        .route_layer(middleware::from_fn(admin_middleware))
        .route("/", get(users::list_users))
        .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware))
        .route("/registration", post(users::register))
        .route("/login", post(users::login))
        .with_state(user_state);

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health::HealthState {
            db,
            started_at: Arc::new(Instant::now()),
        });

    let mut router = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(health_routes)
        .nest("/api/users", user_routes);

    if let Some(handle) = prometheus {
        router = router.route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(metrics::MetricsState { handle }),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(cors)
}
