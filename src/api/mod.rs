use crate::{
    auth::{
        storage::PgAuthStore, CredentialValidator, NoopRateLimiter, OsRngCsrfGenerator,
        RateLimitedAuthenticator, SessionSideEffects, SsoPolicy, TokenIssuer, TokenService,
    },
    cli::globals::GlobalArgs,
    vault,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;
pub mod signer;
pub mod state;

pub use self::signer::TransitSigner;
pub use self::state::{AuthConfig, AuthState};

#[derive(OpenApi)]
#[openapi(
    paths(handlers::token::create_token, handlers::health::health),
    components(schemas(
        handlers::health::Health,
        handlers::token::TokenRequest,
        handlers::token::TokenResponse,
        handlers::token::TokenUser,
        handlers::token::ErrorBody,
        handlers::token::ErrorResponse,
    )),
    tags(
        (name = "auth", description = "Password token issuance"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Wire the Postgres store, the Transit signer and the CSRF generator into a
/// [`TokenService`].
///
/// # Errors
/// Returns an error if the signer cannot be built.
pub fn token_service(
    pool: PgPool,
    globals: &GlobalArgs,
    config: &AuthConfig,
) -> Result<TokenService> {
    let store = PgAuthStore::new(pool, config.last_login_policy());
    let signer = TransitSigner::new(globals, config)?;

    Ok(TokenService::new(
        SsoPolicy::default(),
        CredentialValidator::new(Arc::new(RateLimitedAuthenticator::new(
            store.clone(),
            Arc::new(NoopRateLimiter),
        ))),
        Arc::new(store.clone()),
        TokenIssuer::new(Arc::new(signer), Arc::new(OsRngCsrfGenerator)),
        SessionSideEffects::new(Arc::new(store)),
    ))
}

/// Routes with their layers; state and pool are provided as extensions.
pub fn router(auth_state: Arc<AuthState>, pool: PgPool) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    Router::new()
        .route("/v1/auth/token", post(handlers::create_token))
        .route("/health", get(handlers::health).options(handlers::health))
        .route("/openapi.json", get(openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        )
}

/// Start the HTTP server.
/// # Errors
/// Returns an error if the database is unreachable, the signer cannot be built
/// or the server fails to start.
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs, config: AuthConfig) -> Result<()> {
    // Renew vault token, gracefully shutdown if failed
    let (tx, mut rx) = mpsc::unbounded_channel();

    vault::renew::try_renew(globals, tx).await?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let service = token_service(pool.clone(), globals, &config)?;
    let app = router(Arc::new(AuthState::new(service, config)), pool);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            rx.recv().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_token_and_health() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/auth/token"));
        assert!(doc.paths.paths.contains_key("/health"));

        let schemas = doc
            .components
            .map(|components| components.schemas)
            .unwrap_or_default();
        assert!(schemas.contains_key("TokenResponse"));
        assert!(schemas.contains_key("ErrorResponse"));
    }

    #[tokio::test]
    async fn openapi_json_serializes() -> anyhow::Result<()> {
        let Json(doc) = openapi_json().await;
        let value = serde_json::to_value(doc)?;
        assert!(value["paths"]["/v1/auth/token"]["post"].is_object());
        Ok(())
    }
}
