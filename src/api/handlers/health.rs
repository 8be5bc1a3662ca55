use crate::GIT_COMMIT_HASH;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgPool};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info_span, warn, Instrument};
use utoipa::ToSchema;

const HEALTH_DB_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Database connection is healthy", body = Health),
        (status = 503, description = "Database connection is unhealthy", body = Health)
    ),
    tag = "health",
)]
// axum handler for health
pub async fn health(method: Method, pool: Extension<PgPool>) -> impl IntoResponse {
    let db_healthy = database_is_healthy(&pool.0).await;

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if db_healthy {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .unwrap_or_else(|err| {
            debug!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    if db_healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

async fn database_is_healthy(pool: &PgPool) -> bool {
    let probe = async {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = match pool.acquire().instrument(acquire_span).await {
            Ok(conn) => conn,
            Err(err) => {
                error!("Failed to acquire database connection: {}", err);
                return false;
            }
        };

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        match conn.ping().instrument(ping_span).await {
            Ok(()) => true,
            Err(err) => {
                error!("Failed to ping database: {}", err);
                false
            }
        }
    };

    if let Ok(healthy) = timeout(Duration::from_secs(HEALTH_DB_TIMEOUT_SECONDS), probe).await {
        healthy
    } else {
        warn!("Database health check timed out");
        false
    }
}
