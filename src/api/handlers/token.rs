//! `POST /v1/auth/token`: password login.
//!
//! Denials come back as `400` with the failure attributed to `email`; server
//! faults as `500` with code `INTERNAL_ERROR` and no field. On success the
//! refresh token is also set as an `HttpOnly` cookie read from the request
//! context.

use axum::{
    extract::Extension,
    http::{
        header::{CACHE_CONTROL, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    api::state::{AuthConfig, AuthState},
    auth::{
        AuthFailure, Audience, AuthenticationOutcome, Credentials, IssuedSession, RequestContext,
        ThrottlingContext,
    },
};

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";
const INTERNAL_ERROR_CODE: &str = "INTERNAL_ERROR";
const INVALID_PAYLOAD_CODE: &str = "INVALID";

#[derive(ToSchema, Deserialize)]
pub struct TokenRequest {
    email: String,
    #[schema(format = Password)]
    password: String,
    /// Tag recorded as `custom:<audience>` in both tokens.
    audience: Option<String>,
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct TokenUser {
    id: Uuid,
    email: String,
    is_staff: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    field: Option<String>,
    code: String,
    message: String,
}

impl From<&AuthFailure> for ErrorBody {
    fn from(failure: &AuthFailure) -> Self {
        Self {
            field: Some(failure.field.to_string()),
            code: failure.kind.code().to_string(),
            message: failure.message.to_string(),
        }
    }
}

impl ErrorBody {
    fn internal() -> Self {
        Self {
            field: None,
            code: INTERNAL_ERROR_CODE.to_string(),
            message: "Internal server error".to_string(),
        }
    }

    fn invalid_payload() -> Self {
        Self {
            field: None,
            code: INVALID_PAYLOAD_CODE.to_string(),
            message: "Missing payload".to_string(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    token: String,
    refresh_token: String,
    csrf_token: String,
    user: TokenUser,
    errors: Vec<ErrorBody>,
}

impl From<IssuedSession> for TokenResponse {
    fn from(session: IssuedSession) -> Self {
        Self {
            token: session.access_token,
            refresh_token: session.refresh_token,
            csrf_token: session.csrf_token,
            user: TokenUser {
                id: session.user.id,
                email: session.user.email,
                is_staff: session.user.is_staff,
            },
            errors: Vec::new(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    errors: Vec<ErrorBody>,
}

impl ErrorResponse {
    fn single(error: ErrorBody) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Login denied or missing payload", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(headers, auth_state, payload))]
pub async fn create_token(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<TokenRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::single(ErrorBody::invalid_payload())),
        )
            .into_response();
    };

    let credentials = Credentials::new(&request.email, SecretString::from(request.password));
    let audience = Audience::parse(request.audience.as_deref());
    let throttling = ThrottlingContext::new(extract_client_ip(&headers));
    let mut context = RequestContext::new();

    let outcome = auth_state
        .service()
        .create_token(&mut context, &credentials, audience.as_ref(), &throttling)
        .await;

    match outcome {
        Ok(AuthenticationOutcome::Success(session)) => {
            success_response(auth_state.config(), &context, session)
        }
        Ok(AuthenticationOutcome::Failure(failure)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::single(ErrorBody::from(&failure))),
        )
            .into_response(),
        Err(err) => {
            let err = anyhow::Error::new(err);
            error!("Failed to create token: {err:#}");
            internal_error_response()
        }
    }
}

fn success_response(
    config: &AuthConfig,
    context: &RequestContext,
    session: IssuedSession,
) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    if let Some(refresh_token) = context.refresh_token() {
        match refresh_cookie(config, refresh_token) {
            Ok(cookie) => {
                headers.insert(SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build refresh cookie: {err}");
                return internal_error_response();
            }
        }
    }

    (StatusCode::OK, headers, Json(TokenResponse::from(session))).into_response()
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::single(ErrorBody::internal())),
    )
        .into_response()
}

pub(crate) fn refresh_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let max_age = config.refresh_cookie_max_age();
    let mut cookie =
        format!("{REFRESH_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// First `x-forwarded-for` hop, else `x-real-ip`.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
