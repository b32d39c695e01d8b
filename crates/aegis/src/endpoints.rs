//! Login, logout and refresh.
//!
//! | Route | Body | Success `data` |
//! |---|---|---|
//! | `POST {base}/login` | `{"username", "password"}` | `{"user", "token"?, "jwtEnabled"}` |
//! | `POST {base}/logout` | none | none |
//! | `POST {base}/refresh` | `{"token"}` | `{"user": null, "token", "jwtEnabled": true}` |
//!
//! Every login failure answers 401 `AUTHENTICATION_FAILED` with the same
//! message, whatever the cause. Logout invalidates nothing; issued tokens
//! stay valid until they expire.

use aegis_auth::ProviderRegistry;
use aegis_core::{
    AuthenticationResult, Credentials, Subject, TokenError, GENERIC_FAILURE_MESSAGE,
};
use aegis_middleware::types::OK_CODE;
use aegis_middleware::{ApiEnvelope, BoxFuture, MiddlewareContext, Request, Response, ResponseExt};
use aegis_telemetry::logging::fields::SUBJECT_ID;
use aegis_token::TokenManager;
use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of a login request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default)]
    pub password: String,
}

/// Body of a refresh request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshRequest {
    /// The still-valid token to exchange.
    #[serde(default)]
    pub token: String,
}

/// Payload of a successful login or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The authenticated subject; absent on refresh.
    pub user: Option<Subject>,
    /// The issued token value, when tokens are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Whether tokens are enabled.
    pub jwt_enabled: bool,
}

/// The operation a request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRoute {
    /// `POST {base}/login`
    Login,
    /// `POST {base}/logout`
    Logout,
    /// `POST {base}/refresh`
    Refresh,
}

/// The authentication endpoints, mounted by the host.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    registry: ProviderRegistry,
    token_manager: Option<Arc<TokenManager>>,
    base_path: String,
    enabled: bool,
}

impl AuthEndpoints {
    /// Creates enabled endpoints under `base_path`.
    #[must_use]
    pub fn new(
        registry: ProviderRegistry,
        token_manager: Option<Arc<TokenManager>>,
        base_path: impl Into<String>,
    ) -> Self {
        let base_path = base_path.into();
        Self {
            registry,
            token_manager,
            base_path: base_path.trim_end_matches('/').to_string(),
            enabled: true,
        }
    }

    /// Switches the endpoints on or off. Disabled endpoints answer 404.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns whether the endpoints are served.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the path prefix.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Returns true if `path` falls under the base path.
    #[must_use]
    pub fn handles(&self, path: &str) -> bool {
        path.strip_prefix(self.base_path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// Maps a path to its route, ignoring the method.
    #[must_use]
    pub fn route(&self, path: &str) -> Option<AuthRoute> {
        match path.strip_prefix(self.base_path.as_str())? {
            "/login" => Some(AuthRoute::Login),
            "/logout" => Some(AuthRoute::Logout),
            "/refresh" => Some(AuthRoute::Refresh),
            _ => None,
        }
    }

    /// Routes a request by method and path.
    ///
    /// Logout clears the caller identity in `ctx` before the returned future
    /// runs.
    pub fn dispatch(&self, ctx: &mut MiddlewareContext, request: Request) -> BoxFuture<'static, Response> {
        let path = request.uri().path().to_string();
        let route = self.enabled.then(|| self.route(&path)).flatten();

        let Some(route) = route else {
            return Box::pin(async move {
                Response::json_error_at(StatusCode::NOT_FOUND, "NOT_FOUND", "Not found", &path)
            });
        };
        if request.method() != Method::POST {
            return Box::pin(async move {
                Response::json_error_at(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "METHOD_NOT_ALLOWED",
                    "Method not allowed",
                    &path,
                )
            });
        }

        match route {
            AuthRoute::Logout => {
                let response = self.logout(ctx);
                Box::pin(async move { response })
            }
            AuthRoute::Login => {
                let endpoints = self.clone();
                Box::pin(async move { endpoints.login(&body_bytes(request).await).await })
            }
            AuthRoute::Refresh => {
                let endpoints = self.clone();
                Box::pin(async move { endpoints.refresh(&body_bytes(request).await) })
            }
        }
    }

    /// Authenticates `{username, password}` and issues a token if enabled.
    pub async fn login(&self, body: &[u8]) -> Response {
        let location = format!("{}/login", self.base_path);
        let Ok(request) = serde_json::from_slice::<LoginRequest>(body) else {
            tracing::debug!("Login body is not valid JSON");
            return login_failed(&location);
        };

        let credentials = Credentials::username_password(request.username, request.password);
        let subject = match self.registry.authenticate(&credentials).await {
            Ok(AuthenticationResult::Success { subject, .. }) => subject,
            Ok(AuthenticationResult::Failure { .. }) => return login_failed(&location),
            Err(e) => {
                tracing::error!(error = %e, "Login failed with an internal error");
                return internal_error(&location);
            }
        };

        let token = match &self.token_manager {
            Some(manager) => match manager.issue(subject.username(), &subject.authorities()) {
                Ok(token) => Some(token.value().to_string()),
                Err(e) => {
                    tracing::error!(error = %e, { SUBJECT_ID } = subject.subject_id(), "Token issuance failed");
                    return internal_error(&location);
                }
            },
            None => None,
        };

        tracing::info!({ SUBJECT_ID } = subject.subject_id(), "User logged in");
        Response::json(
            StatusCode::OK,
            &ApiEnvelope::ok(LoginResponse {
                user: Some(subject),
                token,
                jwt_enabled: self.token_manager.is_some(),
            }),
        )
    }

    /// Clears the request identity.
    pub fn logout(&self, ctx: &mut MiddlewareContext) -> Response {
        tracing::info!({ SUBJECT_ID } = ctx.identity().log_id(), "User logged out");
        ctx.clear_identity();
        let envelope = ApiEnvelope::<()> {
            code: OK_CODE.to_string(),
            message: "Logged out".to_string(),
            data: None,
            location: None,
        };
        Response::json(StatusCode::OK, &envelope)
    }

    /// Exchanges a still-valid token for a fresh one.
    pub fn refresh(&self, body: &[u8]) -> Response {
        let location = format!("{}/refresh", self.base_path);
        let value = serde_json::from_slice::<RefreshRequest>(body)
            .map(|r| r.token)
            .unwrap_or_default();
        let value = value.trim();
        if value.is_empty() {
            return Response::json_error_at(
                StatusCode::BAD_REQUEST,
                "REFRESH_TOKEN_EMPTY",
                "Refresh token must not be empty",
                &location,
            );
        }

        let Some(manager) = &self.token_manager else {
            return Response::json_error_at(
                StatusCode::BAD_REQUEST,
                "JWT_NOT_ENABLED",
                "Token authentication is not enabled",
                &location,
            );
        };

        let refreshed = manager
            .parse_token(value)
            .and_then(|token| manager.refresh(&token));
        match refreshed {
            Ok(Some(token)) => Response::json(
                StatusCode::OK,
                &ApiEnvelope::ok(LoginResponse {
                    user: None,
                    token: Some(token.value().to_string()),
                    jwt_enabled: true,
                }),
            ),
            Ok(None) => token_error(&TokenError::Expired, &location),
            Err(e) => token_error(&e, &location),
        }
    }
}

async fn body_bytes(request: Request) -> Bytes {
    match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    }
}

fn login_failed(location: &str) -> Response {
    Response::json_error_at(
        StatusCode::UNAUTHORIZED,
        "AUTHENTICATION_FAILED",
        GENERIC_FAILURE_MESSAGE,
        location,
    )
}

fn internal_error(location: &str) -> Response {
    Response::json_error_at(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal server error",
        location,
    )
}

fn token_error(error: &TokenError, location: &str) -> Response {
    let status = match error {
        TokenError::Expired | TokenError::Malformed(_) => StatusCode::UNAUTHORIZED,
        TokenError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Response::json_error_at(status, error.code(), error.public_message(), location)
}
