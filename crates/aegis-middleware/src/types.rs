//! Request, response and envelope types.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::Full;
use serde::{Deserialize, Serialize};

/// The HTTP request type used in the pipeline.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type used in the pipeline.
pub type Response = http::Response<Full<Bytes>>;

/// Code carried by every successful envelope.
pub const OK_CODE: &str = "OK";

/// JSON body shared by every response Aegis produces.
///
/// ```json
/// {"code": "ACCESS_DENIED", "message": "Access denied", "location": "/api/admin"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Machine-readable outcome code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Payload, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Request path the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Creates a successful envelope around `data`.
    pub fn ok(data: T) -> Self {
        Self {
            code: OK_CODE.to_string(),
            message: "success".to_string(),
            data: Some(data),
            location: None,
        }
    }

    /// Creates an error envelope with no payload.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
            location: None,
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Response constructors.
pub trait ResponseExt {
    /// Creates a response with an empty body.
    fn empty(status: StatusCode) -> Response;

    /// Serializes `body` as JSON.
    ///
    /// Falls back to an empty 500 if serialization fails.
    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response;

    /// Creates a JSON error envelope.
    fn json_error(status: StatusCode, code: &str, message: &str) -> Response;

    /// Creates a JSON error envelope that names the request path.
    fn json_error_at(status: StatusCode, code: &str, message: &str, location: &str) -> Response;
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }

    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                let mut response = http::Response::new(Full::new(Bytes::from(bytes)));
                *response.status_mut() = status;
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                Self::empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
        Self::json(status, &ApiEnvelope::<()>::error(code, message))
    }

    fn json_error_at(status: StatusCode, code: &str, message: &str, location: &str) -> Response {
        Self::json(
            status,
            &ApiEnvelope::<()>::error(code, message).with_location(location),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_json_error_envelope() {
        let response = Response::json_error_at(
            StatusCode::FORBIDDEN,
            "ACCESS_DENIED",
            "Access denied",
            "/api/admin",
        );
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "code": "ACCESS_DENIED",
                "message": "Access denied",
                "location": "/api/admin"
            })
        );
    }

    #[test]
    fn test_ok_envelope_carries_data() {
        let envelope = ApiEnvelope::ok(serde_json::json!({"token": "abc"}));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["code"], "OK");
        assert_eq!(json["data"]["token"], "abc");
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_empty_response() {
        let response = Response::empty(StatusCode::NO_CONTENT);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().is_empty());
    }
}
