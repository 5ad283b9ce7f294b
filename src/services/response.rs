//! HTTP response building helpers
//!
//! Provides a consistent API for building HTTP responses across all
//! handlers. Reduces boilerplate and ensures consistent error formatting.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;

use crate::error::RegistryError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": message }),
    )
}

/// Build a 400 Bad Request response with message
pub fn bad_request(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::BAD_REQUEST,
        &serde_json::json!({ "error": message }),
    )
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed" }),
    )
}

/// Build a CSV response
pub fn csv_response(body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Convert a RegistryError to an appropriate HTTP response.
///
/// Hidden records read as 404 so denial does not leak existence; write
/// denials are explicit 403.
pub fn error_response(error: RegistryError) -> Response<Full<Bytes>> {
    let (status, message) = match &error {
        RegistryError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        RegistryError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        RegistryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RegistryError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        RegistryError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        RegistryError::Json(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {}", e)),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
    };

    json_response(status, &serde_json::json!({ "error": message }))
}

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, RegistryError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a create result into an HTTP response with 201 Created
pub fn from_create_result<T: Serialize>(result: Result<T, RegistryError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap a delete result (bool) into an HTTP response.
/// Returns 204 No Content if deleted, 404 Not Found if not found
pub fn from_delete_bool_result(
    result: Result<bool, RegistryError>,
    not_found_msg: &str,
) -> Response<Full<Bytes>> {
    match result {
        Ok(true) => no_content(),
        Ok(false) => not_found(not_found_msg),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let resp = ok(&serde_json::json!({"test": true}));
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn test_error_response_not_found() {
        let resp = error_response(RegistryError::NotFound("test".into()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_response_permission_denied() {
        let resp = error_response(RegistryError::PermissionDenied("no".into()));
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_error_response_conflict() {
        let resp = error_response(RegistryError::Conflict("already responded".into()));
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
