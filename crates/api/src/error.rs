//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use domain::{CartError, CatalogError, DomainError, OrderError, UserError};

use crate::auth::{ADMIN_REALM, AuthError};

/// API-level error type that maps to HTTP responses.
///
/// The body is always `{"error": {"code", "kind", "message", "errors"?}}`.
/// Internal faults are logged and answered with a generic message.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request body, path or query.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Missing or invalid credentials.
    Auth(AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, errors) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            ApiError::Domain(err) => {
                let status = domain_status(err);
                let errors = match err {
                    DomainError::Validation(errors) => serde_json::to_value(errors).ok(),
                    _ => None,
                };
                (status, err.kind(), err.to_string(), errors)
            }
            ApiError::Auth(err) => (auth_status(err), err.kind(), err.to_string(), None),
        };

        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %message, "internal server error");
            "internal server error".to_string()
        } else {
            message
        };

        let mut error = serde_json::json!({
            "code": status.as_u16(),
            "kind": kind,
            "message": message,
        });
        if let Some(errors) = errors {
            error["errors"] = errors;
        }

        let mut response = (status, axum::Json(serde_json::json!({ "error": error }))).into_response();
        if matches!(self, ApiError::Auth(AuthError::InvalidAdminCredentials))
            && let Ok(value) = HeaderValue::from_str(&format!("Basic realm=\"{ADMIN_REALM}\""))
        {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Order(order_err) => match order_err {
            OrderError::OutOfStock { .. } | OrderError::OrderAlreadyPaid(_) => {
                StatusCode::CONFLICT
            }
            OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            OrderError::PaymentTokenMismatch(_) => StatusCode::FORBIDDEN,
            OrderError::AmountMismatch { .. } | OrderError::TotalTooLarge => {
                StatusCode::BAD_REQUEST
            }
        },
        DomainError::Catalog(catalog_err) => match catalog_err {
            CatalogError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::ProductReferenced(_) => StatusCode::CONFLICT,
        },
        DomainError::Cart(cart_err) => match cart_err {
            CartError::CartItemNotFound(_) => StatusCode::NOT_FOUND,
            CartError::OutOfStock { .. } => StatusCode::CONFLICT,
            CartError::TotalTooLarge => StatusCode::BAD_REQUEST,
        },
        DomainError::User(user_err) => match user_err {
            UserError::EmailAlreadyExists(_) => StatusCode::CONFLICT,
            UserError::WrongCredentials => StatusCode::UNAUTHORIZED,
            UserError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        DomainError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
