use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::dao::{completion::UpstreamError, storage::StorageError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Client input failed validation; `field` names the offending JSON field.
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Storage backend failed or is unreachable.
    #[error("storage failure")]
    Storage(#[from] StorageError),
    /// The chat-completion provider failed.
    #[error("completion provider failure")]
    Upstream(#[from] UpstreamError),
}

impl From<ValidationErrors> for ServiceError {
    /// Report the first offending field (alphabetically, for stable output) using its JSON name.
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let field = field.to_string();
                let message = errs
                    .iter()
                    .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("invalid value for {}", json_field_name(&field)));
                (field, message)
            })
            .collect::<Vec<_>>();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        match fields.into_iter().next() {
            Some((field, message)) => ServiceError::Validation {
                field: Some(json_field_name(&field)),
                message,
            },
            None => ServiceError::Validation {
                field: None,
                message: errors.to_string(),
            },
        }
    }
}

/// Convert a Rust field name (`player_name`) into its camelCase JSON name (`playerName`).
fn json_field_name(field: &str) -> String {
    let mut name = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            name.extend(c.to_uppercase());
            upper = false;
        } else {
            name.push(c);
        }
    }
    name
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{message}")]
    BadRequest {
        message: String,
        field: Option<String>,
    },
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Route exists but not for this HTTP verb.
    #[error("method not allowed")]
    MethodNotAllowed,
    /// Internal server error (storage or upstream provider).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation { field, message } => AppError::BadRequest { message, field },
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Storage(source) => {
                error!(error = %source, "storage failure");
                AppError::Internal("storage unavailable".into())
            }
            ServiceError::Upstream(source) => {
                error!(error = %source, "completion provider failure");
                AppError::Internal("failed to get a reply from the assistant".into())
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest {
            message: rejection.body_text(),
            field: None,
        }
    }
}

impl From<PathRejection> for AppError {
    /// Every path parameter this API takes is a numeric `id`.
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest {
            message: rejection.body_text(),
            field: Some("id".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }

        let payload = match self {
            AppError::BadRequest { message, field } => ErrorBody { message, field },
            other => ErrorBody {
                message: other.to_string(),
                field: None,
            },
        };

        (status, Json(payload)).into_response()
    }
}
