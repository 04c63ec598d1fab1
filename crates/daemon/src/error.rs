// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single wire-level error every domain error converts `From` into
//! (§7, §9 "tagged variants over ad-hoc JSON" applied to error responses).
//! One `axum::response::IntoResponse` impl maps the §7 error-kind table to
//! HTTP status codes in exactly one place.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hangar_core::{ErrorKind, HasErrorKind};
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}

/// Every domain error implements `HasErrorKind`; its `Display` output is
/// already a sanitized, secret-free message (§7) so it's safe to surface
/// verbatim.
impl<E> From<E> for ApiError
where
    E: HasErrorKind + std::fmt::Display,
{
    fn from(err: E) -> Self {
        ApiError { kind: err.kind(), message: err.to_string() }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if matches!(self.kind, ErrorKind::Internal) {
            tracing::error!(error = %self.message, "internal error");
        }
        (status, axum::Json(ErrorBody { error: self.message })).into_response()
    }
}
