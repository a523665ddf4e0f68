// Copyright 2023 Remi Bernotavicius

use crate::error::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFields(_)
            | Self::InvalidField { .. }
            | Self::InvalidAmount { .. }
            | Self::DuplicateIngredient { .. }
            | Self::AlreadyExists
            | Self::AlreadyDeleted
            | Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Some(fields) = self.field_errors() {
            return (status, Json(fields)).into_response();
        }

        let body = match &self {
            Self::AlreadyExists | Self::AlreadyDeleted => json!({ "errors": self.to_string() }),
            Self::Database(_) | Self::Blocking(_) => {
                log::error!("{self}");
                json!({ "detail": "internal server error" })
            }
            _ => json!({ "detail": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
