use crate::models::MergeOutcome;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Forbidden: Invalid API Key")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{0:#}")]
    Operation(#[from] anyhow::Error),
}

impl MergeError {
    pub fn status_code(&self) -> u16 {
        match self {
            MergeError::Unauthorized => 403,
            MergeError::Validation(_) => 400,
            MergeError::Operation(_) => 500,
        }
    }
}

impl IntoResponse for MergeOutcome {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.response())).into_response()
    }
}
