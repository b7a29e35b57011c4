use crate::api::error::MergeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

/// Body of a merge request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct MergeRequest {
    /// Destination object key for the produced artifact
    #[validate(length(min = 1, message = "output_key must not be empty"))]
    pub output_key: String,
    /// Source object keys, in the order they are archived or concatenated
    #[validate(length(min = 1, message = "keys must contain at least one object key"))]
    pub keys: Vec<String>,
    /// "zip" or "unified" (default)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub merge_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Archive,
    UnifiedAudio,
}

impl MergeMode {
    pub fn resolve(value: Option<&str>) -> Result<Self, MergeError> {
        match value {
            None | Some("unified") => Ok(MergeMode::UnifiedAudio),
            Some("zip") => Ok(MergeMode::Archive),
            Some(other) => Err(MergeError::Validation(format!(
                "Invalid type specified: {}. Expected \"zip\" or \"unified\".",
                other
            ))),
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeMode::Archive => write!(f, "zip"),
            MergeMode::UnifiedAudio => write!(f, "unified"),
        }
    }
}

/// The single result of one merge invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub status_code: u16,
    pub message: String,
    pub output_key: Option<String>,
}

/// JSON body returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MergeResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl MergeOutcome {
    pub fn success(message: String, output_key: &str) -> Self {
        Self {
            status_code: 200,
            message,
            output_key: Some(output_key.to_string()),
        }
    }

    pub fn failure(error: &MergeError) -> Self {
        Self {
            status_code: error.status_code(),
            message: error.to_string(),
            output_key: None,
        }
    }

    pub fn response(&self) -> MergeResponse {
        MergeResponse {
            message: self.message.clone(),
            output_key: self.output_key.clone(),
        }
    }

    pub fn body_json(&self) -> String {
        serde_json::json!(self.response()).to_string()
    }
}
