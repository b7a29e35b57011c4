//! Function-style invocation adapter: a header map plus a JSON string body in,
//! a status code plus a JSON string body out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::services::merge_service::{API_KEY_HEADER, MergeService};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationEvent {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub async fn handle_event(service: &MergeService, event: &InvocationEvent) -> InvocationResponse {
    let body = event.body.as_deref().unwrap_or_default();
    let outcome = service
        .handle(event.header(API_KEY_HEADER), body.as_bytes())
        .await;

    InvocationResponse {
        status_code: outcome.status_code,
        body: outcome.body_json(),
    }
}
