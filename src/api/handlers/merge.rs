use crate::AppState;
use crate::models::MergeOutcome;
use crate::services::merge_service::API_KEY_HEADER;
use axum::{body::Bytes, extract::State, http::HeaderMap};

#[utoipa::path(
    post,
    path = "/merge",
    request_body = crate::models::MergeRequest,
    params(
        ("x-api-key" = String, Header, description = "Shared API key")
    ),
    responses(
        (status = 200, description = "Artifact built and uploaded", body = crate::models::MergeResponse),
        (status = 400, description = "Invalid type, malformed body or empty key list", body = crate::models::MergeResponse),
        (status = 403, description = "Missing or invalid API key", body = crate::models::MergeResponse),
        (status = 500, description = "Fetch, decode, assembly or upload failed", body = crate::models::MergeResponse)
    ),
    tag = "merge"
)]
pub async fn merge_fragments(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> MergeOutcome {
    let credential = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    state.merge_service.handle(credential, &body).await
}
