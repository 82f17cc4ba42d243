use axum::{
    Json,
    extract::Request,
    http::{HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::response::ApiResponse;

/// Header carrying the caller identity. An upstream gateway is trusted to
/// have authenticated it.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

const MAX_OWNER_ID_LEN: usize = 255;

/// Identity of the caller, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn extract_owner_id(req: &Request) -> Option<OwnerId> {
    let value = req.headers().get(&USER_ID_HEADER)?.to_str().ok()?.trim();
    if value.is_empty() || value.len() > MAX_OWNER_ID_LEN {
        return None;
    }
    Some(OwnerId(value.to_string()))
}

pub async fn require_owner(mut req: Request, next: Next) -> Response {
    let Some(owner) = extract_owner_id(&req) else {
        tracing::warn!(
            path = %req.uri().path(),
            method = %req.method(),
            "Unauthorized API request"
        );
        let response = ApiResponse::<()>::error("Unauthorized");
        return (StatusCode::UNAUTHORIZED, Json(response)).into_response();
    };

    req.extensions_mut().insert(owner);
    next.run(req).await
}
