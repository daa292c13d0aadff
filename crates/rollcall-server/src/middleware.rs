use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{HeaderName, HeaderValue, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::ApiError;
use rollcall_signup::Actor;

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        });

    // Add to request extensions for downstream usage (e.g., logging)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;

    // Add/propagate the request id header to response
    res.headers_mut().insert(header_name, req_id_value);

    res
}

/// The authenticated caller, as asserted by the upstream identity layer.
///
/// Identity itself is an external collaborator: the platform gateway
/// authenticates the user and forwards an opaque id in `X-Acting-User`.
/// The core trusts it and only applies its own organizer/ownership rules.
pub struct ActingUser(pub Actor);

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get("x-acting-user")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match user {
            Some(user_id) => Ok(ActingUser(Actor::new(user_id))),
            None => Err(ApiError::missing_identity()),
        }
    }
}
