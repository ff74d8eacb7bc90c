use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use uuid::Uuid;

/// Header carrying the caller's identity, set by the authenticating proxy in
/// front of this service. The engine trusts it as pre-authorized.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn extract_user_id(headers: &HeaderMap) -> Option<Uuid> {
    let raw = headers.get(USER_ID_HEADER)?.to_str().ok()?;
    Uuid::parse_str(raw.trim()).ok()
}

/// Axum extractor for the pre-authorized user.
///
/// Usage:
/// ```rust,ignore
/// async fn handler(UserSession(user_id): UserSession) -> Result<...> {
///     // user_id came from the identity collaborator
/// }
/// ```
pub struct UserSession(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match extract_user_id(&parts.headers) {
            Some(user_id) => Ok(UserSession(user_id)),
            None => {
                tracing::warn!("Request without a valid {} header", USER_ID_HEADER);
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}
