//! Caller identity extraction.
//!
//! # Purpose
//! Submissions arrive with the caller's identity asserted by the portal's
//! auth gateway in `x-user-id` / `x-username` headers. This service trusts
//! those headers; token verification happens upstream.
use crate::api::error::{ApiError, api_unauthorized};
use axum::http::HeaderMap;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USERNAME_HEADER: &str = "x-username";

#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
}

/// Extract the asserted identity, or 401 when either header is missing or
/// empty.
pub fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let user_id = header_value(headers, USER_ID_HEADER)
        .ok_or_else(|| api_unauthorized("missing x-user-id header"))?;
    let username = header_value(headers, USERNAME_HEADER)
        .ok_or_else(|| api_unauthorized("missing x-username header"))?;
    Ok(Identity { user_id, username })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?;
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        headers.insert(USERNAME_HEADER, HeaderValue::from_static("alice"));
        let identity = identity_from_headers(&headers).expect("identity");
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn missing_or_empty_headers_are_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u1"));
        assert!(identity_from_headers(&headers).is_err());

        headers.insert(USERNAME_HEADER, HeaderValue::from_static(""));
        assert!(identity_from_headers(&headers).is_err());
    }
}
