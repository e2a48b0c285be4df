//! Caller identity
//!
//! The service never authenticates anyone itself: an upstream gateway
//! resolves the session and forwards the caller identity in headers. This
//! module only reads `x-user-id` (required) and `x-forwarded-for`
//! (optional, first hop) into a [`Caller`].

use std::net::IpAddr;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ClaimError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub source_ip: Option<IpAddr>,
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ClaimError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or(ClaimError::Unauthenticated)?;

        let source_ip = parts
            .headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|s| s.trim().parse().ok());

        Ok(Caller { user_id, source_ip })
    }
}
