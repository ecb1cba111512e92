use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use prospector_core::types::{TenantId, UserId};
use std::future::ready;

use crate::infra::errors::AppError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";

/// Tenant and acting user, set by the authenticating proxy in front of this
/// service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl TenantContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        Ok(Self {
            tenant_id: header_id(headers, TENANT_HEADER)?,
            user_id: header_id(headers, USER_HEADER)?,
        })
    }
}

fn header_id<T: std::str::FromStr>(
    headers: &HeaderMap,
    name: &'static str,
) -> Result<T, AppError> {
    let raw = headers
        .get(name)
        .ok_or_else(|| AppError::bad_request(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| AppError::bad_request(format!("malformed {name} header")))?;
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("malformed {name} header")))
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send
    {
        ready(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    #[test]
    fn both_headers_are_required() {
        let tenant = Uuid::now_v7();
        let user = Uuid::now_v7();
        let mut headers = HeaderMap::new();
        headers.insert(
            TENANT_HEADER,
            HeaderValue::from_str(&tenant.to_string()).expect("header"),
        );
        assert!(TenantContext::from_headers(&headers).is_err());

        headers.insert(
            USER_HEADER,
            HeaderValue::from_str(&user.to_string()).expect("header"),
        );
        let ctx = TenantContext::from_headers(&headers).expect("context");
        assert_eq!(ctx.tenant_id.as_uuid(), tenant);
        assert_eq!(ctx.user_id.as_uuid(), user);
    }

    #[test]
    fn malformed_ids_are_bad_requests() {
        let mut headers = HeaderMap::new();
        headers.insert(TENANT_HEADER, HeaderValue::from_static("tenant-7"));
        headers.insert(USER_HEADER, HeaderValue::from_static("user-7"));
        let err = TenantContext::from_headers(&headers).expect_err("malformed");
        assert_eq!(err.status, axum::http::StatusCode::BAD_REQUEST);
    }
}
