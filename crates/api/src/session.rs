//! Request session extraction.
//!
//! Sign-in is handled upstream; the proxy in front of the API forwards the
//! signed-in user as `x-user-id` and their role as `x-user-role`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(role) if role.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Customer,
        }
    }
}

/// A signed-in user. Rejects the request with 401 when absent.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub user_id: UserId,
    pub role: Role,
}

impl Session {
    fn from_parts(parts: &Parts) -> Result<Option<Self>, ApiError> {
        let Some(raw) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(None);
        };
        let user_id = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<UserId>().ok())
            .ok_or_else(|| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))?;
        let role = Role::from_header(
            parts
                .headers
                .get(USER_ROLE_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        Ok(Some(Session { user_id, role }))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Session::from_parts(parts)?
            .ok_or_else(|| ApiError::Unauthorized("Sign in required".to_string()))
    }
}

/// The session if there is one. Guests may check out.
#[derive(Debug, Clone, Copy)]
pub struct MaybeSession(pub Option<Session>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(Session::from_parts(parts)?))
    }
}

/// A signed-in admin. Rejects non-admins with 403.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession(pub Session);

impl<S: Send + Sync> FromRequestParts<S> for AdminSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        if session.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }
        Ok(AdminSession(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_session_from_headers() {
        let user = UserId::new();
        let id = user.to_string();
        let mut parts = parts(&[(USER_ID_HEADER, id.as_str()), (USER_ROLE_HEADER, "Admin")]);

        let session = Session::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(session.user_id, user);
        assert_eq!(session.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_session_rejected() {
        let mut parts = parts(&[]);
        let result = Session::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        let maybe = MaybeSession::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(maybe.0.is_none());
    }

    #[tokio::test]
    async fn test_malformed_user_id_rejected() {
        let mut parts = parts(&[(USER_ID_HEADER, "not-a-uuid")]);
        let result = MaybeSession::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_customer_is_not_admin() {
        let id = UserId::new().to_string();
        let mut parts = parts(&[(USER_ID_HEADER, id.as_str())]);
        let result = AdminSession::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }
}
