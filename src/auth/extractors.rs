use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::jwt::{JwtKeys, TokenError},
    error::AppError,
};

/// Extracts and validates an access JWT, returning the user ID.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(TokenError::MissingHeader)?;

        // "Bearer <token>", scheme case-insensitive
        let token = match header.trim().split_once(' ') {
            Some((scheme, token))
                if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
            {
                token.trim()
            }
            _ => return Err(TokenError::BadScheme.into()),
        };

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            e
        })?;

        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;
    use crate::config::JwtConfig;

    #[derive(Clone)]
    struct TestState(JwtKeys);

    impl FromRef<TestState> for JwtKeys {
        fn from_ref(state: &TestState) -> Self {
            state.0.clone()
        }
    }

    fn state() -> TestState {
        TestState(JwtKeys::new(&JwtConfig {
            secret: "extractor-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        }))
    }

    async fn extract(state: &TestState, header: Option<&str>) -> Result<AuthUser, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(h) = header {
            builder = builder.header(AUTHORIZATION, h);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state).await
    }

    #[tokio::test]
    async fn accepts_access_token_with_any_scheme_case() {
        let state = state();
        let user_id = Uuid::new_v4();
        let pair = state.0.issue(user_id).unwrap();

        let AuthUser(id) = extract(&state, Some(&format!("Bearer {}", pair.access_token)))
            .await
            .unwrap();
        assert_eq!(id, user_id);
        let AuthUser(id) = extract(&state, Some(&format!("bearer {}", pair.access_token)))
            .await
            .unwrap();
        assert_eq!(id, user_id);
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_headers() {
        let state = state();
        assert!(matches!(
            extract(&state, None).await,
            Err(AppError::Token(TokenError::MissingHeader))
        ));
        assert!(matches!(
            extract(&state, Some("Basic abc")).await,
            Err(AppError::Token(TokenError::BadScheme))
        ));
        assert!(matches!(
            extract(&state, Some("Bearer")).await,
            Err(AppError::Token(TokenError::BadScheme))
        ));
    }

    #[tokio::test]
    async fn rejects_refresh_tokens() {
        let state = state();
        let pair = state.0.issue(Uuid::new_v4()).unwrap();
        let err = extract(&state, Some(&format!("Bearer {}", pair.refresh_token)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Token(TokenError::WrongKind { .. })
        ));
    }
}
