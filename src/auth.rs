//! Bearer token authentication.
//!
//! Tokens are issued by the upstream identity provider; this service only
//! maps a presented token to a user id. The middleware runs before any
//! handler, makes sure the user's rows exist and inserts the
//! [`UserIdentity`] into request extensions for [`AuthenticatedUser`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::logging;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub struct UserIdentity {
    pub user_id: String,
}

/// Token -> identity map
#[derive(Clone, Default)]
pub struct AuthTokens {
    tokens: HashMap<String, UserIdentity>,
}

impl AuthTokens {
    pub fn new(tokens: &HashMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .iter()
                .map(|(token, user_id)| (token.clone(), UserIdentity { user_id: user_id.clone() }))
                .collect(),
        }
    }

    /// Constant-time comparison against every known token
    pub fn authenticate(&self, candidate: &str) -> Option<&UserIdentity> {
        let mut found = None;
        for (token, identity) in &self.tokens {
            if bool::from(candidate.as_bytes().ct_eq(token.as_bytes())) {
                found = Some(identity);
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match bearer_token(&headers).and_then(|t| state.auth.authenticate(t)) {
        Some(identity) => identity.clone(),
        None => {
            logging::log_request(
                None,
                &format!("Rejected unauthenticated {} {}", request.method(), request.uri().path()),
            );
            return AppError::Unauthorized.into_response();
        }
    };

    if let Err(e) = state.db.ensure_user(&identity.user_id) {
        return AppError::from(e).into_response();
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Only available on routes behind `auth_middleware`
pub struct AuthenticatedUser(pub UserIdentity);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserIdentity>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or(AppError::Unauthorized)
    }
}
