//! Axum extractors for caller identity
//!
//! Generic over any state `S` where `AuthBackend: FromRef<S>`.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::backend::AuthBackend;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::jwt::extract_bearer_token;

/// Caller identity from `Authorization: Bearer <token>`
#[derive(Debug)]
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    AuthBackend: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let backend = AuthBackend::from_ref(state);

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;

        let token = extract_bearer_token(auth_header)?;
        Ok(AuthUser(backend.authenticate_token(&token)?))
    }
}

/// Caller identity for a WebSocket upgrade.
///
/// Browsers cannot set headers on upgrade requests, so the token may also
/// arrive as the `token` query parameter. The header wins when both exist.
#[derive(Debug)]
pub struct SocketUser(pub Identity);

impl<S> FromRequestParts<S> for SocketUser
where
    AuthBackend: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let backend = AuthBackend::from_ref(state);

        let token = match parts.headers.get(AUTHORIZATION) {
            Some(header) => extract_bearer_token(header)?,
            None => token_from_query(parts.uri.query()).ok_or(AuthError::MissingAuthorization)?,
        };

        Ok(SocketUser(backend.authenticate_token(&token)?))
    }
}

fn token_from_query(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
