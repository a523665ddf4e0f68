// Copyright 2023 Remi Bernotavicius

//! Resolves the `Authorization: Token <token>` header to a user. The resolved user is handed to
//! the handlers as an ordinary argument.

use super::AppState;
use crate::database::models::User;
use crate::error::Error;
use crate::users;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

pub struct CurrentUser(pub User);

/// An empty header counts as no credentials at all; anything else must be a token.
fn token(parts: &Parts) -> Result<Option<String>, Error> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| Error::Unauthorized)?.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.split_once(' ') {
        Some(("Token", token)) if !token.trim().is_empty() => Ok(Some(token.trim().to_owned())),
        _ => Err(Error::Unauthorized),
    }
}

async fn authenticate(state: &AppState, token: String) -> Result<CurrentUser, Error> {
    let user = state
        .run(move |conn| users::authenticate(conn, &token))
        .await?;
    Ok(CurrentUser(user))
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Error> {
        match token(parts)? {
            Some(token) => authenticate(state, token).await,
            None => Err(Error::Unauthorized),
        }
    }
}

impl OptionalFromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Error> {
        match token(parts)? {
            Some(token) => Ok(Some(authenticate(state, token).await?)),
            None => Ok(None),
        }
    }
}

#[test]
fn token_header_forms() {
    use axum::http::Request;

    let parts = |header: Option<&str>| {
        let mut builder = Request::builder();
        if let Some(header) = header {
            builder = builder.header(AUTHORIZATION, header);
        }
        builder.body(()).unwrap().into_parts().0
    };

    assert_eq!(token(&parts(None)).unwrap(), None);
    assert_eq!(token(&parts(Some(""))).unwrap(), None);
    assert_eq!(
        token(&parts(Some("Token abc123"))).unwrap().as_deref(),
        Some("abc123")
    );
    assert!(matches!(
        token(&parts(Some("Bearer abc123"))),
        Err(Error::Unauthorized)
    ));
    assert!(matches!(
        token(&parts(Some("Token "))),
        Err(Error::Unauthorized)
    ));
}
