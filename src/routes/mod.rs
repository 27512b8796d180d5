use axum::extract::{Form, Path as ReqPath, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::data::*;
use crate::session::Identity;
use crate::{html, AppState};

pub mod auth;
pub mod delete;
pub mod files;
pub mod pages;
pub mod post;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::temporary("/files/") }))
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/files", get(|| async { Redirect::temporary("/files/") }))
        .route("/files/", get(files::root))
        .route("/files/*path", get(files::files))
        .route("/view/*path", get(pages::view))
        .route(
            "/comment/*path",
            post(post::comment).delete(delete::comment),
        )
        .with_state(state)
}

pub fn get_cookie<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value)
}

/// The comment store, or `NotFound` when comments are turned off.
fn comment_store(state: &AppState) -> StoreResult<&CommentStore> {
    state.comments.as_ref().ok_or(StoreError::NotFound)
}

/// Attach `Set-Cookie` headers to a response.
fn with_cookies(response: impl IntoResponse, cookies: &[String]) -> Response {
    let mut response = response.into_response();
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(error) => tracing::warn!(%error, "dropping invalid cookie"),
        }
    }
    response
}
