use serde::Deserialize;

use super::*;
use crate::token;

const SESSION_COOKIE: &str = "session";
const STATE_COOKIE: &str = "oauth_state";
const REDIRECT_COOKIE: &str = "oauth_redirect";

/// Sessions last a day in the browser; the server forgets them on restart.
const SESSION_MAX_AGE: i64 = 60 * 60 * 24;
const HANDSHAKE_MAX_AGE: i64 = 5 * 60;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const EMAIL_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// The signed-in identity for a request, if any.
pub fn identity(headers: &HeaderMap, state: &AppState) -> Option<Identity> {
    get_cookie(headers, SESSION_COOKIE).and_then(|token| state.sessions.resolve(token))
}

/// Like [`identity`], but anonymous requests are an error.
pub fn require_identity(headers: &HeaderMap, state: &AppState) -> StoreResult<Identity> {
    identity(headers, state).ok_or(StoreError::Unauthorized)
}

fn cookie(name: &str, value: &str, max_age: i64) -> String {
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}")
}

fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0")
}

/// Only paths on this site are followed after login.
fn is_local_redirect(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}

#[derive(Deserialize)]
pub struct LoginQuery {
    redirect: Option<String>,
}

/// Start the OAuth handshake.
pub async fn login(State(state): State<AppState>, Query(query): Query<LoginQuery>) -> Response {
    let oauth_state = token::session_token();
    let oauth = &state.config.oauth;

    let url = reqwest::Url::parse_with_params(
        GOOGLE_AUTH_URL,
        [
            ("client_id", oauth.client_id.as_str()),
            ("redirect_uri", oauth.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", EMAIL_SCOPE),
            ("state", oauth_state.as_str()),
        ],
    );
    let url = match url {
        Ok(url) => url,
        Err(error) => {
            tracing::error!(%error, "could not build authorization url");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut cookies = vec![cookie(STATE_COOKIE, &oauth_state, HANDSHAKE_MAX_AGE)];
    if let Some(redirect) = query.redirect.filter(|r| is_local_redirect(r)) {
        cookies.push(cookie(
            REDIRECT_COOKIE,
            &html::encode_path(&redirect),
            HANDSHAKE_MAX_AGE,
        ));
    }

    with_cookies(Redirect::temporary(url.as_str()), &cookies)
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    state: Option<String>,
    code: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum LoginError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("email address is not verified")]
    Unverified,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    email: String,
    verified_email: Option<bool>,
}

async fn fetch_email(state: &AppState, code: &str) -> Result<String, LoginError> {
    let oauth = &state.config.oauth;
    let token: TokenResponse = state
        .http
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("code", code),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("redirect_uri", oauth.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let info: UserInfo = state
        .http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if info.verified_email == Some(false) {
        return Err(LoginError::Unverified);
    }
    Ok(info.email)
}

/// Finish the OAuth handshake and open a session for an allowed identity.
pub async fn callback(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let expected = get_cookie(&headers, STATE_COOKIE).filter(|s| !s.is_empty());
    if expected.is_none() || expected != query.state.as_deref() {
        return (StatusCode::BAD_REQUEST, "invalid state").into_response();
    }
    let Some(code) = query.code else {
        return (StatusCode::BAD_REQUEST, "missing code").into_response();
    };

    let identity = match fetch_email(&state, &code).await {
        Ok(email) => Identity::new(email),
        Err(error) => {
            tracing::warn!(%error, "oauth exchange failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "oauth exchange failed").into_response();
        }
    };

    if !state.allow_list.allows(&identity) {
        tracing::warn!(%identity, "login denied: not in allow-list");
        return with_cookies(
            (StatusCode::FORBIDDEN, "access denied: email not in allowlist"),
            &[clear_cookie(STATE_COOKIE)],
        );
    }

    let token = state.sessions.create(identity.clone());
    tracing::info!(%identity, "logged in");

    let redirect = get_cookie(&headers, REDIRECT_COOKIE)
        .filter(|r| is_local_redirect(r))
        .unwrap_or("/files/");

    with_cookies(
        Redirect::temporary(redirect),
        &[
            clear_cookie(STATE_COOKIE),
            clear_cookie(REDIRECT_COOKIE),
            cookie(SESSION_COOKIE, &token, SESSION_MAX_AGE),
        ],
    )
}

/// End the current session.
pub async fn logout(headers: HeaderMap, State(state): State<AppState>) -> Response {
    if let Some(token) = get_cookie(&headers, SESSION_COOKIE) {
        state.sessions.revoke(token);
    }
    with_cookies(Redirect::temporary("/files/"), &[clear_cookie(SESSION_COOKIE)])
}
