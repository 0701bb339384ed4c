//! The login flow.
//!
//! Cookies are managed by hand rather than through a cookie store: the
//! endpoints authenticate on raw `Cookie` headers and hand identity
//! back in `Set-Cookie`, so redirects are disabled and both directions
//! go through the core cookie codec.

use std::collections::HashMap;

use parking_lot::RwLock;
use reqwest::header::{COOKIE, HeaderMap, REFERER, SET_COOKIE};
use serde::Deserialize;
use tracing::info;

use scratchkit_core::{CredentialProvider, Credentials, Settings, cookie};

use crate::errors::AuthError;
use crate::types::{Authorisation, SessionUser};

/// Client for the accounts endpoints. One instance holds at most one
/// authorised identity; `login` replaces it, `logout` clears it.
pub struct AuthClient {
    http: reqwest::Client,
    settings: Settings,
    authorisation: RwLock<Option<Authorisation>>,
}

impl AuthClient {
    /// Build a client from settings. Starts logged out.
    pub fn new(settings: Settings) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            settings,
            authorisation: RwLock::new(None),
        })
    }

    /// Build a client that resumes a previously obtained authorisation
    /// without logging in again.
    pub fn with_authorisation(
        settings: Settings,
        authorisation: Authorisation,
    ) -> Result<Self, AuthError> {
        let client = Self::new(settings)?;
        *client.authorisation.write() = Some(authorisation);
        Ok(client)
    }

    /// The stored authorisation, if logged in.
    pub fn authorisation(&self) -> Option<Authorisation> {
        self.authorisation.read().clone()
    }

    /// Forget the stored authorisation. Local only; the remote session
    /// is not invalidated.
    pub fn logout(&self) {
        *self.authorisation.write() = None;
    }

    /// Log in with a username and password, storing the resulting
    /// authorisation on success.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Authorisation, AuthError> {
        let csrf_token = self.fetch_csrf().await?;

        let mut cookies = HashMap::new();
        let _ = cookies.insert("permissions".to_string(), "{}".to_string());
        let _ = cookies.insert("scratchcsrftoken".to_string(), csrf_token.clone());

        let response = self
            .http
            .post(format!("{}/accounts/login", self.settings.site_base))
            .header(COOKIE, cookie::stringify(&cookies))
            .header(REFERER, &self.settings.site_base)
            .header("x-csrftoken", &csrf_token)
            .header("x-requested-with", "XMLHttpRequest")
            .json(&serde_json::json!({
                "useMessages": true,
                "username": username,
                "password": password,
            }))
            .send()
            .await?;

        let jar = set_cookies(response.headers());
        let rows: Vec<LoginRow> = response.json().await?;
        let row = rows.into_iter().next().ok_or(AuthError::MalformedResponse {
            context: "empty login response",
        })?;
        if !row.succeeded() {
            return Err(AuthError::LoginRejected {
                message: row.msg.unwrap_or_default(),
            });
        }

        let session_id =
            jar.get("scratchsessionsid")
                .cloned()
                .ok_or(AuthError::MalformedResponse {
                    context: "login response carried no session cookie",
                })?;

        let authorisation = Authorisation {
            session_id,
            csrf_token,
            token: row.token.unwrap_or_default(),
            user_id: row.id.unwrap_or_default(),
            username: row.username.unwrap_or_else(|| username.to_string()),
        };
        info!(username = %authorisation.username, "logged in");
        *self.authorisation.write() = Some(authorisation.clone());
        Ok(authorisation)
    }

    /// Fetch the identity of the current session from the server.
    /// Requires a prior login (or a resumed authorisation).
    #[tracing::instrument(skip_all)]
    pub async fn session_user(&self) -> Result<SessionUser, AuthError> {
        let authorisation = self.authorisation().ok_or(AuthError::NotLoggedIn)?;

        let mut cookies = HashMap::new();
        let _ = cookies.insert("permissions".to_string(), "{}".to_string());
        let _ = cookies.insert(
            "scratchsessionsid".to_string(),
            authorisation.session_id.clone(),
        );

        let response = self
            .http
            .get(format!("{}/session", self.settings.site_base))
            .header(COOKIE, cookie::stringify(&cookies))
            .header(REFERER, &self.settings.site_base)
            .header("x-requested-with", "XMLHttpRequest")
            .send()
            .await?;

        let body: serde_json::Value = response.json().await?;
        let user = body.get("user").ok_or(AuthError::MalformedResponse {
            context: "session response carried no user",
        })?;

        Ok(SessionUser {
            username: user
                .get("username")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
            user_id: user
                .get("id")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or_default(),
            token: user
                .get("token")
                .and_then(serde_json::Value::as_str)
                .map(String::from),
        })
    }

    /// Fetch a fresh CSRF token from its cookie.
    async fn fetch_csrf(&self) -> Result<String, AuthError> {
        let mut cookies = HashMap::new();
        let _ = cookies.insert("permissions".to_string(), "{}".to_string());

        let response = self
            .http
            .get(format!("{}/csrf_token", self.settings.site_base))
            .header(COOKIE, cookie::stringify(&cookies))
            .header(REFERER, &self.settings.site_base)
            .header("x-requested-with", "XMLHttpRequest")
            .send()
            .await?;

        set_cookies(response.headers())
            .get("scratchcsrftoken")
            .cloned()
            .ok_or(AuthError::CsrfMissing)
    }
}

impl CredentialProvider for AuthClient {
    fn credentials(&self) -> Option<Credentials> {
        self.authorisation.read().as_ref().map(|auth| Credentials {
            session_id: auth.session_id.clone(),
            username: auth.username.clone(),
        })
    }
}

/// One row of the login endpoint's response array. `success` arrives as
/// a number from the live service; booleans are accepted too.
#[derive(Debug, Deserialize)]
struct LoginRow {
    #[serde(default)]
    success: serde_json::Value,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    username: Option<String>,
}

impl LoginRow {
    fn succeeded(&self) -> bool {
        match &self.success {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        }
    }
}

/// Merge every `Set-Cookie` header into one map.
fn set_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for value in headers.get_all(SET_COOKIE) {
        if let Ok(text) = value.to_str() {
            out.extend(cookie::parse(text));
        }
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
