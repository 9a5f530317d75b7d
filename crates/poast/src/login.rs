//! Login against the board server and the locally stored session token.
//!
//! The server answers `GET /api/login` with a `jwt` cookie; logging out just
//! forgets the token.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use poast_sync::identity::user_id_from_token;
use poast_sync::sync::AuthProvider;
use reqwest::header::SET_COOKIE;

use crate::error::{PoastError, Result};

pub const LOGIN_PATH: &str = "/api/login";
pub const JWT_COOKIE: &str = "jwt";

/// The `jwt` value among `Set-Cookie` header values.
pub fn jwt_from_set_cookie<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    values.into_iter().find_map(|header| {
        let pair = header.split(';').next()?.trim();
        let (name, value) = pair.split_once('=')?;
        (name.trim() == JWT_COOKIE && !value.is_empty()).then(|| value.trim().to_string())
    })
}

/// Fetch a fresh token from `server`.
pub async fn fetch_token(http: &reqwest::Client, server: &str) -> Result<String> {
    let url = format!("{}{LOGIN_PATH}", server.trim_end_matches('/'));
    let response = http.get(&url).send().await?.error_for_status()?;
    let token = jwt_from_set_cookie(
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok()),
    );
    token.ok_or_else(|| PoastError::Login(format!("{url} did not set a {JWT_COOKIE} cookie")))
}

// ============================================================================
// Session
// ============================================================================

/// The current token, persisted to a file between runs.
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
    token: Option<String>,
}

impl Session {
    /// Load the token stored at `path`. A missing file means logged out.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let token = match std::fs::read_to_string(&path) {
            Ok(raw) => Some(raw.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, token })
    }

    /// A session with an explicit token that is never written back.
    pub fn with_token(path: impl Into<PathBuf>, token: Option<String>) -> Self {
        Self {
            path: path.into(),
            token,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The identity carried by the token, or `anon`.
    pub fn user_id(&self) -> String {
        user_id_from_token(self.token())
    }

    pub fn auth_provider(&self) -> Option<AuthProvider> {
        let token = self.token.clone()?;
        Some(Arc::new(move || Some(token.clone())))
    }

    pub async fn login(&mut self, http: &reqwest::Client, server: &str) -> Result<()> {
        let token = fetch_token(http, server).await?;
        std::fs::write(&self.path, &token)?;
        tracing::info!(user_id = %user_id_from_token(Some(&token)), "logged in");
        self.token = Some(token);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.token = None;
        Ok(())
    }
}
