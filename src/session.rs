use std::sync::Arc;

use reqwest::cookie::Jar;
use serde::{Deserialize, Serialize};

use crate::types::LoginUser;

/// Login context for a [`PictureClient`](crate::PictureClient).
///
/// The cookie-session backend keeps login state in a `gsessionid` cookie;
/// the JWT backend issues a bearer token in the login reply. A session
/// carries both: its own cookie jar and the token, if any, plus the user
/// they belong to. A client carries exactly one session; there is no global
/// "current user". Swap sessions with
/// [`PictureClient::with_session`](crate::PictureClient::with_session).
///
/// Clones share the cookie jar. The jar is not serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    token: Option<String>,
    user: Option<LoginUser>,
    #[serde(skip)]
    cookies: Arc<Jar>,
}

impl Session {
    /// A session with no credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session authenticated by a bare token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Session built from a login response. An empty token counts as none.
    pub fn from_login(user: LoginUser) -> Self {
        Self::anonymous().logged_in(user)
    }

    /// Record a login reply, keeping the cookies it set.
    pub(crate) fn logged_in(mut self, user: LoginUser) -> Self {
        self.token = user.token.clone().filter(|t| !t.trim().is_empty());
        self.user = Some(user);
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&LoginUser> {
        self.user.as_ref()
    }

    /// True once a login succeeded or a token was supplied.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() || self.user.is_some()
    }

    /// Replace the cached user, keeping the token.
    pub fn set_user(&mut self, user: LoginUser) {
        self.user = Some(user);
    }

    /// Value for the `Authorization` header, if any.
    pub(crate) fn authorization(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    pub(crate) fn cookie_jar(&self) -> &Jar {
        &self.cookies
    }
}
