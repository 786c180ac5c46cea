//! Bearer-token handling for outbound requests
//!
//! Attaches the session token to requests aimed at our API and reacts to 401
//! answers by dropping the token and raising the login-required flag.

use std::sync::{Arc, RwLock};

use reqwest::{RequestBuilder, Url};
use tokio::sync::watch;

/// Shared session credentials
#[derive(Clone)]
pub struct Credentials {
    inner: Arc<Inner>,
}

struct Inner {
    /// `None` when the configured base is not a valid URL; nothing gets the token then
    api_base: Option<Url>,
    token: RwLock<Option<String>>,
    login_required: watch::Sender<bool>,
}

impl Credentials {
    /// Requests to the same origin as `api_base`, at or below its path, receive
    /// the token; requests elsewhere go out bare.
    pub fn new(api_base: impl AsRef<str>, token: Option<String>) -> Self {
        let (login_required, _) = watch::channel(false);
        let base = api_base.as_ref();
        let api_base = match Url::parse(base) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(base, "Invalid API base URL, token disabled: {}", e);
                None
            }
        };
        Self {
            inner: Arc::new(Inner {
                api_base,
                token: RwLock::new(token.filter(|t| !t.is_empty())),
                login_required,
            }),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Store a fresh token after a successful login
    pub fn set_token(&self, token: impl Into<String>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token.into());
        self.inner.login_required.send_replace(false);
    }

    pub fn clear(&self) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Flag flipped to `true` when the server rejected our credentials
    pub fn login_required(&self) -> watch::Receiver<bool> {
        self.inner.login_required.subscribe()
    }

    pub fn authorize(&self, request: RequestBuilder, url: &str) -> RequestBuilder {
        if !self.in_scope(url) {
            return request;
        }
        match self.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Same scheme, host and port as the base, and a path equal to the base path
    /// or continuing it after a `/`.
    fn in_scope(&self, url: &str) -> bool {
        let Some(base) = &self.inner.api_base else {
            return false;
        };
        let Ok(target) = Url::parse(url) else {
            return false;
        };

        if base.scheme() != target.scheme()
            || base.host_str() != target.host_str()
            || base.port_or_known_default() != target.port_or_known_default()
        {
            return false;
        }

        let prefix = base.path().trim_end_matches('/');
        let path = target.path();
        prefix.is_empty()
            || path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Called on a 401: forget the token and ask for a new login
    pub fn reject(&self) {
        tracing::warn!("API rejected credentials, clearing session");
        self.clear();
        self.inner.login_required.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    const BASE: &str = "http://localhost:8081/api";

    fn authorization(creds: &Credentials, url: &str) -> Option<String> {
        let client = reqwest::Client::new();
        let request = creds.authorize(client.get(url), url).build().unwrap();
        request
            .headers()
            .get(AUTHORIZATION)
            .map(|v| v.to_str().unwrap().to_string())
    }

    #[test]
    fn test_adds_header_for_api_urls() {
        let creds = Credentials::new(BASE, Some("test-token".into()));
        assert_eq!(
            authorization(&creds, "http://localhost:8081/api/test"),
            Some("Bearer test-token".to_string())
        );
    }

    #[test]
    fn test_no_header_without_token() {
        let creds = Credentials::new(BASE, None);
        assert_eq!(authorization(&creds, "http://localhost:8081/api/test"), None);

        let empty = Credentials::new(BASE, Some(String::new()));
        assert_eq!(empty.token(), None);
    }

    #[test]
    fn test_no_header_for_foreign_urls() {
        let creds = Credentials::new(BASE, Some("test-token".into()));
        assert_eq!(authorization(&creds, "http://external-api.com/test"), None);
    }

    #[test]
    fn test_no_header_for_lookalike_hosts() {
        let creds = Credentials::new("https://coach.example.com", Some("test-token".into()));
        assert_eq!(
            authorization(&creds, "https://coach.example.com.attacker.net/steal"),
            None
        );
        assert_eq!(
            authorization(&creds, "https://coach.example.com/user/chat/conversations"),
            Some("Bearer test-token".to_string())
        );
    }

    #[test]
    fn test_no_header_for_sibling_paths() {
        let creds = Credentials::new(BASE, Some("test-token".into()));
        assert_eq!(authorization(&creds, "http://localhost:8081/apix/steal"), None);
        assert_eq!(authorization(&creds, "http://localhost:8081/other"), None);
        assert_eq!(
            authorization(&creds, "http://localhost:8081/api"),
            Some("Bearer test-token".to_string())
        );

        let trailing = Credentials::new("http://localhost:8081/api/", Some("test-token".into()));
        assert_eq!(
            authorization(&trailing, "http://localhost:8081/api/user"),
            Some("Bearer test-token".to_string())
        );
        assert_eq!(authorization(&trailing, "http://localhost:8081/apix"), None);
    }

    #[test]
    fn test_no_header_for_other_port_or_scheme() {
        let creds = Credentials::new(BASE, Some("test-token".into()));
        assert_eq!(authorization(&creds, "http://localhost:9999/api/test"), None);
        assert_eq!(authorization(&creds, "https://localhost:8081/api/test"), None);

        let default_port = Credentials::new("https://coach.example.com/api", Some("t".into()));
        assert_eq!(
            authorization(&default_port, "https://coach.example.com:443/api/x"),
            Some("Bearer t".to_string())
        );
    }

    #[test]
    fn test_invalid_base_never_sends_token() {
        let creds = Credentials::new("not a url", Some("test-token".into()));
        assert_eq!(authorization(&creds, "http://localhost:8081/api/test"), None);
    }

    #[test]
    fn test_reject_clears_token_and_flags_login() {
        let creds = Credentials::new(BASE, Some("test-token".into()));
        let login = creds.login_required();
        assert!(!*login.borrow());

        creds.reject();
        assert_eq!(creds.token(), None);
        assert!(*login.borrow());

        creds.set_token("fresh");
        assert_eq!(creds.token().as_deref(), Some("fresh"));
        assert!(!*login.borrow());
    }
}
