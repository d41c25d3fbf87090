//! Replayable request descriptors and bearer attachment

use crate::store::{self, TokenStore};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// An outgoing call, kept around long enough to be replayed once
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    retried: bool,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether this request has already been through a refresh cycle
    pub const fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Token currently carried in the Authorization header, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }

    /// Overwrite the Authorization header with `token`
    pub(crate) fn set_bearer(&mut self, token: &str) {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Access token is not a valid header value, sending request without it"),
        }
    }
}

/// Attaches the stored access token to every outgoing request
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn TokenStore>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Set `Authorization: Bearer <token>` when a token is stored; otherwise
    /// leave the request untouched
    pub fn authenticate(&self, request: &mut PendingRequest) {
        if let Some(token) = store::access_token(self.store.as_ref()) {
            request.set_bearer(&token);
        }
    }
}
