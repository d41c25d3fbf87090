//! MediTrack HTTP client
//!
//! Every call made through [`ApiClient::send`] passes through two stages:
//! the [`Authenticator`] attaches the stored access token, and on a 401 the
//! reauthenticator refreshes the session once and replays the request.

pub mod auth;
pub mod request;

mod refresh;

pub use refresh::REFRESH_PATH;
pub use request::{Authenticator, PendingRequest};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::redirect::{LogRedirect, LoginRedirect};
use crate::store::{MemoryTokenStore, TokenStore};
use refresh::Reauthenticator;
use reqwest::{Client, ClientBuilder, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// MediTrack API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    authenticator: Authenticator,
    reauth: Arc<Reauthenticator>,
}

impl ApiClient {
    /// Create a new client with default configuration and an in-memory store
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token store shared with this client
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// Start describing a request to `path`
    pub fn request(&self, method: Method, path: impl Into<String>) -> PendingRequest {
        PendingRequest::new(method, path)
    }

    /// Send a request through the authenticate / reauthenticate pipeline
    ///
    /// Only successful responses are returned; every other status becomes a
    /// [`ClientError`].
    pub async fn send(&self, mut request: PendingRequest) -> Result<Response, ClientError> {
        self.authenticator.authenticate(&mut request);

        match self.dispatch(&request).await {
            Err(err) if err.is_auth_expired() && !request.is_retried() => {
                request.mark_retried();
                let access = self.reauth.recover(request.bearer_token(), err).await?;
                request.set_bearer(&access);
                debug!(method = %request.method, path = %request.path, "Replaying request");
                self.dispatch(&request).await
            }
            other => other,
        }
    }

    /// Send a request and decode the JSON response body
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute(self.request(Method::GET, path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.request(Method::POST, path).json(body)?)
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.request(Method::PUT, path).json(body)?)
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(self.request(Method::PATCH, path).json(body)?)
            .await
    }

    /// Delete a resource, discarding any response body
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// Issue a single HTTP call exactly as described, without interception
    async fn dispatch(&self, request: &PendingRequest) -> Result<Response, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    redirect: Option<Arc<dyn LoginRedirect>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    coalesce_refresh: bool,
}

impl ApiClientBuilder {
    /// Seed the builder from a loaded configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::default()
            .base_url(config.api_base_url.clone())
            .user_agent(config.user_agent.clone())
            .coalesce_refresh(config.coalesce_refresh)
            .redirect(Arc::new(LogRedirect::new(config.login_path.clone())));
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        builder
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the token store (defaults to an in-memory store)
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the login redirect hook (defaults to logging the redirect)
    pub fn redirect(mut self, redirect: Arc<dyn LoginRedirect>) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Share one refresh between requests that fail together
    pub const fn coalesce_refresh(mut self, enabled: bool) -> Self {
        self.coalesce_refresh = enabled;
        self
    }

    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("meditrack-client/", env!("CARGO_PKG_VERSION")).into()),
        );
        let client = client_builder.build()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let redirect = self
            .redirect
            .unwrap_or_else(|| Arc::new(LogRedirect::default()));

        let reauth = Reauthenticator::new(
            client.clone(),
            &base_url,
            store.clone(),
            redirect,
            self.coalesce_refresh,
        );

        Ok(ApiClient {
            client,
            base_url,
            authenticator: Authenticator::new(store.clone()),
            store,
            reauth: Arc::new(reauth),
        })
    }
}
