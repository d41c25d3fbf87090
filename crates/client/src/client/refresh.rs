//! Single-shot session recovery after an authorization failure
//!
//! A request rejected with 401 goes through `REFRESHING` at most once: the
//! stored refresh token is exchanged for a new access token, which the caller
//! then uses to replay the request. Any failure on the way tears the session
//! down and sends the user to the login surface.

use crate::error::ClientError;
use crate::redirect::LoginRedirect;
use crate::store::{self, TokenKey, TokenStore};
use crate::types::{RefreshRequest, RefreshResponse};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const REFRESH_PATH: &str = "/api/token/refresh/";

pub(crate) struct Reauthenticator {
    client: Client,
    refresh_url: String,
    store: Arc<dyn TokenStore>,
    redirect: Arc<dyn LoginRedirect>,
    /// Present when concurrent refreshes are coalesced
    in_flight: Option<Mutex<()>>,
}

impl Reauthenticator {
    pub fn new(
        client: Client,
        base_url: &str,
        store: Arc<dyn TokenStore>,
        redirect: Arc<dyn LoginRedirect>,
        coalesce: bool,
    ) -> Self {
        Self {
            client,
            refresh_url: format!("{base_url}{REFRESH_PATH}"),
            store,
            redirect,
            in_flight: coalesce.then(|| Mutex::new(())),
        }
    }

    /// Obtain a fresh access token for a request that was rejected while
    /// carrying `rejected_token`
    ///
    /// On failure the credentials are already cleared and the redirect has
    /// fired; the returned error is what the original caller should see.
    pub async fn recover(
        &self,
        rejected_token: Option<&str>,
        original: ClientError,
    ) -> Result<String, ClientError> {
        let _guard = match &self.in_flight {
            Some(lock) => {
                let guard = lock.lock().await;
                match store::access_token(self.store.as_ref()) {
                    Some(current) if Some(current.as_str()) != rejected_token => {
                        debug!("Access token was renewed by a concurrent request, reusing it");
                        return Ok(current);
                    }
                    None if rejected_token.is_some() => {
                        debug!("Session was torn down by a concurrent request");
                        return Err(original);
                    }
                    _ => {}
                }
                Some(guard)
            }
            None => None,
        };

        let Some(refresh) = store::refresh_token(self.store.as_ref()) else {
            warn!("No refresh token available, session cannot be recovered");
            self.teardown();
            return Err(original);
        };

        match self.refresh(&refresh).await {
            Ok(response) => {
                self.store.set(TokenKey::Access, &response.access);
                if let Some(rotated) = &response.refresh {
                    self.store.set(TokenKey::Refresh, rotated);
                }
                info!("Access token refreshed");
                Ok(response.access)
            }
            Err(e) => {
                warn!("Token refresh failed: {e}");
                self.teardown();
                Err(ClientError::RefreshFailed(Box::new(e)))
            }
        }
    }

    /// Exchange a refresh token for a new access token
    ///
    /// This call never carries an Authorization header and never recurses
    /// into the recovery flow.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let response = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh: refresh_token.to_string(),
            })
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            Err(ClientError::from_status(status, message))
        }
    }

    fn teardown(&self) {
        store::clear_credentials(self.store.as_ref());
        self.redirect.redirect_to_login();
    }
}
