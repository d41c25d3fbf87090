//! Session lifecycle: login, registration, logout and access checks

use super::{ApiClient, PendingRequest};
use crate::access::{self, AccessStatus};
use crate::error::ClientError;
use crate::store::{self, TokenKey};
use crate::types::{LoginRequest, LoginResponse, RegisterRequest, Role};
use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const LOGIN_PATH: &str = "/api/token/";
pub const REGISTER_PATH: &str = "/api/user/register/";

impl ApiClient {
    /// Exchange credentials for a token pair and persist it
    ///
    /// Any failure clears the stored session, including the role tag.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::BadRequest(
                "Please enter both username and password".into(),
            ));
        }

        let request = PendingRequest::new(Method::POST, LOGIN_PATH).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;

        let result = match self.dispatch(&request).await {
            Ok(response) => response.json::<LoginResponse>().await.map_err(ClientError::from),
            Err(e) => Err(e),
        };

        match result {
            Ok(login) => {
                let store = self.store.as_ref();
                store::store_credentials(store, &login.tokens());
                match login.role() {
                    Some(role) => store.set(TokenKey::Role, role.as_str()),
                    None => store.remove(TokenKey::Role),
                }
                info!(user = username, role = ?login.role(), "Logged in");
                Ok(login)
            }
            Err(e) => {
                warn!(user = username, "Login failed: {e}");
                store::clear_session(self.store.as_ref());
                Err(e)
            }
        }
    }

    /// Create a new account; the server's response body is returned as-is
    pub async fn register(&self, registration: &RegisterRequest) -> Result<Value, ClientError> {
        let request = PendingRequest::new(Method::POST, REGISTER_PATH).json(registration)?;
        let response = self.dispatch(&request).await?;
        info!(user = %registration.username, "Registered account");
        Ok(response.json().await?)
    }

    /// Forget the stored session
    pub fn logout(&self) {
        store::clear_session(self.store.as_ref());
        info!("Logged out");
    }

    /// Role tag stored at login
    pub fn role(&self) -> Option<Role> {
        store::role(self.store.as_ref())
    }

    /// Decide whether the stored session may access protected surfaces
    ///
    /// An expired access token is renewed with the refresh token. Unlike the
    /// request pipeline, a failed renewal here leaves the store untouched and
    /// does not redirect; the caller routes to login on `Unauthorized`.
    pub async fn check_access(&self) -> AccessStatus {
        let Some(token) = store::access_token(self.store.as_ref()) else {
            return AccessStatus::Unauthorized;
        };
        let Some(claims) = access::decode_claims(&token) else {
            debug!("Stored access token is not a decodable JWT");
            return AccessStatus::Unauthorized;
        };
        if !claims.is_expired_at(Utc::now().timestamp()) {
            return AccessStatus::Authorized;
        }

        let Some(refresh) = store::refresh_token(self.store.as_ref()) else {
            return AccessStatus::Unauthorized;
        };
        match self.reauth.refresh(&refresh).await {
            Ok(response) => {
                self.store.set(TokenKey::Access, &response.access);
                if let Some(rotated) = &response.refresh {
                    self.store.set(TokenKey::Refresh, rotated);
                }
                AccessStatus::Authorized
            }
            Err(e) => {
                debug!("Access check refresh failed: {e}");
                AccessStatus::Unauthorized
            }
        }
    }
}
