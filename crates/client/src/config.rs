//! Client configuration

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `MEDITRACK__API_BASE_URL`
pub const ENV_PREFIX: &str = "MEDITRACK";

/// Settings for the API client and chat session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API host
    pub api_base_url: String,

    /// Base URL of the realtime chat server
    pub chat_url: String,

    /// Request timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Serialize concurrent refreshes and reuse a token minted by another request
    pub coalesce_refresh: bool,

    /// Where the host sends the user when the session is torn down
    pub login_path: String,

    /// Override for the platform state directory
    pub state_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            chat_url: "http://localhost:8001".to_string(),
            timeout_secs: 30,
            user_agent: concat!("meditrack-client/", env!("CARGO_PKG_VERSION")).to_string(),
            coalesce_refresh: false,
            login_path: "/login".to_string(),
            state_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a file, with environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        Self::load(Some(path.as_ref()))
    }

    /// Load configuration from defaults and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables cannot be parsed
    pub fn from_env() -> Result<Self, ClientError> {
        Self::load(None)
    }

    /// Defaults, then the optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| ClientError::Configuration(e.to_string()))
    }

    /// Chat server URL rewritten to the WebSocket scheme
    pub fn chat_socket_url(&self) -> Result<url::Url, ClientError> {
        let mut url = url::Url::parse(&self.chat_url)
            .map_err(|e| ClientError::Configuration(format!("invalid chat_url: {e}")))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::Configuration(format!(
                    "unsupported chat_url scheme: {other}"
                )));
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Configuration("cannot set chat_url scheme".into()))?;
        url.set_path("/socket.io/");
        url.set_query(Some("EIO=4&transport=websocket"));
        Ok(url)
    }
}
