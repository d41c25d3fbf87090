//! MediTrack API client
//!
//! Bearer-authenticated access to the MediTrack REST API with a single
//! transparent token refresh on authorization failure, a persisted token
//! store, and the realtime assistant chat session.

pub mod access;
pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod redirect;
pub mod state_dir;
pub mod store;
pub mod types;

pub use access::AccessStatus;
pub use chat::{ChatMessage, ChatReply, ChatSession};
pub use client::{ApiClient, ApiClientBuilder, PendingRequest};
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind, StoreError};
pub use redirect::{CallbackRedirect, LogRedirect, LoginRedirect};
pub use state_dir::StateDir;
pub use store::{FileTokenStore, MemoryTokenStore, TokenKey, TokenStore};
pub use reqwest::Method;
pub use types::{LoginResponse, RegisterRequest, Role, TokenPair};
