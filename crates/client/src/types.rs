//! Wire types for the MediTrack REST and chat endpoints

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Access/refresh credential pair issued at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Session role tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Doctor,
    Patient,
    /// Unrecognized tag, preserved verbatim
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Doctor => "DOCTOR",
            Self::Patient => "PATIENT",
            Self::Other(raw) => raw,
        }
    }
}

impl From<&str> for Role {
    fn from(raw: &str) -> Self {
        match raw {
            "DOCTOR" => Self::Doctor,
            "PATIENT" => Self::Patient,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/token/`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Minimal user descriptor returned alongside a login
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_type: Option<Role>,
}

/// Response of `POST /api/token/`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<UserSummary>,
}

impl LoginResponse {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access: self.access.clone(),
            refresh: self.refresh.clone(),
        }
    }

    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().and_then(|u| u.user_type.as_ref())
    }
}

/// Body of `POST /api/token/refresh/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Response of `POST /api/token/refresh/`
///
/// `refresh` is only present when the server rotates refresh tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Body of `POST /api/user/register/`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    pub address: String,
    /// Additional profile fields (`first_name`, `dob`, `gender`, ...)
    #[serde(flatten)]
    pub profile: BTreeMap<String, String>,
}

/// One stored exchange with the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryEntry {
    pub message: String,
    pub ai_response: String,
}

/// Response of `GET /api/chatbot/history/`, newest entry first
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatHistoryResponse {
    #[serde(default)]
    pub history: Vec<ChatHistoryEntry>,
}
