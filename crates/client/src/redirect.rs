//! Login surface hook
//!
//! When a session cannot be recovered the client clears its credentials and
//! hands control to a [`LoginRedirect`]. A browser host would navigate to the
//! login page; other hosts decide for themselves what "go to login" means.

use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Navigation to the login surface
#[cfg_attr(test, mockall::automock)]
pub trait LoginRedirect: Send + Sync {
    /// Called once per unrecoverable credential failure
    fn redirect_to_login(&self);
}

/// Logs the redirect and does nothing else
#[derive(Debug, Clone)]
pub struct LogRedirect {
    login_path: String,
}

impl LogRedirect {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }
}

impl Default for LogRedirect {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        warn!(target = %self.login_path, "Session expired, redirecting to login");
    }
}

/// Forwards the redirect to an arbitrary callback
#[derive(Clone)]
pub struct CallbackRedirect {
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl CallbackRedirect {
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRedirect").finish_non_exhaustive()
    }
}

impl LoginRedirect for CallbackRedirect {
    fn redirect_to_login(&self) {
        (self.callback)();
    }
}
