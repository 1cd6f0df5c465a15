//! Signed-in identity used to scope synced documents.

use std::fmt;

use crate::util::normalize_text_option;

/// Who is signed in on this device, if anyone.
///
/// Flows that need an identity (sync, notification restore) treat `None` as
/// "nothing to do" rather than an error.
pub trait SessionProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Session fixed at construction time, typically from configuration
#[derive(Clone, PartialEq, Eq, Default)]
pub struct StaticSession {
    user_id: Option<String>,
    access_token: Option<String>,
}

impl StaticSession {
    #[must_use]
    pub fn new(user_id: Option<String>, access_token: Option<String>) -> Self {
        Self {
            user_id: normalize_text_option(user_id),
            access_token: normalize_text_option(access_token),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

impl SessionProvider for StaticSession {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}

impl fmt::Debug for StaticSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StaticSession")
            .field("user_id", &self.user_id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
