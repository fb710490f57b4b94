use crate::models::User;
use chrono::{DateTime, Duration, Utc};

/// Lifetime of one authenticated session.
///
/// Created on a successful login and dropped on logout; nothing about the
/// session outlives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user: User,
    user_key: String,
    expires_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn start(user: User, duration: Duration, now: DateTime<Utc>) -> Self {
        let user_key = user.key();
        Self {
            user,
            user_key,
            expires_at: now + duration,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Partition key for this user's saved state
    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Time left before expiry, never negative
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Countdown text in `m:ss` form
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{}:{:02}", secs / 60, secs % 60)
}
