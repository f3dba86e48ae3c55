//! Bearer authentication, privilege checks and per-user rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use citequotes_core::config::AuthConfig;
use citequotes_core::credentials::parse_bearer;
use citequotes_core::domain::role::{Privilege, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// The caller behind a valid bearer token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub privilege: Privilege,
}

impl AuthUser {
    pub fn require(&self, min: Privilege) -> Result<(), ApiError> {
        if self.privilege.at_least(min) {
            return Ok(());
        }
        warn!(
            event_name = "auth.privilege.denied",
            user_id = %self.id.0,
            required = %min,
            actual = %self.privilege,
            "insufficient privilege"
        );
        Err(ApiError::Forbidden(format!("requires {min} privilege")))
    }
}

/// Anonymous callers are allowed; a malformed or unknown token is still rejected.
#[derive(Clone, Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        match authenticate(parts, state).await? {
            Some(user) => Ok(user),
            None => Err(ApiError::Unauthorized("missing bearer token".to_string())),
        }
    }
}

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        Ok(Self(authenticate(parts, state).await?))
    }
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, ApiError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(parse_bearer)
        .ok_or_else(|| ApiError::Unauthorized("malformed authorization header".to_string()))?;

    let user = state
        .users
        .authenticate(token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid or expired token".to_string()))?;
    let privilege = state.roles.privilege_of(&user.id).await?;

    debug!(event_name = "auth.token.accepted", user_id = %user.id.0, privilege = %privilege);
    Ok(Some(AuthUser { id: user.id, email: user.email, privilege }))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateBucket {
    RoleChange,
    Generation,
    ApiWrite,
}

impl RateBucket {
    fn as_str(&self) -> &'static str {
        match self {
            Self::RoleChange => "role_change",
            Self::Generation => "generation",
            Self::ApiWrite => "api_write",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimits {
    pub role_change_per_minute: u32,
    pub generation_per_minute: u32,
    pub api_writes_per_minute: u32,
}

impl From<&AuthConfig> for RateLimits {
    fn from(config: &AuthConfig) -> Self {
        Self {
            role_change_per_minute: config.role_change_per_minute,
            generation_per_minute: config.generation_per_minute,
            api_writes_per_minute: config.api_writes_per_minute,
        }
    }
}

impl RateLimits {
    fn limit(&self, bucket: RateBucket) -> usize {
        let per_minute = match bucket {
            RateBucket::RoleChange => self.role_change_per_minute,
            RateBucket::Generation => self.generation_per_minute,
            RateBucket::ApiWrite => self.api_writes_per_minute,
        };
        per_minute as usize
    }
}

/// Request timestamps inside the current window.
#[derive(Debug, Default)]
struct RateLimitEntry {
    requests: Vec<Instant>,
}

impl RateLimitEntry {
    fn record_request(&mut self, now: Instant, window: Duration) -> usize {
        self.requests.retain(|&t| now.duration_since(t) < window);
        self.requests.push(now);
        self.requests.len()
    }
}

/// Sliding-window limiter keyed by bucket and user.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    limits: RateLimits,
    window: Duration,
    entries: Arc<RwLock<HashMap<(RateBucket, String), RateLimitEntry>>>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self::with_window(limits, Duration::from_secs(60))
    }

    pub fn with_window(limits: RateLimits, window: Duration) -> Self {
        Self { limits, window, entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn check(&self, bucket: RateBucket, user: &UserId) -> Result<(), ApiError> {
        let limit = self.limits.limit(bucket);
        let mut entries = self.entries.write().await;
        let entry = entries.entry((bucket, user.0.clone())).or_default();
        let count = entry.record_request(Instant::now(), self.window);

        if count > limit {
            entry.requests.pop();
            warn!(
                event_name = "auth.rate_limit.exceeded",
                bucket = bucket.as_str(),
                user_id = %user.0,
                limit,
                "rate limit exceeded"
            );
            return Err(ApiError::RateLimited { retry_after_secs: self.window.as_secs() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use citequotes_core::domain::role::UserId;

    use super::{RateBucket, RateLimiter, RateLimits};
    use crate::error::ApiError;

    fn limits() -> RateLimits {
        RateLimits { role_change_per_minute: 2, generation_per_minute: 1, api_writes_per_minute: 5 }
    }

    #[tokio::test]
    async fn limiter_denies_after_the_bucket_limit() {
        let limiter = RateLimiter::new(limits());
        let admin = UserId("admin".to_string());

        limiter.check(RateBucket::RoleChange, &admin).await.expect("first");
        limiter.check(RateBucket::RoleChange, &admin).await.expect("second");
        let third = limiter.check(RateBucket::RoleChange, &admin).await;
        assert!(matches!(third, Err(ApiError::RateLimited { retry_after_secs: 60 })));

        // Buckets and users are tracked separately.
        limiter.check(RateBucket::Generation, &admin).await.expect("other bucket");
        limiter
            .check(RateBucket::RoleChange, &UserId("other".to_string()))
            .await
            .expect("other user");
    }

    #[tokio::test]
    async fn window_expiry_frees_capacity() {
        let limiter = RateLimiter::with_window(limits(), Duration::from_millis(20));
        let user = UserId("u".to_string());

        limiter.check(RateBucket::Generation, &user).await.expect("first");
        assert!(limiter.check(RateBucket::Generation, &user).await.is_err());
        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.check(RateBucket::Generation, &user).await.expect("after window");
    }
}
