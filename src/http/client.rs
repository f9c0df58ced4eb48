use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::github::GitHubError;

/// Rate-limited HTTP client that wraps Octocrab with client-side request pacing
/// and a short-lived cache for read-mostly lookups
#[derive(Debug, Clone)]
pub struct RateLimitedHttpClient {
    octocrab: Octocrab,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    cache: Cache<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    data: serde_json::Value,
}

impl RateLimitedHttpClient {
    /// Create a new client authenticated with a personal access token.
    /// `base_uri` points the client at a GitHub Enterprise host or a test server.
    pub fn new(
        token: String,
        base_uri: Option<&str>,
        requests_per_second: u32,
    ) -> Result<Self, GitHubError> {
        let per_second = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(per_second.get().saturating_mul(2)).unwrap_or(per_second);
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let mut builder = Octocrab::builder().personal_token(token);
        if let Some(uri) = base_uri {
            builder = builder.base_uri(uri)?;
        }
        let octocrab = builder.build()?;

        // Protection rules rarely change during a sweep
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300))
            .build();

        Ok(Self {
            octocrab,
            rate_limiter,
            cache,
        })
    }

    async fn throttle(&self) {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;
    }

    pub async fn get<T, P>(&self, route: &str, params: Option<&P>) -> Result<T, GitHubError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.throttle().await;
        debug!(route, "GET");
        Ok(self.octocrab.get(route, params).await?)
    }

    /// GET with the response cached under its route
    pub async fn get_cached<T>(&self, route: &str) -> Result<T, GitHubError>
    where
        T: DeserializeOwned + Serialize,
    {
        if let Some(cached) = self.cache.get(route).await {
            debug!(route, "Cache hit");
            if let Ok(value) = serde_json::from_value(cached.data) {
                return Ok(value);
            }
        }

        let value: T = self.get(route, None::<&()>).await?;
        if let Ok(data) = serde_json::to_value(&value) {
            self.cache
                .insert(route.to_string(), CacheEntry { data })
                .await;
        }
        Ok(value)
    }

    pub async fn post<T, B>(&self, route: &str, body: &B) -> Result<T, GitHubError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.throttle().await;
        debug!(route, "POST");
        Ok(self.octocrab.post(route, Some(body)).await?)
    }

    pub async fn put<T, B>(&self, route: &str, body: &B) -> Result<T, GitHubError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.throttle().await;
        debug!(route, "PUT");
        Ok(self.octocrab.put(route, Some(body)).await?)
    }

    pub async fn patch<T, B>(&self, route: &str, body: &B) -> Result<T, GitHubError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.throttle().await;
        debug!(route, "PATCH");
        Ok(self.octocrab.patch(route, Some(body)).await?)
    }

    /// DELETE endpoints answer 204 with no body, so only the status is checked
    pub async fn delete(&self, route: &str) -> Result<(), GitHubError> {
        self.throttle().await;
        debug!(route, "DELETE");
        let response = self.octocrab._delete(route, None::<&()>).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            401 => Err(GitHubError::Authentication(format!("DELETE {route}"))),
            404 => Err(GitHubError::NotFound(route.to_string())),
            code => Err(GitHubError::Api {
                status: code,
                message: format!("DELETE {route} failed"),
            }),
        }
    }

    /// Drop cached responses whose route contains `pattern`
    pub async fn invalidate_cache_pattern(&self, pattern: &str) {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.contains(pattern))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key).await;
        }
        debug!(pattern, "Invalidated cache entries");
    }
}
