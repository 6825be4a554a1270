// neon_pay/src/token_cache.rs
// In-memory bKash bearer token cache with single-flight refresh

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Lifetime assumed for every granted token. The provider's own
/// `expires_in` is not consulted.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl GatewayToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && now < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Cached,
    Granted,
}

/// Holds at most one token. Validity is checked lazily on every read;
/// nothing ever evicts an expired token.
#[derive(Clone, Default)]
pub struct TokenCache {
    token: Arc<RwLock<Option<GatewayToken>>>,
    refresh: Arc<Mutex<()>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with a token, valid or not.
    pub fn with_token(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(GatewayToken {
                access_token: access_token.into(),
                expires_at,
            }))),
            refresh: Arc::new(Mutex::new(())),
        }
    }

    pub async fn current_at(&self, now: DateTime<Utc>) -> Option<GatewayToken> {
        let guard = self.token.read().await;
        guard.as_ref().filter(|t| t.is_valid_at(now)).cloned()
    }

    /// The cached token if it is still valid.
    pub async fn current(&self) -> Option<GatewayToken> {
        self.current_at(Utc::now()).await
    }

    pub async fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.current_at(now).await.is_some()
    }

    pub async fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now()).await
    }

    /// Expiry of whatever token is held, expired or not.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.token.read().await.as_ref().map(|t| t.expires_at)
    }

    pub async fn store_at(&self, access_token: String, now: DateTime<Utc>) -> GatewayToken {
        let token = GatewayToken {
            access_token,
            expires_at: now + Duration::seconds(TOKEN_LIFETIME_SECS),
        };
        *self.token.write().await = Some(token.clone());
        token
    }

    /// Replace the held token, expiring one hour from now.
    pub async fn store(&self, access_token: String) -> GatewayToken {
        self.store_at(access_token, Utc::now()).await
    }

    /// Return the cached token, or run `grant` to obtain a new one.
    ///
    /// Concurrent callers that all find the cache invalid queue on the
    /// refresh lock; the first one grants, the rest see its token.
    pub async fn get_or_refresh<F, Fut, E>(&self, grant: F) -> Result<(GatewayToken, TokenSource), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(token) = self.current().await {
            return Ok((token, TokenSource::Cached));
        }

        let _refresh = self.refresh.lock().await;
        if let Some(token) = self.current().await {
            tracing::debug!("[BKASH] token refreshed by a concurrent request");
            return Ok((token, TokenSource::Cached));
        }

        let access_token = grant().await?;
        let token = self.store(access_token).await;
        tracing::info!(expires_at = %token.expires_at, "[BKASH] token cached");
        Ok((token, TokenSource::Granted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn empty_cache_is_invalid() {
        let cache = TokenCache::new();
        assert!(!cache.is_valid().await);
        assert!(cache.current().await.is_none());
        assert!(cache.expires_at().await.is_none());
    }

    #[tokio::test]
    async fn stored_token_valid_for_one_hour() {
        let cache = TokenCache::new();
        let now = Utc::now();
        let token = cache.store_at("tok".to_string(), now).await;

        assert_eq!(token.expires_at, now + Duration::hours(1));
        assert!(cache.is_valid_at(now).await);
        assert!(cache.is_valid_at(now + Duration::minutes(59)).await);
        assert!(!cache.is_valid_at(now + Duration::hours(1)).await);
        assert!(!cache.is_valid_at(now + Duration::hours(2)).await);
    }

    #[tokio::test]
    async fn expired_token_present_but_invalid() {
        let past = Utc::now() - Duration::seconds(1);
        let cache = TokenCache::with_token("stale", past);

        assert!(!cache.is_valid().await);
        assert!(cache.current().await.is_none());
        assert_eq!(cache.expires_at().await, Some(past));
    }

    #[tokio::test]
    async fn empty_token_string_never_valid() {
        let cache = TokenCache::new();
        cache.store(String::new()).await;
        assert!(!cache.is_valid().await);
    }

    #[tokio::test]
    async fn valid_cache_skips_grant() {
        let cache = TokenCache::with_token("live", Utc::now() + Duration::minutes(5));
        let (token, source) = cache
            .get_or_refresh(|| async { Err::<String, &str>("grant must not run") })
            .await
            .unwrap();
        assert_eq!(token.access_token, "live");
        assert_eq!(source, TokenSource::Cached);
    }

    #[tokio::test]
    async fn failed_grant_leaves_cache_invalid() {
        let cache = TokenCache::new();
        let result = cache
            .get_or_refresh(|| async { Err::<String, &str>("boom") })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert!(!cache.is_valid().await);
    }

    #[tokio::test]
    async fn expired_token_is_replaced() {
        let cache = TokenCache::with_token("old", Utc::now() - Duration::minutes(1));
        let (token, source) = cache
            .get_or_refresh(|| async { Ok::<_, ()>("new".to_string()) })
            .await
            .unwrap();
        assert_eq!(token.access_token, "new");
        assert_eq!(source, TokenSource::Granted);
        assert!(cache.is_valid().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refresh_grants_once() {
        let cache = TokenCache::new();
        let grants = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let grants = grants.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_refresh(|| async move {
                        let n = grants.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<_, ()>(format!("token-{}", n))
                    })
                    .await
                    .unwrap()
                    .0
            }));
        }

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().access_token);
        }

        assert_eq!(grants.load(Ordering::SeqCst), 1);
        assert!(tokens.iter().all(|t| t == "token-0"));
    }
}
