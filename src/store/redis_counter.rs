//! Redis-backed rate-limit counters. Counters must live in a store shared
//! by every instance; an in-process map silently stops limiting the moment
//! a second replica comes up.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::store::RateLimitStore;

// INCR and EXPIRE must land together, otherwise a crash between the two
// leaves a counter that never resets.
const INCR_WINDOW_SCRIPT: &str = r#"
    local key = KEYS[1]
    local window_secs = tonumber(ARGV[1])

    local count = redis.call('INCR', key)
    if count == 1 then
        redis.call('EXPIRE', key, window_secs)
    end
    local ttl = redis.call('TTL', key)
    if ttl < 0 then
        redis.call('EXPIRE', key, window_secs)
        ttl = window_secs
    end
    return {count, ttl}
"#;

pub struct RedisRateLimitStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisRateLimitStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid redis URL")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("Redis connection failed")?;

        tracing::info!("Redis connected for rate-limit counters");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}

/// Stand-in used when redis is unreachable at startup. Every check errors,
/// which the gate treats as fail-open, so the API stays up while degraded.
pub struct UnavailableRateLimitStore;

#[async_trait]
impl RateLimitStore for UnavailableRateLimitStore {
    async fn incr_window(&self, _key: &str, _window_secs: u64) -> Result<(u64, u64)> {
        anyhow::bail!("rate limit store unavailable")
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<(u64, u64)> {
        let mut conn = self.conn.clone();

        let (count, ttl): (i64, i64) = redis::Script::new(INCR_WINDOW_SCRIPT)
            .key(key)
            .arg(window_secs)
            .invoke_async(&mut conn)
            .await
            .context("Rate limit script failed")?;

        Ok((count.max(0) as u64, ttl.max(0) as u64))
    }
}
