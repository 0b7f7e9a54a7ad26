use serde::Deserialize;

/// How a check behaves when the shared store is unreachable.
///
/// The reference system shipped with fail-open revocation (a Redis outage
/// must not lock out all authenticated traffic) and a fail-closed rate
/// limiter (an outage must not silently lift the quota). Both are explicit,
/// independent settings here rather than an accident of two code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutagePolicy {
    FailOpen,
    FailClosed,
}

impl OutagePolicy {
    fn parse(s: &str, default: OutagePolicy) -> OutagePolicy {
        match s.trim().to_lowercase().as_str() {
            "fail_open" | "fail-open" | "open" => OutagePolicy::FailOpen,
            "fail_closed" | "fail-closed" | "closed" => OutagePolicy::FailClosed,
            _ => default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// Base64-encoded HMAC-SHA-256 signing secret.
    pub jwt_secret: String,
    /// Token lifetime in seconds. Default: 3600.
    pub token_ttl_secs: i64,
    /// Accepted clock skew when checking `exp`. Default: 0 (reference behavior).
    pub clock_skew_leeway_secs: i64,
    /// Fixed-window rate limit ceiling per caller key. Default: 3.
    pub rate_limit_max_requests: i64,
    /// Fixed window length in seconds. Default: 10.
    pub rate_limit_window_secs: i64,
    /// Upper bound on any single shared-store call, in milliseconds.
    /// A timeout is treated exactly like an unreachable store.
    pub store_timeout_ms: u64,
    pub revocation_outage_policy: OutagePolicy,
    pub rate_limit_outage_policy: OutagePolicy,
}

const PLACEHOLDER_SECRET: &str = "Q0hBTkdFX01FX0RFVl9PTkxZX1NFQ1JFVF9LRVlfMzJC";

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let jwt_secret =
        std::env::var("AUTHGATE_JWT_SECRET").unwrap_or_else(|_| PLACEHOLDER_SECRET.into());

    if jwt_secret == PLACEHOLDER_SECRET {
        let env_mode = std::env::var("AUTHGATE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "AUTHGATE_JWT_SECRET is still the insecure placeholder. \
                 Set a base64-encoded secret of at least 32 bytes before running in production."
            );
        }
        eprintln!("⚠️  AUTHGATE_JWT_SECRET is not set — using insecure placeholder. Set a base64 secret for production.");
    }

    Ok(Config {
        port: env_parse("AUTHGATE_PORT", 8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/authgate".into()),
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
        jwt_secret,
        token_ttl_secs: env_parse("AUTHGATE_TOKEN_TTL_SECS", 3600),
        clock_skew_leeway_secs: env_parse("AUTHGATE_CLOCK_SKEW_LEEWAY_SECS", 0),
        rate_limit_max_requests: env_parse("AUTHGATE_RATE_LIMIT_MAX_REQUESTS", 3),
        rate_limit_window_secs: env_parse("AUTHGATE_RATE_LIMIT_WINDOW_SECS", 10),
        store_timeout_ms: env_parse("AUTHGATE_STORE_TIMEOUT_MS", 2000),
        revocation_outage_policy: OutagePolicy::parse(
            &std::env::var("AUTHGATE_REVOCATION_OUTAGE_POLICY").unwrap_or_default(),
            OutagePolicy::FailOpen,
        ),
        rate_limit_outage_policy: OutagePolicy::parse(
            &std::env::var("AUTHGATE_RATE_LIMIT_OUTAGE_POLICY").unwrap_or_default(),
            OutagePolicy::FailClosed,
        ),
    })
}

fn env_parse<T: std::str::FromStr + Copy>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outage_policy_parsing() {
        assert_eq!(
            OutagePolicy::parse("fail_open", OutagePolicy::FailClosed),
            OutagePolicy::FailOpen
        );
        assert_eq!(
            OutagePolicy::parse("fail-closed", OutagePolicy::FailOpen),
            OutagePolicy::FailClosed
        );
        assert_eq!(
            OutagePolicy::parse("garbage", OutagePolicy::FailOpen),
            OutagePolicy::FailOpen
        );
        assert_eq!(
            OutagePolicy::parse("  CLOSED ", OutagePolicy::FailOpen),
            OutagePolicy::FailClosed
        );
    }
}
