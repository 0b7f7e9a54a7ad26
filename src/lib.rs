//! authgate — authentication and abuse-control core.
//!
//! Stateless bearer-token authentication with server-side revocation and
//! fixed-window rate limiting, coordinated through a shared TTL-based
//! key-value store so any number of service instances observe the same
//! revocation and quota state.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod revocation;
pub mod store;
pub mod token;

use std::sync::Arc;

use auth::password::PasswordStrategy;
use auth::token::TokenStrategy;
use config::Config;
use middleware::rate_limit::RateLimiter;
use revocation::RevocationRegistry;
use store::postgres::UserDirectory;
use store::KvStore;
use token::TokenCodec;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserDirectory>,
    pub codec: Arc<TokenCodec>,
    pub revocation: Arc<RevocationRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub password_strategy: Arc<PasswordStrategy>,
    pub token_strategy: Arc<TokenStrategy>,
}

impl AppState {
    /// Wire the core components over the given user directory and shared
    /// store. Outage policies, window sizes, signing secret and leeway all
    /// come from `config`.
    pub fn new(
        config: Config,
        users: Arc<dyn UserDirectory>,
        kv: Arc<dyn KvStore>,
    ) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(
            &config.jwt_secret,
            config.clock_skew_leeway_secs,
        )?);
        let revocation = Arc::new(RevocationRegistry::new(
            kv.clone(),
            config.revocation_outage_policy,
        ));
        let limiter = Arc::new(RateLimiter::new(
            kv,
            config.rate_limit_max_requests,
            config.rate_limit_window_secs,
            config.rate_limit_outage_policy,
        ));
        let password_strategy = Arc::new(PasswordStrategy::new(users.clone()));
        let token_strategy = Arc::new(TokenStrategy::new(
            users.clone(),
            codec.clone(),
            revocation.clone(),
        ));

        Ok(Self {
            config,
            users,
            codec,
            revocation,
            limiter,
            password_strategy,
            token_strategy,
        })
    }
}
