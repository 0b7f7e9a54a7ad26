use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authgate::cli::{Cli, Commands, TokenCommands};
use authgate::config::{self, Config};
use authgate::store::postgres::PgUserDirectory;
use authgate::store::redis::RedisKv;
use authgate::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "authgate=debug,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => run_server(cfg, port).await,
        Some(Commands::Token { command }) => handle_token_command(cfg, command).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let users = PgUserDirectory::connect(&cfg.database_url)
        .await
        .context("failed to connect to Postgres")?;

    tracing::info!("Running migrations...");
    users.migrate().await?;

    tracing::info!("Connecting to Redis...");
    let kv = RedisKv::connect(&cfg.redis_url, Duration::from_millis(cfg.store_timeout_ms))
        .await
        .context("failed to connect to Redis")?;

    let state = Arc::new(AppState::new(cfg, Arc::new(users), Arc::new(kv))?);

    let app = authgate::api::router(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("authgate listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_token_command(cfg: Config, command: TokenCommands) -> anyhow::Result<()> {
    match command {
        TokenCommands::Issue { email, role, ttl } => {
            let codec = authgate::token::TokenCodec::new(&cfg.jwt_secret, cfg.clock_skew_leeway_secs)?;
            let role = role
                .parse::<authgate::models::user::Role>()
                .map_err(|e| anyhow::anyhow!(e))?;
            let token = codec.issue(&email, role, Utc::now(), ttl.unwrap_or(cfg.token_ttl_secs))?;
            println!("{}", token);
            Ok(())
        }
        TokenCommands::Revoke { token } => {
            let codec = authgate::token::TokenCodec::new(&cfg.jwt_secret, cfg.clock_skew_leeway_secs)?;
            let kv = RedisKv::connect(&cfg.redis_url, Duration::from_millis(cfg.store_timeout_ms))
                .await
                .context("failed to connect to Redis")?;
            let registry = authgate::revocation::RevocationRegistry::new(
                Arc::new(kv),
                cfg.revocation_outage_policy,
            );

            let now = Utc::now();
            let claims = codec
                .parse_and_verify(&token, now)
                .map_err(|e| anyhow::anyhow!("token did not verify: {}", e))?;
            let expires_at = chrono::TimeZone::timestamp_opt(&Utc, claims.exp, 0)
                .single()
                .ok_or_else(|| anyhow::anyhow!("token carries an out-of-range expiry"))?;
            registry
                .revoke(&token, expires_at, now)
                .await
                .map_err(|e| anyhow::anyhow!("revocation failed: {}", e))?;
            println!("revoked token for {} ({}s remaining)", claims.sub, claims.remaining_secs(now));
            Ok(())
        }
    }
}
