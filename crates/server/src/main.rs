//! Pollwave server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use chrono::Utc;
use fred::interfaces::ClientLike;
use pollwave_api::{AppState, VoteRateLimiter, router as api_router};
use pollwave_common::Config;
use pollwave_core::{
    AggregateService, EventPublisher, FeedService, IdentityService, VoteService,
};
use pollwave_db::repositories::{
    FollowRepository, PollRepository, PollStatsRepository, UserRepository, VoteRepository,
};
use pollwave_realtime::RedisPubSub;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Re-runs the full-scan recompute over polls with recent vote activity.
/// The per-vote synchronous recompute is the fast path; this pass is the
/// correctness fallback that heals any snapshot a crashed request left
/// stale.
fn spawn_reconciliation(
    vote_repo: VoteRepository,
    aggregate: AggregateService,
    publisher: Arc<dyn EventPublisher>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            // Overlap the lookback with the previous pass.
            let since = Utc::now() - chrono::Duration::seconds((interval_secs * 2) as i64);

            let poll_ids = match vote_repo.poll_ids_with_votes_since(since).await {
                Ok(ids) => ids,
                Err(e) => {
                    error!(error = %e, "Reconciliation scan failed");
                    continue;
                }
            };
            if poll_ids.is_empty() {
                continue;
            }

            info!(polls = poll_ids.len(), "Reconciling poll aggregates");
            for poll_id in poll_ids {
                match aggregate.recompute(&poll_id).await {
                    Ok(agg) => {
                        if let Err(e) = publisher
                            .publish_stats_updated(&poll_id, agg.total_votes, &agg.counts)
                            .await
                        {
                            warn!(poll_id = %poll_id, error = %e, "Failed to broadcast reconciled stats");
                        }
                    }
                    Err(e) => {
                        warn!(poll_id = %poll_id, error = %e, "Reconciliation recompute failed");
                    }
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pollwave=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting pollwave server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database and run migrations
    let db = pollwave_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    pollwave_db::migrate(&db).await?;
    info!("Migrations completed");

    // Redis: one client for rate-limit counters, a pub/sub pair for updates
    info!("Connecting to Redis...");
    let fred_config = fred::types::config::Config::from_url(&config.redis.url)?;
    let fred_client = fred::clients::Client::new(fred_config, None, None, None);
    fred_client.connect();
    fred_client.wait_for_connect().await?;
    let fred_client = Arc::new(fred_client);

    let pubsub = RedisPubSub::new(&config.redis.url).await?;
    pubsub.start();
    info!("Connected to Redis");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let stats_repo = PollStatsRepository::new(Arc::clone(&db));
    let follow_repo = FollowRepository::new(Arc::clone(&db));

    // Initialize services
    let publisher: Arc<dyn EventPublisher> = Arc::new(pubsub.clone());
    let identity_service = IdentityService::new(config.voting.pepper.clone());
    let aggregate_service = AggregateService::new(vote_repo.clone(), stats_repo.clone());
    let vote_service = VoteService::new(
        poll_repo.clone(),
        vote_repo.clone(),
        aggregate_service.clone(),
        Arc::clone(&publisher),
    );
    let feed_service = FeedService::new(
        poll_repo.clone(),
        vote_repo.clone(),
        follow_repo.clone(),
        aggregate_service.clone(),
        config.feed.clone(),
    );
    let rate_limiter = VoteRateLimiter::new(
        Arc::clone(&fred_client),
        config.redis.prefix.clone(),
        config.voting.rate_limit_per_window,
        config.voting.rate_window_secs,
    );

    spawn_reconciliation(
        vote_repo.clone(),
        aggregate_service.clone(),
        Arc::clone(&publisher),
        config.voting.reconcile_interval_secs,
    );

    let state = AppState {
        identity_service,
        vote_service,
        aggregate_service,
        feed_service,
        poll_repo,
        vote_repo,
        user_repo,
        pubsub,
        rate_limiter,
    };

    // Build router
    let app = Router::new()
        .merge(api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            pollwave_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
