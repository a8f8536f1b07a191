mod board_view;
mod config;
mod ephemeral;
mod events;
mod game;
mod gateway;
mod handlers;
mod match_actor;
mod persistence;
mod registry;
mod tasks;

use std::sync::Arc;
use std::time::Duration;

use log::info;
use sqlx::postgres::PgPoolOptions;

use config::Config;
use ephemeral::redis_store::RedisEphemeralStore;
use events::EventBus;
use game::timeout::TimeoutManager;
use gateway::GatewayState;
use persistence::postgres::{
    PgMatchRepo, PgPlayerRepo, PgShotRepo, PgSpectatorRepo, PgStatsRepo, PgUserGlobalStatsRepo,
};
use persistence::Repositories;
use registry::MatchRegistry;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };
    info!("starting on {}", config.bind_addr);

    let ephemeral = RedisEphemeralStore::connect(&config.redis_url)
        .await
        .expect("failed to connect to the ephemeral store");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to the database");

    let repos = Repositories {
        matches: Arc::new(PgMatchRepo::new(pool.clone())),
        players: Arc::new(PgPlayerRepo::new(pool.clone())),
        shots: Arc::new(PgShotRepo::new(pool.clone())),
        spectators: Arc::new(PgSpectatorRepo::new(pool.clone())),
        stats: Arc::new(PgStatsRepo::new(pool.clone())),
        user_global_stats: Arc::new(PgUserGlobalStatsRepo::new(pool)),
    };

    let shared = Arc::new(match_actor::Shared {
        repos,
        ephemeral: Arc::new(ephemeral),
        events: Arc::new(EventBus::new()),
        timeouts: Arc::new(TimeoutManager::new(config.turn_timeout)),
        config: Arc::new(config),
    });
    let registry = Arc::new(MatchRegistry::new());

    let reap_shared = shared.clone();
    let reap_registry = registry.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        loop {
            ticker.tick().await;
            reap_registry.reap(&reap_shared.events).await;
        }
    });

    let state = Arc::new(GatewayState { shared: shared.clone(), registry });
    let app = gateway::router(state);

    let listener = tokio::net::TcpListener::bind(shared.config.bind_addr).await.expect("failed to bind listener");
    info!("listening on {}", shared.config.bind_addr);
    axum::serve(listener, app).await.expect("server error");
}
