use std::net::SocketAddr;
use std::sync::Arc;

use tickduel::{
    api, init_db, BattleBus, BattleEngine, BattleService, Config, InProcessBus, PointsService,
    ReplayService, Repository, ScenarioStore, TtlCache,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let cache = Arc::new(TtlCache::new());
    let bus: Arc<dyn BattleBus> = Arc::new(InProcessBus::new());
    let scenarios = Arc::new(ScenarioStore::new(Arc::clone(&repo)));
    let points = Arc::new(PointsService::new(Arc::clone(&repo)));
    let engine = Arc::new(BattleEngine::new(
        Arc::clone(&repo),
        Arc::clone(&scenarios),
        Arc::clone(&points),
        Arc::clone(&bus),
        Arc::clone(&cache),
        config.clone(),
    ));
    let battles = Arc::new(BattleService::new(
        Arc::clone(&repo),
        Arc::clone(&scenarios),
        config,
    ));
    let replays = Arc::new(ReplayService::new(
        Arc::clone(&repo),
        Arc::clone(&scenarios),
    ));

    // Create router
    let app = api::create_router(api::AppState {
        engine,
        battles,
        scenarios,
        replays,
        points,
        bus,
    });

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
