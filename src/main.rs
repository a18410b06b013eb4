use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use blvq_backend::{
    AppState,
    config::Config,
    database,
    ewity::EwityClient,
    middleware::RateLimiter,
    router::create_router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        "Starting BLVQ backend v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );

    // 设置数据库连接池并建表
    let pool = database::connect(&config)
        .await
        .expect("Failed to connect to Postgres");
    database::initialize_schema(&pool)
        .await
        .expect("Failed to initialize database schema");

    let ewity = EwityClient::from_config(&config).expect("Failed to create Ewity client");

    // 设置限流器，未配置 Redis 时不限流
    let rate_limiter = match &config.redis_url {
        Some(url) => {
            let redis_client = redis::Client::open(url.as_str()).expect("Failed to create Redis client");
            tracing::info!(
                "Rate limiting public routes: {} requests per {}s",
                config.rate_limit_requests,
                config.rate_limit_window_secs
            );
            Some(Arc::new(RateLimiter::new(redis_client, config.clone())))
        }
        None => {
            tracing::info!("REDIS_URL not set, rate limiting disabled");
            None
        }
    };

    // 设置应用状态
    let state = AppState::new(config.clone(), pool, ewity);
    let app = create_router(state, rate_limiter);

    // 启动服务器
    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}{}", addr, config.api_base_uri);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
