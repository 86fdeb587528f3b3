use axum::http::{self, HeaderValue, Method};
use dotenvy::dotenv;
use env_logger::Builder;
use log::LevelFilter;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use server::{app, models::config::GameConfig, state::AppState, utils::config::CONFIG};

fn init_logger(config: &GameConfig) {
    let level = if config.verbose_logging {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .filter_module("tower_http", level)
        .filter_module("axum", level)
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .format_target(true)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenv() {
        eprintln!("Warning: failed to load .env file: {}", e);
    }

    let config = GameConfig::from_env();
    init_logger(&config);
    log::info!("game config: {:?}", config);

    let origin = CONFIG.cors_origin.parse::<HeaderValue>()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    let app = app::create_app_with_state(AppState::with_config(config))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
                tracing::info_span!(
                    "HTTP request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    let addr = CONFIG.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
