use anyhow::Result;
use axum::{Router, http::StatusCode, response::Html, routing::get};
use tokio::fs;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use quiz_master::{
    api::{AppState, create_router},
    config::{Config, LoggingConfig},
    history_log::HistoryLog,
    log_system_event,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let _guard = setup_logging(&LoggingConfig::from_env()?)?;

    // Nothing else runs without a credential
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Startup aborted");
            return Err(e);
        }
    };
    config.validate()?;

    log_system_event!(startup, component = "server", "Starting Quiz Master server");

    let history = HistoryLog::load(config.history.path.clone())?;
    info!(
        path = %history.path().display(),
        entries = history.len(),
        "Quiz history loaded"
    );

    let state = AppState::from_config(&config, history);
    info!(
        provider = state.explanation_service.provider_name(),
        model = state.explanation_service.model_name(),
        "Initialized explanation service"
    );

    // Build the application router
    let app = Router::new()
        // Serve static files
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .route("/styles.css", get(serve_css))
        .route("/app.js", get(serve_js))
        // API routes
        .merge(create_router(state))
        // CORS middleware
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log_system_event!(shutdown, component = "server", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

async fn serve_index() -> Result<Html<String>, StatusCode> {
    match fs::read_to_string("static/index.html").await {
        Ok(content) => Ok(Html(content)),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

async fn serve_css() -> Result<(StatusCode, [(&'static str, &'static str); 1], String), StatusCode> {
    match fs::read_to_string("static/styles.css").await {
        Ok(content) => Ok((StatusCode::OK, [("content-type", "text/css")], content)),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

async fn serve_js() -> Result<(StatusCode, [(&'static str, &'static str); 1], String), StatusCode> {
    match fs::read_to_string("static/app.js").await {
        Ok(content) => Ok((
            StatusCode::OK,
            [("content-type", "application/javascript")],
            content,
        )),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
    });

    // File output (no ANSI colors), rotated daily
    let (file_layer, guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create logs directory: {}", e);
        });
        let file_appender = tracing_appender::rolling::daily(&config.log_directory, "quiz-master.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        log_directory = %config.log_directory,
        file_enabled = config.file_enabled,
        console_enabled = config.console_enabled,
        "Logging initialized"
    );

    Ok(guard)
}
