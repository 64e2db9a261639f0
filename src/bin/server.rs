use std::{error::Error, fs::OpenOptions, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use expense_ledger::{
    AppState, SessionConfig, build_router, graceful_shutdown, logging_middleware,
};

/// The REST API server for the expense ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// How many minutes a session lasts after log in.
    #[arg(long, default_value_t = 60)]
    session_minutes: i64,

    /// Extend sessions on use once less than a quarter of their duration is left.
    #[arg(long)]
    sliding_sessions: bool,

    /// The bcrypt cost for hashing new passwords.
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
    password_cost: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let duration = Duration::minutes(args.session_minutes);
    let session_config = SessionConfig {
        duration,
        renew_within: args.sliding_sessions.then(|| duration / 4),
    };

    let connection = Connection::open(&args.db_path)?;
    let state = AppState::new(connection, session_config, args.password_cost)?;

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
