use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_api::middleware::require_auth;
use parley_api::{AppState, AppStateInner, attachments, messages, presence, reactions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("PARLEY_DB_PATH").unwrap_or_else(|_| "parley.db".into());
    let upload_dir = std::env::var("PARLEY_UPLOAD_DIR").unwrap_or_else(|_| "./uploads".into());
    let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PARLEY_PORT")
        .unwrap_or_else(|_| "4000".into())
        .parse()?;

    // Init database
    let db = parley_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        upload_dir: PathBuf::from(upload_dir),
    });

    // Routes — everything requires an identity token from the auth collaborator
    let app = Router::new()
        .route("/presence/heartbeat", post(presence::heartbeat))
        .route("/presence/snapshot", post(presence::snapshot))
        .route("/conversations", get(messages::list_conversations))
        .route(
            "/conversations/{peer_id}/messages",
            get(messages::fetch_messages).post(messages::send_message),
        )
        .route("/messages/{message_id}/reactions", post(reactions::react))
        .route("/attachments", post(attachments::upload))
        .route("/attachments/{attachment_id}", get(attachments::download))
        .layer(DefaultBodyLimit::max(attachments::UPLOAD_BODY_LIMIT))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Parley server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
