use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use config::{redact, AllowList, Config};
use data::CommentStore;
use session::Sessions;

mod config;
mod data;
mod html;
mod routes;
mod session;
mod token;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    sessions: Arc<Sessions>,
    /// `None` when comments are turned off.
    comments: Option<CommentStore>,
    allow_list: Arc<AllowList>,
    http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            sessions: Arc::new(Sessions::new()),
            comments: config.comments_root().map(CommentStore::new),
            allow_list: Arc::new(AllowList::parse(&config.allowed_emails)),
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let state = AppState::new(config);

    // Older threads may predate comment ids. A failed migration only means
    // those comments cannot be deleted, so the server starts regardless.
    match &state.comments {
        Some(store) => match data::migrate(store).await {
            Ok(report) => tracing::info!(
                scanned = report.scanned,
                rewritten = report.rewritten,
                assigned = report.assigned,
                skipped = report.skipped,
                "comment migration finished"
            ),
            Err(error) => tracing::warn!(%error, "comment migration failed"),
        },
        None => tracing::info!("comments disabled"),
    }

    let config = &state.config;
    tracing::info!(
        port = config.port,
        data = %config.data.display(),
        comments = %config.comments,
        "starting consus media/file server"
    );
    tracing::info!(
        client_id = %redact(&config.oauth.client_id),
        client_secret = %redact(&config.oauth.client_secret),
        redirect_url = %config.oauth.redirect_url,
        allowed = state.allow_list.len(),
        "oauth"
    );
    if state.allow_list.is_empty() {
        tracing::warn!("no allowed emails configured; nobody can log in");
    }

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, port = config.port, "could not start listening");
            std::process::exit(1);
        }
    };

    if let Err(error) = axum::serve(listener, routes::router(state.clone())).await {
        tracing::error!(%error, "server error");
        std::process::exit(1);
    }
}
