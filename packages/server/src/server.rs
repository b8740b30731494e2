//! HTTP routes and the listener

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use dynaser_protocol::MountPoint;

use crate::app::build_app;
use crate::bootstrap;
use crate::config::Config;
use crate::error::ServerResult;
use crate::handler::{ws_handler, ConnectQuery};
use crate::registry::{is_valid_session_id, new_session_id, SessionRegistry};

pub struct AppState {
    pub registry: SessionRegistry,
    pub mount: MountPoint,
}

impl AppState {
    pub fn from_config(config: &Config) -> ServerResult<Self> {
        let mount = config.mount_point()?;
        let app = build_app(config)?;
        info!(app = app.name(), mount = %mount.segment, "application ready");
        Ok(Self {
            registry: SessionRegistry::new(app, config.keep_sessions),
            mount,
        })
    }
}

/// Serve the client page for a valid `?session=`. Without one the browser is
/// redirected to a fresh id so that reloads resume the same session.
async fn index(
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match query.session.filter(|id| is_valid_session_id(id)) {
        Some(session) => Html(bootstrap::page(&state.mount, &session)).into_response(),
        None => {
            let session = new_session_id();
            debug!(session = %session, "assigning session id");
            Redirect::to(&format!("/?session={session}")).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    pub async fn bind(config: &Config) -> ServerResult<Self> {
        let state = Arc::new(AppState::from_config(config)?);
        let listener = TcpListener::bind(config.addr()).await?;
        Ok(Self {
            listener,
            router: build_router(state),
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> ServerResult<()> {
        info!("listening on http://{}", self.local_addr()?);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
