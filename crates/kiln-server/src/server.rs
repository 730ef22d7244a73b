//! Development server: build, serve, watch.

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use kiln_tasks::{ServerSettings, Task, TaskContext};
use tokio::sync::{broadcast, watch};
use tower_http::services::ServeDir;

use crate::bindings::{Dispatcher, GraphRunner, WatchTable};
use crate::livereload::{client_script, inject_client, LiveReloadHub, LiveReloadMessage};
use crate::livereload::{SCRIPT_PATH, SOCKET_PATH};
use crate::watcher::FileWatcher;

/// Configuration for the development server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on; 0 picks a free one
    pub port: u16,

    /// Page opened in the browser, relative to the build root
    pub start_path: String,

    /// Open a browser once the server is up
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self::from(&ServerSettings::default())
    }
}

impl From<&ServerSettings> for DevServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            start_path: settings.start_path.clone(),
            open: settings.open,
        }
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {0}: {1}")]
    BindError(String, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Server error: {0}")]
    ServeError(String),
}

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building,
    Serving(SocketAddr),
    Watching(SocketAddr),
    Stopped,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    ctx: Arc<TaskContext>,
    hub: LiveReloadHub,
    phase: watch::Sender<Phase>,
}

impl DevServer {
    /// Create a server for `ctx`. Tasks the server runs signal its live-reload
    /// hub.
    pub fn new(config: DevServerConfig, ctx: TaskContext) -> Self {
        let hub = LiveReloadHub::new();
        let ctx = ctx.with_reload(Arc::new(hub.clone()));
        let (phase, _) = watch::channel(Phase::Idle);

        Self {
            config,
            ctx: Arc::new(ctx),
            hub,
            phase,
        }
    }

    /// Follow lifecycle changes.
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn hub(&self) -> &LiveReloadHub {
        &self.hub
    }

    /// Run until Ctrl-C.
    pub async fn start(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Build, serve and watch until `shutdown` resolves.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        self.phase.send_replace(Phase::Building);
        let reports = Task::build().run(self.ctx.clone()).await;
        let failed = reports.iter().filter(|r| r.outcome.is_failure()).count();
        if failed > 0 {
            tracing::warn!("Initial build finished with {} failed task(s)", failed);
        }

        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                let addr = format!("{}:{}", self.config.host, self.config.port);
                ServerError::BindError(addr, e.to_string())
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        let (closing, closed) = watch::channel(false);
        let app = router(
            self.ctx.dirs.build(),
            LiveState {
                hub: self.hub.clone(),
                closed,
            },
        );
        self.phase.send_replace(Phase::Serving(addr));
        tracing::info!("Serving {} at http://{}", self.ctx.dirs.build().display(), addr);

        if self.config.open {
            let url = format!(
                "http://{}/{}",
                addr,
                self.config.start_path.trim_start_matches('/')
            );
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open {}: {}", url, e);
            }
        }

        let source = self.ctx.dirs.source().canonicalize().map_err(|e| {
            ServerError::WatchError(format!("{}: {}", self.ctx.dirs.source().display(), e))
        })?;
        let (watcher, mut events) =
            FileWatcher::new(&source).map_err(|e| ServerError::WatchError(e.to_string()))?;
        let table =
            WatchTable::standard(&source).map_err(|e| ServerError::WatchError(e.to_string()))?;
        let dispatcher = Dispatcher::spawn(table, Arc::new(GraphRunner::new(self.ctx.clone())));

        let watch_loop = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::debug!("{:?} {}", event.kind, event.path.display());
                dispatcher.dispatch(&event);
            }
            // Keep watcher alive
            drop(watcher);
        });

        self.phase.send_replace(Phase::Watching(addr));
        tracing::info!("Watching {}", source.display());

        // Live-reload sockets never close on their own, so release them
        // before axum waits for open connections.
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let _ = closing.send(true);
            })
            .await;

        watch_loop.abort();
        self.phase.send_replace(Phase::Stopped);
        tracing::info!("Stopped");

        served.map_err(|e| ServerError::ServeError(e.to_string()))
    }
}

/// State shared by the live-reload socket handlers.
#[derive(Clone)]
struct LiveState {
    hub: LiveReloadHub,

    /// Flips to `true` when the server shuts down
    closed: watch::Receiver<bool>,
}

/// Static files from the build root plus the live-reload endpoints.
fn router(build_dir: &Path, state: LiveState) -> Router {
    Router::new()
        .route(SOCKET_PATH, get(ws_handler))
        .route(SCRIPT_PATH, get(script_handler))
        .fallback_service(ServeDir::new(build_dir).append_index_html_on_directories(true))
        .layer(middleware::from_fn(inject_livereload))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Add the client script to every successful HTML response.
async fn inject_livereload(req: Request, next: Next) -> Response {
    let res = next.run(req).await;

    let is_html = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if res.status() != StatusCode::OK || !is_html {
        return res;
    }

    let (mut parts, body) = res.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<LiveState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: LiveState) {
    let mut rx = state.hub.subscribe();
    let mut closed = state.closed;

    if !send(&mut socket, &LiveReloadMessage::Connected).await {
        return;
    }

    loop {
        let received = tokio::select! {
            received = rx.recv() => received,
            _ = closed.wait_for(|closed| *closed) => break,
        };

        match received {
            Ok(msg) => {
                if !send(&mut socket, &msg).await {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Live-reload client lagged by {} message(s)", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}

/// Send one message; `false` once the client is gone.
async fn send(socket: &mut WebSocket, msg: &LiveReloadMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return true;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn script_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], client_script())
}
