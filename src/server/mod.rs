//! HTTP endpoint returning the normalized view of the caller's request.

pub mod headers;

use axum::{
  extract::{ConnectInfo, State},
  response::Json,
  routing::get,
  Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::Result;
pub use headers::{normalize_headers, parse_accept_language, LanguageEntry, NormalizedRequest};

#[derive(Debug, Clone, Default)]
pub struct ServerState {
  pub trust_proxy: bool,
}

pub fn router(state: ServerState) -> Router {
  Router::new()
    .route("/fingerprint", get(fingerprint_handler))
    .with_state(state)
}

async fn fingerprint_handler(
  State(state): State<ServerState>,
  request: axum::extract::Request,
) -> Json<NormalizedRequest> {
  let remote_addr = request
    .extensions()
    .get::<ConnectInfo<SocketAddr>>()
    .map(|ConnectInfo(addr)| addr.ip());

  let pairs = request.headers().iter().map(|(name, value)| {
    (
      name.as_str().to_string(),
      String::from_utf8_lossy(value.as_bytes()).into_owned(),
    )
  });

  Json(normalize_headers(pairs, remote_addr, state.trust_proxy))
}

/// A server started in the background.
pub struct RunningServer {
  local_addr: SocketAddr,
  shutdown_tx: Option<oneshot::Sender<()>>,
  task_handle: JoinHandle<()>,
}

impl RunningServer {
  pub fn local_addr(&self) -> SocketAddr {
    self.local_addr
  }

  pub async fn stop(mut self) {
    if let Some(shutdown_tx) = self.shutdown_tx.take() {
      let _ = shutdown_tx.send(());
    }
    let _ = self.task_handle.await;
  }
}

pub async fn start_server(addr: SocketAddr, state: ServerState) -> Result<RunningServer> {
  let listener = TcpListener::bind(addr).await?;
  let local_addr = listener.local_addr()?;
  let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

  let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
  let task_handle = tokio::spawn(async move {
    let server = axum::serve(listener, app).with_graceful_shutdown(async {
      let _ = shutdown_rx.await;
    });
    if let Err(e) = server.await {
      log::error!("Fingerprint server stopped with error: {e}");
    }
  });

  log::info!("Fingerprint server listening on http://{local_addr}");
  Ok(RunningServer {
    local_addr,
    shutdown_tx: Some(shutdown_tx),
    task_handle,
  })
}
