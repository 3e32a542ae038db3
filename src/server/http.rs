//! HTTP server implementation
//!
//! hyper http1 with TokioIo for async handling; requests are routed by a
//! `(Method, path)` match. Each inbound request is handled independently;
//! the only shared state is the store handle, the lock client and the audit
//! recorder (spec of the concurrency model lives with the admission module).

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::admission::AdmissionController;
use crate::audit::AuditRecorder;
use crate::config::Args;
use crate::db::Store;
use crate::lock::LockClient;
use crate::routes;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<Store>,
    pub lock: Arc<LockClient>,
    pub audit: AuditRecorder,
    pub admission: AdmissionController,
}

impl AppState {
    pub fn new(args: Args, store: Arc<Store>, lock: Arc<LockClient>, audit: AuditRecorder) -> Self {
        let admission = AdmissionController::new(
            Arc::clone(&store),
            Arc::clone(&lock),
            audit.clone(),
            args.resource_class.clone(),
        );
        Self {
            args,
            store,
            lock,
            audit,
            admission,
        }
    }
}

/// Bind the configured listen address and serve until failure
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;
    info!(
        "Scheduler listening on {} as node {}",
        state.args.listen, state.args.node_id
    );
    serve(listener, state).await
}

/// Serve connections from an already-bound listener. Split out from `run`
/// so tests can bind an ephemeral port themselves.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probes
        (Method::GET, "/health") | (Method::GET, "/healthz") => routes::health_check(&state),

        // Server clock, entry point for HATEOAS navigation
        (Method::GET, "/time") => routes::server_time(),

        // Confirmed bookings
        (Method::GET, "/bookings") => routes::handle_list_bookings(&state).await,

        // Protected create path (admission protocol)
        (Method::POST, "/bookings") => {
            routes::handle_create_booking(req, Arc::clone(&state)).await
        }

        // Guarded cancellation, addressed by primary key (no lock needed)
        (Method::POST, p) if p.starts_with("/bookings/") && p.ends_with("/cancel") => {
            let id_str = p
                .strip_prefix("/bookings/")
                .and_then(|rest| rest.strip_suffix("/cancel"))
                .unwrap_or("");
            match id_str.parse::<i64>() {
                Ok(id) => routes::handle_cancel_booking(Arc::clone(&state), id).await,
                Err(_) => not_found_response(&path),
            }
        }

        // Test-data seeder
        (Method::POST, "/setup") => routes::handle_setup(&state).await,

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        _ => not_found_response(&path),
    };

    Ok(response)
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
