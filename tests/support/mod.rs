//! Shared harness for integration tests: an in-process mock coordinator
//! (lock authority) and a scheduler instance on an ephemeral port.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use telescope_scheduler::audit::AuditRecorder;
use telescope_scheduler::config::Args;
use telescope_scheduler::db::Store;
use telescope_scheduler::lock::LockClient;
use telescope_scheduler::server::{self, AppState};

use clap::Parser;

/// Behavior of the mock coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityMode {
    /// Real lock semantics over an in-memory key set
    Normal,
    /// Every /lock call is answered 409
    AlwaysBusy,
}

/// In-process stand-in for the coordinator service
#[derive(Clone)]
pub struct MockAuthority {
    pub base_url: String,
    locks: Arc<Mutex<HashSet<String>>>,
    acquire_calls: Arc<AtomicUsize>,
}

impl MockAuthority {
    /// Keys currently held (leak detector for release-on-every-path)
    pub fn held_count(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    /// Total /lock requests observed
    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }
}

pub async fn spawn_authority(mode: AuthorityMode) -> MockAuthority {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let authority = MockAuthority {
        base_url: format!("http://{}", addr),
        locks: Arc::new(Mutex::new(HashSet::new())),
        acquire_calls: Arc::new(AtomicUsize::new(0)),
    };

    let handle = authority.clone();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => continue,
            };
            let handle = handle.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handle = handle.clone();
                    async move { authority_request(handle, mode, req).await }
                });
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    authority
}

async fn authority_request(
    authority: MockAuthority,
    mode: AuthorityMode,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    let body = req.collect().await?.to_bytes();
    let resource_id = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("resource_id").and_then(|r| r.as_str()).map(String::from))
        .unwrap_or_default();

    let response = match path.as_str() {
        "/lock" => {
            authority.acquire_calls.fetch_add(1, Ordering::SeqCst);
            match mode {
                AuthorityMode::AlwaysBusy => authority_response(
                    StatusCode::CONFLICT,
                    &resource_id,
                    "Resource already in use",
                ),
                AuthorityMode::Normal => {
                    let mut locks = authority.locks.lock().unwrap();
                    if locks.contains(&resource_id) {
                        authority_response(
                            StatusCode::CONFLICT,
                            &resource_id,
                            "Resource already in use",
                        )
                    } else {
                        locks.insert(resource_id.clone());
                        authority_response(StatusCode::OK, &resource_id, "Lock acquired")
                    }
                }
            }
        }
        "/unlock" => {
            let mut locks = authority.locks.lock().unwrap();
            if locks.remove(&resource_id) {
                authority_response(StatusCode::OK, &resource_id, "Lock released")
            } else {
                authority_response(StatusCode::NOT_FOUND, &resource_id, "No lock held")
            }
        }
        _ => authority_response(StatusCode::NOT_FOUND, &resource_id, "Unknown path"),
    };

    Ok(response)
}

fn authority_response(
    status: StatusCode,
    resource_id: &str,
    message: &str,
) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "success": status == StatusCode::OK,
        "resource_id": resource_id,
        "message": message,
    });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

/// A running scheduler instance backed by scratch files
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<Store>,
    pub audit_path: PathBuf,
    _tmp: tempfile::TempDir,
}

pub async fn spawn_app(coordinator_url: &str) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let db_path = tmp.path().join("scheduler.db");
    let audit_path = tmp.path().join("audit.log");

    let args = Args::parse_from([
        "telescope-scheduler",
        "--listen",
        "127.0.0.1:0",
        "--database-path",
        db_path.to_str().unwrap(),
        "--coordinator-url",
        coordinator_url,
        "--audit-log-path",
        audit_path.to_str().unwrap(),
        "--lock-timeout-ms",
        "1000",
        "--unlock-timeout-ms",
        "1000",
    ]);

    let store = Arc::new(Store::open(&db_path).unwrap());
    let audit = AuditRecorder::open(audit_path.clone()).unwrap();
    let lock = Arc::new(LockClient::new(
        args.coordinator_url.clone(),
        args.lock_timeout(),
        args.unlock_timeout(),
    ));
    let state = Arc::new(AppState::new(args, Arc::clone(&store), lock, audit));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server::serve(listener, state).await;
    });

    TestApp {
        base_url: format!("http://{}", addr),
        store,
        audit_path,
        _tmp: tmp,
    }
}

impl TestApp {
    /// Parsed audit trail records, in append order
    pub fn audit_events(&self) -> Vec<serde_json::Value> {
        let content = std::fs::read_to_string(&self.audit_path).unwrap_or_default();
        content
            .lines()
            .map(|line| serde_json::from_str(line).expect("audit line must be valid JSON"))
            .collect()
    }

    pub fn audit_events_of_type(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.audit_events()
            .into_iter()
            .filter(|e| e["event_type"] == event_type)
            .collect()
    }
}

/// JSON body for POST /bookings
pub fn booking_body(scientist_id: i64, start: &str, end: &str) -> serde_json::Value {
    serde_json::json!({
        "scientist_id": scientist_id,
        "start_utc": start,
        "end_utc": end,
        "observed_object": "M31",
    })
}
