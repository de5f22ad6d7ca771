//! Shared helpers for integration tests: a local HTTP server that answers
//! with a scripted sequence of status codes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;

#[derive(Default)]
struct Script {
    statuses: Mutex<VecDeque<u16>>,
    hits: AtomicU32,
}

/// Handle to a running scripted server
pub struct ScriptedServer {
    pub addr: SocketAddr,
    script: Arc<Script>,
}

impl ScriptedServer {
    /// Serve `statuses` in order on every path, then 200 once the script runs out.
    pub async fn start(statuses: &[u16]) -> Self {
        let script = Arc::new(Script {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            hits: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/", get(respond))
            .route("/{*path}", get(respond))
            .with_state(script.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, script }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Number of requests received so far
    pub fn hits(&self) -> u32 {
        self.script.hits.load(Ordering::SeqCst)
    }
}

async fn respond(State(script): State<Arc<Script>>) -> StatusCode {
    script.hits.fetch_add(1, Ordering::SeqCst);
    let status = script.statuses.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap()
}

/// Address with nothing listening on it
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
