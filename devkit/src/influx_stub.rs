/*!
Mock InfluxDB 1.x write endpoint.

Serves `POST /write` on `127.0.0.1:<ephemeral>` and records each call
(database, precision, line protocol body). Answers 204 like InfluxDB, or a
configured failure status.
*/

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub database: Option<String>,
    pub precision: Option<String>,
    pub body: String,
}

#[derive(Clone, Default)]
struct Recorder {
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    /// 0 = answer 204
    fail_status: Arc<AtomicU16>,
}

pub struct MockInfluxServer {
    addr: SocketAddr,
    recorder: Recorder,
}

impl MockInfluxServer {
    pub async fn start() -> Result<Self> {
        let recorder = Recorder::default();
        let app = Router::new()
            .route("/write", post(record_write))
            .with_state(recorder.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("[MOCK] influx server stopped: {e}");
            }
        });

        Ok(Self { addr, recorder })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Answer every following write with `status` (still recorded).
    pub fn fail_with(&self, status: u16) {
        self.recorder.fail_status.store(status, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.recorder.writes.lock().unwrap().clone()
    }
}

async fn record_write(
    State(recorder): State<Recorder>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> (StatusCode, String) {
    recorder.writes.lock().unwrap().push(RecordedWrite {
        database: params.get("db").cloned(),
        precision: params.get("precision").cloned(),
        body,
    });

    match recorder.fail_status.load(Ordering::SeqCst) {
        0 => (StatusCode::NO_CONTENT, String::new()),
        code => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "{\"error\":\"mock failure\"}".to_string())
        }
    }
}
