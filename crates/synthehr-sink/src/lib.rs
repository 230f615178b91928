//! Stand-in intake service.
//!
//! ## Purpose
//! Answers the same four endpoints a real openEHR server exposes to the
//! generator, and stores every received composition as a pretty-printed
//! JSON file instead of persisting it in an EHR.
//!
//! ## Intended use
//! Local development and tests of API-mode runs without a clinical data
//! repository.

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Default bind address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8088";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Clone)]
struct SinkState {
    storage: Arc<PathBuf>,
}

/// Router serving the intake endpoints, storing compositions under `storage`.
pub fn router(storage: PathBuf) -> Router {
    let state = SinkState {
        storage: Arc::new(storage),
    };
    Router::new()
        .route(
            "/definition/template/adl1.4",
            get(check_connection).post(receive_template),
        )
        .route("/ehr", post(create_ehr))
        .route("/ehr/:ehr_id/composition", post(receive_composition))
        .with_state(state)
}

/// Bind `addr` and serve until the process stops.
pub async fn serve(addr: SocketAddr, storage: PathBuf) -> Result<(), SinkError> {
    tokio::fs::create_dir_all(&storage).await?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        storage = %storage.display(),
        "intake sink listening"
    );
    axum::serve(listener, router(storage)).await?;
    Ok(())
}

/// Serve on an already bound listener. Used by tests binding port 0.
pub async fn serve_listener(listener: TcpListener, storage: PathBuf) -> Result<(), SinkError> {
    tokio::fs::create_dir_all(&storage).await?;
    axum::serve(listener, router(storage)).await?;
    Ok(())
}

async fn check_connection() -> Json<Value> {
    Json(json!({"status": "connected"}))
}

async fn receive_template(body: String) -> StatusCode {
    tracing::debug!(bytes = body.len(), "operational template received");
    StatusCode::OK
}

async fn create_ehr() -> Json<Value> {
    let ehr_id = uuid::Uuid::new_v4().to_string();
    tracing::debug!(ehr_id = %ehr_id, "EHR created");
    Json(json!({"ehr_id": {"value": ehr_id}}))
}

async fn receive_composition(
    State(state): State<SinkState>,
    AxumPath(ehr_id): AxumPath<String>,
    Json(payload): Json<Value>,
) -> Response {
    match store_composition(&state.storage, &ehr_id, &payload).await {
        Ok(file) => {
            tracing::debug!(ehr_id = %ehr_id, file = %file, "composition stored");
            Json(json!({"status": "success", "file": file})).into_response()
        }
        Err(err) => {
            tracing::warn!(ehr_id = %ehr_id, error = %err, "composition not stored");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Write `payload` to `<ehr_id>_<timestamp>.json`, never overwriting an
/// existing file. Returns the file name used.
async fn store_composition(storage: &Path, ehr_id: &str, payload: &Value) -> io::Result<String> {
    let safe_id: String = ehr_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%6f");
    let mut bytes = serde_json::to_vec_pretty(payload)?;
    bytes.push(b'\n');

    let mut attempt = 0_u32;
    loop {
        let filename = if attempt == 0 {
            format!("{safe_id}_{timestamp}.json")
        } else {
            format!("{safe_id}_{timestamp}_{attempt}.json")
        };
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(storage.join(&filename))
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(&bytes).await?;
                file.flush().await?;
                return Ok(filename);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => return Err(err),
        }
    }
}
