//! Collect command - development collector for uploaded frames
//!
//! Accepts `POST /upload` with `{"image": "data:image/jpeg;base64,..."}`,
//! decodes the frame and logs its size. Nothing is written to disk.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use base64::prelude::*;
use clap::Args;
use screenstream_core::output::UploadPayload;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for the collect command
#[derive(Args)]
pub struct CollectArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, default_value = "5000")]
    port: u16,
}

#[derive(Default)]
struct CollectorState {
    accepted: AtomicU64,
    rejected: AtomicU64,
    bytes: AtomicU64,
}

/// Run the collector until Ctrl+C
pub async fn collect(args: CollectArgs) -> Result<()> {
    let state = Arc::new(CollectorState::default());

    let app = Router::new()
        .route("/upload", post(receive_frame))
        .route("/status", get(get_status))
        .with_state(state.clone());

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind collector on {}", addr))?;

    println!("screenstream - Collector\n");
    println!("  Listening on http://{}/upload", addr);
    println!();
    println!("Press Ctrl+C to stop...\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Collector server error")?;

    println!(
        "Collector stopped: {} frames accepted ({} bytes), {} rejected",
        state.accepted.load(Ordering::Relaxed),
        state.bytes.load(Ordering::Relaxed),
        state.rejected.load(Ordering::Relaxed)
    );
    Ok(())
}

/// Decode a `data:<mime>;base64,<payload>` URI into its bytes
fn decode_data_uri(uri: &str) -> Result<Vec<u8>, String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or("missing data: scheme")?;
    let (meta, payload) = rest.split_once(',').ok_or("missing payload separator")?;
    if !meta.ends_with(";base64") {
        return Err(format!("unsupported encoding: {}", meta));
    }
    BASE64_STANDARD
        .decode(payload)
        .map_err(|e| format!("invalid base64: {}", e))
}

async fn receive_frame(
    State(state): State<Arc<CollectorState>>,
    Json(body): Json<UploadPayload>,
) -> impl IntoResponse {
    let decoded = decode_data_uri(&body.image).and_then(|bytes| {
        image::load_from_memory(&bytes)
            .map(|img| (bytes.len(), img.width(), img.height()))
            .map_err(|e| format!("undecodable image: {}", e))
    });

    match decoded {
        Ok((len, width, height)) => {
            let n = state.accepted.fetch_add(1, Ordering::Relaxed) + 1;
            state.bytes.fetch_add(len as u64, Ordering::Relaxed);
            info!("Frame #{}: {}x{}, {} bytes", n, width, height, len);
            (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
        }
        Err(e) => {
            state.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("Rejected upload: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e })),
            )
        }
    }
}

async fn get_status(State(state): State<Arc<CollectorState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "accepted": state.accepted.load(Ordering::Relaxed),
        "rejected": state.rejected.load(Ordering::Relaxed),
        "bytes": state.bytes.load(Ordering::Relaxed),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_uri() {
        let uri = format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode([1u8, 2, 3]));
        assert_eq!(decode_data_uri(&uri).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_data_uri_rejects_garbage() {
        assert!(decode_data_uri("image/jpeg;base64,AAAA").is_err());
        assert!(decode_data_uri("data:image/jpeg,AAAA").is_err());
        assert!(decode_data_uri("data:image/jpeg;base64,@@@").is_err());
    }
}
