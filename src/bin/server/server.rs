//! HTTP server for digit prediction.

use crate::config::ServerConfig;
use crate::digit::{
    DigitEngine, PredictResponse, SharedDigitEngine, is_client_error, save_display_copy,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use digit_recognizer::core::{DigitError, ErrorKind};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// URL prefix under which saved display copies are served
const UPLOADS_ROUTE: &str = "/static/uploads";

/// Application state shared across handlers
struct AppState {
    engine: SharedDigitEngine,
    upload_dir: Option<PathBuf>,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

/// An uploaded image pulled out of the multipart body
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

/// Run the HTTP server
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing digit engine...");
    let engine = Arc::new(DigitEngine::new_degraded(&config.digit)?);
    if engine.is_ready() {
        info!("Digit engine initialized successfully");
    } else {
        warn!("Digit engine started without a model; predictions will return 503");
    }

    let state = Arc::new(AppState {
        engine,
        upload_dir: config.upload_dir.clone(),
    });

    let app = build_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health          - Health check");
    info!("  POST /predict         - Digit prediction (multipart field 'image')");
    info!("  POST /api/v1/predict  - Digit prediction (versioned API)");
    info!("  GET  /static/samples  - Sample images");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .route("/api/v1/predict", post(predict_handler))
        .nest_service("/static/samples", ServeDir::new(&config.samples_dir));

    if let Some(dir) = &config.upload_dir {
        app = app.nest_service(UPLOADS_ROUTE, ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let model_loaded = state.engine.is_ready();
    Json(HealthResponse {
        status: if model_loaded { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded,
        model: state.engine.model_name().map(str::to_string),
    })
}

/// Digit prediction endpoint
async fn predict_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let request_id = uuid::Uuid::new_v4().to_string();

    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!(request_id = %request_id, error = %rejection.body_text(), "Request is not multipart");
            return (
                StatusCode::BAD_REQUEST,
                Json(PredictResponse::error("No image uploaded".to_string())),
            );
        }
    };

    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err((status, message)) => {
            warn!(request_id = %request_id, status = %status, "{}", message);
            return (status, Json(PredictResponse::error(message)));
        }
    };

    info!(
        request_id = %request_id,
        filename = %upload.filename,
        bytes = upload.bytes.len(),
        "Processing prediction request"
    );

    let start = Instant::now();
    let engine = Arc::clone(&state.engine);
    let upload_dir = state.upload_dir.clone();
    let task_request_id = request_id.clone();

    let result = tokio::task::spawn_blocking(move || {
        let prediction = engine.predict(&upload.bytes)?;
        let image_path = upload_dir.and_then(|dir| {
            match save_display_copy(&upload.bytes, &dir, &upload.filename) {
                Ok(path) => path
                    .file_name()
                    .map(|name| format!("{}/{}", UPLOADS_ROUTE, name.to_string_lossy())),
                Err(e) => {
                    warn!(request_id = %task_request_id, error = %e, "Display copy not saved");
                    None
                }
            }
        });
        Ok::<_, DigitError>((prediction, image_path))
    })
    .await;

    let (prediction, image_path) = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!(request_id = %request_id, error = %e, kind = %e.kind(), "Prediction failed");
            return (status_for(&e), Json(PredictResponse::error(e.to_string())));
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Prediction task panicked");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PredictResponse::error(format!("Prediction failed: {}", e))),
            );
        }
    };

    let processing_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!(
        request_id = %request_id,
        digit = prediction.digit,
        confidence = prediction.confidence,
        total_ms = processing_ms,
        "Prediction completed"
    );

    (
        StatusCode::OK,
        Json(PredictResponse::from_prediction(
            &prediction,
            image_path,
            processing_ms,
        )),
    )
}

/// Pull the `image` field out of a multipart body.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, (StatusCode, String)> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| (e.status(), e.body_text()))?;
        let Some(field) = field else {
            return Err((StatusCode::BAD_REQUEST, "No image uploaded".to_string()));
        };
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "No image selected".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| (e.status(), e.body_text()))?;
        return Ok(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
}

/// HTTP status for a failed prediction
fn status_for(err: &DigitError) -> StatusCode {
    if is_client_error(err) {
        return StatusCode::BAD_REQUEST;
    }
    match err.kind() {
        ErrorKind::ScorerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DigitConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use digit_recognizer::predictors::predict_digit;
    use digit_recognizer::processors::ResizeFilter;
    use tower::ServiceExt;

    const BOUNDARY: &str = "digit-test-boundary";

    fn degraded_router() -> Router {
        let config = ServerConfig {
            digit: DigitConfig {
                model: PathBuf::from("no/such/model.onnx"),
                device: "cpu".to_string(),
                ort_config: None,
                session_pool_size: 1,
                threads: None,
                resize_filter: ResizeFilter::CatmullRom,
            },
            host: "127.0.0.1".to_string(),
            port: 0,
            samples_dir: PathBuf::from("static/samples"),
            upload_dir: None,
            max_upload_bytes: 1024 * 1024,
        };
        let state = Arc::new(AppState {
            engine: Arc::new(DigitEngine::new_degraded(&config.digit).unwrap()),
            upload_dir: None,
        });
        build_router(state, &config)
    }

    fn multipart_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::post("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = degraded_router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_non_multipart_request_gets_json_error() {
        let request = Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"image": "seven.png"}"#))
            .unwrap();

        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_missing_image_field() {
        let (status, json) = send(multipart_request("file", "seven.png", b"abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No image uploaded");
    }

    #[tokio::test]
    async fn test_empty_filename() {
        let (status, json) = send(multipart_request("image", "", b"abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No image selected");
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_bad_request() {
        let (status, json) = send(multipart_request("image", "seven.png", b"not a png")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn test_health_reports_degraded() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["model_loaded"], false);
    }

    #[test]
    fn test_status_mapping() {
        let decode = predict_digit(b"garbage", None).unwrap_err();
        assert_eq!(status_for(&decode), StatusCode::BAD_REQUEST);

        assert_eq!(
            status_for(&DigitError::scorer_unavailable("no model loaded")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&DigitError::malformed_scores("mock", "expected 10 scores, got 3")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
