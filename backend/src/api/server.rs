//! HTTP Server for the covidash API.
//!
//! Every request parses and analyzes its own upload; nothing is cached
//! between requests.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                              |
//! |--------|-----------------------|------------------------------------------|
//! | GET    | `/health`             | Health check                             |
//! | POST   | `/api/upload`         | Upload CSV, receive the analysis as JSON |
//! | POST   | `/api/export/{kind}`  | Upload CSV, receive one table as CSV     |
//! | GET    | `/api/logs`           | SSE stream for real-time logs            |
//!
//! Uploads are multipart with a `file` field and an optional `options` field
//! holding pipeline options as JSON.

use axum::{
    extract::{Multipart, Path},
    http::{header, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::AnalysisResponse;
use crate::error::{ServerError, ServerResult};
use crate::export::{analysis_to_csv_string, ExportKind};
use crate::transform::pipeline::{analyze_bytes, AnalysisResult, PipelineOptions};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3000;

/// Environment variable overriding [`DEFAULT_PORT`].
pub const PORT_ENV: &str = "COVIDASH_PORT";

/// Port from `COVIDASH_PORT`, or [`DEFAULT_PORT`].
pub fn port_from_env() -> u16 {
    let _ = dotenvy::dotenv();
    std::env::var(PORT_ENV)
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Build the application router.
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload_csv))
        .route("/api/export/{kind}", post(export_csv))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 covidash server running on http://localhost:{}", port);
    println!("   POST /api/upload        - Upload CSV, get analysis JSON");
    println!("   POST /api/export/{{kind}} - Upload CSV, get time-series|summary|growth|weekly CSV");
    println!("   GET  /api/logs          - SSE log stream");
    println!("   GET  /health            - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "covidash",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "export": "POST /api/export/{kind}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// A parsed multipart upload.
struct Upload {
    bytes: Vec<u8>,
    file_name: Option<String>,
    options: PipelineOptions,
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    let mut bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut options = PipelineOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            "options" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                options = PipelineOptions::from_json_str(&text)?;
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))?;

    Ok(Upload {
        bytes,
        file_name,
        options,
    })
}

/// Run the synchronous pipeline off the async executor.
async fn analyze_upload(upload: Upload) -> ServerResult<AnalysisResult> {
    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        upload.file_name.as_deref().unwrap_or("unknown"),
        upload.bytes.len()
    ));

    let Upload { bytes, options, .. } = upload;
    let result = tokio::task::spawn_blocking(move || analyze_bytes(&bytes, &options))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    result.map_err(|e| {
        log_error(format!("Analysis failed: {}", e));
        ServerError::from(e)
    })
}

/// Upload CSV endpoint
async fn upload_csv(multipart: Multipart) -> ServerResult<Json<AnalysisResponse>> {
    let upload = read_upload(multipart).await?;
    let result = analyze_upload(upload).await?;
    Ok(Json(AnalysisResponse::from(result)))
}

/// Export endpoint: one analysis table as a CSV attachment
async fn export_csv(Path(kind): Path<String>, multipart: Multipart) -> ServerResult<Response> {
    let kind = ExportKind::from_name(&kind)
        .ok_or_else(|| ServerError::BadRequest(format!("Unknown export kind: {}", kind)))?;

    let upload = read_upload(multipart).await?;
    let result = analyze_upload(upload).await?;
    let body = analysis_to_csv_string(&result, kind)
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", kind.file_name()),
            ),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "covidash-test-boundary";

    const CSV_WITH_NOTES: &str = "Province/State,Country/Region,Lat,Long,3/1/20,Notes,3/2/20\n\
        ,France,46.2,2.2,100,see source,150\n\
        Ontario,Canada,51.2,-85.3,0,,10\n";

    /// Serve the router on an ephemeral port and return its base URL.
    async fn spawn_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Encode `(name, file_name, content)` parts as multipart/form-data.
    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> Vec<u8> {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(f) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n",
                    name, f
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body.into_bytes()
    }

    async fn post(url: &str, parts: &[(&str, Option<&str>, &str)]) -> reqwest::Response {
        reqwest::Client::new()
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(multipart_body(parts))
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "covidash");
    }

    #[tokio::test]
    async fn test_upload_reports_dropped_column() {
        let base = spawn_server().await;
        let response = post(
            &format!("{}/api/upload", base),
            &[("file", Some("confirmed.csv"), CSV_WITH_NOTES)],
        )
        .await;

        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "warning");
        assert!(body["jobId"].is_string());
        assert_eq!(body["warnings"][0]["label"], "Notes");
        assert_eq!(body["longCount"], 4);
        assert_eq!(body["summary"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_applies_options() {
        let base = spawn_server().await;
        let response = post(
            &format!("{}/api/upload", base),
            &[
                ("options", None, r#"{ "entities": ["France"] }"#),
                ("file", Some("confirmed.csv"), CSV_WITH_NOTES),
            ],
        )
        .await;

        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();
        let summary = body["summary"].as_array().unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0]["entity"], "France");
    }

    #[tokio::test]
    async fn test_upload_invalid_options_is_bad_request() {
        let base = spawn_server().await;
        let response = post(
            &format!("{}/api/upload", base),
            &[
                ("options", None, r#"{ "movingAverageWindow": 0 }"#),
                ("file", Some("confirmed.csv"), CSV_WITH_NOTES),
            ],
        )
        .await;

        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_upload_without_file_is_bad_request() {
        let base = spawn_server().await;
        let response = post(
            &format!("{}/api/upload", base),
            &[("options", None, "{}")],
        )
        .await;

        assert_eq!(response.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_upload_bad_count_is_unprocessable() {
        let base = spawn_server().await;
        let response = post(
            &format!("{}/api/upload", base),
            &[("file", Some("bad.csv"), "Country/Region,3/1/20\nFrance,lots\n")],
        )
        .await;

        assert_eq!(response.status().as_u16(), 422);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("lots"));
    }

    #[tokio::test]
    async fn test_export_summary_csv() {
        let base = spawn_server().await;
        let response = post(
            &format!("{}/api/export/summary", base),
            &[("file", Some("confirmed.csv"), CSV_WITH_NOTES)],
        )
        .await;

        assert_eq!(response.status().as_u16(), 200);
        let headers = response.headers().clone();
        assert!(headers[reqwest::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/csv"));
        assert!(headers[reqwest::header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains("covid_summary_statistics.csv"));

        let body = response.text().await.unwrap();
        let mut lines = body.lines();
        assert!(lines.next().unwrap().starts_with("Country/Region,Total_Cases"));
        assert!(lines.next().unwrap().starts_with("Canada,10,"));
    }

    #[tokio::test]
    async fn test_export_unknown_kind() {
        let base = spawn_server().await;
        let response = post(
            &format!("{}/api/export/charts", base),
            &[("file", Some("confirmed.csv"), CSV_WITH_NOTES)],
        )
        .await;

        assert_eq!(response.status().as_u16(), 400);
    }
}
