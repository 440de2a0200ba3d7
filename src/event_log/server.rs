use super::store::{EventStore, LogEntry};
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted POST body. A motion record is ~40 bytes.
pub const MAX_BODY_BYTES: usize = 4 * 1024;

pub type SharedStore = Arc<EventStore>;

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/resource", get(list_handler).post(append_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_request))
        .with_state(store)
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Stores one record. Accepts any JSON object carrying a `timestamp`.
async fn append_handler(State(store): State<SharedStore>, body: Bytes) -> Response {
    let data: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return error_reply(StatusCode::BAD_REQUEST, "No JSON data received"),
    };

    let fields = match data.as_object() {
        Some(map) if !map.is_empty() => map,
        _ => return error_reply(StatusCode::BAD_REQUEST, "No JSON data received"),
    };

    let timestamp = match fields.get("timestamp") {
        None | Some(Value::Null) => {
            return error_reply(StatusCode::BAD_REQUEST, "Missing 'timestamp' in the request")
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    match store.append(&timestamp).await {
        Ok(entry) => {
            log::info!("Stored motion record #{}: timestamp={}", entry.id, entry.timestamp);
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Data received successfully",
                    "timestamp": entry.timestamp,
                })),
            )
                .into_response()
        }
        Err(e) => {
            log::error!("Failed to store motion record: {}", e);
            error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn list_handler(State(store): State<SharedStore>) -> Json<Vec<LogEntry>> {
    Json(store.list().await)
}

async fn index_handler(State(store): State<SharedStore>) -> Html<String> {
    Html(render_index(&store.list().await))
}

pub fn render_index(entries: &[LogEntry]) -> String {
    let mut rows = String::new();
    for entry in entries {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            entry.id,
            escape_html(&entry.timestamp),
            escape_html(&entry.received_at)
        ));
    }
    if entries.is_empty() {
        rows.push_str("<tr><td colspan=\"3\">No motion recorded yet</td></tr>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Motion Logs</title></head>\n<body>\n<h1>Motion Logs</h1>\n<table border=\"1\">\n<tr><th>ID</th><th>Timestamp</th><th>Received</th></tr>\n{}</table>\n</body>\n</html>\n",
        rows
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest};
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn temp_db(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "motion_sentry_server_{}_{}.jsonl",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn app(name: &str) -> (Router, SharedStore, PathBuf) {
        let path = temp_db(name);
        let store = Arc::new(EventStore::open(&path).await.unwrap());
        (router(store.clone()), store, path)
    }

    fn post(body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri("/api/resource")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_post_stores_record() {
        let (app, store, path) = app("post").await;

        let response = app
            .oneshot(post(r#"{"timestamp":"2024-11-02 11:04:09"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Data received successfully");
        assert_eq!(body["timestamp"], "2024-11-02 11:04:09");
        assert_eq!(store.list().await[0].timestamp, "2024-11-02 11:04:09");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_post_rejects_bad_bodies() {
        let (app, store, path) = app("reject").await;

        for body in ["", "not json", "{}", r#"{"id": 4}"#, r#"{"timestamp": null}"#] {
            let response = app.clone().oneshot(post(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
            assert!(body_json(response).await["error"].is_string());
        }
        assert!(store.list().await.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let (app, _store, path) = app("oversized").await;
        let big = format!(r#"{{"timestamp":"{}"}}"#, "x".repeat(MAX_BODY_BYTES));
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/resource")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, big.len())
            .body(Body::from(big))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_listing_newest_first() {
        let (app, store, path) = app("listing").await;
        store.append("2024-11-02 11:04:09").await.unwrap();
        store.append("2024-11-02 11:09:41").await.unwrap();

        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/resource")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let listed = body_json(response).await;
        assert_eq!(listed[0]["id"], 2);
        assert_eq!(listed[1]["timestamp"], "2024-11-02 11:04:09");

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        let newer = html.find("11:09:41").unwrap();
        let older = html.find("11:04:09").unwrap();
        assert!(newer < older);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_render_escapes_markup() {
        let html = render_index(&[LogEntry {
            id: 1,
            timestamp: "<script>".to_string(),
            received_at: "now".to_string(),
        }]);
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
