//! Shared helpers for cutoff-server integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use cutoff_common::config::ServerConfig;
use cutoff_server::db::{self, cutoffs};
use cutoff_server::models::CutoffRecord;
use cutoff_server::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const BOUNDARY: &str = "cutoff-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub dir: TempDir,
}

/// App over an in-memory database and a temp data directory
///
/// The extractor is `sh -c <script> extractor <input> <output>`: the input
/// path is `$1` and the output path `$2`.
pub async fn setup_app(extractor_script: &str) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = ServerConfig::with_data_dir(dir.path()).unwrap();
    config.extractor_program = "sh".to_string();
    config.extractor_args = vec![
        "-c".to_string(),
        extractor_script.to_string(),
        "extractor".to_string(),
    ];
    config.extraction_timeout = Duration::from_secs(20);
    config.admin_username = "admin".to_string();
    config.admin_password = "admin123".to_string();
    config.session_secret = "integration-test-secret".to_string();
    config.ensure_directories().unwrap();

    let pool = db::init_memory_pool().await.unwrap();
    let state = AppState::new(pool, config);
    let app = build_router(state.clone());

    TestApp { app, state, dir }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// Log in with the configured credentials; returns the `Cookie` header value
    pub async fn login(&self) -> String {
        let response = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                None,
                json!({"username": "admin", "password": "admin123"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("login sets a cookie")
            .to_str()
            .unwrap()
            .to_string();
        set_cookie.split(';').next().unwrap().to_string()
    }

    pub async fn seed(&self, records: &[(&str, &str, &str, f64)]) {
        for (college, branch, category, percentile) in records {
            let record = CutoffRecord {
                college_id: None,
                college_name: college.to_string(),
                branch_id: None,
                branch_name: branch.to_string(),
                status: None,
                category: category.to_string(),
                rank: None,
                percentile: *percentile,
            };
            cutoffs::insert_record(&self.state.db, &record).await.unwrap();
        }
    }

    pub fn upload_dir_entries(&self) -> usize {
        std::fs::read_dir(self.state.config.upload_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn upload_request(file_name: &str, content: &[u8], cookie: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/admin/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = body.collect().await.expect("Should read body").to_bytes();
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// JSON payloads of every `data:` line in an SSE body
pub fn sse_payloads(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("SSE data is JSON"))
        .collect()
}

/// Read a whole SSE body; the stream ends after the terminal event
pub async fn read_sse(body: Body) -> Vec<Value> {
    let bytes = tokio::time::timeout(Duration::from_secs(30), body.collect())
        .await
        .expect("SSE stream should end after its terminal event")
        .expect("Should read SSE body")
        .to_bytes();
    sse_payloads(&String::from_utf8_lossy(&bytes))
}
