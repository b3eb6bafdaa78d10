//! Integration tests for cutoff-server HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Login/logout/status and the admin session middleware
//! - Upload validation (extension check before anything is written)
//! - Progress stream defaults for unknown jobs
//! - Predictor window, filters and suggestions
//! - Options, admin data pagination and reset

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{extract_json, json_request, request, setup_app, upload_request};
use http_body_util::BodyExt;
use serde_json::json;
use std::time::Duration;

const NO_OP_EXTRACTOR: &str = "exit 0";

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let t = setup_app(NO_OP_EXTRACTOR).await;

    let response = t.send(request("GET", "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cutoff-server");
    assert!(body["version"].is_string());
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_admin_routes_require_session() {
    let t = setup_app(NO_OP_EXTRACTOR).await;

    for (method, uri) in [
        ("GET", "/api/admin/data"),
        ("POST", "/api/admin/reset"),
        ("GET", "/api/admin/progress?fileId=7d444840-9dc0-11d1-b245-5ffdce74fad2"),
    ] {
        let response = t.send(request(method, uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["error"], "Unauthorized");
    }

    let forged = t
        .send(request("GET", "/api/admin/data", Some("admin_session=not-a-real-session")))
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let t = setup_app(NO_OP_EXTRACTOR).await;

    let wrong = t
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"username": "admin", "password": "wrong"}),
        ))
        .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(wrong.headers().get(header::SET_COOKIE).is_none());

    let missing = t
        .send(json_request("POST", "/api/auth/login", None, json!({"username": "admin"})))
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_status_logout() {
    let t = setup_app(NO_OP_EXTRACTOR).await;

    let anonymous = t.send(request("GET", "/api/auth/status", None)).await;
    let body = extract_json(anonymous.into_body()).await;
    assert_eq!(body["authenticated"], false);
    assert!(body.get("user").is_none());

    let cookie = t.login().await;
    assert!(cookie.starts_with("admin_session="));

    let status = t.send(request("GET", "/api/auth/status", Some(&cookie))).await;
    let body = extract_json(status.into_body()).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");

    let data = t.send(request("GET", "/api/admin/data", Some(&cookie))).await;
    assert_eq!(data.status(), StatusCode::OK);

    let logout = t.send(request("POST", "/api/auth/logout", Some(&cookie))).await;
    assert_eq!(logout.status(), StatusCode::OK);
    let cleared = logout
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cleared.starts_with("admin_session=;"));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_session_cookie_attributes() {
    let t = setup_app(NO_OP_EXTRACTOR).await;
    let response = t
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({"username": "admin", "password": "admin123"}),
        ))
        .await;

    let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=86400"));
    assert!(!set_cookie.contains("Secure"));
}

// =============================================================================
// Upload validation
// =============================================================================

#[tokio::test]
async fn test_upload_rejects_non_pdf_without_writing() {
    let t = setup_app(NO_OP_EXTRACTOR).await;
    let cookie = t.login().await;

    let response = t
        .send(upload_request("cutoffs.xlsx", b"PK\x03\x04", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Only PDF files are allowed");

    assert_eq!(t.upload_dir_entries(), 0);
    assert_eq!(t.state.progress.job_count(), 0);
}

#[tokio::test]
async fn test_upload_without_session_writes_nothing() {
    let t = setup_app(NO_OP_EXTRACTOR).await;

    let response = t.send(upload_request("cutoffs.pdf", b"%PDF-1.7", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(t.upload_dir_entries(), 0);
}

// =============================================================================
// Progress stream
// =============================================================================

#[tokio::test]
async fn test_progress_unknown_job_sends_waiting_first() {
    let t = setup_app(NO_OP_EXTRACTOR).await;
    let cookie = t.login().await;

    let response = t
        .send(request(
            "GET",
            "/api/admin/progress?fileId=7d444840-9dc0-11d1-b245-5ffdce74fad2",
            Some(&cookie),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("first frame arrives immediately")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    let events = common::sse_payloads(&text);

    assert_eq!(events[0], json!({"progress": 0, "statusText": "Waiting to start..."}));

    drop(body);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(t.state.progress.subscriber_count(), 0);
}

#[tokio::test]
async fn test_progress_requires_valid_file_id() {
    let t = setup_app(NO_OP_EXTRACTOR).await;
    let cookie = t.login().await;

    let missing = t.send(request("GET", "/api/admin/progress", Some(&cookie))).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let invalid = t
        .send(request("GET", "/api/admin/progress?fileId=abc", Some(&cookie)))
        .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Predictor
// =============================================================================

async fn seeded_app() -> common::TestApp {
    let t = setup_app(NO_OP_EXTRACTOR).await;
    t.seed(&[
        ("COEP Technological University", "Computer Engineering", "OPEN", 99.2),
        ("COEP Technological University", "Civil Engineering", "OPEN", 92.4),
        ("COEP Technological University", "Civil Engineering", "OBC", 88.0),
        ("VJTI Mumbai", "Electrical Engineering", "OPEN", 85.1),
        ("VJTI Mumbai", "Mechanical Engineering", "open", 81.7),
        ("PICT Pune", "Information Technology", "OPEN", 79.9),
        ("PICT Pune", "Computer Engineering", "SC", 70.0),
    ])
    .await;
    t
}

#[tokio::test]
async fn test_predict_percentile_window() {
    let t = seeded_app().await;

    let response = t
        .send(json_request("POST", "/api/predict", None, json!({"percentile": 90})))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    let colleges = body["colleges"].as_array().unwrap();
    assert_eq!(body["total"], 5);
    assert_eq!(colleges.len(), 5);
    for college in colleges {
        let p = college["percentile"].as_f64().unwrap();
        assert!((80.0..=100.0).contains(&p), "{p} outside window");
    }
    let percentiles: Vec<f64> = colleges.iter().map(|c| c["percentile"].as_f64().unwrap()).collect();
    assert!(percentiles.windows(2).all(|w| w[0] >= w[1]));
    assert!(body.get("suggestions").is_none());
}

#[tokio::test]
async fn test_predict_category_exact_case_sensitive() {
    let t = seeded_app().await;

    let response = t
        .send(json_request(
            "POST",
            "/api/predict",
            None,
            json!({"percentile": "90", "category": "OPEN"}),
        ))
        .await;
    let body = extract_json(response.into_body()).await;

    let colleges = body["colleges"].as_array().unwrap();
    assert_eq!(colleges.len(), 3);
    assert!(colleges.iter().all(|c| c["category"] == "OPEN"));
}

#[tokio::test]
async fn test_predict_suggestions_on_empty_result() {
    let t = seeded_app().await;

    let response = t
        .send(json_request(
            "POST",
            "/api/predict",
            None,
            json!({"percentile": 95, "branch_name": "Nonexistent"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["total"], 0);
    let branches = body["suggestions"]["branch_name"].as_array().unwrap();
    assert!(!branches.is_empty() && branches.len() <= 5);
    assert!(branches.contains(&json!("Computer Engineering")));
}

#[tokio::test]
async fn test_predict_requires_percentile() {
    let t = seeded_app().await;

    let response = t
        .send(json_request("POST", "/api/predict", None, json!({"category": "OPEN"})))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Percentile is required");
}

#[tokio::test]
async fn test_malformed_json_bodies_get_structured_errors() {
    let t = seeded_app().await;
    let cookie = t.login().await;

    let malformed = |uri: &str, cookie: Option<&str>| {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from("{\"percentile\": ")).unwrap()
    };

    for request in [
        malformed("/api/predict", None),
        malformed("/api/auth/login", None),
        malformed("/api/admin/process", Some(&cookie)),
    ] {
        let response = t.send(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    // Missing content type is a 400 with a JSON body too
    let response = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/api/predict")
                .body(Body::from(json!({"percentile": 90}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_read_endpoints_fall_back_when_store_is_down() {
    let t = seeded_app().await;
    let cookie = t.login().await;
    t.state.db.close().await;

    let response = t.send(request("GET", "/api/options", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["colleges"], json!([]));
    assert_eq!(body["branches"], json!([]));
    assert_eq!(body["categories"], json!([]));
    assert_eq!(body["code"], "STORE_UNAVAILABLE");

    let response = t
        .send(json_request("POST", "/api/predict", None, json!({"percentile": 90})))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["colleges"], json!([]));
    assert_eq!(body["total"], 0);

    let response = t.send(request("GET", "/api/admin/data", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"], json!([]));
    assert!(body["error"].is_string());
}

// =============================================================================
// Options, data browsing and reset
// =============================================================================

#[tokio::test]
async fn test_options_sorted_distinct() {
    let t = seeded_app().await;

    let body = extract_json(t.send(request("GET", "/api/options", None)).await.into_body()).await;
    assert_eq!(
        body["colleges"],
        json!(["COEP Technological University", "PICT Pune", "VJTI Mumbai"])
    );
    assert_eq!(body["categories"], json!(["OBC", "OPEN", "SC", "open"]));
    assert_eq!(body["branches"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_admin_data_pagination() {
    let t = seeded_app().await;
    let cookie = t.login().await;

    let body = extract_json(
        t.send(request("GET", "/api/admin/data?page=1", Some(&cookie)))
            .await
            .into_body(),
    )
    .await;
    assert_eq!(body["count"], 7);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pageSize"], 100);
    assert_eq!(body["totalPages"], 1);
    assert_eq!(body["data"][0]["college_name"], "COEP Technological University");
    assert_eq!(body["data"][0]["branch_name"], "Civil Engineering");
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let t = seeded_app().await;
    let cookie = t.login().await;

    let response = t.send(request("POST", "/api/admin/reset", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["details"]["database"]["recordsBefore"], 7);
    assert_eq!(body["details"]["database"]["recordsAfter"], 0);
    assert_eq!(body["details"]["outputJson"], "Cleared");

    let snapshot = std::fs::read_to_string(t.state.config.snapshot_path()).unwrap();
    assert_eq!(snapshot.trim(), "[]");

    let options = extract_json(t.send(request("GET", "/api/options", None)).await.into_body()).await;
    assert_eq!(options, json!({"colleges": [], "branches": [], "categories": []}));

    let data = extract_json(
        t.send(request("GET", "/api/admin/data", Some(&cookie)))
            .await
            .into_body(),
    )
    .await;
    assert_eq!(data["data"], json!([]));
    assert!(data["message"].is_string());
}

#[tokio::test]
async fn test_process_unknown_file_is_not_found() {
    let t = setup_app(NO_OP_EXTRACTOR).await;
    let cookie = t.login().await;

    let response = t
        .send(json_request(
            "POST",
            "/api/admin/process",
            Some(&cookie),
            json!({"fileId": "7d444840-9dc0-11d1-b245-5ffdce74fad2"}),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let missing = t
        .send(json_request("POST", "/api/admin/process", Some(&cookie), json!({})))
        .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}
