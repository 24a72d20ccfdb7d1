//! HTTP surface tests, driving the router in-process.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::header::AUTHORIZATION;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::TestDepot;

const DEPOT: &str = r#"{
    "storages": [{
        "id": "storage0",
        "repositories": [
            {"id": "releases", "type": "hosted", "layout": "maven", "policy": "release"},
            {"id": "public", "type": "group", "layout": "maven", "members": ["releases"]}
        ]
    }],
    "access": {
        "anonymous_read": true,
        "tokens": {"t-deployer": "deployer", "t-reader": "reader"},
        "writers": ["deployer"]
    }
}"#;

const JAR: &str = "com/acme/lib/1.0/lib-1.0.jar";

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Body) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health() {
    let depot = TestDepot::new(DEPOT).await;
    let app = depot.router();

    let response = send(&app, Method::GET, "/health", None, Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["repositories"], 2);
}

#[tokio::test]
async fn test_deploy_and_download_through_group() {
    let depot = TestDepot::new(DEPOT).await;
    let app = depot.router();
    let uri = format!("/storages/storage0/releases/{}", JAR);

    let response = send(&app, Method::PUT, &uri, Some("t-deployer"), Body::from("jar bytes")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["size_bytes"], 9);
    assert!(json["checksums"]["SHA-1"].is_string());

    let response = send(
        &app,
        Method::GET,
        &format!("/storages/storage0/public/{}", JAR),
        None,
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-served-by"], "storage0:releases");
    assert_eq!(response.headers()["content-type"], "application/java-archive");
    assert_eq!(body_bytes(response).await, b"jar bytes");

    let response = send(
        &app,
        Method::GET,
        "/storages/storage0/public/com/acme/lib/maven-metadata.xml",
        None,
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_write_requires_writer_token() {
    let depot = TestDepot::new(DEPOT).await;
    let app = depot.router();
    let uri = format!("/storages/storage0/releases/{}", JAR);

    let response = send(&app, Method::PUT, &uri, None, Body::from("x")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, Method::PUT, &uri, Some("t-reader"), Body::from("x")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, Method::GET, &uri, Some("bogus"), Body::empty()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!depot.file("releases", JAR).exists());
}

#[tokio::test]
async fn test_error_statuses() {
    let depot = TestDepot::new(DEPOT).await;
    let app = depot.router();

    let response = send(
        &app,
        Method::GET,
        "/storages/storage0/public/com/acme/missing/1.0/missing-1.0.jar",
        None,
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");

    // Snapshot into a release repository
    let response = send(
        &app,
        Method::PUT,
        "/storages/storage0/releases/com/acme/lib/2.0-SNAPSHOT/lib-2.0-SNAPSHOT.jar",
        Some("t-deployer"),
        Body::from("x"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Groups do not accept uploads
    let response = send(
        &app,
        Method::PUT,
        &format!("/storages/storage0/public/{}", JAR),
        Some("t-deployer"),
        Body::from("x"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_undelete_and_purge() {
    let depot = TestDepot::new(DEPOT).await;
    let app = depot.router();
    let uri = format!("/storages/storage0/releases/{}", JAR);
    send(&app, Method::PUT, &uri, Some("t-deployer"), Body::from("jar")).await;

    let response = send(&app, Method::DELETE, &uri, Some("t-deployer"), Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["trashed"], true);

    let response = send(&app, Method::GET, &uri, None, Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let trash_uri = format!("/api/trash/storage0/releases/{}", JAR);
    let response = send(&app, Method::POST, &trash_uri, Some("t-deployer"), Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, Method::GET, &uri, None, Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, Method::POST, &trash_uri, Some("t-deployer"), Body::empty()).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    send(&app, Method::DELETE, &uri, Some("t-deployer"), Body::empty()).await;
    let response = send(
        &app,
        Method::DELETE,
        "/api/trash/storage0/releases",
        Some("t-deployer"),
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["purged"].as_u64().unwrap() >= 1);

    let response = send(&app, Method::POST, &trash_uri, Some("t-deployer"), Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_regenerate_endpoint() {
    let depot = TestDepot::new(DEPOT).await;
    let app = depot.router();
    depot.put("releases", JAR, b"jar");

    let request = |force: bool| {
        Body::from(format!(
            r#"{{"storage_id": "storage0", "repository_id": "releases", "force": {}}}"#,
            force
        ))
    };
    let regenerate = |body: Body| {
        let app = app.clone();
        async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/api/regenerate")
                .header(AUTHORIZATION, "Bearer t-deployer")
                .header("content-type", "application/json")
                .body(body)
                .unwrap();
            app.oneshot(request).await.unwrap()
        }
    };

    let response = regenerate(request(false)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["metadata_written"], 1);

    let json = body_json(regenerate(request(false)).await).await;
    assert_eq!(json["succeeded"], 0);
    assert_eq!(json["metadata_written"], 0);

    assert!(depot.file("releases", "com/acme/lib/maven-metadata.xml").exists());
}
