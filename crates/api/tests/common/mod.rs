#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use swapdeck_api::auth::password::hash_password;
use swapdeck_api::config::ServerConfig;
use swapdeck_api::router::build_app_router;
use swapdeck_api::state::AppState;
use swapdeck_db::models::user::CreateUser;
use swapdeck_db::{MemoryUserStore, UserStore};
use swapdeck_upstream::UpstreamConfig;

pub const MASTER_CODE: &str = "test-master-code";

/// Smallest byte string `image::guess_format` recognises as PNG.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 0];

/// Smallest byte string recognised as JPEG.
pub const JPEG_BYTES: &[u8] = &[0xff, 0xd8, 0xff, 0xe0, 0, 0x10, b'J', b'F', b'I', b'F'];

const BOUNDARY: &str = "swapdeck-test-boundary";

/// Build a test `ServerConfig` pointing at `upstream_base_url`.
pub fn test_config(upstream_base_url: &str, max_concurrent: usize) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:10000".to_string()],
        request_timeout_secs: 30,
        max_concurrent_generations: max_concurrent,
        master_access_code: MASTER_CODE.to_string(),
        upstream: UpstreamConfig {
            base_url: upstream_base_url.to_string(),
            timeout: Duration::from_secs(5),
        },
        static_dir: "does-not-exist".to_string(),
        database_url: None,
    }
}

/// State backed by a fresh in-memory store.
pub fn test_state(upstream_base_url: &str, max_concurrent: usize) -> AppState {
    AppState::new(
        test_config(upstream_base_url, max_concurrent),
        Arc::new(MemoryUserStore::new()),
    )
}

/// Full application router with an unreachable upstream and the default
/// admission limit.
pub fn build_test_app() -> Router {
    build_app_router(test_state("http://127.0.0.1:9", 3))
}

/// Insert an account straight into the store.
pub async fn seed_user(state: &AppState, username: &str, password: &str, api_key: &str) {
    state
        .users
        .create(CreateUser {
            username: username.to_string(),
            password_hash: hash_password(password).expect("hashing should succeed"),
            upstream_api_key: api_key.to_string(),
        })
        .await
        .expect("seeding user should succeed");
}

/// Bind `router` on an ephemeral port and return its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST `body` as-is, with `content_type` if given.
pub async fn post_raw(
    app: Router,
    uri: &str,
    content_type: Option<&str>,
    body: impl Into<Body>,
) -> Response {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    app.oneshot(builder.body(body.into()).unwrap()).await.unwrap()
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

impl<'a> Part<'a> {
    pub fn image(name: &'a str, bytes: &'a [u8]) -> Self {
        Part::File {
            name,
            filename: "image.png",
            content_type: "image/png",
            bytes,
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub async fn post_multipart(app: Router, uri: &str, parts: &[Part<'_>]) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// The standard form for `/api/process-single`.
pub fn single_form<'a>(api_key: &'a str) -> Vec<Part<'a>> {
    vec![
        Part::image("faceRef", PNG_BYTES),
        Part::File {
            name: "target",
            filename: "target.jpg",
            content_type: "image/jpeg",
            bytes: JPEG_BYTES,
        },
        Part::Text("apiKey", api_key),
    ]
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
