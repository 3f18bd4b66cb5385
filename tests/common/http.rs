use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

pub async fn request(app: &Router, method: Method, path: &str, body: Option<Value>) -> Response {
    request_with_headers(app, method, path, body, &[]).await
}

pub async fn request_with_headers(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }

    let req = match body {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request body"),
        None => builder.body(Body::empty()).expect("empty body"),
    };

    app.clone().oneshot(req).await.expect("oneshot response")
}

pub async fn response_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body bytes");

    let json = if bytes.is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_slice::<Value>(&bytes).expect("parse json body")
    };

    (status, headers, json)
}

/// Send a request and return `(status, body)`.
pub async fn call(app: &Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, json) = response_json(request(app, method, path, body).await).await;
    (status, json)
}

pub fn assert_json_error(body: &Value, code: &str) {
    assert_eq!(body["success"], false, "body: {body}");
    assert_eq!(body["code"], code, "body: {body}");
    assert!(body.get("message").is_some());
    assert!(body["traceId"].is_string(), "error bodies carry a traceId");
}

/// Assert a success envelope and hand back its `data`.
pub fn ok_data(status: StatusCode, body: &Value) -> Value {
    assert!(status.is_success(), "status {status}, body: {body}");
    assert_eq!(body["success"], true);
    body.get("data").cloned().expect("data field")
}
