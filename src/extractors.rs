use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::response::AppError;

/// `axum::Json<T>` whose rejection is an `AppError`, so malformed frames and
/// settings get the same JSON error body as every other failure.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        axum::Json::<T>::from_request(req, state)
            .await
            .map(|axum::Json(value)| JsonBody(value))
            .map_err(rejection_to_app_error)
    }
}

fn rejection_to_app_error(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::MissingJsonContentType(e) => {
            tracing::warn!(error = %e, "Missing JSON content type");
            AppError::bad_request("UNSUPPORTED_CONTENT_TYPE", "Expected application/json")
        }
        // serde's message names the offending field, which helps sensor clients
        JsonRejection::JsonDataError(e) => {
            tracing::warn!(error = %e, "JSON body does not match schema");
            AppError::bad_request("INVALID_REQUEST_BODY", &e.body_text())
        }
        other => {
            tracing::warn!(error = %other, "JSON body rejected");
            AppError::bad_request("INVALID_REQUEST_BODY", "Invalid request body")
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        #[allow(dead_code)]
        timestamp_ms: i64,
    }

    fn json_request(body: &str, content_type: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_json() {
        let req = json_request(r#"{"timestampMs": 5}"#, Some("application/json"));
        assert!(JsonBody::<Probe>::from_request(req, &()).await.is_ok());
    }

    #[tokio::test]
    async fn schema_mismatch_is_bad_request() {
        let req = json_request(r#"{"timestampMs": "soon"}"#, Some("application/json"));
        let err = JsonBody::<Probe>::from_request(req, &()).await.err().unwrap();
        assert_eq!(err.code, "INVALID_REQUEST_BODY");
        assert!(err.message.contains("timestampMs"));
    }

    #[tokio::test]
    async fn missing_content_type_is_reported() {
        let req = json_request(r#"{"timestampMs": 5}"#, None);
        let err = JsonBody::<Probe>::from_request(req, &()).await.err().unwrap();
        assert_eq!(err.code, "UNSUPPORTED_CONTENT_TYPE");
    }
}
