//! Body and path extractors that reject with the JSON error body.
//!
//! axum's own `Json` and `Path` rejections answer in plain text. These
//! wrappers turn every rejection into a 400 `VALIDATION_FAILED` through
//! [`ApiError`].

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::adapters::http::error::ApiError;
use crate::domain::foundation::ValidationError;

fn rejected(field: &str, reason: impl Into<String>) -> ApiError {
    ValidationError::invalid_format(field, reason).into()
}

/// Required JSON body.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| rejected("body", rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// JSON body that may be left out entirely.
///
/// An empty body yields `T::default()`. Anything else must parse as `T`.
#[derive(Debug, Clone)]
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| rejected("body", rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|err| rejected("body", err.to_string()))
    }
}

/// Path parameters.
#[derive(Debug, Clone)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| rejected("id", rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        reason: Option<String>,
        #[serde(default)]
        refund_deposit: bool,
    }

    async fn echo(ApiPath(id): ApiPath<Uuid>, OptionalJson(note): OptionalJson<Note>) -> String {
        format!("{} {:?} {}", id, note.reason, note.refund_deposit)
    }

    async fn strict(ApiJson(note): ApiJson<Note>) -> String {
        format!("{:?}", note.reason)
    }

    fn router() -> Router {
        Router::new()
            .route("/:id", post(echo))
            .route("/strict", post(strict))
    }

    async fn call(uri: &str, body: &'static str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Optional Body Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn empty_body_uses_defaults() {
        let id = Uuid::new_v4();
        let (status, body) = call(&format!("/{}", id), "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{} None false", id));
    }

    #[tokio::test]
    async fn well_formed_body_is_used() {
        let id = Uuid::new_v4();
        let (status, body) = call(
            &format!("/{}", id),
            r#"{"reason":"relocating","refundDeposit":true}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, format!("{} Some(\"relocating\") true", id));
    }

    #[tokio::test]
    async fn mistyped_body_is_rejected_as_json() {
        let id = Uuid::new_v4();
        let (status, body) = call(
            &format!("/{}", id),
            r#"{"reason":"relocating","refundDeposit":"yes"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error["code"], "VALIDATION_FAILED");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Path And Required Body Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn malformed_id_is_rejected_as_json() {
        let (status, body) = call("/not-a-uuid", "").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn required_body_rejects_bad_json() {
        let (status, body) = call("/strict", "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error["code"], "VALIDATION_FAILED");
    }
}
