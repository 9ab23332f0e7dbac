//! Proof image uploads to the external object store.
//!
//! Only the resulting public URL is persisted; the bytes never touch the
//! database.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::error::ServerError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `bytes` under `key` and return the object's public URL.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<String, ServerError>;
}

/// Object key for a proof image: `{user_id}/{random}.{ext}`.
///
/// The extension comes from the uploaded filename when it is purely
/// alphanumeric, otherwise `png`.
pub fn proof_key(user_id: Uuid, filename: Option<&str>) -> String {
    let ext = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| "png".to_string());
    format!("{user_id}/{}.{ext}", Uuid::new_v4())
}

/// Storage-API compatible bucket client.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        bucket: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            api_key,
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, ServerError> {
        if bytes.is_empty() {
            return Err(ServerError::BadRequest("Empty upload".into()));
        }

        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key);
        let size = bytes.len();

        let mut request = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key).header("apikey", api_key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| ServerError::Internal(format!("object store unreachable: {e}")))?;

        if !resp.status().is_success() {
            return Err(ServerError::Internal(format!(
                "object store responded {}",
                resp.status()
            )));
        }

        tracing::debug!(key = %key, size, "proof uploaded");
        Ok(self.public_url(key))
    }
}

/// Used when no object store is configured; every upload fails, which the
/// submission flow tolerates.
pub struct DisabledObjectStore;

#[async_trait]
impl ObjectStore for DisabledObjectStore {
    async fn put(
        &self,
        _key: &str,
        _bytes: Bytes,
        _content_type: &str,
    ) -> Result<String, ServerError> {
        Err(ServerError::Internal("proof storage is not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_proof_key_extension() {
        let user = Uuid::new_v4();

        let key = proof_key(user, Some("Screenshot 2024.JPG"));
        assert!(key.starts_with(&format!("{user}/")));
        assert!(key.ends_with(".jpg"));

        assert!(proof_key(user, None).ends_with(".png"));
        assert!(proof_key(user, Some("noext")).ends_with(".png"));
        assert!(proof_key(user, Some("evil.p/../hp")).ends_with(".png"));
        assert_ne!(proof_key(user, None), proof_key(user, None));
    }

    #[test]
    fn test_public_url() {
        let store =
            HttpObjectStore::new(reqwest::Client::new(), "https://x.example/", "proofs", None);
        assert_eq!(
            store.public_url("u/1.png"),
            "https://x.example/storage/v1/object/public/proofs/u/1.png"
        );
    }

    #[tokio::test]
    async fn test_disabled_store_fails() {
        let result = DisabledObjectStore
            .put("a/b.png", Bytes::from_static(b"x"), "image/png")
            .await;
        assert!(result.is_err());
    }

    type Received = Arc<Mutex<Vec<(String, String, usize)>>>;

    async fn spawn_fake_storage(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let app = Router::new().route(
            "/storage/v1/object/:bucket/*key",
            post(
                move |Path((bucket, key)): Path<(String, String)>,
                      headers: HeaderMap,
                      body: Bytes| async move {
                    assert_eq!(
                        headers.get("apikey").and_then(|v| v.to_str().ok()),
                        Some("service")
                    );
                    sink.lock().unwrap().push((bucket, key, body.len()));
                    status
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }

    #[tokio::test]
    async fn test_http_store_uploads() {
        let (base, received) = spawn_fake_storage(StatusCode::OK).await;
        let store =
            HttpObjectStore::new(reqwest::Client::new(), &base, "proofs", Some("service".into()));

        let url = store
            .put("user/abc.png", Bytes::from_static(b"\x89PNG"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, format!("{base}/storage/v1/object/public/proofs/user/abc.png"));

        let got = received.lock().unwrap().clone();
        assert_eq!(got, vec![("proofs".to_string(), "user/abc.png".to_string(), 4)]);
    }

    #[tokio::test]
    async fn test_http_store_error_status() {
        let (base, _) = spawn_fake_storage(StatusCode::FORBIDDEN).await;
        let store =
            HttpObjectStore::new(reqwest::Client::new(), &base, "proofs", Some("service".into()));
        assert!(store
            .put("user/abc.png", Bytes::from_static(b"x"), "image/png")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_http_store_rejects_empty() {
        let store =
            HttpObjectStore::new(reqwest::Client::new(), "http://127.0.0.1:1", "proofs", None);
        assert!(store.put("k.png", Bytes::new(), "image/png").await.is_err());
    }
}
