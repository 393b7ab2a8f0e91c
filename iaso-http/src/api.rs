//! Typed request helpers

use crate::client::{ApiClient, Transport};
use crate::config::HttpConfig;
use crate::errors::{self, HttpError};
use crate::types::{ApiRequest, Fetched, HttpMethod};
use iaso_core::ApiResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cloneable handle used by query and mutation functions
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}

impl Api {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Build an [`Api`] over a reqwest [`ApiClient`]
    pub fn from_config(config: HttpConfig) -> Result<Self, HttpError> {
        Ok(Self::new(Arc::new(ApiClient::new(config)?)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(ApiRequest::get(path)).await
    }

    /// GET that resolves to [`Fetched::Cancelled`] once `token` is cancelled
    pub async fn get_cancellable<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &CancellationToken,
    ) -> ApiResult<Fetched<T>> {
        self.request_cancellable(ApiRequest::get(path), token).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with_body(HttpMethod::Post, path, body).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with_body(HttpMethod::Patch, path, body).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_with_body(HttpMethod::Put, path, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(ApiRequest::new(HttpMethod::Delete, path)).await
    }

    /// Send a raw request and decode the body into `T`
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let body = self.transport.send(request).await?;
        decode(body)
    }

    /// Send a raw request, racing it against `token`.
    ///
    /// A request aborted through the token is dropped and resolves to
    /// [`Fetched::Cancelled`], never to an error.
    pub async fn request_cancellable<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        token: &CancellationToken,
    ) -> ApiResult<Fetched<T>> {
        if token.is_cancelled() {
            return Ok(Fetched::Cancelled);
        }
        let route = request.route();
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("{} aborted", route);
                Ok(Fetched::Cancelled)
            }
            result = self.transport.send(request) => decode(result?).map(Fetched::Data),
        }
    }

    async fn send_with_body<B, T>(&self, method: HttpMethod, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(errors::from_json)?;
        self.request(ApiRequest::new(method, path).with_body(body))
            .await
    }
}

fn decode<T: DeserializeOwned>(body: JsonValue) -> ApiResult<T> {
    serde_json::from_value(body).map_err(errors::from_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use iaso_core::ApiError;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Form {
        id: u32,
        name: String,
    }

    #[tokio::test]
    async fn test_get_decodes_typed_body() {
        let transport = MockTransport::new();
        transport.respond(
            HttpMethod::Get,
            "/api/forms/1/",
            Ok(json!({"id": 1, "name": "Census"})),
        );
        let api = Api::new(Arc::new(transport.clone()));

        let form: Form = api.get("/api/forms/1/").await.unwrap();
        assert_eq!(form, Form { id: 1, name: "Census".into() });
        assert_eq!(transport.calls("GET:/api/forms/1/"), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_is_reported() {
        let transport = MockTransport::new();
        transport.respond(HttpMethod::Get, "/api/forms/1/", Ok(json!({"id": "x"})));
        let api = Api::new(Arc::new(transport));

        let err = api.get::<Form>("/api/forms/1/").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_patch_serializes_body() {
        let transport = MockTransport::new();
        transport.respond(HttpMethod::Patch, "/api/forms/1/", Ok(json!({"id": 1, "name": "New"})));
        let api = Api::new(Arc::new(transport.clone()));

        let form: Form = api
            .patch("/api/forms/1/", &json!({"name": "New"}))
            .await
            .unwrap();
        assert_eq!(form.name, "New");
        let sent = transport.requests();
        assert_eq!(sent[0].body, Some(json!({"name": "New"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_get_resolves_to_sentinel() {
        let transport = MockTransport::new().with_delay(Duration::from_secs(5));
        transport.respond(HttpMethod::Get, "/api/tasks/", Ok(json!([])));
        let api = Api::new(Arc::new(transport));
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result: Fetched<Vec<JsonValue>> =
            api.get_cancellable("/api/tasks/", &token).await.unwrap();
        assert!(result.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_token_skips_request() {
        let transport = MockTransport::new();
        let api = Api::new(Arc::new(transport.clone()));
        let token = CancellationToken::new();
        token.cancel();

        let result: Fetched<JsonValue> = api.get_cancellable("/api/tasks/", &token).await.unwrap();
        assert!(result.is_cancelled());
        assert_eq!(transport.calls("GET:/api/tasks/"), 0);
    }

    #[tokio::test]
    async fn test_error_passes_through_cancellable_request() {
        let transport = MockTransport::new();
        transport.respond(
            HttpMethod::Get,
            "/api/tasks/",
            Err(ApiError::http(500, json!({"detail": "boom"}))),
        );
        let api = Api::new(Arc::new(transport));

        let err = api
            .get_cancellable::<JsonValue>("/api/tasks/", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
