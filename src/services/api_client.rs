//! REST client for the tournament calendar API.

use std::{sync::Arc, time::Duration};

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

use crate::{
    dao::models::TournamentId,
    dto::{
        analytics::AnalyticsBatch,
        tournament::{
            AdminStatistics, BulkActionRequest, BulkActionResponse, FavoriteToggleRequest,
            FavoriteToggleResponse, RateRequest, RateResponse, TournamentDto,
            TournamentListResponse, TournamentQuery,
        },
    },
};

/// Convenient result alias returning [`ApiError`] failures.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures that can occur while talking to the calendar API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build API client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or timed out.
    #[error("failed to send API request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with a non-success status.
    #[error("unexpected API response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// The response body was not the expected JSON.
    #[error("failed to decode API response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Whether the failure happened before any response was received.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::RequestSend { .. })
    }
}

/// Handle on the calendar API; cheap to clone.
#[derive(Clone)]
pub struct CalendarApi {
    client: Client,
    base_url: Arc<str>,
    user_id: Arc<str>,
}

impl CalendarApi {
    pub fn new(
        base_url: &str,
        user_id: impl Into<Arc<str>>,
        timeout: Duration,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            user_id: user_id.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Absolute URL for an API path starting with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub async fn list_tournaments(&self, query: &TournamentQuery) -> ApiResult<Vec<TournamentDto>> {
        let query = query.to_query_string();
        let path = if query.is_empty() {
            "/api/tournaments".to_string()
        } else {
            format!("/api/tournaments?{query}")
        };
        let response: TournamentListResponse = self.fetch(Method::GET, &path, None::<&()>).await?;
        Ok(response.into_tournaments())
    }

    /// Fetch one tournament; `None` when the API does not know the id.
    pub async fn get_tournament(&self, id: TournamentId) -> ApiResult<Option<TournamentDto>> {
        match self
            .fetch(Method::GET, &format!("/api/tournaments/{id}"), None::<&()>)
            .await
        {
            Ok(tournament) => Ok(Some(tournament)),
            Err(ApiError::RequestStatus { status, .. }) if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn rate_tournament(
        &self,
        id: TournamentId,
        request: &RateRequest,
    ) -> ApiResult<RateResponse> {
        self.fetch(
            Method::POST,
            &format!("/api/tournaments/{id}/rate"),
            Some(request),
        )
        .await
    }

    pub async fn toggle_favorite(&self, id: TournamentId) -> ApiResult<FavoriteToggleResponse> {
        let body = FavoriteToggleRequest {
            user_id: self.user_id.to_string(),
        };
        self.fetch(
            Method::POST,
            &format!("/api/tournaments/{id}/toggle-favorite"),
            Some(&body),
        )
        .await
    }

    pub async fn statistics(&self) -> ApiResult<AdminStatistics> {
        self.fetch(Method::GET, "/api/admin/statistics", None::<&()>)
            .await
    }

    pub async fn bulk_action(&self, request: &BulkActionRequest) -> ApiResult<BulkActionResponse> {
        self.fetch(Method::POST, "/api/admin/bulk-action", Some(request))
            .await
    }

    /// Post an analytics batch and wait for the response status.
    pub async fn post_analytics(&self, path: &str, batch: &AnalyticsBatch) -> ApiResult<()> {
        let response = self.send(Method::POST, path, Some(batch)).await?;
        check_status(path, response.status())
    }

    async fn fetch<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body).await?;
        check_status(path, response.status())?;
        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        debug!(%method, path, "calling calendar API");
        let mut builder: RequestBuilder = self.client.request(method, self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(|source| ApiError::RequestSend {
            path: path.to_string(),
            source,
        })
    }
}

fn check_status(path: &str, status: StatusCode) -> ApiResult<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ApiError::RequestStatus {
            path: path.to_string(),
            status,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    /// Serve a single canned HTTP response; the task yields the raw request it received.
    pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0_u8; 4096];
            loop {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..read]);
                if request_complete(&request) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..split]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= split + 4 + content_length
    }
}

#[cfg(test)]
mod tests {
    use super::{test_server::serve_once, *};

    fn api(base_url: &str) -> CalendarApi {
        CalendarApi::new(base_url, "user-1", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn list_accepts_bare_array_and_sends_filters() {
        let (base_url, server) = serve_once("200 OK", r#"[{"id": 1, "name": "Moscow Open"}]"#).await;
        let query = TournamentQuery {
            status: Some("Scheduled".into()),
            ..TournamentQuery::default()
        };

        let tournaments = api(&base_url).list_tournaments(&query).await.unwrap();
        assert_eq!(tournaments.len(), 1);
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/tournaments?status=Scheduled HTTP/1.1"));
    }

    #[tokio::test]
    async fn missing_tournament_is_none() {
        let (base_url, _server) = serve_once("404 Not Found", r#"{"error": "Tournament not found"}"#).await;
        assert!(api(&base_url).get_tournament(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn toggle_favorite_posts_user_id() {
        let (base_url, server) =
            serve_once("200 OK", r#"{"is_favorite": true, "message": "added"}"#).await;

        let response = api(&base_url).toggle_favorite(5).await.unwrap();
        assert!(response.is_favorite);
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/tournaments/5/toggle-favorite"));
        assert!(request.contains(r#"{"user_id":"user-1"}"#));
    }

    #[tokio::test]
    async fn server_error_status_is_reported() {
        let (base_url, _server) = serve_once("500 Internal Server Error", "{}").await;
        let err = api(&base_url).statistics().await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::RequestStatus { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(!err.is_network());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = api("http://127.0.0.1:5000/");
        assert_eq!(api.url("/api/analytics"), "http://127.0.0.1:5000/api/analytics");
    }
}
