//! Buffered analytics events with periodic and on-unload delivery.

use std::{sync::Arc, time::Duration};

use futures::{FutureExt, future::BoxFuture};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use serde_with::{DurationMilliSeconds, serde_as};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{runtime::Handle, sync::Mutex, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::models::TournamentId,
    dto::{
        analytics::{AnalyticsBatch, AnalyticsEvent, ClientContext},
        format_timestamp,
    },
    services::api_client::{ApiError, CalendarApi},
};

/// Which events survive when a failed batch is merged back into a full buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimPolicy {
    /// Keep the unsent batch and drop the newest events.
    #[default]
    KeepOldest,
    /// Keep the most recent events and drop the oldest unsent ones.
    KeepNewest,
}

/// Buffering and delivery settings.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSettings {
    /// API path the batches are posted to.
    pub endpoint: String,
    pub max_events: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "flush_interval_ms")]
    pub flush_interval: Duration,
    pub trim_policy: TrimPolicy,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            endpoint: "/api/analytics".into(),
            max_events: 100,
            flush_interval: Duration::from_secs(30),
            trim_policy: TrimPolicy::KeepOldest,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("analytics transport unavailable: {0}")]
    Unavailable(String),
}

/// Delivery channel for analytics batches.
pub trait AnalyticsTransport: Send + Sync {
    /// Deliver a batch and report the outcome.
    fn send<'a>(&'a self, batch: &'a AnalyticsBatch) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Hand a batch off without waiting for delivery.
    ///
    /// Returns `false` when fire-and-forget delivery is not available, in which case the caller
    /// falls back to [`AnalyticsTransport::send`].
    fn beacon(&self, batch: &AnalyticsBatch) -> bool;
}

/// Transport posting batches to the calendar API.
pub struct HttpTransport {
    api: CalendarApi,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(api: CalendarApi, endpoint: impl Into<String>) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
        }
    }
}

impl AnalyticsTransport for HttpTransport {
    fn send<'a>(&'a self, batch: &'a AnalyticsBatch) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            self.api.post_analytics(&self.endpoint, batch).await?;
            Ok(())
        }
        .boxed()
    }

    fn beacon(&self, batch: &AnalyticsBatch) -> bool {
        let Ok(handle) = Handle::try_current() else {
            return false;
        };
        let request = self
            .api
            .client()
            .post(self.api.url(&self.endpoint))
            .json(batch);
        let count = batch.events.len();
        handle.spawn(async move {
            match request.send().await {
                Ok(response) => debug!(count, status = %response.status(), "analytics beacon delivered"),
                Err(err) => debug!(count, error = %err, "analytics beacon lost"),
            }
        });
        true
    }
}

/// Client-side analytics buffer.
pub struct AnalyticsClient {
    transport: Arc<dyn AnalyticsTransport>,
    buffer: Mutex<Vec<AnalyticsEvent>>,
    session_id: String,
    user_id: String,
    context: ClientContext,
    settings: AnalyticsSettings,
}

impl AnalyticsClient {
    pub fn new(
        transport: Arc<dyn AnalyticsTransport>,
        user_id: impl Into<String>,
        context: ClientContext,
        settings: AnalyticsSettings,
    ) -> Self {
        Self {
            transport,
            buffer: Mutex::new(Vec::new()),
            session_id: generate_session_id(OffsetDateTime::now_utc()),
            user_id: user_id.into(),
            context,
            settings,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn settings(&self) -> &AnalyticsSettings {
        &self.settings
    }

    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Buffer an event; a full buffer is flushed right away.
    pub async fn track(&self, event: &str, payload: Map<String, Value>) {
        let event = AnalyticsEvent::new(
            event,
            &self.session_id,
            format_timestamp(OffsetDateTime::now_utc()),
            &self.context,
            payload,
        );

        let full = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(event);
            buffer.len() >= self.settings.max_events
        };
        if full {
            if let Err(err) = self.flush(false).await {
                warn!(error = %err, "analytics flush on full buffer failed");
            }
        }
    }

    /// Send everything buffered; returns how many events were handed to the transport.
    ///
    /// With `is_unload` the batch is beaconed and never awaited. A failed send puts the batch
    /// back in front of events tracked meanwhile, trimmed to the buffer cap.
    pub async fn flush(&self, is_unload: bool) -> Result<usize, TransportError> {
        let events = {
            let mut buffer = self.buffer.lock().await;
            if buffer.is_empty() {
                return Ok(0);
            }
            std::mem::take(&mut *buffer)
        };
        let batch = AnalyticsBatch {
            events,
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
        };
        let count = batch.events.len();

        if is_unload && self.transport.beacon(&batch) {
            debug!(count, "analytics batch beaconed");
            return Ok(count);
        }

        match self.transport.send(&batch).await {
            Ok(()) => {
                debug!(count, "analytics batch flushed");
                Ok(count)
            }
            Err(err) => {
                self.restore(batch.events).await;
                Err(err)
            }
        }
    }

    async fn restore(&self, unsent: Vec<AnalyticsEvent>) {
        let mut buffer = self.buffer.lock().await;
        let mut merged = unsent;
        merged.append(&mut buffer);
        let cap = self.settings.max_events;
        if merged.len() > cap {
            let dropped = merged.len() - cap;
            match self.settings.trim_policy {
                TrimPolicy::KeepOldest => merged.truncate(cap),
                TrimPolicy::KeepNewest => {
                    merged.drain(..dropped);
                }
            }
            warn!(dropped, "analytics buffer overflow after failed flush");
        }
        *buffer = merged;
    }

    pub async fn page_view(&self, url: &str, path: &str, title: &str, referrer: &str) {
        self.track(
            "page_view",
            object(json!({"url": url, "path": path, "title": title, "referrer": referrer})),
        )
        .await;
    }

    /// Track an application-defined event under `custom_<name>`.
    pub async fn custom(&self, name: &str, payload: Map<String, Value>) {
        self.track(&format!("custom_{name}"), payload).await;
    }

    pub async fn error(&self, message: &str, source: Option<&str>) {
        let mut payload = object(json!({ "message": truncate(message, 500) }));
        if let Some(source) = source {
            payload.insert("source".into(), Value::String(truncate(source, 500)));
        }
        self.track("client_error", payload).await;
    }

    pub async fn time_on_page(&self, page: &str, duration: Duration) {
        self.track(
            "time_on_page",
            object(json!({"duration_seconds": duration.as_secs(), "page": page})),
        )
        .await;
    }

    pub async fn tournament_view(&self, id: TournamentId, name: &str) {
        self.track(
            "tournament_view",
            object(json!({"tournament_id": id, "tournament_name": name})),
        )
        .await;
    }

    pub async fn favorite_changed(&self, id: TournamentId, added: bool) {
        let event = if added { "favorite_add" } else { "favorite_remove" };
        self.track(event, object(json!({ "tournament_id": id })))
            .await;
    }

    pub async fn share(&self, method: &str, url: &str) {
        self.track("share", object(json!({"method": method, "url": url})))
            .await;
    }

    /// Search queries shorter than two characters are not tracked.
    pub async fn search(&self, query: &str) {
        let query = query.trim();
        let length = query.chars().count();
        if length < 2 {
            return;
        }
        self.track(
            "search",
            object(json!({"query": query, "query_length": length})),
        )
        .await;
    }
}

/// Flush the buffer every `interval` until the task is aborted.
pub async fn run_flush_loop(client: Arc<AnalyticsClient>, interval: Duration) {
    info!(interval_ms = interval.as_millis() as u64, "analytics flush loop started");
    loop {
        sleep(interval).await;
        match client.flush(false).await {
            Ok(0) => {}
            Ok(count) => debug!(count, "periodic analytics flush"),
            Err(err) => warn!(error = %err, "periodic analytics flush failed"),
        }
    }
}

fn generate_session_id(now: OffsetDateTime) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect();
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{millis}-{suffix}")
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex as StdMutex,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;

    #[derive(Default)]
    struct FakeTransport {
        sent: StdMutex<Vec<AnalyticsBatch>>,
        beaconed: StdMutex<Vec<AnalyticsBatch>>,
        failing: AtomicBool,
        beacon_supported: bool,
    }

    impl FakeTransport {
        fn sent_events(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .flat_map(|batch| batch.events.iter().map(|event| event.event.clone()))
                .collect()
        }
    }

    impl AnalyticsTransport for FakeTransport {
        fn send<'a>(
            &'a self,
            batch: &'a AnalyticsBatch,
        ) -> BoxFuture<'a, Result<(), TransportError>> {
            async move {
                if self.failing.load(Ordering::SeqCst) {
                    return Err(TransportError::Unavailable("offline".into()));
                }
                self.sent.lock().unwrap().push(batch.clone());
                Ok(())
            }
            .boxed()
        }

        fn beacon(&self, batch: &AnalyticsBatch) -> bool {
            if self.beacon_supported {
                self.beaconed.lock().unwrap().push(batch.clone());
            }
            self.beacon_supported
        }
    }

    fn client(transport: Arc<FakeTransport>, settings: AnalyticsSettings) -> AnalyticsClient {
        AnalyticsClient::new(transport, "anonymous", ClientContext::default(), settings)
    }

    #[tokio::test]
    async fn flush_sends_buffered_events_and_empties_buffer() {
        let transport = Arc::new(FakeTransport::default());
        let analytics = client(transport.clone(), AnalyticsSettings::default());

        analytics.custom("filter_used", Map::new()).await;
        analytics.tournament_view(7, "Moscow Open").await;
        assert_eq!(analytics.flush(false).await.unwrap(), 2);

        assert_eq!(analytics.buffered().await, 0);
        assert_eq!(
            transport.sent_events(),
            vec!["custom_filter_used", "tournament_view"]
        );
        {
            let batch = &transport.sent.lock().unwrap()[0];
            assert_eq!(batch.user_id, "anonymous");
            assert_eq!(batch.session_id, analytics.session_id());
        }

        assert_eq!(analytics.flush(false).await.unwrap(), 0);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_flush_restores_events_without_exceeding_cap() {
        let transport = Arc::new(FakeTransport::default());
        transport.failing.store(true, Ordering::SeqCst);
        let settings = AnalyticsSettings {
            max_events: 3,
            ..AnalyticsSettings::default()
        };
        let analytics = client(transport.clone(), settings);

        analytics.custom("a", Map::new()).await;
        analytics.custom("b", Map::new()).await;
        assert!(analytics.flush(false).await.is_err());
        assert_eq!(analytics.buffered().await, 2);

        // Reaching the cap triggers a flush, which fails again and is trimmed.
        analytics.custom("c", Map::new()).await;
        analytics.custom("d", Map::new()).await;
        assert_eq!(analytics.buffered().await, 3);

        transport.failing.store(false, Ordering::SeqCst);
        analytics.flush(false).await.unwrap();
        assert_eq!(
            transport.sent_events(),
            vec!["custom_a", "custom_b", "custom_c"]
        );
    }

    #[tokio::test]
    async fn keep_newest_policy_drops_oldest_unsent_events() {
        let transport = Arc::new(FakeTransport::default());
        transport.failing.store(true, Ordering::SeqCst);
        let settings = AnalyticsSettings {
            max_events: 2,
            trim_policy: TrimPolicy::KeepNewest,
            ..AnalyticsSettings::default()
        };
        let analytics = client(transport.clone(), settings);

        analytics.custom("a", Map::new()).await;
        analytics.custom("b", Map::new()).await;
        analytics.custom("c", Map::new()).await;

        transport.failing.store(false, Ordering::SeqCst);
        analytics.flush(false).await.unwrap();
        assert_eq!(transport.sent_events(), vec!["custom_b", "custom_c"]);
    }

    #[tokio::test]
    async fn full_buffer_flushes_immediately() {
        let transport = Arc::new(FakeTransport::default());
        let settings = AnalyticsSettings {
            max_events: 2,
            ..AnalyticsSettings::default()
        };
        let analytics = client(transport.clone(), settings);

        analytics.custom("a", Map::new()).await;
        assert!(transport.sent.lock().unwrap().is_empty());
        analytics.custom("b", Map::new()).await;
        assert_eq!(transport.sent_events().len(), 2);
        assert_eq!(analytics.buffered().await, 0);
    }

    #[tokio::test]
    async fn unload_flush_uses_beacon_when_available() {
        let transport = Arc::new(FakeTransport {
            beacon_supported: true,
            ..FakeTransport::default()
        });
        let analytics = client(transport.clone(), AnalyticsSettings::default());

        analytics.time_on_page("/calendar", Duration::from_secs(42)).await;
        assert_eq!(analytics.flush(true).await.unwrap(), 1);
        assert!(transport.sent.lock().unwrap().is_empty());
        let beaconed = transport.beaconed.lock().unwrap();
        assert_eq!(beaconed[0].events[0].payload["duration_seconds"], 42);
    }

    #[tokio::test]
    async fn unload_flush_falls_back_to_send_without_beacon() {
        let transport = Arc::new(FakeTransport::default());
        let analytics = client(transport.clone(), AnalyticsSettings::default());

        analytics.error("boom", Some("calendar")).await;
        analytics.flush(true).await.unwrap();
        assert_eq!(transport.sent_events(), vec!["client_error"]);
    }

    #[tokio::test]
    async fn short_search_queries_are_ignored() {
        let transport = Arc::new(FakeTransport::default());
        let analytics = client(transport, AnalyticsSettings::default());

        analytics.search(" a ").await;
        assert_eq!(analytics.buffered().await, 0);
        analytics.search("Аэрофлот").await;
        assert_eq!(analytics.buffered().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_loop_sends_on_interval() {
        let transport = Arc::new(FakeTransport::default());
        let analytics = Arc::new(client(transport.clone(), AnalyticsSettings::default()));
        let task = tokio::spawn(run_flush_loop(analytics.clone(), Duration::from_secs(30)));

        analytics.share("telegram", "https://example.org/tournament/1").await;
        sleep(Duration::from_secs(29)).await;
        assert!(transport.sent.lock().unwrap().is_empty());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.sent_events(), vec!["share"]);
        task.abort();
    }

    #[test]
    fn session_id_has_timestamp_and_random_suffix() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let id = generate_session_id(now);
        let (millis, suffix) = id.split_once('-').unwrap();
        assert_eq!(millis, "1700000000000");
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
