use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope fields every event carries; payload keys with these names are dropped.
pub const RESERVED_FIELDS: [&str; 6] = [
    "event",
    "session_id",
    "timestamp",
    "user_agent",
    "screen_resolution",
    "viewport_size",
];

/// Description of the client environment attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientContext {
    pub user_agent: String,
    /// `WIDTHxHEIGHT` of the screen.
    pub screen_resolution: String,
    /// `WIDTHxHEIGHT` of the viewport.
    pub viewport_size: String,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into(),
            screen_resolution: "0x0".into(),
            viewport_size: "0x0".into(),
        }
    }
}

/// One tracked event; the payload is flattened next to the envelope fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event: String,
    pub session_id: String,
    pub timestamp: String,
    pub user_agent: String,
    pub screen_resolution: String,
    pub viewport_size: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new(
        event: impl Into<String>,
        session_id: &str,
        timestamp: String,
        context: &ClientContext,
        mut payload: Map<String, Value>,
    ) -> Self {
        for field in RESERVED_FIELDS {
            payload.remove(field);
        }
        Self {
            event: event.into(),
            session_id: session_id.to_string(),
            timestamp,
            user_agent: context.user_agent.clone(),
            screen_resolution: context.screen_resolution.clone(),
            viewport_size: context.viewport_size.clone(),
            payload,
        }
    }
}

/// Body of `POST /api/analytics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsBatch {
    pub events: Vec<AnalyticsEvent>,
    pub session_id: String,
    pub user_id: String,
}
