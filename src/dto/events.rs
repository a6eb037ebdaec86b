use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::dao::models::TournamentId;

#[derive(Clone, Debug, PartialEq)]
/// Notification published to the view layer whenever client state changes.
pub struct UiEvent {
    pub event: String,
    pub data: Value,
}

impl UiEvent {
    /// Serialise `payload` into the event data.
    pub fn json<T: Serialize>(event: impl Into<String>, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_value(payload)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Lifecycle stage reported for a toast.
pub enum ToastPhase {
    Shown,
    Removing,
    Removed,
}

#[derive(Debug, Serialize)]
/// Published on every toast lifecycle change.
pub struct ToastEvent {
    pub id: Uuid,
    pub phase: ToastPhase,
    pub kind: &'static str,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
/// Published once the module behind a lazy component finished loading.
pub struct ComponentLoadedEvent {
    pub element_id: String,
    pub component_name: String,
}

#[derive(Debug, Serialize)]
/// Published when the module behind a lazy component failed to load.
pub struct ComponentLoadFailedEvent {
    pub element_id: String,
    pub component_name: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ThemeChangedEvent {
    pub theme: &'static str,
}

#[derive(Debug, Serialize)]
/// Published after the accessibility panel settings changed.
pub struct AccessibilityChangedEvent {
    pub classes: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Which persisted collection changed.
pub enum CollectionKind {
    Favorites,
    History,
    Comparison,
    Ratings,
    RecentSearches,
}

#[derive(Debug, Serialize)]
/// Published after a collection mutation was persisted.
pub struct CollectionChangedEvent {
    pub collection: CollectionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_id: Option<TournamentId>,
    pub size: usize,
}

#[derive(Debug, Serialize)]
/// Published after the tournament list filters changed.
pub struct FiltersChangedEvent {
    /// Non-default options, ready for the page URL.
    pub params: IndexMap<String, String>,
    pub active: usize,
}

#[derive(Debug, Serialize)]
/// Published when a keyboard shortcut resolved to an action.
pub struct ShortcutTriggeredEvent {
    pub action: &'static str,
}
