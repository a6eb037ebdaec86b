use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::TournamentId,
    dto::events::{
        AccessibilityChangedEvent, CollectionChangedEvent, CollectionKind,
        ComponentLoadFailedEvent, ComponentLoadedEvent, FiltersChangedEvent,
        ShortcutTriggeredEvent, ThemeChangedEvent, ToastEvent, UiEvent,
    },
    state::{filters::FilterState, hub::EventHub, preferences::Theme},
};

pub const EVENT_TOAST: &str = "toast";
pub const EVENT_COMPONENT_LOADED: &str = "component.loaded";
pub const EVENT_COMPONENT_LOAD_FAILED: &str = "component.load_failed";
pub const EVENT_THEME_CHANGED: &str = "theme.changed";
pub const EVENT_ACCESSIBILITY_CHANGED: &str = "accessibility.changed";
pub const EVENT_COLLECTION_CHANGED: &str = "collection.changed";
pub const EVENT_SHORTCUT_TRIGGERED: &str = "shortcut.triggered";
pub const EVENT_FILTERS_CHANGED: &str = "filters.changed";

pub fn broadcast_toast(hub: &EventHub, payload: &ToastEvent) {
    send_event(hub, EVENT_TOAST, payload);
}

pub fn broadcast_component_loaded(hub: &EventHub, element_id: &str, component_name: &str) {
    let payload = ComponentLoadedEvent {
        element_id: element_id.to_string(),
        component_name: component_name.to_string(),
    };
    send_event(hub, EVENT_COMPONENT_LOADED, &payload);
}

pub fn broadcast_component_load_failed(
    hub: &EventHub,
    element_id: &str,
    component_name: &str,
    reason: &str,
) {
    let payload = ComponentLoadFailedEvent {
        element_id: element_id.to_string(),
        component_name: component_name.to_string(),
        reason: reason.to_string(),
    };
    send_event(hub, EVENT_COMPONENT_LOAD_FAILED, &payload);
}

pub fn broadcast_theme_changed(hub: &EventHub, theme: Theme) {
    let payload = ThemeChangedEvent {
        theme: theme.as_str(),
    };
    send_event(hub, EVENT_THEME_CHANGED, &payload);
}

pub fn broadcast_accessibility_changed(hub: &EventHub, classes: Vec<&'static str>) {
    send_event(
        hub,
        EVENT_ACCESSIBILITY_CHANGED,
        &AccessibilityChangedEvent { classes },
    );
}

/// Broadcast the new size of a collection after a persisted mutation.
pub fn broadcast_collection_changed(
    hub: &EventHub,
    collection: CollectionKind,
    tournament_id: Option<TournamentId>,
    size: usize,
) {
    let payload = CollectionChangedEvent {
        collection,
        tournament_id,
        size,
    };
    send_event(hub, EVENT_COLLECTION_CHANGED, &payload);
}

pub fn broadcast_filters_changed(hub: &EventHub, filters: &FilterState) {
    let payload = FiltersChangedEvent {
        params: filters.changed_params(),
        active: filters.active_count(),
    };
    send_event(hub, EVENT_FILTERS_CHANGED, &payload);
}

pub fn broadcast_shortcut(hub: &EventHub, action: &'static str) {
    send_event(
        hub,
        EVENT_SHORTCUT_TRIGGERED,
        &ShortcutTriggeredEvent { action },
    );
}

fn send_event(hub: &EventHub, event: &str, payload: &impl Serialize) {
    match UiEvent::json(event, payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize UI event payload"),
    }
}
