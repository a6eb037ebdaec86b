use crate::{error::AppError, state::AppState};

/// Buffered analytics events and their delivery.
pub mod analytics;
/// HTTP client for the calendar REST API.
pub mod api_client;
/// List filters, filter presets and recent searches.
pub mod filter_service;
/// Visibility-triggered component loading and route preloading.
pub mod lazy_loading;
/// Theme, accessibility and shortcut actions.
pub mod preferences_service;
/// Social share links and share counters.
pub mod share;
/// Keyboard shortcut resolution.
pub mod shortcuts;
/// Tournament actions: favorites, comparison, history, ratings, sharing, admin.
pub mod tournament_service;
/// UI event payload generation.
pub mod ui_events;
/// Embeddable tournament widget.
pub mod widget;

/// Convert `err`, show it to the user as a toast and return it for propagation.
pub(crate) fn surface(state: &AppState, err: impl Into<AppError>) -> AppError {
    err.into().notify(state.toasts())
}
