//! Theme, accessibility and keyboard shortcut actions.

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::{
    error::AppError,
    services::{
        filter_service::reset_filters,
        lazy_loading::spawn_route_preload,
        shortcuts::ShortcutAction,
        surface,
        ui_events::{broadcast_accessibility_changed, broadcast_shortcut, broadcast_theme_changed},
    },
    state::{
        SharedState,
        preferences::{ShortcutsEnabled, Theme},
    },
};

pub async fn set_theme(state: &SharedState, theme: Theme) -> Result<Theme, AppError> {
    state
        .theme()
        .write()
        .await
        .set(theme)
        .map_err(|err| surface(state, err))?;
    broadcast_theme_changed(state.events(), theme);
    debug!(theme = %theme, "theme changed");
    Ok(theme)
}

/// Switch between light and dark and persist the choice.
pub async fn toggle_theme(state: &SharedState) -> Result<Theme, AppError> {
    let next = state.theme().read().await.get().toggled();
    set_theme(state, next).await
}

/// Change one accessibility option by its stored name; returns the resulting root classes.
pub async fn set_accessibility_option(
    state: &SharedState,
    option: &str,
    value: Value,
) -> Result<Vec<&'static str>, AppError> {
    let classes = {
        let mut settings = state.accessibility().write().await;
        settings
            .set(option, value)
            .map_err(|err| surface(state, err))?;
        settings.record().root_classes()
    };
    broadcast_accessibility_changed(state.events(), classes.clone());
    Ok(classes)
}

pub async fn reset_accessibility(state: &SharedState) -> Result<Vec<&'static str>, AppError> {
    let classes = {
        let mut settings = state.accessibility().write().await;
        settings.reset().map_err(|err| surface(state, err))?;
        settings.record().root_classes()
    };
    state.toasts().success("Настройки доступности сброшены");
    broadcast_accessibility_changed(state.events(), classes.clone());
    Ok(classes)
}

pub async fn set_shortcuts_enabled(state: &SharedState, enabled: bool) -> Result<(), AppError> {
    state
        .shortcuts_enabled()
        .write()
        .await
        .set(ShortcutsEnabled(enabled))
        .map_err(|err| surface(state, err))?;
    state.toasts().success(if enabled {
        "Горячие клавиши включены"
    } else {
        "Горячие клавиши отключены"
    });
    Ok(())
}

/// Resolve a key press and run the resulting action.
///
/// Navigation actions start preloading the target page's modules; the theme and filter reset
/// shortcuts act directly. Every resolved action is published for the view layer.
pub async fn handle_key(
    state: &SharedState,
    key: &str,
    in_text_input: bool,
) -> Result<Option<ShortcutAction>, AppError> {
    if !state.shortcuts_enabled().read().await.get().0 {
        return Ok(None);
    }
    let action = state
        .shortcuts()
        .lock()
        .await
        .handle_key(key, in_text_input, Instant::now());
    let Some(action) = action else {
        return Ok(None);
    };

    broadcast_shortcut(state.events(), action.as_str());
    match action {
        ShortcutAction::ToggleTheme => {
            toggle_theme(state).await?;
        }
        ShortcutAction::ResetFilters => {
            reset_filters(state).await?;
        }
        _ => {}
    }
    if let Some(route) = action.route() {
        spawn_route_preload(
            state.loader().clone(),
            route,
            state.config().loader.route_preload_delay,
        );
    }
    Ok(Some(action))
}

/// Help dialog rows: binding and description of every shortcut.
pub fn shortcut_help() -> Vec<(&'static str, &'static str)> {
    ShortcutAction::ALL
        .iter()
        .map(|action| (action.binding(), action.description()))
        .collect()
}
