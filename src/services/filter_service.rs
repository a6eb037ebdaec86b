//! Tournament list filters, filter presets and recent searches.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{
    dto::{events::CollectionKind, tournament::TournamentDto},
    error::AppError,
    services::{
        surface,
        tournament_service::load_tournaments,
        ui_events::{broadcast_collection_changed, broadcast_filters_changed},
    },
    state::{
        SharedState,
        collection::AddOutcome,
        filters::{FilterState, ViewMode},
    },
};

/// Change one filter option by its stored name, e.g. `category` or `perPage`.
pub async fn update_filter(
    state: &SharedState,
    option: &str,
    value: Value,
) -> Result<FilterState, AppError> {
    let filters = {
        let mut filters = state.filters().write().await;
        filters
            .set(option, value.clone())
            .map_err(|err| surface(state, err))?;
        filters.record().clone()
    };
    broadcast_filters_changed(state.events(), &filters);

    let mut payload = Map::new();
    payload.insert("filter".into(), json!(option));
    payload.insert("value".into(), value);
    state.analytics().track("filter_change", payload).await;
    Ok(filters)
}

/// Sort by `column`, flipping the order when it is already the sort column.
pub async fn sort_tournaments(state: &SharedState, column: &str) -> Result<FilterState, AppError> {
    change_filters(state, |filters| filters.toggle_sort(column)).await
}

pub async fn set_view_mode(state: &SharedState, mode: ViewMode) -> Result<FilterState, AppError> {
    change_filters(state, |filters| filters.view_mode = mode).await
}

pub async fn reset_filters(state: &SharedState) -> Result<FilterState, AppError> {
    let filters = {
        let mut filters = state.filters().write().await;
        filters.reset().map_err(|err| surface(state, err))?;
        filters.record().clone()
    };
    state.toasts().success("Фильтры сброшены");
    broadcast_filters_changed(state.events(), &filters);
    Ok(filters)
}

/// Fetch `page` of the tournament list under the current filters.
pub async fn apply_filters(
    state: &SharedState,
    page: u32,
) -> Result<Vec<TournamentDto>, AppError> {
    let query = state.filters().read().await.record().query(page);
    let tournaments = load_tournaments(state, &query).await?;
    state.toasts().filter_applied();
    Ok(tournaments)
}

/// Save the current filters under `name`.
pub async fn save_filter_preset(state: &SharedState, name: &str) -> Result<(), AppError> {
    let filters = state.filters().read().await.record().clone();
    state
        .filter_presets()
        .write()
        .await
        .save(name, filters)
        .map_err(|err| surface(state, err))?;
    state
        .toasts()
        .success(format!("Пресет \"{}\" сохранен", name.trim()));
    Ok(())
}

/// Replace the current filters with the preset saved as `name`.
pub async fn apply_filter_preset(state: &SharedState, name: &str) -> Result<FilterState, AppError> {
    let preset = state
        .filter_presets()
        .read()
        .await
        .get(name)
        .map_err(|err| surface(state, err))?
        .clone();
    let filters = change_filters(state, move |filters| *filters = preset).await?;
    state
        .toasts()
        .success(format!("Пресет \"{}\" загружен", name.trim()));
    Ok(filters)
}

pub async fn delete_filter_preset(state: &SharedState, name: &str) -> Result<bool, AppError> {
    state
        .filter_presets()
        .write()
        .await
        .remove(name)
        .map_err(|err| surface(state, err))
}

/// Remember a submitted search query; returns whether it was new.
///
/// Blank queries are ignored and a repeated query keeps its place in the list.
pub async fn record_search(state: &SharedState, query: &str) -> Result<bool, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(false);
    }

    let (outcome, size) = {
        let mut searches = state.recent_searches().write().await;
        let outcome = searches
            .add(query.to_string())
            .map_err(|err| surface(state, err))?;
        (outcome, searches.len())
    };
    broadcast_collection_changed(state.events(), CollectionKind::RecentSearches, None, size);
    state.analytics().search(query).await;
    debug!(query, "search recorded");
    Ok(!matches!(outcome, AddOutcome::AlreadyPresent))
}

pub async fn clear_recent_searches(state: &SharedState) -> Result<(), AppError> {
    state
        .recent_searches()
        .write()
        .await
        .clear()
        .map_err(|err| surface(state, err))?;
    broadcast_collection_changed(state.events(), CollectionKind::RecentSearches, None, 0);
    Ok(())
}

async fn change_filters(
    state: &SharedState,
    change: impl FnOnce(&mut FilterState),
) -> Result<FilterState, AppError> {
    let filters = {
        let mut filters = state.filters().write().await;
        filters.update(change).map_err(|err| surface(state, err))?;
        filters.record().clone()
    };
    broadcast_filters_changed(state.events(), &filters);
    Ok(filters)
}
