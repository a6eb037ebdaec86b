//! Tournament list filters and named filter presets.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{
    dao::{
        models::{FILTER_PRESETS_KEY, FILTER_STATE_KEY},
        storage::{KeyValueStore, StorageError, read_json, write_json},
    },
    dto::tournament::TournamentQuery,
    state::preferences::PreferenceRecord,
};

pub const DEFAULT_SORT_COLUMN: &str = "start_date";
pub const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("preset name is empty")]
    BlankName,
    #[error("no filter preset named `{name}`")]
    Missing { name: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Grid,
    List,
}

/// Filters, sorting and layout of the tournament list. Empty strings mean "any".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    pub category: String,
    pub location: String,
    pub status: String,
    pub date_from: String,
    pub date_to: String,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub view_mode: ViewMode,
    pub per_page: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            category: String::new(),
            location: String::new(),
            status: String::new(),
            date_from: String::new(),
            date_to: String::new(),
            sort_by: DEFAULT_SORT_COLUMN.to_string(),
            sort_order: SortOrder::Asc,
            view_mode: ViewMode::Grid,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PreferenceRecord for FilterState {
    const STORAGE_KEY: &'static str = FILTER_STATE_KEY;
}

impl FilterState {
    /// Sort by `column`; choosing the current column again flips the order.
    pub fn toggle_sort(&mut self, column: &str) {
        if self.sort_by == column {
            self.sort_order = self.sort_order.reversed();
        } else {
            self.sort_by = column.to_string();
            self.sort_order = SortOrder::Asc;
        }
    }

    /// Number of narrowing filters in use, shown as a badge.
    pub fn active_count(&self) -> usize {
        [
            &self.category,
            &self.location,
            &self.status,
            &self.date_from,
            &self.date_to,
        ]
        .into_iter()
        .filter(|value| !value.is_empty())
        .count()
    }

    /// Request for `page` of the tournament list under these filters.
    pub fn query(&self, page: u32) -> TournamentQuery {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        TournamentQuery {
            status: non_empty(self.status.as_str()),
            category: non_empty(self.category.as_str()),
            page: Some(page),
            limit: Some(self.per_page),
        }
    }

    /// Options that differ from the defaults, as URL parameters.
    pub fn changed_params(&self) -> IndexMap<String, String> {
        let (Ok(Value::Object(current)), Ok(Value::Object(defaults))) =
            (serde_json::to_value(self), serde_json::to_value(Self::default()))
        else {
            return IndexMap::new();
        };

        current
            .into_iter()
            .filter(|(name, value)| defaults.get(name) != Some(value))
            .filter_map(|(name, value)| match value {
                Value::String(text) if text.is_empty() => None,
                Value::String(text) => Some((name, text)),
                other => Some((name, other.to_string())),
            })
            .collect()
    }
}

/// Named snapshots of [`FilterState`], persisted as one JSON object.
pub struct FilterPresets {
    store: Arc<dyn KeyValueStore>,
    presets: IndexMap<String, FilterState>,
}

impl FilterPresets {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let presets = read_json(store.as_ref(), FILTER_PRESETS_KEY).unwrap_or_default();
        Self { store, presets }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Result<&FilterState, PresetError> {
        self.presets
            .get(name.trim())
            .ok_or_else(|| PresetError::Missing {
                name: name.trim().to_string(),
            })
    }

    /// Store `filters` under `name`, replacing a preset of the same name.
    pub fn save(&mut self, name: &str, filters: FilterState) -> Result<(), PresetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PresetError::BlankName);
        }
        let mut candidate = self.presets.clone();
        candidate.insert(name.to_string(), filters);
        self.commit(candidate)?;
        debug!(preset = name, "filter preset saved");
        Ok(())
    }

    /// Remove `name`; returns whether it existed.
    pub fn remove(&mut self, name: &str) -> Result<bool, StorageError> {
        let mut candidate = self.presets.clone();
        if candidate.shift_remove(name.trim()).is_none() {
            return Ok(false);
        }
        self.commit(candidate)?;
        Ok(true)
    }

    fn commit(&mut self, candidate: IndexMap<String, FilterState>) -> Result<(), StorageError> {
        write_json(self.store.as_ref(), FILTER_PRESETS_KEY, &candidate)?;
        self.presets = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{dao::memory_store::MemoryStore, state::preferences::PreferenceStore};

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn repeated_sort_column_flips_order() {
        let mut filters = FilterState::default();
        filters.toggle_sort(DEFAULT_SORT_COLUMN);
        assert_eq!(filters.sort_order, SortOrder::Desc);

        filters.toggle_sort("name");
        assert_eq!((filters.sort_by.as_str(), filters.sort_order), ("name", SortOrder::Asc));
    }

    #[test]
    fn only_changed_options_become_params() {
        let mut filters = FilterState {
            category: "blitz".into(),
            view_mode: ViewMode::List,
            ..FilterState::default()
        };
        filters.per_page = 50;

        let params = filters.changed_params();
        assert_eq!(params.len(), 3);
        assert_eq!(params["category"], "blitz");
        assert_eq!(params["viewMode"], "list");
        assert_eq!(params["perPage"], "50");
        assert_eq!(filters.active_count(), 1);
        assert_eq!(
            filters.query(2).to_query_string(),
            "category=blitz&page=2&limit=50"
        );
    }

    #[test]
    fn stored_filters_merge_with_defaults_and_reject_bad_values() {
        let backend = memory();
        backend
            .set(FILTER_STATE_KEY, r#"{"status": "upcoming", "perPage": "many"}"#)
            .unwrap();

        let mut filters = PreferenceStore::<FilterState>::load(backend);
        assert_eq!(filters.record().status, "upcoming");
        assert_eq!(filters.record().per_page, DEFAULT_PER_PAGE);

        assert!(filters.set("viewMode", json!("carousel")).is_err());
        filters.set("location", json!("Казань")).unwrap();
        assert_eq!(filters.record().location, "Казань");
    }

    #[test]
    fn presets_round_trip_through_storage() {
        let backend = memory();
        let mut presets = FilterPresets::load(backend.clone());
        let weekend = FilterState {
            category: "rapid".into(),
            ..FilterState::default()
        };

        assert!(matches!(
            presets.save("  ", weekend.clone()),
            Err(PresetError::BlankName)
        ));
        presets.save(" Выходные ", weekend.clone()).unwrap();

        let reloaded = FilterPresets::load(backend);
        assert_eq!(reloaded.names().collect::<Vec<_>>(), ["Выходные"]);
        assert_eq!(reloaded.get("Выходные").unwrap(), &weekend);
        assert!(matches!(
            reloaded.get("Будни"),
            Err(PresetError::Missing { .. })
        ));
    }
}
