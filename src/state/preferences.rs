//! Persisted user preferences: JSON records merged with defaults and raw scalar settings.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dao::{
    models::{ACCESSIBILITY_KEY, SHORTCUTS_ENABLED_KEY, THEME_KEY},
    storage::{KeyValueStore, StorageError, read_json, write_json},
};

/// Failures raised when changing a preference option.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("unknown preference option `{option}`")]
    UnknownOption { option: String },
    #[error("value {value} is outside the domain of `{option}`")]
    OutOfDomain { option: String, value: Value },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A JSON object of options persisted under one storage key.
///
/// `Default` provides the hard-coded fallback for every option, so a loaded record never has an
/// undefined field.
pub trait PreferenceRecord: Serialize + DeserializeOwned + Default + Clone + Send + Sync {
    const STORAGE_KEY: &'static str;
}

/// Loaded preference record bound to its storage backend.
pub struct PreferenceStore<T> {
    store: Arc<dyn KeyValueStore>,
    record: T,
}

impl<T: PreferenceRecord> PreferenceStore<T> {
    /// Read the record from storage and overlay it on the defaults.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let record = match read_json::<Value>(store.as_ref(), T::STORAGE_KEY) {
            Some(Value::Object(stored)) => merge_with_defaults(stored),
            Some(other) => {
                warn!(
                    key = T::STORAGE_KEY,
                    kind = json_kind(&other),
                    "stored preferences are not an object; using defaults"
                );
                T::default()
            }
            None => T::default(),
        };
        Self { store, record }
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    /// Persist the current record.
    pub fn save(&self) -> Result<(), StorageError> {
        write_json(self.store.as_ref(), T::STORAGE_KEY, &self.record)
    }

    /// Change a single option by its JSON name, validating it against the option's domain.
    pub fn set(&mut self, option: &str, value: Value) -> Result<(), PreferenceError> {
        let mut fields = record_fields(&self.record);
        if !fields.contains_key(option) {
            return Err(PreferenceError::UnknownOption {
                option: option.to_string(),
            });
        }

        fields.insert(option.to_string(), value.clone());
        let candidate = serde_json::from_value::<T>(Value::Object(fields)).map_err(|_| {
            PreferenceError::OutOfDomain {
                option: option.to_string(),
                value,
            }
        })?;

        self.replace(candidate)?;
        debug!(key = T::STORAGE_KEY, option, "preference updated");
        Ok(())
    }

    /// Apply a typed change and persist it; the previous record is kept if the write fails.
    pub fn update(&mut self, change: impl FnOnce(&mut T)) -> Result<(), StorageError> {
        let mut candidate = self.record.clone();
        change(&mut candidate);
        self.replace(candidate)
    }

    /// Restore and persist the defaults.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.replace(T::default())
    }

    fn replace(&mut self, candidate: T) -> Result<(), StorageError> {
        let previous = std::mem::replace(&mut self.record, candidate);
        if let Err(err) = self.save() {
            self.record = previous;
            return Err(err);
        }
        Ok(())
    }
}

/// Overlay stored options one by one so a single bad option cannot discard the others.
fn merge_with_defaults<T: PreferenceRecord>(stored: Map<String, Value>) -> T {
    let mut merged = record_fields(&T::default());

    for (option, value) in stored {
        if !merged.contains_key(&option) {
            debug!(key = T::STORAGE_KEY, option = %option, "ignoring unknown stored option");
            continue;
        }

        let mut candidate = merged.clone();
        candidate.insert(option.clone(), value);
        if serde_json::from_value::<T>(Value::Object(candidate.clone())).is_ok() {
            merged = candidate;
        } else {
            warn!(
                key = T::STORAGE_KEY,
                option = %option,
                "stored option is outside its domain; keeping default"
            );
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

fn record_fields<T: Serialize>(record: &T) -> Map<String, Value> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Normal,
    Large,
    Xlarge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contrast {
    #[default]
    Normal,
    High,
}

/// Spacing option shared by line height and letter spacing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    #[default]
    Normal,
    Increased,
}

/// Accessibility panel settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilitySettings {
    pub font_size: FontSize,
    pub contrast: Contrast,
    pub animations: bool,
    pub focus_indicator: bool,
    pub keyboard_nav: bool,
    pub screen_reader: bool,
    pub dyslexia_font: bool,
    pub line_height: Spacing,
    pub letter_spacing: Spacing,
}

impl Default for AccessibilitySettings {
    fn default() -> Self {
        Self {
            font_size: FontSize::Normal,
            contrast: Contrast::Normal,
            animations: true,
            focus_indicator: true,
            keyboard_nav: true,
            screen_reader: false,
            dyslexia_font: false,
            line_height: Spacing::Normal,
            letter_spacing: Spacing::Normal,
        }
    }
}

impl PreferenceRecord for AccessibilitySettings {
    const STORAGE_KEY: &'static str = ACCESSIBILITY_KEY;
}

impl AccessibilitySettings {
    /// Root element classes the view layer applies for these settings.
    pub fn root_classes(&self) -> Vec<&'static str> {
        let mut classes = vec![match self.font_size {
            FontSize::Small => "font-small",
            FontSize::Normal => "font-normal",
            FontSize::Large => "font-large",
            FontSize::Xlarge => "font-xlarge",
        }];
        if self.contrast == Contrast::High {
            classes.push("high-contrast");
        }
        if !self.animations {
            classes.push("reduce-motion");
        }
        if self.focus_indicator {
            classes.push("enhanced-focus");
        }
        if self.dyslexia_font {
            classes.push("dyslexia-font");
        }
        if self.line_height == Spacing::Increased {
            classes.push("increased-line-height");
        }
        if self.letter_spacing == Spacing::Increased {
            classes.push("increased-letter-spacing");
        }
        classes
    }
}

/// A single value stored as a raw string rather than JSON.
pub trait ScalarPreference: Clone + Default + Send + Sync {
    const STORAGE_KEY: &'static str;

    /// Parse a stored value; `None` falls back to the default.
    fn decode(raw: &str) -> Option<Self>;
    fn encode(&self) -> String;
}

/// Loaded scalar preference bound to its storage backend.
pub struct ScalarSetting<T> {
    store: Arc<dyn KeyValueStore>,
    value: T,
}

impl<T: ScalarPreference> ScalarSetting<T> {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let value = match store.get(T::STORAGE_KEY) {
            Ok(Some(raw)) => T::decode(&raw).unwrap_or_else(|| {
                warn!(key = T::STORAGE_KEY, raw = %raw, "unrecognised stored value; using default");
                T::default()
            }),
            Ok(None) => T::default(),
            Err(err) => {
                warn!(key = T::STORAGE_KEY, error = %err, "failed to read setting; using default");
                T::default()
            }
        };
        Self { store, value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Persist `value`; the previous value is kept if the write fails.
    pub fn set(&mut self, value: T) -> Result<(), StorageError> {
        self.store.set(T::STORAGE_KEY, &value.encode())?;
        self.value = value;
        Ok(())
    }
}

/// Colour theme of the site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScalarPreference for Theme {
    const STORAGE_KEY: &'static str = THEME_KEY;

    fn decode(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    fn encode(&self) -> String {
        self.as_str().to_string()
    }
}

/// Keyboard shortcuts switch; anything but a stored `false` means enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortcutsEnabled(pub bool);

impl Default for ShortcutsEnabled {
    fn default() -> Self {
        Self(true)
    }
}

impl ScalarPreference for ShortcutsEnabled {
    const STORAGE_KEY: &'static str = SHORTCUTS_ENABLED_KEY;

    fn decode(raw: &str) -> Option<Self> {
        Some(Self(raw != "false"))
    }

    fn encode(&self) -> String {
        self.0.to_string()
    }
}
