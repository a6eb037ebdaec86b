//! Client configuration loading: JSON file with environment overrides and built-in defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::{
    dto::analytics::ClientContext,
    services::{
        analytics::AnalyticsSettings,
        lazy_loading::{DEFAULT_PRELOAD_DELAY, DEFAULT_ROOT_MARGIN_PX, DEFAULT_ROUTE_PRELOAD_DELAY},
    },
    state::toast::ToastSettings,
};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/client.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "CHESSCAL_CONFIG_PATH";
/// Environment variable that overrides the API base URL.
const API_URL_ENV: &str = "CHESSCAL_API_URL";
/// Environment variable that overrides the profile directory.
const DATA_DIR_ENV: &str = "CHESSCAL_DATA_DIR";

/// Immutable runtime configuration shared across the client.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the calendar API.
    pub api_url: String,
    /// Public site origin used to build shareable links.
    pub site_origin: String,
    /// Profile directory holding the persisted preferences and collections.
    pub data_dir: PathBuf,
    /// Identifier sent with analytics batches and favorite toggles.
    pub user_id: String,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "request_timeout_ms")]
    pub request_timeout: Duration,
    /// Mirror ratings and favorites to the API after the local change.
    pub sync_with_server: bool,
    pub toasts: ToastSettings,
    pub analytics: AnalyticsSettings,
    pub loader: LoaderSettings,
    pub client: ClientContext,
}

/// Timings of the lazy loader.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "route_preload_delay_ms")]
    pub route_preload_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "preload_delay_ms")]
    pub preload_delay: Duration,
    pub root_margin_px: u32,
    /// Use visibility-driven loading; `false` loads every observed component immediately.
    pub intersection_supported: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            route_preload_delay: DEFAULT_ROUTE_PRELOAD_DELAY,
            preload_delay: DEFAULT_PRELOAD_DELAY,
            root_margin_px: DEFAULT_ROOT_MARGIN_PX,
            intersection_supported: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5000".into(),
            site_origin: "https://chesscalendar-ru.ru".into(),
            data_dir: PathBuf::from("data"),
            user_id: "anonymous".into(),
            request_timeout: Duration::from_secs(10),
            sync_with_server: false,
            toasts: ToastSettings::default(),
            analytics: AnalyticsSettings::default(),
            loader: LoaderSettings::default(),
            client: ClientContext::default(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in defaults, then apply
    /// environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded client config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };
        config.with_env_overrides(|name| env::var(name).ok())
    }

    fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(api_url) = lookup(API_URL_ENV) {
            self.api_url = api_url;
        }
        if let Some(data_dir) = lookup(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(data_dir);
        }
        self
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
