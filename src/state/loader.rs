//! On-demand module loading with de-duplication of concurrent requests.

use std::{
    collections::{HashMap, HashSet},
    error::Error,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Error type returned by module thunks.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Asynchronous initializer producing a module; called at most once per load attempt.
pub type ModuleThunk = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Handle to a load; every caller asking for the same in-flight module gets a clone.
pub type PendingLoad = Shared<BoxFuture<'static, Result<(), ModuleLoadError>>>;

/// Failure of a module load.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModuleLoadError {
    #[error("module `{name}` is not registered")]
    NotRegistered { name: String },
    #[error("module `{name}` failed to load: {reason}")]
    Failed { name: String, reason: String },
}

/// Observable state of a module name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ModuleLoadState {
    Unregistered,
    Registered,
    Loading,
    Loaded,
    /// The last attempt failed; the next load retries.
    Failed(String),
}

/// Snapshot of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatus {
    pub loaded: Vec<String>,
    pub loading: Vec<String>,
    pub total_registered: usize,
}

#[derive(Default)]
struct Registry {
    thunks: HashMap<String, ModuleThunk>,
    loaded: HashSet<String>,
    in_flight: HashMap<String, PendingLoad>,
    failed: HashMap<String, String>,
}

/// Registry of named modules and their load state.
///
/// Cloning yields another handle on the same registry.
#[derive(Clone, Default)]
pub struct ModuleLoader {
    registry: Arc<Mutex<Registry>>,
}

impl ModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the thunk for `name`.
    pub fn register_module<F, Fut>(&self, name: impl Into<String>, thunk: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let name = name.into();
        let thunk: ModuleThunk = Arc::new(move || thunk().boxed());
        if self.lock().thunks.insert(name.clone(), thunk).is_some() {
            debug!(module = %name, "module thunk replaced");
        }
    }

    /// Start loading `name`, or join the load already in progress.
    ///
    /// The in-flight entry is recorded before this returns, so concurrent callers share one
    /// thunk invocation even if none of them has polled yet.
    pub fn load_module(&self, name: &str) -> PendingLoad {
        let mut registry = self.lock();

        if registry.loaded.contains(name) {
            return futures::future::ready(Ok(())).boxed().shared();
        }
        if let Some(pending) = registry.in_flight.get(name) {
            return pending.clone();
        }
        let Some(thunk) = registry.thunks.get(name).cloned() else {
            warn!(module = name, "module not registered");
            let err = ModuleLoadError::NotRegistered {
                name: name.to_string(),
            };
            return futures::future::ready(Err(err)).boxed().shared();
        };

        let handle = Arc::downgrade(&self.registry);
        let owned = name.to_string();
        let pending = async move {
            let result = thunk().await.map_err(|err| ModuleLoadError::Failed {
                name: owned.clone(),
                reason: err.to_string(),
            });
            finish(&handle, &owned, &result);
            result
        }
        .boxed()
        .shared();

        registry.in_flight.insert(name.to_string(), pending.clone());
        debug!(module = name, "module load started");
        pending
    }

    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.lock().loaded.contains(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().thunks.contains_key(name)
    }

    pub fn state(&self, name: &str) -> ModuleLoadState {
        let registry = self.lock();
        if registry.loaded.contains(name) {
            ModuleLoadState::Loaded
        } else if registry.in_flight.contains_key(name) {
            ModuleLoadState::Loading
        } else if let Some(reason) = registry.failed.get(name) {
            ModuleLoadState::Failed(reason.clone())
        } else if registry.thunks.contains_key(name) {
            ModuleLoadState::Registered
        } else {
            ModuleLoadState::Unregistered
        }
    }

    /// Loaded and loading names, sorted, plus the number of registered modules.
    pub fn status(&self) -> LoadStatus {
        let registry = self.lock();
        let mut loaded: Vec<String> = registry.loaded.iter().cloned().collect();
        let mut loading: Vec<String> = registry.in_flight.keys().cloned().collect();
        loaded.sort();
        loading.sort();
        LoadStatus {
            loaded,
            loading,
            total_registered: registry.thunks.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        lock_registry(&self.registry)
    }
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Registry updates never leave it half-written, so a poisoned lock is still usable.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn finish(handle: &Weak<Mutex<Registry>>, name: &str, result: &Result<(), ModuleLoadError>) {
    let Some(registry) = handle.upgrade() else {
        return;
    };
    let mut registry = lock_registry(&registry);
    registry.in_flight.remove(name);
    match result {
        Ok(()) => {
            registry.failed.remove(name);
            registry.loaded.insert(name.to_string());
            debug!(module = name, "module loaded");
        }
        Err(err) => {
            error!(module = name, error = %err, "module load failed");
            registry.failed.insert(name.to_string(), err.to_string());
        }
    }
}

/// Modules to load for a page, split by urgency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteModules {
    pub critical: Vec<&'static str>,
    pub non_critical: Vec<&'static str>,
}

/// Static route to module table; the first matching rule wins.
pub fn route_modules(path: &str) -> RouteModules {
    const RULES: &[(&str, &[&str], &[&str])] = &[
        ("/calendar", &["calendar"], &["export", "print"]),
        ("/profile", &["user-profile"], &["achievements", "history"]),
        ("/admin", &["admin-dashboard"], &["analytics", "reports"]),
        ("/notifications", &["notifications"], &["reminders"]),
        ("/recommendations", &["recommendations"], &["ai-engine"]),
    ];

    if path == "/" || path.contains("/tournaments") {
        return RouteModules {
            critical: vec!["search", "filters"],
            non_critical: vec!["favorites", "ratings", "comparison"],
        };
    }

    RULES
        .iter()
        .find(|(fragment, _, _)| path.contains(*fragment))
        .map(|(_, critical, non_critical)| RouteModules {
            critical: critical.to_vec(),
            non_critical: non_critical.to_vec(),
        })
        .unwrap_or_default()
}

/// Page features that hint which modules will likely be needed soon.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageHints {
    pub logged_in: bool,
    pub tournament_list: bool,
    pub calendar: bool,
}

impl PageHints {
    pub fn likely_modules(self) -> Vec<&'static str> {
        let mut modules = Vec::new();
        if self.logged_in {
            modules.extend(["favorites", "achievements", "user-profile"]);
        }
        if self.tournament_list {
            modules.extend(["comparison", "filters"]);
        }
        if self.calendar {
            modules.extend(["calendar", "calendar-export"]);
        }
        modules
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use futures::future::join_all;

    use super::*;

    fn counting_module(loader: &ModuleLoader, name: &str, calls: Arc<AtomicUsize>) {
        loader.register_module(name, move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            }
        });
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_loads_run_the_thunk_once() {
        let loader = ModuleLoader::new();
        let calls = Arc::new(AtomicUsize::new(0));
        counting_module(&loader, "search", calls.clone());

        let pending: Vec<_> = (0..8).map(|_| loader.load_module("search")).collect();
        assert_eq!(loader.state("search"), ModuleLoadState::Loading);

        for result in join_all(pending).await {
            assert_eq!(result, Ok(()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(loader.is_module_loaded("search"));

        loader.load_module("search").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_retried_on_next_call() {
        let loader = ModuleLoader::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        loader.register_module("ratings", move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err::<(), BoxError>("network down".into())
                } else {
                    Ok(())
                }
            }
        });

        let err = loader.load_module("ratings").await.unwrap_err();
        assert!(matches!(err, ModuleLoadError::Failed { .. }));
        assert!(matches!(loader.state("ratings"), ModuleLoadState::Failed(_)));

        loader.load_module("ratings").await.unwrap();
        assert_eq!(loader.state("ratings"), ModuleLoadState::Loaded);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unregistered_module_is_an_error() {
        let loader = ModuleLoader::new();
        let err = loader.load_module("ghost").await.unwrap_err();
        assert_eq!(
            err,
            ModuleLoadError::NotRegistered {
                name: "ghost".into()
            }
        );
        assert_eq!(loader.state("ghost"), ModuleLoadState::Unregistered);
    }

    #[tokio::test]
    async fn status_reports_loaded_and_registered() {
        let loader = ModuleLoader::new();
        let calls = Arc::new(AtomicUsize::new(0));
        counting_module(&loader, "calendar", calls.clone());
        counting_module(&loader, "print", calls);

        loader.load_module("calendar").await.unwrap();
        let status = loader.status();
        assert_eq!(status.loaded, vec!["calendar".to_string()]);
        assert!(status.loading.is_empty());
        assert_eq!(status.total_registered, 2);
        assert_eq!(loader.state("print"), ModuleLoadState::Registered);
    }

    #[test]
    fn routes_map_to_module_sets() {
        assert_eq!(route_modules("/").critical, vec!["search", "filters"]);
        assert_eq!(
            route_modules("/tournaments/42").non_critical,
            vec!["favorites", "ratings", "comparison"]
        );
        assert_eq!(route_modules("/calendar").non_critical, vec!["export", "print"]);
        assert_eq!(route_modules("/admin/users").critical, vec!["admin-dashboard"]);
        assert_eq!(route_modules("/about"), RouteModules::default());
    }

    #[test]
    fn page_hints_accumulate_modules() {
        let hints = PageHints {
            logged_in: true,
            calendar: true,
            ..PageHints::default()
        };
        assert_eq!(
            hints.likely_modules(),
            vec![
                "favorites",
                "achievements",
                "user-profile",
                "calendar",
                "calendar-export"
            ]
        );
    }
}
