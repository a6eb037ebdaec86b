//! Visibility-driven component loading and route-based module preloading.

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::join_all;
use serde::Serialize;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    services::ui_events::{broadcast_component_load_failed, broadcast_component_loaded},
    state::{
        hub::EventHub,
        loader::{ModuleLoadError, ModuleLoader, route_modules},
    },
};

pub const DEFAULT_ROOT_MARGIN_PX: u32 = 50;
pub const DEFAULT_ROUTE_PRELOAD_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_PRELOAD_DELAY: Duration = Duration::from_millis(2000);

/// How the platform reports that an element became visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityStrategy {
    /// Elements load once they come within `root_margin_px` of the viewport.
    Intersection { root_margin_px: u32 },
    /// No intersection support: every observed element loads right away.
    Immediate,
}

impl VisibilityStrategy {
    pub fn select(intersection_supported: bool, root_margin_px: u32) -> Self {
        if intersection_supported {
            VisibilityStrategy::Intersection { root_margin_px }
        } else {
            VisibilityStrategy::Immediate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Pending,
    Loading,
    Loaded,
    LoadError,
}

#[derive(Debug, Clone)]
struct TrackedComponent {
    module: String,
    status: ComponentStatus,
}

/// Tracks elements tagged with a module name and loads each module the first time its
/// element becomes visible.
#[derive(Clone)]
pub struct ComponentTracker {
    loader: ModuleLoader,
    events: EventHub,
    strategy: VisibilityStrategy,
    components: Arc<DashMap<String, TrackedComponent>>,
}

impl ComponentTracker {
    pub fn new(loader: ModuleLoader, events: EventHub, strategy: VisibilityStrategy) -> Self {
        Self {
            loader,
            events,
            strategy,
            components: Arc::new(DashMap::new()),
        }
    }

    pub fn strategy(&self) -> VisibilityStrategy {
        self.strategy
    }

    /// Start observing `element_id`. Under the immediate strategy the load starts now.
    ///
    /// An element that is already tracked keeps its status; it is never loaded twice.
    pub fn observe(&self, element_id: &str, module: &str) -> Option<JoinHandle<()>> {
        match self.components.entry(element_id.to_string()) {
            Entry::Occupied(_) => {
                debug!(element_id, "component already observed");
                return None;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(TrackedComponent {
                    module: module.to_string(),
                    status: ComponentStatus::Pending,
                });
            }
        }
        debug!(element_id, module, "observing lazy component");

        match self.strategy {
            VisibilityStrategy::Immediate => self.trigger(element_id),
            VisibilityStrategy::Intersection { .. } => None,
        }
    }

    /// Report that `element_id` is `distance_px` away from the viewport.
    ///
    /// Observation is one-shot: only the first report within the margin starts a load.
    pub fn notify_intersecting(&self, element_id: &str, distance_px: u32) -> Option<JoinHandle<()>> {
        if let VisibilityStrategy::Intersection { root_margin_px } = self.strategy {
            if distance_px > root_margin_px {
                return None;
            }
        }
        self.trigger(element_id)
    }

    pub fn status(&self, element_id: &str) -> Option<ComponentStatus> {
        self.components.get(element_id).map(|entry| entry.status)
    }

    /// Load the module behind `element_id` and publish the outcome.
    ///
    /// A failed element stays in the tracker with [`ComponentStatus::LoadError`].
    pub async fn load_component(&self, element_id: &str) -> Result<(), ModuleLoadError> {
        let Some(module) = self.set_status(element_id, ComponentStatus::Loading) else {
            warn!(element_id, "load requested for unknown component");
            return Ok(());
        };

        match self.loader.load_module(&module).await {
            Ok(()) => {
                self.set_status(element_id, ComponentStatus::Loaded);
                broadcast_component_loaded(&self.events, element_id, &module);
                Ok(())
            }
            Err(err) => {
                self.set_status(element_id, ComponentStatus::LoadError);
                broadcast_component_load_failed(&self.events, element_id, &module, &err.to_string());
                Err(err)
            }
        }
    }

    fn trigger(&self, element_id: &str) -> Option<JoinHandle<()>> {
        {
            let mut entry = self.components.get_mut(element_id)?;
            if entry.status != ComponentStatus::Pending {
                return None;
            }
            entry.status = ComponentStatus::Loading;
        }

        let tracker = self.clone();
        let element_id = element_id.to_string();
        Some(tokio::spawn(async move {
            // Outcome is already logged by the loader and published as an event.
            let _ = tracker.load_component(&element_id).await;
        }))
    }

    fn set_status(&self, element_id: &str, status: ComponentStatus) -> Option<String> {
        let mut entry = self.components.get_mut(element_id)?;
        entry.status = status;
        Some(entry.module.clone())
    }
}

/// Load the critical modules of `path` now and the rest after `delay`.
pub fn spawn_route_preload(loader: ModuleLoader, path: &str, delay: Duration) -> JoinHandle<()> {
    let modules = route_modules(path);
    let path = path.to_string();
    tokio::spawn(async move {
        if modules.critical.is_empty() && modules.non_critical.is_empty() {
            return;
        }
        info!(%path, critical = ?modules.critical, "preloading route modules");
        load_all(&loader, modules.critical.iter().copied()).await;

        if !modules.non_critical.is_empty() {
            sleep(delay).await;
            load_all(&loader, modules.non_critical.iter().copied()).await;
        }
    })
}

/// After `delay`, load every name in `names` that is not loaded yet.
pub fn preload_modules(loader: ModuleLoader, names: Vec<String>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        let pending: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !loader.is_module_loaded(name))
            .collect();
        load_all(&loader, pending).await;
    })
}

async fn load_all<'a>(loader: &ModuleLoader, names: impl IntoIterator<Item = &'a str>) {
    let loads: Vec<_> = names
        .into_iter()
        .filter(|name| loader.is_registered(name))
        .map(|name| loader.load_module(name))
        .collect();
    join_all(loads).await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::services::ui_events::{EVENT_COMPONENT_LOAD_FAILED, EVENT_COMPONENT_LOADED};

    fn counting_loader(names: &[&str]) -> (ModuleLoader, Arc<AtomicUsize>) {
        let loader = ModuleLoader::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for name in names {
            let calls = calls.clone();
            loader.register_module(*name, move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });
        }
        (loader, calls)
    }

    #[tokio::test]
    async fn intersection_loads_once_within_margin() {
        let (loader, calls) = counting_loader(&["calendar"]);
        let events = EventHub::new(8);
        let mut rx = events.subscribe();
        let tracker = ComponentTracker::new(
            loader.clone(),
            events,
            VisibilityStrategy::select(true, DEFAULT_ROOT_MARGIN_PX),
        );

        assert!(tracker.observe("cal-1", "calendar").is_none());
        assert!(tracker.notify_intersecting("cal-1", 120).is_none());
        assert_eq!(tracker.status("cal-1"), Some(ComponentStatus::Pending));

        tracker.notify_intersecting("cal-1", 40).unwrap().await.unwrap();
        assert!(tracker.notify_intersecting("cal-1", 0).is_none());

        assert_eq!(tracker.status("cal-1"), Some(ComponentStatus::Loaded));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.recv().await.unwrap().event, EVENT_COMPONENT_LOADED);
    }

    #[tokio::test]
    async fn observing_a_loaded_element_again_is_ignored() {
        let (loader, calls) = counting_loader(&["ratings"]);
        let events = EventHub::new(8);
        let mut rx = events.subscribe();
        let tracker = ComponentTracker::new(
            loader,
            events,
            VisibilityStrategy::select(true, DEFAULT_ROOT_MARGIN_PX),
        );

        assert!(tracker.observe("stars", "ratings").is_none());
        tracker.notify_intersecting("stars", 0).unwrap().await.unwrap();

        assert!(tracker.observe("stars", "ratings").is_none());
        assert_eq!(tracker.status("stars"), Some(ComponentStatus::Loaded));
        assert!(tracker.notify_intersecting("stars", 0).is_none());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.recv().await.unwrap().event, EVENT_COMPONENT_LOADED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn immediate_strategy_loads_on_observe() {
        let (loader, calls) = counting_loader(&["map"]);
        let tracker = ComponentTracker::new(loader, EventHub::new(4), VisibilityStrategy::Immediate);

        tracker.observe("map-1", "map").unwrap().await.unwrap();
        assert_eq!(tracker.status("map-1"), Some(ComponentStatus::Loaded));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_component_keeps_error_status() {
        let loader = ModuleLoader::new();
        loader.register_module("broken", || async { Err("chunk missing".into()) });
        let events = EventHub::new(4);
        let mut rx = events.subscribe();
        let tracker = ComponentTracker::new(loader, events, VisibilityStrategy::Immediate);

        tracker.observe("el", "broken").unwrap().await.unwrap();
        assert_eq!(tracker.status("el"), Some(ComponentStatus::LoadError));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, EVENT_COMPONENT_LOAD_FAILED);
        assert_eq!(event.data["component_name"], "broken");
    }

    #[tokio::test(start_paused = true)]
    async fn route_preload_defers_non_critical_modules() {
        let (loader, _) =
            counting_loader(&["search", "filters", "favorites", "ratings", "comparison"]);

        let task = spawn_route_preload(loader.clone(), "/tournaments", DEFAULT_ROUTE_PRELOAD_DELAY);
        sleep(Duration::from_millis(10)).await;
        assert!(loader.is_module_loaded("search"));
        assert!(loader.is_module_loaded("filters"));
        assert!(!loader.is_module_loaded("favorites"));

        task.await.unwrap();
        assert!(loader.is_module_loaded("comparison"));
    }

    #[tokio::test(start_paused = true)]
    async fn preload_skips_already_loaded_modules() {
        let (loader, calls) = counting_loader(&["history", "reminders"]);
        loader.load_module("history").await.unwrap();

        preload_modules(
            loader.clone(),
            vec!["history".into(), "reminders".into(), "unknown".into()],
            DEFAULT_PRELOAD_DELAY,
        )
        .await
        .unwrap();

        assert!(loader.is_module_loaded("reminders"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
