pub mod calendar;
pub mod collection;
pub mod filters;
pub mod hub;
pub mod loader;
pub mod preferences;
pub mod ratings;
pub mod toast;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::{
    config::AppConfig,
    dao::{
        models::TournamentId,
        storage::KeyValueStore,
    },
    dto::tournament::TournamentDto,
    services::{
        analytics::{AnalyticsClient, AnalyticsTransport, HttpTransport},
        api_client::{ApiError, CalendarApi},
        lazy_loading::{ComponentTracker, VisibilityStrategy},
        share::ShareCounters,
        shortcuts::ShortcutDispatcher,
    },
};

use self::{
    collection::{CollectionRules, Comparison, Favorites, History, RecentSearches},
    filters::{FilterPresets, FilterState},
    hub::EventHub,
    loader::ModuleLoader,
    preferences::{AccessibilitySettings, PreferenceStore, ScalarSetting, ShortcutsEnabled, Theme},
    ratings::RatingBook,
    toast::ToastPresenter,
};

pub type SharedState = Arc<AppState>;

/// Capacity of the UI event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Central client state: persisted stores, service handles and the tournament cache.
pub struct AppState {
    config: AppConfig,
    api: CalendarApi,
    events: EventHub,
    toasts: ToastPresenter,
    loader: ModuleLoader,
    components: ComponentTracker,
    analytics: Arc<AnalyticsClient>,
    favorites: RwLock<Favorites>,
    history: RwLock<History>,
    comparison: RwLock<Comparison>,
    ratings: RwLock<RatingBook>,
    accessibility: RwLock<PreferenceStore<AccessibilitySettings>>,
    theme: RwLock<ScalarSetting<Theme>>,
    shortcuts_enabled: RwLock<ScalarSetting<ShortcutsEnabled>>,
    shortcuts: Mutex<ShortcutDispatcher>,
    shares: RwLock<ShareCounters>,
    recent_searches: RwLock<RecentSearches>,
    filters: RwLock<PreferenceStore<FilterState>>,
    filter_presets: RwLock<FilterPresets>,
    tournaments: DashMap<TournamentId, TournamentDto>,
}

impl AppState {
    /// Build the state over `store`, posting analytics to the configured API.
    pub fn new(config: AppConfig, store: Arc<dyn KeyValueStore>) -> Result<SharedState, ApiError> {
        let api = CalendarApi::new(&config.api_url, config.user_id.as_str(), config.request_timeout)?;
        let transport = Arc::new(HttpTransport::new(api.clone(), config.analytics.endpoint.clone()));
        Ok(Self::with_transport(config, store, api, transport))
    }

    /// Build the state with an explicit analytics transport.
    pub fn with_transport(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        api: CalendarApi,
        transport: Arc<dyn AnalyticsTransport>,
    ) -> SharedState {
        let events = EventHub::new(EVENT_CHANNEL_CAPACITY);
        let toasts = ToastPresenter::new(events.clone(), config.toasts.clone());
        let loader = ModuleLoader::new();
        let strategy = VisibilityStrategy::select(
            config.loader.intersection_supported,
            config.loader.root_margin_px,
        );
        let components = ComponentTracker::new(loader.clone(), events.clone(), strategy);
        let analytics = Arc::new(AnalyticsClient::new(
            transport,
            config.user_id.clone(),
            config.client.clone(),
            config.analytics.clone(),
        ));

        Arc::new(Self {
            favorites: RwLock::new(Favorites::load(store.clone(), CollectionRules::FAVORITES)),
            history: RwLock::new(History::load(store.clone(), CollectionRules::HISTORY)),
            comparison: RwLock::new(Comparison::load(store.clone(), CollectionRules::COMPARISON)),
            ratings: RwLock::new(RatingBook::load(store.clone())),
            accessibility: RwLock::new(PreferenceStore::load(store.clone())),
            theme: RwLock::new(ScalarSetting::load(store.clone())),
            shortcuts_enabled: RwLock::new(ScalarSetting::load(store.clone())),
            shortcuts: Mutex::new(ShortcutDispatcher::new()),
            recent_searches: RwLock::new(RecentSearches::load(
                store.clone(),
                CollectionRules::RECENT_SEARCHES,
            )),
            filters: RwLock::new(PreferenceStore::load(store.clone())),
            filter_presets: RwLock::new(FilterPresets::load(store.clone())),
            shares: RwLock::new(ShareCounters::load(store)),
            tournaments: DashMap::new(),
            config,
            api,
            events,
            toasts,
            loader,
            components,
            analytics,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &CalendarApi {
        &self.api
    }

    /// Broadcast hub the view layer subscribes to.
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn toasts(&self) -> &ToastPresenter {
        &self.toasts
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn components(&self) -> &ComponentTracker {
        &self.components
    }

    pub fn analytics(&self) -> &Arc<AnalyticsClient> {
        &self.analytics
    }

    pub fn favorites(&self) -> &RwLock<Favorites> {
        &self.favorites
    }

    pub fn history(&self) -> &RwLock<History> {
        &self.history
    }

    pub fn comparison(&self) -> &RwLock<Comparison> {
        &self.comparison
    }

    pub fn ratings(&self) -> &RwLock<RatingBook> {
        &self.ratings
    }

    pub fn accessibility(&self) -> &RwLock<PreferenceStore<AccessibilitySettings>> {
        &self.accessibility
    }

    pub fn theme(&self) -> &RwLock<ScalarSetting<Theme>> {
        &self.theme
    }

    pub fn shortcuts_enabled(&self) -> &RwLock<ScalarSetting<ShortcutsEnabled>> {
        &self.shortcuts_enabled
    }

    /// Key sequence state of the shortcut dispatcher.
    pub fn shortcuts(&self) -> &Mutex<ShortcutDispatcher> {
        &self.shortcuts
    }

    pub fn shares(&self) -> &RwLock<ShareCounters> {
        &self.shares
    }

    pub fn recent_searches(&self) -> &RwLock<RecentSearches> {
        &self.recent_searches
    }

    /// Filters of the tournament list.
    pub fn filters(&self) -> &RwLock<PreferenceStore<FilterState>> {
        &self.filters
    }

    pub fn filter_presets(&self) -> &RwLock<FilterPresets> {
        &self.filter_presets
    }

    /// Tournaments seen in API responses, keyed by id.
    pub fn tournaments(&self) -> &DashMap<TournamentId, TournamentDto> {
        &self.tournaments
    }

    /// Cached tournament, if any list or detail response contained it.
    pub fn cached_tournament(&self, id: TournamentId) -> Option<TournamentDto> {
        self.tournaments.get(&id).map(|entry| entry.value().clone())
    }

    pub fn cache_tournaments<'a>(&self, tournaments: impl IntoIterator<Item = &'a TournamentDto>) {
        for tournament in tournaments {
            self.tournaments.insert(tournament.id, tournament.clone());
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{sync::Arc, time::Duration};

    use futures::{FutureExt, future::BoxFuture};

    use super::{AppState, SharedState};
    use crate::{
        config::AppConfig,
        dao::memory_store::MemoryStore,
        dto::analytics::AnalyticsBatch,
        services::{
            analytics::{AnalyticsTransport, TransportError},
            api_client::CalendarApi,
        },
    };

    /// Accepts every analytics batch without sending it anywhere.
    pub struct DiscardTransport;

    impl AnalyticsTransport for DiscardTransport {
        fn send<'a>(
            &'a self,
            _batch: &'a AnalyticsBatch,
        ) -> BoxFuture<'a, Result<(), TransportError>> {
            async { Ok(()) }.boxed()
        }

        fn beacon(&self, _batch: &AnalyticsBatch) -> bool {
            true
        }
    }

    /// State over an empty in-memory profile, talking to the API at `api_url`.
    pub fn state_with(api_url: &str, configure: impl FnOnce(&mut AppConfig)) -> SharedState {
        let mut config = AppConfig {
            api_url: api_url.to_string(),
            ..AppConfig::default()
        };
        configure(&mut config);
        let api = CalendarApi::new(&config.api_url, config.user_id.as_str(), Duration::from_secs(2))
            .unwrap();
        AppState::with_transport(
            config,
            Arc::new(MemoryStore::new()),
            api,
            Arc::new(DiscardTransport),
        )
    }
}
