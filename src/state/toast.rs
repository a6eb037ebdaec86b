//! Ephemeral user notifications with auto-expiry and two-phase removal.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::debug;
use uuid::Uuid;

use crate::{
    dto::events::{ToastEvent, ToastPhase},
    services::ui_events::broadcast_toast,
    state::hub::EventHub,
};

/// Identifier handed back by [`ToastPresenter::show`].
pub type ToastId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

impl ToastKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Warning => "warning",
            ToastKind::Info => "info",
        }
    }

    /// Title used when the caller gives none.
    pub fn default_title(self) -> &'static str {
        match self {
            ToastKind::Success => "Успешно",
            ToastKind::Error => "Ошибка",
            ToastKind::Warning => "Внимание",
            ToastKind::Info => "Информация",
        }
    }
}

/// Presenter limits and timings.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToastSettings {
    pub max_active: usize,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "default_duration_ms")]
    pub default_duration: Duration,
    /// Delay between marking a toast as removing and detaching it.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "exit_delay_ms")]
    pub exit_delay: Duration,
}

impl Default for ToastSettings {
    fn default() -> Self {
        Self {
            max_active: 5,
            default_duration: Duration::from_millis(5_000),
            exit_delay: Duration::from_millis(300),
        }
    }
}

/// Request to display a toast.
#[derive(Debug, Clone)]
pub struct ToastOptions {
    pub kind: ToastKind,
    pub title: Option<String>,
    pub message: String,
    /// `None` uses the presenter default; `Some(Duration::ZERO)` never expires.
    pub duration: Option<Duration>,
    pub closable: bool,
}

impl ToastOptions {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: None,
            message: message.into(),
            duration: None,
            closable: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Keep the toast until it is dismissed explicitly.
    pub fn persistent(self) -> Self {
        self.with_duration(Duration::ZERO)
    }

    pub fn not_closable(mut self) -> Self {
        self.closable = false;
        self
    }
}

/// A toast attached to the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
    pub duration: Duration,
    pub closable: bool,
    /// Set once dismissal started; the toast is detached after the exit delay.
    pub removing: bool,
}

impl Toast {
    fn event(&self, phase: ToastPhase) -> ToastEvent {
        ToastEvent {
            id: self.id,
            phase,
            kind: self.kind.as_str(),
            title: self.title.clone(),
            message: self.message.clone(),
        }
    }
}

/// Queue of visible toasts, oldest first.
///
/// Timers run on spawned Tokio tasks, so the presenter must be used inside a runtime.
#[derive(Clone)]
pub struct ToastPresenter {
    toasts: Arc<Mutex<Vec<Toast>>>,
    events: EventHub,
    settings: ToastSettings,
}

impl ToastPresenter {
    pub fn new(events: EventHub, settings: ToastSettings) -> Self {
        Self {
            toasts: Arc::new(Mutex::new(Vec::new())),
            events,
            settings,
        }
    }

    pub fn show(&self, options: ToastOptions) -> ToastId {
        let duration = options.duration.unwrap_or(self.settings.default_duration);
        let toast = Toast {
            id: Uuid::new_v4(),
            kind: options.kind,
            title: options
                .title
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| options.kind.default_title().to_string()),
            message: options.message,
            duration,
            closable: options.closable,
            removing: false,
        };
        let id = toast.id;

        let evicted = {
            let toasts = self.lock();
            let mut active = toasts.iter().filter(|toast| !toast.removing);
            let oldest = active.next().map(|toast| toast.id);
            if active.count() + 1 >= self.settings.max_active {
                oldest
            } else {
                None
            }
        };
        if let Some(oldest) = evicted {
            debug!(toast = %oldest, "evicting oldest toast");
            self.dismiss(oldest);
        }

        let shown = toast.event(ToastPhase::Shown);
        self.lock().push(toast);
        broadcast_toast(&self.events, &shown);

        if !duration.is_zero() {
            let presenter = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                presenter.dismiss(id);
            });
        }
        id
    }

    /// Start removing `id`; returns `false` when it is already removing or gone.
    ///
    /// The toast stays attached, flagged as removing, until the exit delay elapsed.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let removing = {
            let mut toasts = self.lock();
            match toasts.iter_mut().find(|toast| toast.id == id && !toast.removing) {
                Some(toast) => {
                    toast.removing = true;
                    toast.event(ToastPhase::Removing)
                }
                None => return false,
            }
        };
        broadcast_toast(&self.events, &removing);

        let presenter = self.clone();
        let delay = self.settings.exit_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            presenter.detach(id);
        });
        true
    }

    /// Every attached toast, including those playing their exit animation.
    pub fn toasts(&self) -> Vec<Toast> {
        self.lock().clone()
    }

    /// Number of toasts not yet being removed.
    pub fn active_count(&self) -> usize {
        self.lock().iter().filter(|toast| !toast.removing).count()
    }

    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.show(ToastOptions::new(ToastKind::Success, message))
    }

    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.show(ToastOptions::new(ToastKind::Error, message))
    }

    pub fn warning(&self, message: impl Into<String>) -> ToastId {
        self.show(ToastOptions::new(ToastKind::Warning, message))
    }

    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.show(ToastOptions::new(ToastKind::Info, message))
    }

    pub fn tournament_added(&self) -> ToastId {
        self.success("Турнир успешно добавлен в избранное")
    }

    pub fn tournament_removed(&self) -> ToastId {
        self.info("Турнир удален из избранного")
    }

    pub fn filter_applied(&self) -> ToastId {
        self.success("Фильтры применены")
    }

    pub fn export_success(&self, format: &str) -> ToastId {
        self.success(format!("Данные экспортированы в формате {format}"))
    }

    pub fn export_error(&self) -> ToastId {
        self.error("Не удалось экспортировать данные")
    }

    pub fn comparison_ready(&self, count: usize) -> ToastId {
        self.success(format!("Готово к сравнению {count} турниров"))
    }

    pub fn network_error(&self) -> ToastId {
        self.error("Ошибка сети. Проверьте подключение к интернету")
    }

    pub fn copied(&self) -> ToastId {
        self.success("Скопировано в буфер обмена")
    }

    pub fn saved(&self) -> ToastId {
        self.success("Изменения сохранены")
    }

    /// Persistent, non-closable progress toast; dismiss it once the work is done.
    pub fn loading(&self, message: Option<&str>) -> ToastId {
        self.show(
            ToastOptions::new(ToastKind::Info, message.unwrap_or("Загрузка..."))
                .with_title("Загрузка")
                .persistent()
                .not_closable(),
        )
    }

    fn detach(&self, id: ToastId) {
        let removed = {
            let mut toasts = self.lock();
            let Some(index) = toasts.iter().position(|toast| toast.id == id) else {
                return;
            };
            toasts.remove(index)
        };
        broadcast_toast(&self.events, &removed.event(ToastPhase::Removed));
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Toast>> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use tokio::{sync::broadcast::Receiver, time::sleep};

    use super::*;
    use crate::{dto::events::UiEvent, services::ui_events::EVENT_TOAST};

    fn presenter() -> (ToastPresenter, Receiver<UiEvent>) {
        let hub = EventHub::new(64);
        let events = hub.subscribe();
        (ToastPresenter::new(hub, ToastSettings::default()), events)
    }

    fn phases(events: &mut Receiver<UiEvent>) -> Vec<String> {
        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            assert_eq!(event.event, EVENT_TOAST);
            phases.push(event.data["phase"].as_str().unwrap_or_default().to_string());
        }
        phases
    }

    #[tokio::test(start_paused = true)]
    async fn toast_expires_after_duration_and_exit_delay() {
        let (toasts, mut events) = presenter();
        let id = toasts.success("Сохранено");
        assert_eq!(toasts.toasts()[0].title, "Успешно");

        sleep(Duration::from_millis(5_001)).await;
        let snapshot = toasts.toasts();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].removing);
        assert_eq!(snapshot[0].id, id);

        sleep(Duration::from_millis(300)).await;
        assert!(toasts.toasts().is_empty());
        assert_eq!(phases(&mut events), vec!["shown", "removing", "removed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_toast_only_leaves_on_dismiss() {
        let (toasts, _events) = presenter();
        let id = toasts.loading(None);

        sleep(Duration::from_secs(3_600)).await;
        assert_eq!(toasts.active_count(), 1);
        assert!(!toasts.toasts()[0].closable);

        assert!(toasts.dismiss(id));
        assert_eq!(toasts.toasts().len(), 1);
        sleep(Duration::from_millis(301)).await;
        assert!(toasts.toasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_is_idempotent() {
        let (toasts, mut events) = presenter();
        let id = toasts.show(ToastOptions::new(ToastKind::Info, "x").persistent());

        assert!(toasts.dismiss(id));
        assert!(!toasts.dismiss(id));
        sleep(Duration::from_millis(301)).await;
        assert!(!toasts.dismiss(id));
        assert_eq!(phases(&mut events), vec!["shown", "removing", "removed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn sixth_toast_evicts_the_oldest() {
        let (toasts, _events) = presenter();
        let ids: Vec<_> = (0..6)
            .map(|n| toasts.show(ToastOptions::new(ToastKind::Info, format!("#{n}")).persistent()))
            .collect();

        assert_eq!(toasts.active_count(), 5);
        let first = toasts
            .toasts()
            .into_iter()
            .find(|toast| toast.id == ids[0])
            .unwrap();
        assert!(first.removing);

        sleep(Duration::from_millis(301)).await;
        let remaining: Vec<_> = toasts.toasts().into_iter().map(|toast| toast.id).collect();
        assert_eq!(remaining, ids[1..].to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_title_overrides_default() {
        let (toasts, _events) = presenter();
        toasts.show(
            ToastOptions::new(ToastKind::Warning, "Лимит")
                .with_title("Сравнение")
                .persistent(),
        );
        assert_eq!(toasts.toasts()[0].title, "Сравнение");
    }
}
