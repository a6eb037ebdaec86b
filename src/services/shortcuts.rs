//! Keyboard shortcut resolution, including two-key `g` sequences.

use std::time::Duration;

use tokio::time::Instant;

/// How long a pending `g` waits for its second key.
pub const SEQUENCE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    GoHome,
    GoCalendar,
    GoMap,
    GoStatistics,
    FocusSearch,
    ToggleFilters,
    ResetFilters,
    OpenNotifications,
    OpenHistory,
    OpenStats,
    OpenCompare,
    ToggleTheme,
    ShowHelp,
    CloseModals,
    ScrollTop,
    ScrollBottom,
}

impl ShortcutAction {
    pub const ALL: [ShortcutAction; 16] = [
        ShortcutAction::GoHome,
        ShortcutAction::GoCalendar,
        ShortcutAction::GoMap,
        ShortcutAction::GoStatistics,
        ShortcutAction::FocusSearch,
        ShortcutAction::ToggleFilters,
        ShortcutAction::ResetFilters,
        ShortcutAction::OpenNotifications,
        ShortcutAction::OpenHistory,
        ShortcutAction::OpenStats,
        ShortcutAction::OpenCompare,
        ShortcutAction::ToggleTheme,
        ShortcutAction::ShowHelp,
        ShortcutAction::CloseModals,
        ShortcutAction::ScrollTop,
        ShortcutAction::ScrollBottom,
    ];

    /// Key binding as shown in the help dialog.
    pub fn binding(self) -> &'static str {
        match self {
            ShortcutAction::GoHome => "h",
            ShortcutAction::GoCalendar => "c",
            ShortcutAction::GoMap => "m",
            ShortcutAction::GoStatistics => "s",
            ShortcutAction::FocusSearch => "/",
            ShortcutAction::ToggleFilters => "f",
            ShortcutAction::ResetFilters => "r",
            ShortcutAction::OpenNotifications => "n",
            ShortcutAction::OpenHistory => "i",
            ShortcutAction::OpenStats => "p",
            ShortcutAction::OpenCompare => "o",
            ShortcutAction::ToggleTheme => "t",
            ShortcutAction::ShowHelp => "?",
            ShortcutAction::CloseModals => "Escape",
            ShortcutAction::ScrollTop => "g g",
            ShortcutAction::ScrollBottom => "g b",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShortcutAction::GoHome => "go_home",
            ShortcutAction::GoCalendar => "go_calendar",
            ShortcutAction::GoMap => "go_map",
            ShortcutAction::GoStatistics => "go_statistics",
            ShortcutAction::FocusSearch => "focus_search",
            ShortcutAction::ToggleFilters => "toggle_filters",
            ShortcutAction::ResetFilters => "reset_filters",
            ShortcutAction::OpenNotifications => "open_notifications",
            ShortcutAction::OpenHistory => "open_history",
            ShortcutAction::OpenStats => "open_stats",
            ShortcutAction::OpenCompare => "open_compare",
            ShortcutAction::ToggleTheme => "toggle_theme",
            ShortcutAction::ShowHelp => "show_help",
            ShortcutAction::CloseModals => "close_modals",
            ShortcutAction::ScrollTop => "scroll_top",
            ShortcutAction::ScrollBottom => "scroll_bottom",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ShortcutAction::GoHome => "Главная страница",
            ShortcutAction::GoCalendar => "Календарь",
            ShortcutAction::GoMap => "Карта турниров",
            ShortcutAction::GoStatistics => "Статистика",
            ShortcutAction::FocusSearch => "Фокус на поиск",
            ShortcutAction::ToggleFilters => "Показать/скрыть фильтры",
            ShortcutAction::ResetFilters => "Сбросить фильтры",
            ShortcutAction::OpenNotifications => "Уведомления",
            ShortcutAction::OpenHistory => "История просмотров",
            ShortcutAction::OpenStats => "Моя статистика",
            ShortcutAction::OpenCompare => "Сравнение турниров",
            ShortcutAction::ToggleTheme => "Переключить тему",
            ShortcutAction::ShowHelp => "Показать справку",
            ShortcutAction::CloseModals => "Закрыть модальные окна",
            ShortcutAction::ScrollTop => "Прокрутить наверх",
            ShortcutAction::ScrollBottom => "Прокрутить вниз",
        }
    }

    /// Page the action navigates to, if any.
    pub fn route(self) -> Option<&'static str> {
        match self {
            ShortcutAction::GoHome => Some("/"),
            ShortcutAction::GoCalendar => Some("/calendar"),
            ShortcutAction::GoMap => Some("/map"),
            ShortcutAction::GoStatistics => Some("/statistics"),
            _ => None,
        }
    }

    fn single(key: &str) -> Option<Self> {
        let action = match key {
            "h" => ShortcutAction::GoHome,
            "c" => ShortcutAction::GoCalendar,
            "m" => ShortcutAction::GoMap,
            "s" => ShortcutAction::GoStatistics,
            "/" => ShortcutAction::FocusSearch,
            "f" => ShortcutAction::ToggleFilters,
            "r" => ShortcutAction::ResetFilters,
            "n" => ShortcutAction::OpenNotifications,
            "i" => ShortcutAction::OpenHistory,
            "p" => ShortcutAction::OpenStats,
            "o" => ShortcutAction::OpenCompare,
            "t" => ShortcutAction::ToggleTheme,
            "?" => ShortcutAction::ShowHelp,
            "escape" => ShortcutAction::CloseModals,
            _ => return None,
        };
        Some(action)
    }
}

/// Turns key presses into actions, tracking a pending `g` prefix.
#[derive(Debug, Default)]
pub struct ShortcutDispatcher {
    pending_g: Option<Instant>,
}

impl ShortcutDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a key press at `now`.
    ///
    /// While a text input has focus only Escape is honoured.
    pub fn handle_key(
        &mut self,
        key: &str,
        in_text_input: bool,
        now: Instant,
    ) -> Option<ShortcutAction> {
        let key = key.to_lowercase();
        if in_text_input && key != "escape" {
            return None;
        }

        let pending = self
            .pending_g
            .take()
            .is_some_and(|started| now.duration_since(started) < SEQUENCE_TIMEOUT);
        if pending {
            match key.as_str() {
                "g" => return Some(ShortcutAction::ScrollTop),
                "b" => return Some(ShortcutAction::ScrollBottom),
                _ => {}
            }
        }

        if key == "g" {
            self.pending_g = Some(now);
            return None;
        }
        ShortcutAction::single(&key)
    }

    pub fn has_pending_sequence(&self) -> bool {
        self.pending_g.is_some()
    }
}
