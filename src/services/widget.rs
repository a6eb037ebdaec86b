//! Read-only tournament widget for embedding on third-party sites.

use std::{fmt::Write as _, time::Duration};

use html_escape::{encode_double_quoted_attribute, encode_text};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    dto::tournament::{TournamentDto, TournamentQuery},
    services::api_client::{ApiError, CalendarApi},
    state::{calendar::parse_day, preferences::Theme},
};

pub const DEFAULT_WIDGET_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_WIDGET_LIMIT: u32 = 5;

const EMPTY_TITLE: &str = "Шахматные турниры";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WidgetKind {
    #[default]
    Upcoming,
    Popular,
    Category,
}

impl WidgetKind {
    fn parse(raw: &str) -> Self {
        match raw {
            "popular" => WidgetKind::Popular,
            "category" => WidgetKind::Category,
            _ => WidgetKind::Upcoming,
        }
    }
}

/// Widget settings read from the `data-*` attributes of the embedding tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub kind: WidgetKind,
    pub limit: u32,
    pub category: String,
    pub theme: Theme,
    pub api_url: String,
    pub show_dates: bool,
    pub show_location: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            kind: WidgetKind::Upcoming,
            limit: DEFAULT_WIDGET_LIMIT,
            category: String::new(),
            theme: Theme::Light,
            api_url: DEFAULT_WIDGET_API_URL.to_string(),
            show_dates: true,
            show_location: true,
        }
    }
}

impl WidgetConfig {
    /// Build from tag attributes; missing or malformed values fall back to the defaults.
    pub fn from_attributes(attributes: &IndexMap<String, String>) -> Self {
        let attr = |name: &str| attribute(attributes, name);
        let defaults = Self::default();

        Self {
            kind: attr("data-widget").map_or(defaults.kind, WidgetKind::parse),
            limit: attr("data-limit")
                .and_then(|value| value.parse().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.limit),
            category: attr("data-category").unwrap_or_default().to_string(),
            theme: match attr("data-theme") {
                Some("dark") => Theme::Dark,
                _ => Theme::Light,
            },
            api_url: attr("data-api-url")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            show_dates: attr("data-show-dates") != Some("false"),
            show_location: attr("data-show-location") != Some("false"),
        }
    }

    /// Query sent to the tournament list endpoint.
    pub fn query(&self) -> TournamentQuery {
        match self.kind {
            WidgetKind::Upcoming => TournamentQuery {
                status: Some("upcoming".into()),
                limit: Some(self.limit),
                ..TournamentQuery::default()
            },
            _ if !self.category.is_empty() => TournamentQuery {
                category: Some(self.category.clone()),
                limit: Some(self.limit),
                ..TournamentQuery::default()
            },
            _ => TournamentQuery::default(),
        }
    }

    pub fn title(&self) -> String {
        match self.kind {
            WidgetKind::Upcoming => "Предстоящие турниры".to_string(),
            _ if !self.category.is_empty() => format!("Турниры: {}", self.category),
            _ => EMPTY_TITLE.to_string(),
        }
    }
}

fn attribute<'a>(attributes: &'a IndexMap<String, String>, name: &str) -> Option<&'a str> {
    attributes
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

/// Fetch tournaments for `config` and render the widget; fetch failures render the empty state.
pub async fn load_widget(config: &WidgetConfig, timeout: Duration) -> String {
    let tournaments = match fetch_tournaments(config, timeout).await {
        Ok(tournaments) => tournaments,
        Err(err) => {
            warn!(api_url = %config.api_url, error = %err, "widget failed to fetch tournaments");
            Vec::new()
        }
    };
    debug!(count = tournaments.len(), "rendering widget");
    render_widget(config, &tournaments)
}

async fn fetch_tournaments(
    config: &WidgetConfig,
    timeout: Duration,
) -> Result<Vec<TournamentDto>, ApiError> {
    let api = CalendarApi::new(&config.api_url, "widget", timeout)?;
    api.list_tournaments(&config.query()).await
}

/// Self-contained HTML for the widget, at most `config.limit` items.
pub fn render_widget(config: &WidgetConfig, tournaments: &[TournamentDto]) -> String {
    let mut html = String::new();
    let _ = write!(html, r#"<div class="chess-calendar-widget chess-widget-{}">"#, config.theme);
    html.push_str("<style>");
    html.push_str(&styles(config.theme));
    html.push_str("</style>");

    if tournaments.is_empty() {
        push_header(&mut html, EMPTY_TITLE);
        html.push_str(r#"<div class="chess-widget-empty">Нет доступных турниров</div>"#);
        html.push_str("</div>");
        return html;
    }

    push_header(&mut html, &config.title());
    html.push_str(r#"<ul class="chess-widget-list">"#);
    for tournament in tournaments.iter().take(config.limit as usize) {
        push_item(&mut html, config, tournament);
    }
    html.push_str("</ul>");
    let _ = write!(
        html,
        r#"<div class="chess-widget-footer"><a href="{}" class="chess-widget-link" target="_blank">Все турниры на ChessCalendar-RU →</a></div>"#,
        encode_double_quoted_attribute(&config.api_url)
    );
    html.push_str("</div>");
    html
}

fn push_header(html: &mut String, title: &str) {
    let _ = write!(
        html,
        r#"<div class="chess-widget-header"><h3 class="chess-widget-title"><span class="chess-widget-logo">♟️</span> {}</h3></div>"#,
        encode_text(title)
    );
}

fn push_item(html: &mut String, config: &WidgetConfig, tournament: &TournamentDto) {
    let url = format!("{}/tournament/{}", config.api_url, tournament.id);
    let _ = write!(
        html,
        r#"<li class="chess-widget-item"><a href="{}" target="_blank"><div class="chess-widget-item-title">{}</div><div class="chess-widget-item-meta">"#,
        encode_double_quoted_attribute(&url),
        encode_text(&tournament.name)
    );
    if config.show_dates {
        let date = tournament
            .start_date
            .as_deref()
            .map(format_date)
            .unwrap_or_default();
        let _ = write!(html, "<span>📅 {}</span>", encode_text(&date));
    }
    if config.show_location {
        let _ = write!(html, "<span>📍 {}</span>", encode_text(&tournament.location));
    }
    html.push_str("</div></a></li>");
}

/// `DD.MM.YYYY`, or the raw text when it is not a date.
fn format_date(raw: &str) -> String {
    match parse_day(raw) {
        Some(date) => format!(
            "{:02}.{:02}.{}",
            date.day(),
            u8::from(date.month()),
            date.year()
        ),
        None => raw.to_string(),
    }
}

fn styles(theme: Theme) -> String {
    let dark = theme == Theme::Dark;
    let pick = |dark_value: &'static str, light_value: &'static str| {
        if dark { dark_value } else { light_value }
    };
    format!(
        ".chess-calendar-widget{{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;\
         background:{bg};border-radius:12px;padding:1.5rem;color:{fg}}}\
         .chess-widget-header{{margin-bottom:1rem;padding-bottom:1rem;border-bottom:2px solid {border}}}\
         .chess-widget-list{{list-style:none;padding:0;margin:0}}\
         .chess-widget-item{{padding:1rem;margin-bottom:0.75rem;background:{item};border-radius:8px}}\
         .chess-widget-item a{{color:inherit;text-decoration:none}}\
         .chess-widget-item-meta{{display:flex;gap:1rem;font-size:0.875rem;color:{muted}}}\
         .chess-widget-footer{{margin-top:1rem;text-align:center}}\
         .chess-widget-link{{color:#2563eb;font-weight:600}}\
         .chess-widget-empty{{text-align:center;padding:2rem;color:{empty}}}",
        bg = pick("#1e293b", "#ffffff"),
        fg = pick("#f8fafc", "#1e293b"),
        border = pick("#334155", "#e2e8f0"),
        item = pick("#334155", "#f8fafc"),
        muted = pick("#cbd5e1", "#64748b"),
        empty = pick("#94a3b8", "#64748b"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api_client::test_server::serve_once;

    fn attributes(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    fn tournament(id: u64, name: &str) -> TournamentDto {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "location": "Казань",
            "start_date": "2024-03-10",
        }))
        .unwrap()
    }

    #[test]
    fn attributes_fall_back_to_defaults() {
        assert_eq!(WidgetConfig::from_attributes(&IndexMap::new()), WidgetConfig::default());

        let config = WidgetConfig::from_attributes(&attributes(&[
            ("data-widget", "category"),
            ("data-limit", "abc"),
            ("data-category", "blitz"),
            ("data-theme", "dark"),
            ("data-api-url", "https://chesscalendar.ru/"),
            ("data-show-location", "false"),
        ]));
        assert_eq!(config.kind, WidgetKind::Category);
        assert_eq!(config.limit, DEFAULT_WIDGET_LIMIT);
        assert_eq!(config.theme, Theme::Dark);
        assert_eq!(config.api_url, "https://chesscalendar.ru");
        assert!(config.show_dates);
        assert!(!config.show_location);
        assert_eq!(config.title(), "Турниры: blitz");
        assert_eq!(config.query().to_query_string(), "category=blitz&limit=5");
    }

    #[test]
    fn renders_limited_escaped_items() {
        let config = WidgetConfig {
            limit: 2,
            show_location: false,
            ..WidgetConfig::default()
        };
        let html = render_widget(
            &config,
            &[
                tournament(1, "<b>Open</b>"),
                tournament(2, "Cup"),
                tournament(3, "Hidden"),
            ],
        );

        assert!(html.contains("Предстоящие турниры"));
        assert!(html.contains("&lt;b&gt;Open&lt;/b&gt;"));
        assert!(html.contains("📅 10.03.2024"));
        assert!(html.contains("http://127.0.0.1:5000/tournament/2"));
        assert!(!html.contains("Hidden"));
        assert!(!html.contains("📍"));
    }

    #[test]
    fn api_url_cannot_break_out_of_links() {
        let config = WidgetConfig {
            api_url: r#"https://x.org/"><script>"#.into(),
            ..WidgetConfig::default()
        };
        let html = render_widget(&config, &[tournament(7, "Cup & Co")]);

        assert!(html.contains("Cup &amp; Co"));
        assert!(html.contains(r#"href="https://x.org/&quot;"#));
        assert!(!html.contains(r#"/"><script>"#));
    }

    #[test]
    fn empty_list_renders_empty_state() {
        let html = render_widget(&WidgetConfig::default(), &[]);
        assert!(html.contains("Нет доступных турниров"));
        assert!(!html.contains("chess-widget-list"));
    }

    #[tokio::test]
    async fn fetch_failure_renders_empty_state() {
        let (base_url, _server) = serve_once("500 Internal Server Error", "{}").await;
        let config = WidgetConfig {
            api_url: base_url,
            ..WidgetConfig::default()
        };
        let html = load_widget(&config, Duration::from_secs(5)).await;
        assert!(html.contains("Нет доступных турниров"));
    }

    #[tokio::test]
    async fn upcoming_widget_queries_upcoming_status() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"tournaments": [{"id": 4, "name": "Moscow Open", "location": "Москва"}]}"#,
        )
        .await;
        let config = WidgetConfig {
            api_url: base_url,
            ..WidgetConfig::default()
        };

        let html = load_widget(&config, Duration::from_secs(5)).await;
        assert!(html.contains("Moscow Open"));
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/tournaments?status=upcoming&limit=5 "));
    }
}
