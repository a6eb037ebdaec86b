//! Headless ChessCalendar-RU client: loads the profile, preloads route modules, prints the
//! current month and keeps analytics flowing until shutdown.

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chesscalendar_client::{
    config::AppConfig,
    dao::file_store::FileStore,
    dto::tournament::{TournamentDto, TournamentQuery},
    services::{
        analytics::run_flush_loop,
        lazy_loading::{preload_modules, spawn_route_preload},
        tournament_service::load_tournaments,
    },
    state::{
        AppState, SharedState,
        calendar::{CalendarView, DayCell, MonthGrid, WEEKDAY_NAMES},
        loader::PageHints,
    },
};

/// Modules the client knows how to initialise.
const MODULES: &[&str] = &[
    "search",
    "filters",
    "favorites",
    "ratings",
    "comparison",
    "calendar",
    "calendar-export",
    "export",
    "print",
    "user-profile",
    "achievements",
    "history",
    "admin-dashboard",
    "analytics",
    "reports",
    "notifications",
    "reminders",
    "recommendations",
    "ai-engine",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let path = env::args().nth(1).unwrap_or_else(|| "/".into());
    let store = FileStore::open(&config.data_dir).context("opening profile directory")?;
    let state = AppState::new(config, Arc::new(store)).context("building API client")?;

    register_modules(&state);
    let route_preload = spawn_route_preload(
        state.loader().clone(),
        &path,
        state.config().loader.route_preload_delay,
    );
    let hinted = PageHints {
        logged_in: state.config().user_id != "anonymous",
        tournament_list: path == "/" || path.contains("/tournaments"),
        calendar: path.contains("/calendar"),
    };
    let hinted_preload = preload_modules(
        state.loader().clone(),
        hinted
            .likely_modules()
            .into_iter()
            .map(String::from)
            .collect(),
        state.config().loader.preload_delay,
    );

    state.analytics().page_view(&path, &path, "ChessCalendar-RU", "").await;

    let tournaments = match load_tournaments(&state, &TournamentQuery::default()).await {
        Ok(tournaments) => tournaments,
        Err(err) => {
            warn!(error = %err, "starting with an empty tournament list");
            Vec::new()
        }
    };
    let today = OffsetDateTime::now_utc().date();
    let view = CalendarView::new(today, tournaments);
    match view.grid() {
        Ok(grid) => print_month(&grid, view.tournaments()),
        Err(err) => warn!(error = %err, "cannot render current month"),
    }

    let flush_loop = tokio::spawn(run_flush_loop(
        state.analytics().clone(),
        state.config().analytics.flush_interval,
    ));
    info!(path = %path, "client ready; press Ctrl+C to exit");

    shutdown_signal().await;

    flush_loop.abort();
    route_preload.abort();
    hinted_preload.abort();
    match state.analytics().flush(true).await {
        Ok(count) => info!(count, "final analytics flush handed off"),
        Err(err) => warn!(error = %err, "final analytics flush failed"),
    }
    // Give the beacon a moment before the runtime shuts down.
    sleep(Duration::from_millis(200)).await;
    info!(status = ?state.loader().status(), "client stopped");
    Ok(())
}

fn register_modules(state: &SharedState) {
    for &name in MODULES {
        state.loader().register_module(name, move || async move {
            info!(module = name, "module initialised");
            Ok(())
        });
    }
}

fn print_month(grid: &MonthGrid, tournaments: &[TournamentDto]) {
    println!("{} {}", grid.month, grid.year);
    println!("{}", WEEKDAY_NAMES.map(|name| format!("{name:>4}")).concat());
    for week in grid.weeks() {
        let row: String = week
            .iter()
            .map(|cell| match cell {
                DayCell::Blank => "    ".to_string(),
                DayCell::Day(slot) if slot.tournament_count() > 0 => {
                    format!("{:>3}*", slot.date.day())
                }
                DayCell::Day(slot) => format!("{:>4}", slot.date.day()),
            })
            .collect();
        println!("{row}");
    }

    for slot in grid.days().filter(|slot| slot.tournament_count() > 0) {
        let names: Vec<&str> = slot
            .tournament_ids
            .iter()
            .filter_map(|id| tournaments.iter().find(|t| t.id == *id))
            .map(|t| t.name.as_str())
            .collect();
        println!("{}: {}", slot.date, names.join(", "));
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
