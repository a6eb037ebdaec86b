//! User actions on tournaments: listing, favorites, comparison, history, ratings and sharing.

use serde_json::{Map, json};
use time::OffsetDateTime;
use tracing::{info, warn};
use validator::Validate;

use crate::{
    dao::models::{RatingRecord, Review, TournamentId},
    dto::{
        events::CollectionKind,
        format_timestamp,
        tournament::{
            AdminStatistics, BulkActionRequest, BulkActionResponse, RateRequest, ReviewInput,
            TournamentDto, TournamentQuery,
        },
    },
    error::AppError,
    services::{
        share::{ShareNetwork, tournament_url},
        surface,
        ui_events::broadcast_collection_changed,
    },
    state::{
        SharedState,
        collection::{AddOutcome, ToggleOutcome},
        ratings::{MAX_SCORE, RatingError},
    },
};

/// Fetch a page of tournaments and remember them for later snapshots.
pub async fn load_tournaments(
    state: &SharedState,
    query: &TournamentQuery,
) -> Result<Vec<TournamentDto>, AppError> {
    let tournaments = state
        .api()
        .list_tournaments(query)
        .await
        .map_err(|err| surface(state, err))?;
    state.cache_tournaments(&tournaments);
    info!(count = tournaments.len(), "tournaments loaded");
    Ok(tournaments)
}

/// Cached tournament, or a fresh copy from the API.
pub async fn tournament_snapshot(
    state: &SharedState,
    id: TournamentId,
) -> Result<TournamentDto, AppError> {
    if let Some(cached) = state.cached_tournament(id) {
        return Ok(cached);
    }
    match state.api().get_tournament(id).await {
        Ok(Some(tournament)) => {
            state.cache_tournaments([&tournament]);
            Ok(tournament)
        }
        Ok(None) => Err(surface(state, AppError::NotFound { id })),
        Err(err) => Err(surface(state, err)),
    }
}

/// Add `id` to favorites, or remove it when already present.
///
/// With server sync on, the API is told first and the local collection only changes once it
/// accepted the toggle.
pub async fn toggle_favorite(
    state: &SharedState,
    id: TournamentId,
) -> Result<ToggleOutcome, AppError> {
    let mut favorites = state.favorites().write().await;
    let entry = if favorites.contains(id) {
        None
    } else {
        Some(tournament_snapshot(state, id).await?.to_entry())
    };

    if state.config().sync_with_server {
        state.api().toggle_favorite(id).await.map_err(|err| {
            warn!(id, error = %err, "favorite sync failed; favorites unchanged");
            surface(state, err)
        })?;
    }

    let outcome = match entry {
        Some(entry) => {
            favorites.add(entry).map_err(|err| surface(state, err))?;
            ToggleOutcome::Added
        }
        None => {
            favorites.remove(id).map_err(|err| surface(state, err))?;
            ToggleOutcome::Removed
        }
    };
    let size = favorites.len();
    drop(favorites);

    let added = outcome == ToggleOutcome::Added;
    if added {
        state.toasts().tournament_added();
    } else {
        state.toasts().tournament_removed();
    }
    broadcast_collection_changed(state.events(), CollectionKind::Favorites, Some(id), size);
    state.analytics().favorite_changed(id, added).await;
    Ok(outcome)
}

/// Add `id` to the comparison selection, or remove it when already selected.
pub async fn toggle_comparison(
    state: &SharedState,
    id: TournamentId,
) -> Result<ToggleOutcome, AppError> {
    let (outcome, size) = {
        let mut comparison = state.comparison().write().await;
        let outcome = comparison.toggle(id).map_err(|err| surface(state, err))?;
        (outcome, comparison.len())
    };

    match outcome {
        ToggleOutcome::Added => {
            state.toasts().success("Турнир добавлен в сравнение");
            if size >= 2 {
                state.toasts().comparison_ready(size);
            }
        }
        ToggleOutcome::Removed => {
            state.toasts().info("Турнир удален из сравнения");
        }
    }
    broadcast_collection_changed(state.events(), CollectionKind::Comparison, Some(id), size);
    Ok(outcome)
}

pub async fn clear_comparison(state: &SharedState) -> Result<(), AppError> {
    state
        .comparison()
        .write()
        .await
        .clear()
        .map_err(|err| surface(state, err))?;
    state.toasts().info("Сравнение очищено");
    broadcast_collection_changed(state.events(), CollectionKind::Comparison, None, 0);
    Ok(())
}

/// Put `id` at the front of the viewing history.
pub async fn record_view(state: &SharedState, id: TournamentId) -> Result<AddOutcome, AppError> {
    let tournament = tournament_snapshot(state, id).await?;
    let mut entry = tournament.to_entry();
    entry.viewed_at = Some(format_timestamp(OffsetDateTime::now_utc()));

    let (outcome, size) = {
        let mut history = state.history().write().await;
        let outcome = history.add(entry).map_err(|err| surface(state, err))?;
        (outcome, history.len())
    };
    broadcast_collection_changed(state.events(), CollectionKind::History, Some(id), size);
    state.analytics().tournament_view(id, &tournament.name).await;
    Ok(outcome)
}

pub async fn clear_history(state: &SharedState) -> Result<(), AppError> {
    state
        .history()
        .write()
        .await
        .clear()
        .map_err(|err| surface(state, err))?;
    state.toasts().success("История очищена");
    broadcast_collection_changed(state.events(), CollectionKind::History, None, 0);
    Ok(())
}

/// Store the user's score for `id`.
///
/// With server sync on, the score is validated and sent first; a rejected or failed request
/// leaves the local rating untouched.
pub async fn rate(
    state: &SharedState,
    id: TournamentId,
    score: u8,
) -> Result<RatingRecord, AppError> {
    if !(1..=MAX_SCORE).contains(&score) {
        return Err(surface(state, RatingError::ScoreOutOfRange { score }));
    }

    if state.config().sync_with_server {
        let request = RateRequest {
            user_id: state.api().user_id().to_string(),
            rating: score,
            review: String::new(),
        };
        request.validate().map_err(|err| surface(state, err))?;
        state
            .api()
            .rate_tournament(id, &request)
            .await
            .map_err(|err| {
                warn!(id, error = %err, "rating sync failed; rating unchanged");
                surface(state, err)
            })?;
    }

    let (record, size) = {
        let mut ratings = state.ratings().write().await;
        let record = ratings.rate(id, score).map_err(|err| surface(state, err))?;
        (record, ratings.records().len())
    };
    state.toasts().success(format!("Вы поставили {score} звезд"));
    broadcast_collection_changed(state.events(), CollectionKind::Ratings, Some(id), size);

    let mut payload = Map::new();
    payload.insert("tournament_id".into(), json!(id));
    payload.insert("rating".into(), json!(score));
    state.analytics().custom("rating", payload).await;
    Ok(record)
}

/// Add a review to a tournament the user already rated.
pub async fn submit_review(
    state: &SharedState,
    id: TournamentId,
    input: &ReviewInput,
) -> Result<Review, AppError> {
    input.validate().map_err(|err| surface(state, err))?;
    let (review, size) = {
        let mut ratings = state.ratings().write().await;
        let review = ratings
            .submit_review(id, &input.author, &input.text, OffsetDateTime::now_utc())
            .map_err(|err| surface(state, err))?;
        (review, ratings.records().len())
    };
    state.toasts().success("Отзыв отправлен!");
    broadcast_collection_changed(state.events(), CollectionKind::Ratings, Some(id), size);
    Ok(review)
}

/// Share link for `id` on `network`; the share is counted and tracked.
pub async fn share_via(
    state: &SharedState,
    id: TournamentId,
    title: &str,
    network: ShareNetwork,
) -> Result<String, AppError> {
    let url = tournament_url(&state.config().site_origin, id);
    let link = network.share_url(&url, title);
    count_share(state, network.as_str(), &url).await?;
    Ok(link)
}

/// How a platform share (share sheet or clipboard) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Unsupported,
    Failed,
}

/// Report the result of sharing through the platform share sheet.
pub async fn complete_native_share(
    state: &SharedState,
    id: TournamentId,
    outcome: ShareOutcome,
) -> Result<(), AppError> {
    match outcome {
        ShareOutcome::Shared => {
            let url = tournament_url(&state.config().site_origin, id);
            count_share(state, "native", &url).await?;
            state.toasts().success("Успешно поделились!");
        }
        ShareOutcome::Unsupported => {
            state.toasts().warning("Функция недоступна в вашем браузере");
        }
        // The user dismissed the share sheet.
        ShareOutcome::Failed => {}
    }
    Ok(())
}

/// Report the result of copying the tournament link to the clipboard.
pub async fn complete_link_copy(
    state: &SharedState,
    id: TournamentId,
    outcome: ShareOutcome,
) -> Result<(), AppError> {
    if outcome == ShareOutcome::Shared {
        let url = tournament_url(&state.config().site_origin, id);
        count_share(state, "copy", &url).await?;
        state.toasts().success("Ссылка скопирована!");
    } else {
        state.toasts().error("Не удалось скопировать");
    }
    Ok(())
}

async fn count_share(state: &SharedState, channel: &str, url: &str) -> Result<u64, AppError> {
    let total = state
        .shares()
        .write()
        .await
        .record(channel)
        .map_err(|err| surface(state, err))?;
    state.analytics().share(channel, url).await;
    Ok(total)
}

pub async fn admin_statistics(state: &SharedState) -> Result<AdminStatistics, AppError> {
    state
        .api()
        .statistics()
        .await
        .map_err(|err| surface(state, err))
}

/// Validate and run a bulk admin action; the tournament cache drops affected entries.
pub async fn bulk_action(
    state: &SharedState,
    request: &BulkActionRequest,
) -> Result<BulkActionResponse, AppError> {
    request.validate().map_err(|err| surface(state, err))?;
    let response = state
        .api()
        .bulk_action(request)
        .await
        .map_err(|err| surface(state, err))?;
    for id in &request.tournament_ids {
        state.tournaments().remove(id);
    }
    if response.message.is_empty() {
        state.toasts().saved();
    } else {
        state.toasts().success(response.message.clone());
    }
    Ok(response)
}
