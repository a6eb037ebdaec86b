use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::Date;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{CollectionEntry, TournamentId},
    dto::validation::{validate_review_text, validate_status},
    state::calendar::{CalendarEntry, day_range},
};

/// Tournament as returned by the calendar API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentDto {
    pub id: TournamentId,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fide_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorites_count: Option<u64>,
}

impl TournamentDto {
    /// Snapshot stored in favorites and history.
    pub fn to_entry(&self) -> CollectionEntry {
        CollectionEntry {
            id: self.id,
            name: self.name.clone(),
            location: self.location.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            category: self.category.clone(),
            viewed_at: None,
        }
    }
}

impl CalendarEntry for TournamentDto {
    fn id(&self) -> TournamentId {
        self.id
    }

    fn date_range(&self) -> Option<(Date, Date)> {
        day_range(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

/// Pagination block of the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub per_page: u32,
    pub total: u64,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

/// The list endpoint answers either with an envelope or with a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TournamentListResponse {
    Envelope {
        tournaments: Vec<TournamentDto>,
        #[serde(default)]
        pagination: Option<Pagination>,
    },
    Bare(Vec<TournamentDto>),
}

impl TournamentListResponse {
    pub fn into_tournaments(self) -> Vec<TournamentDto> {
        match self {
            TournamentListResponse::Envelope { tournaments, .. } => tournaments,
            TournamentListResponse::Bare(tournaments) => tournaments,
        }
    }
}

/// Filters accepted by `GET /api/tournaments`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TournamentQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl TournamentQuery {
    /// Percent-encoded query string without the leading `?`; empty when no filter is set.
    pub fn to_query_string(&self) -> String {
        let page = self.page.map(|page| page.to_string());
        let limit = self.limit.map(|limit| limit.to_string());
        [
            ("status", self.status.as_deref()),
            ("category", self.category.as_deref()),
            ("page", page.as_deref()),
            ("limit", limit.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| format!("{key}={}", urlencoding::encode(value))))
        .collect::<Vec<_>>()
        .join("&")
    }
}

/// Body of `POST /api/tournaments/{id}/rate`.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct RateRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[serde(skip_serializing_if = "String::is_empty")]
    #[validate(length(max = 2000))]
    pub review: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateResponse {
    #[serde(default)]
    pub message: String,
}

/// Body of `POST /api/tournaments/{id}/toggle-favorite`.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteToggleRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteToggleResponse {
    pub is_favorite: bool,
    #[serde(default)]
    pub message: String,
}

/// Review typed by the user before it is added to the local rating book.
#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub author: String,
    pub text: String,
}

impl Validate for ReviewInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_review_text(&self.text) {
            errors.add("text", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Aggregate counters served by `GET /api/admin/statistics`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminStatistics {
    #[serde(default)]
    pub total_tournaments: u64,
    #[serde(default)]
    pub scheduled_tournaments: u64,
    #[serde(default)]
    pub ongoing_tournaments: u64,
    #[serde(default)]
    pub completed_tournaments: u64,
    /// Counters this client does not interpret, kept in server order.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Delete,
    UpdateStatus,
}

/// Body of `POST /api/admin/bulk-action`.
#[derive(Debug, Clone, Serialize)]
pub struct BulkActionRequest {
    pub action: BulkAction,
    pub tournament_ids: Vec<TournamentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Validate for BulkActionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.tournament_ids.is_empty() {
            errors.add(
                "tournament_ids",
                validator::ValidationError::new("no_tournaments_selected"),
            );
        }
        match (self.action, self.status.as_deref()) {
            (BulkAction::UpdateStatus, Some(status)) => {
                if let Err(e) = validate_status(status) {
                    errors.add("status", e);
                }
            }
            (BulkAction::UpdateStatus, None) => {
                errors.add("status", validator::ValidationError::new("status_missing"));
            }
            (BulkAction::Delete, _) => {}
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkActionResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}
