use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::{models::TournamentId, storage::StorageError},
    services::{analytics::TransportError, api_client::ApiError},
    state::{
        calendar::CalendarError,
        collection::CollectionError,
        filters::PresetError,
        loader::ModuleLoadError,
        preferences::PreferenceError,
        ratings::{MAX_SCORE, RatingError},
        toast::{ToastKind, ToastOptions, ToastPresenter},
    },
};

/// Errors returned by client services; each one maps to the toast the user sees.
#[derive(Debug, Error)]
pub enum AppError {
    /// The calendar API could not be reached or rejected the request.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Local persistence failed; in-memory state was left unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// User input was rejected; the message is shown as-is.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A bounded collection refused a new entry.
    #[error("collection limit of {capacity} reached")]
    LimitReached { capacity: usize },
    #[error("tournament {id} not found")]
    NotFound { id: TournamentId },
    #[error(transparent)]
    ModuleLoad(#[from] ModuleLoadError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl AppError {
    /// Toast kind and message describing this error to the user.
    pub fn feedback(&self) -> (ToastKind, String) {
        match self {
            AppError::Api(err) if err.is_network() => (
                ToastKind::Error,
                "Ошибка сети. Проверьте подключение к интернету".into(),
            ),
            AppError::Api(_) | AppError::Transport(_) => {
                (ToastKind::Error, "Не удалось выполнить запрос к серверу".into())
            }
            AppError::Storage(_) => (ToastKind::Error, "Не удалось сохранить изменения".into()),
            AppError::Validation(message) => (ToastKind::Warning, message.clone()),
            AppError::LimitReached { capacity } => (
                ToastKind::Warning,
                format!("Можно сравнить максимум {capacity} турнира"),
            ),
            AppError::NotFound { .. } => (
                ToastKind::Error,
                "Не удалось загрузить данные турнира".into(),
            ),
            AppError::ModuleLoad(_) => {
                (ToastKind::Error, "Не удалось загрузить компонент".into())
            }
            AppError::Calendar(_) => (ToastKind::Error, "Некорректная дата календаря".into()),
        }
    }

    /// Show this error through `toasts` and hand it back for propagation.
    pub fn notify(self, toasts: &ToastPresenter) -> Self {
        let (kind, message) = self.feedback();
        toasts.show(ToastOptions::new(kind, message));
        self
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        let message = err
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .find_map(|error| error.message.as_ref().map(|message| message.to_string()))
            .unwrap_or_else(|| format!("Некорректные данные: {err}"));
        AppError::Validation(message)
    }
}

impl From<PreferenceError> for AppError {
    fn from(err: PreferenceError) -> Self {
        match err {
            PreferenceError::Storage(source) => AppError::Storage(source),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<CollectionError> for AppError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::LimitReached { capacity } => AppError::LimitReached { capacity },
            CollectionError::Storage(source) => AppError::Storage(source),
        }
    }
}

impl From<PresetError> for AppError {
    fn from(err: PresetError) -> Self {
        match err {
            PresetError::BlankName => AppError::Validation("Введите название пресета".into()),
            PresetError::Missing { name } => {
                AppError::Validation(format!("Пресет \"{name}\" не найден"))
            }
            PresetError::Storage(source) => AppError::Storage(source),
        }
    }
}

impl From<RatingError> for AppError {
    fn from(err: RatingError) -> Self {
        match err {
            RatingError::ScoreOutOfRange { .. } => {
                AppError::Validation(format!("Оценка должна быть от 1 до {MAX_SCORE}"))
            }
            RatingError::EmptyReview => AppError::Validation("Напишите текст отзыва".into()),
            RatingError::NotRated { .. } => {
                AppError::Validation("Сначала поставьте оценку".into())
            }
            RatingError::Storage(source) => AppError::Storage(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_errors_become_warnings() {
        let (kind, message) = AppError::from(RatingError::NotRated { id: 3 }).feedback();
        assert_eq!(kind, ToastKind::Warning);
        assert_eq!(message, "Сначала поставьте оценку");

        let (kind, message) = AppError::from(RatingError::EmptyReview).feedback();
        assert_eq!(kind, ToastKind::Warning);
        assert_eq!(message, "Напишите текст отзыва");
    }

    #[test]
    fn validation_message_is_shown_verbatim() {
        use validator::Validate;

        let input = crate::dto::tournament::ReviewInput {
            author: "Гость".into(),
            text: "  ".into(),
        };
        let err = AppError::from(input.validate().unwrap_err());
        assert_eq!(
            err.feedback(),
            (ToastKind::Warning, "Напишите текст отзыва".to_string())
        );
    }

    #[test]
    fn comparison_limit_names_capacity() {
        let err = AppError::from(CollectionError::LimitReached { capacity: 4 });
        assert_eq!(
            err.feedback(),
            (ToastKind::Warning, "Можно сравнить максимум 4 турнира".to_string())
        );
    }

    #[test]
    fn storage_failures_stay_storage_errors() {
        let err = AppError::from(PreferenceError::Storage(StorageError::InvalidKey {
            key: "../theme".into(),
        }));
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(err.feedback().0, ToastKind::Error);
    }
}
