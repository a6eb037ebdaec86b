use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod analytics;
pub mod events;
pub mod tournament;
pub mod validation;

/// RFC 3339 rendering used for every timestamp the client stores or sends.
pub fn format_timestamp(time: OffsetDateTime) -> String {
    time.format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
