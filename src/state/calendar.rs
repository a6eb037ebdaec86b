//! Month grid rendering and calendar navigation.

use thiserror::Error;
use time::{Date, Month, macros::format_description, util::days_in_year_month};

use crate::dao::models::TournamentId;

/// Column headers, Monday first.
pub const WEEKDAY_NAMES: [&str; 7] = ["Пн", "Вт", "Ср", "Чт", "Пт", "Сб", "Вс"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("month index must be between 0 and 11 (got {month_index})")]
    MonthOutOfRange { month_index: u8 },
    #[error("year {year} cannot be represented")]
    YearOutOfRange { year: i32 },
}

/// Anything that can be placed on the calendar.
pub trait CalendarEntry {
    fn id(&self) -> TournamentId;
    /// Inclusive date range, or `None` when the dates are unusable.
    fn date_range(&self) -> Option<(Date, Date)>;
}

/// Parse the `YYYY-MM-DD` prefix of a date or date-time string.
pub fn parse_day(raw: &str) -> Option<Date> {
    let prefix = raw.trim().get(..10)?;
    Date::parse(prefix, format_description!("[year]-[month]-[day]")).ok()
}

/// Inclusive range from optional date strings; a missing end means a one-day event.
pub fn day_range(start: Option<&str>, end: Option<&str>) -> Option<(Date, Date)> {
    let start = parse_day(start?)?;
    let end = match end {
        Some(raw) if !raw.trim().is_empty() => parse_day(raw)?,
        _ => start,
    };
    (start <= end).then_some((start, end))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlot {
    pub date: Date,
    /// Tournaments running on this day, in input order.
    pub tournament_ids: Vec<TournamentId>,
}

impl DaySlot {
    pub fn tournament_count(&self) -> usize {
        self.tournament_ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayCell {
    /// Padding before the first day of the month.
    Blank,
    Day(DaySlot),
}

/// Rendered month: leading blanks followed by one cell per day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: Month,
    pub cells: Vec<DayCell>,
}

impl MonthGrid {
    pub fn leading_blanks(&self) -> usize {
        self.cells
            .iter()
            .take_while(|cell| matches!(cell, DayCell::Blank))
            .count()
    }

    pub fn days(&self) -> impl Iterator<Item = &DaySlot> {
        self.cells.iter().filter_map(|cell| match cell {
            DayCell::Day(slot) => Some(slot),
            DayCell::Blank => None,
        })
    }

    pub fn day(&self, day: u8) -> Option<&DaySlot> {
        self.days().find(|slot| slot.date.day() == day)
    }

    /// Cells split into rows of seven; the last row may be shorter.
    pub fn weeks(&self) -> Vec<&[DayCell]> {
        self.cells.chunks(7).collect()
    }

    /// ISO week number of every row.
    pub fn week_numbers(&self) -> Vec<u8> {
        self.weeks()
            .iter()
            .filter_map(|week| {
                week.iter().find_map(|cell| match cell {
                    DayCell::Day(slot) => Some(slot.date.iso_week()),
                    DayCell::Blank => None,
                })
            })
            .collect()
    }
}

/// Render the grid for `month_index` (0 = January) of `year`.
pub fn render_month<T: CalendarEntry>(
    year: i32,
    month_index: u8,
    tournaments: &[T],
) -> Result<MonthGrid, CalendarError> {
    let month = month_index
        .checked_add(1)
        .and_then(|number| Month::try_from(number).ok())
        .ok_or(CalendarError::MonthOutOfRange { month_index })?;
    render(year, month, tournaments)
}

fn render<T: CalendarEntry>(
    year: i32,
    month: Month,
    tournaments: &[T],
) -> Result<MonthGrid, CalendarError> {
    let first = Date::from_calendar_date(year, month, 1)
        .map_err(|_| CalendarError::YearOutOfRange { year })?;
    let ranges: Vec<(TournamentId, Date, Date)> = tournaments
        .iter()
        .filter_map(|t| t.date_range().map(|(start, end)| (t.id(), start, end)))
        .collect();

    let blanks = usize::from(first.weekday().number_days_from_monday());
    let mut cells = vec![DayCell::Blank; blanks];
    let mut date = Some(first);
    for _ in 0..days_in_year_month(year, month) {
        let Some(day) = date else {
            break;
        };
        let tournament_ids = ranges
            .iter()
            .filter(|(_, start, end)| *start <= day && day <= *end)
            .map(|(id, _, _)| *id)
            .collect();
        cells.push(DayCell::Day(DaySlot {
            date: day,
            tournament_ids,
        }));
        date = day.next_day();
    }

    Ok(MonthGrid { year, month, cells })
}

/// Navigable month view over a fixed tournament list.
pub struct CalendarView<T> {
    year: i32,
    month: Month,
    selected: Option<Date>,
    tournaments: Vec<T>,
}

impl<T: CalendarEntry> CalendarView<T> {
    /// Open the view on the month containing `today`.
    pub fn new(today: Date, tournaments: Vec<T>) -> Self {
        Self {
            year: today.year(),
            month: today.month(),
            selected: None,
            tournaments,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn selected(&self) -> Option<Date> {
        self.selected
    }

    pub fn tournaments(&self) -> &[T] {
        &self.tournaments
    }

    pub fn set_tournaments(&mut self, tournaments: Vec<T>) {
        self.tournaments = tournaments;
    }

    pub fn grid(&self) -> Result<MonthGrid, CalendarError> {
        render(self.year, self.month, &self.tournaments)
    }

    pub fn next_month(&mut self) {
        if self.month == Month::December {
            self.year += 1;
        }
        self.month = self.month.next();
    }

    pub fn previous_month(&mut self) {
        if self.month == Month::January {
            self.year -= 1;
        }
        self.month = self.month.previous();
    }

    /// Jump back to the month containing `today` and clear the selection.
    pub fn go_to(&mut self, today: Date) {
        self.year = today.year();
        self.month = today.month();
        self.selected = None;
    }

    pub fn select_day(&mut self, date: Date) {
        self.selected = Some(date);
    }

    /// Tournaments running on the selected day, in list order.
    pub fn tournaments_on_selected(&self) -> Vec<&T> {
        let Some(day) = self.selected else {
            return Vec::new();
        };
        self.tournaments_on(day)
    }

    pub fn tournaments_on(&self, day: Date) -> Vec<&T> {
        self.tournaments
            .iter()
            .filter(|t| {
                t.date_range()
                    .is_some_and(|(start, end)| start <= day && day <= end)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    struct Event {
        id: TournamentId,
        start: Option<&'static str>,
        end: Option<&'static str>,
    }

    impl CalendarEntry for Event {
        fn id(&self) -> TournamentId {
            self.id
        }

        fn date_range(&self) -> Option<(Date, Date)> {
            day_range(self.start, self.end)
        }
    }

    fn event(id: TournamentId, start: &'static str, end: Option<&'static str>) -> Event {
        Event {
            id,
            start: Some(start),
            end,
        }
    }

    #[test]
    fn february_length_follows_leap_years() {
        let leap = render_month::<Event>(2024, 1, &[]).unwrap();
        assert_eq!(leap.days().count(), 29);
        let common = render_month::<Event>(2023, 1, &[]).unwrap();
        assert_eq!(common.days().count(), 28);
    }

    #[test]
    fn first_day_is_aligned_to_monday_start() {
        // 2024-03-01 is a Friday.
        let grid = render_month::<Event>(2024, 2, &[]).unwrap();
        assert_eq!(grid.leading_blanks(), 4);
        // 2024-04-01 is a Monday.
        let grid = render_month::<Event>(2024, 3, &[]).unwrap();
        assert_eq!(grid.leading_blanks(), 0);
        // 2023-10-01 is a Sunday.
        let grid = render_month::<Event>(2023, 9, &[]).unwrap();
        assert_eq!(grid.leading_blanks(), 6);
        assert_eq!(grid.week_numbers().first(), Some(&39));
    }

    #[test]
    fn range_counts_inclusive_days_only() {
        let tournaments = [event(1, "2024-03-10", Some("2024-03-12"))];
        let grid = render_month(2024, 2, &tournaments).unwrap();

        let count = |day| grid.day(day).unwrap().tournament_count();
        assert_eq!(count(9), 0);
        assert_eq!(count(10), 1);
        assert_eq!(count(11), 1);
        assert_eq!(count(12), 1);
        assert_eq!(count(13), 0);
    }

    #[test]
    fn missing_end_is_single_day_and_bad_dates_are_skipped() {
        let tournaments = [
            event(1, "2024-03-05", None),
            event(2, "5 марта", Some("2024-03-06")),
            Event {
                id: 3,
                start: None,
                end: Some("2024-03-05"),
            },
            event(4, "2024-03-05T10:00:00", Some("2024-03-04")),
        ];
        let grid = render_month(2024, 2, &tournaments).unwrap();

        assert_eq!(grid.day(5).unwrap().tournament_ids, vec![1]);
        assert_eq!(grid.day(6).unwrap().tournament_count(), 0);
    }

    #[test]
    fn month_index_past_december_is_rejected() {
        assert_eq!(
            render_month::<Event>(2024, 12, &[]),
            Err(CalendarError::MonthOutOfRange { month_index: 12 })
        );
    }

    #[test]
    fn navigation_wraps_years_and_selection_is_pure() {
        let tournaments = vec![event(7, "2025-01-02", Some("2025-01-04"))];
        let mut view = CalendarView::new(date!(2024 - 12 - 15), tournaments);

        view.next_month();
        assert_eq!((view.year(), view.month()), (2025, Month::January));
        view.select_day(date!(2025 - 01 - 03));
        let ids: Vec<_> = view.tournaments_on_selected().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![7]);
        assert_eq!(view.tournaments().len(), 1);

        view.previous_month();
        view.previous_month();
        assert_eq!((view.year(), view.month()), (2024, Month::November));
        assert_eq!(view.grid().unwrap().days().count(), 30);
    }
}
