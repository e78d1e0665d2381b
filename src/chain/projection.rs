//! Finish-date projection.
//!
//! Durations are whole days: `ceil(words / words_per_day)`. The entry being
//! read is projected from its actual start date; everything after it follows
//! back to back. Missing word counts never abort a projection: the entry
//! becomes a zero-length placeholder and a warning is attached.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::chain::Chain;
use crate::models::{Book, BookId, EntryId, ReadingEntry, ReadingStatus};

/// What the calculator needs to know about one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionInput {
    pub entry_id: EntryId,
    pub word_count: Option<i64>,
    pub words_per_day_goal: Option<u32>,
}

impl ProjectionInput {
    pub fn for_entry(entry: &ReadingEntry, books: &HashMap<BookId, Book>) -> Self {
        Self {
            entry_id: entry.id,
            word_count: books.get(&entry.book_id).and_then(|book| book.word_count),
            words_per_day_goal: entry.words_per_day_goal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectedDates {
    pub entry_id: EntryId,
    pub est_start: NaiveDate,
    pub est_finish: NaiveDate,
    pub duration_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionWarning {
    MissingWordCount { entry_id: EntryId },
    MultipleCurrent { entries: Vec<EntryId> },
}

impl fmt::Display for ProjectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionWarning::MissingWordCount { entry_id } => write!(
                f,
                "reading {} has no word count; projected as zero days",
                entry_id
            ),
            ProjectionWarning::MultipleCurrent { entries } => write!(
                f,
                "{} readings are in progress ({}); projecting from the last one",
                entries.len(),
                entries.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub dates: Vec<ProjectedDates>,
    pub warnings: Vec<ProjectionWarning>,
}

/// Whole days needed to read `word_count` words, or `None` when unknown.
/// The speed falls back to `default_wpd` and never drops below one word a day.
pub fn duration_days(word_count: Option<i64>, goal: Option<u32>, default_wpd: u32) -> Option<u32> {
    let words = u64::try_from(word_count?).ok().filter(|&w| w > 0)?;
    let speed = u64::from(goal.unwrap_or(default_wpd).max(1));
    Some(u32::try_from(words.div_ceil(speed)).unwrap_or(u32::MAX))
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

/// Project a run of future entries back to back, starting at `anchor`.
///
/// Output order matches input order and every input gets exactly one pair.
pub fn project(future: &[ProjectionInput], anchor: NaiveDate, default_wpd: u32) -> Projection {
    let mut projection = Projection::default();
    let mut cursor = anchor;

    for input in future {
        let days = match duration_days(input.word_count, input.words_per_day_goal, default_wpd) {
            Some(days) => days,
            None => {
                projection.warnings.push(ProjectionWarning::MissingWordCount {
                    entry_id: input.entry_id,
                });
                0
            }
        };
        let finish = add_days(cursor, days);
        projection.dates.push(ProjectedDates {
            entry_id: input.entry_id,
            est_start: cursor,
            est_finish: finish,
            duration_days: days,
        });
        cursor = finish;
    }

    projection
}

/// Project the entry being read from its actual start date
pub fn project_current(
    input: &ProjectionInput,
    date_started: NaiveDate,
    default_wpd: u32,
) -> (ProjectedDates, Option<ProjectionWarning>) {
    let days = duration_days(input.word_count, input.words_per_day_goal, default_wpd);
    let warning = days.is_none().then(|| ProjectionWarning::MissingWordCount {
        entry_id: input.entry_id,
    });
    let days = days.unwrap_or(0);
    (
        ProjectedDates {
            entry_id: input.entry_id,
            est_start: date_started,
            est_finish: add_days(date_started, days),
            duration_days: days,
        },
        warning,
    )
}

/// Dates for a whole chain: the current entry plus everything queued after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainProjection {
    pub current: Option<ProjectedDates>,
    pub future: Vec<ProjectedDates>,
    pub warnings: Vec<ProjectionWarning>,
}

impl ChainProjection {
    pub fn dates_for(&self, id: EntryId) -> Option<&ProjectedDates> {
        self.current
            .iter()
            .chain(self.future.iter())
            .find(|dates| dates.entry_id == id)
    }

    /// Every projected pair, current entry first
    pub fn all(&self) -> Vec<ProjectedDates> {
        self.current.iter().chain(self.future.iter()).copied().collect()
    }
}

/// Project every unfinished entry of `chain`.
///
/// With an entry in progress, the future entries on its head side are
/// anchored at its estimated finish. With none, every future entry is
/// projected from `today`.
pub fn project_chain(
    chain: &Chain,
    books: &HashMap<BookId, Book>,
    today: NaiveDate,
    default_wpd: u32,
) -> ChainProjection {
    let mut warnings = Vec::new();

    let open: Vec<EntryId> = chain
        .iter()
        .filter(|entry| entry.status() == ReadingStatus::Current)
        .map(|entry| entry.id)
        .collect();
    if open.len() > 1 {
        warnings.push(ProjectionWarning::MultipleCurrent { entries: open });
    }

    let current = chain.current().and_then(|entry| {
        let started = entry.date_started?;
        let (dates, warning) =
            project_current(&ProjectionInput::for_entry(entry, books), started, default_wpd);
        warnings.extend(warning);
        Some((chain.position(entry.id).unwrap_or(0), dates))
    });

    let (skip, anchor) = match current {
        Some((pos, dates)) => (pos + 1, dates.est_finish),
        None => (0, today),
    };
    let queued: Vec<ProjectionInput> = chain
        .iter()
        .skip(skip)
        .filter(|entry| entry.status() == ReadingStatus::Future)
        .map(|entry| ProjectionInput::for_entry(entry, books))
        .collect();

    let projection = project(&queued, anchor, default_wpd);
    warnings.extend(projection.warnings);

    ChainProjection {
        current: current.map(|(_, dates)| dates),
        future: projection.dates,
        warnings,
    }
}

/// How far along a reading is on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Progress {
    NotStarted,
    Percent(u8),
    Done,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::NotStarted => f.write_str("TBR"),
            Progress::Percent(pct) => write!(f, "{}%", pct),
            Progress::Done => f.write_str("Done"),
        }
    }
}

/// Day-based progress between `start` and `est_end`, both days inclusive
pub fn progress_on(start: NaiveDate, est_end: NaiveDate, date: NaiveDate) -> Progress {
    if date < start {
        return Progress::NotStarted;
    }
    if date > est_end {
        return Progress::Done;
    }
    if date == est_end {
        return Progress::Percent(100);
    }
    let total = (est_end - start).num_days() + 1;
    let elapsed = (date - start).num_days() + 1;
    let pct = (elapsed as f64 / total as f64 * 100.0).round();
    Progress::Percent(pct.clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Medium;

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(n)
    }

    fn input(id: EntryId, words: Option<i64>, goal: Option<u32>) -> ProjectionInput {
        ProjectionInput {
            entry_id: id,
            word_count: words,
            words_per_day_goal: goal,
        }
    }

    fn book(id: BookId, words: Option<i64>) -> Book {
        Book {
            word_count: words,
            ..Book::new(id, format!("Book {}", id))
        }
    }

    #[test]
    fn duration_rounds_up_and_guards_zero_speed() {
        assert_eq!(duration_days(Some(10_000), Some(3_000), 5_000), Some(4));
        assert_eq!(duration_days(Some(9_000), None, 3_000), Some(3));
        assert_eq!(duration_days(Some(5), Some(0), 0), Some(5));
        assert_eq!(duration_days(None, Some(100), 100), None);
        assert_eq!(duration_days(Some(0), Some(100), 100), None);
        assert_eq!(duration_days(Some(-3), Some(100), 100), None);
    }

    #[test]
    fn entries_follow_back_to_back() {
        let projection = project(
            &[input(1, Some(30_000), None), input(2, Some(7_000), Some(2_000))],
            day(10),
            3_000,
        );

        assert!(projection.warnings.is_empty());
        assert_eq!(projection.dates[0].est_start, day(10));
        assert_eq!(projection.dates[0].est_finish, day(20));
        assert_eq!(projection.dates[1].est_start, day(20));
        assert_eq!(projection.dates[1].est_finish, day(24));
    }

    #[test]
    fn missing_word_count_is_a_placeholder_not_a_failure() {
        let projection = project(
            &[
                input(1, Some(6_000), None),
                input(2, None, None),
                input(3, Some(9_000), None),
            ],
            day(0),
            3_000,
        );

        assert_eq!(projection.warnings, vec![ProjectionWarning::MissingWordCount { entry_id: 2 }]);
        let placeholder = projection.dates[1];
        assert_eq!(placeholder.est_start, day(2));
        assert_eq!(placeholder.est_finish, day(2));
        assert_eq!(placeholder.duration_days, 0);
        assert_eq!(projection.dates[2].est_start, day(2));
        assert_eq!(projection.dates[2].est_finish, day(5));
        assert_eq!(projection.dates[2].duration_days, 3);
    }

    #[test]
    fn dates_never_go_backward() {
        let inputs: Vec<_> = (0..20)
            .map(|i| input(i, if i % 4 == 0 { None } else { Some(i * 1_700) }, Some((i as u32 % 3) * 900)))
            .collect();
        let projection = project(&inputs, day(3), 2_500);

        assert_eq!(projection.dates.len(), inputs.len());
        for pair in projection.dates.windows(2) {
            assert!(pair[0].est_start <= pair[0].est_finish);
            assert!(pair[1].est_start >= pair[0].est_finish);
        }
    }

    #[test]
    fn current_entry_projects_from_its_start() {
        let (dates, warning) = project_current(&input(1, Some(50_000), Some(5_000)), day(0), 3_000);
        assert_eq!(dates.est_finish, day(10));
        assert!(warning.is_none());

        let (dates, warning) = project_current(&input(1, None, None), day(4), 3_000);
        assert_eq!(dates.est_finish, day(4));
        assert_eq!(warning, Some(ProjectionWarning::MissingWordCount { entry_id: 1 }));
    }

    #[test]
    fn chain_projection_anchors_on_the_current_entry() {
        // A(1) completed <- B(2) current <- C(3) future
        let a = ReadingEntry {
            date_started: Some(day(0)),
            date_finished_actual: Some(day(0)),
            ..ReadingEntry::new(1, 1, Medium::Kindle)
        };
        let b = ReadingEntry {
            previous_id: Some(1),
            date_started: Some(day(0)),
            words_per_day_goal: Some(5_000),
            ..ReadingEntry::new(2, 2, Medium::Kindle)
        };
        let c = ReadingEntry {
            previous_id: Some(2),
            ..ReadingEntry::new(3, 3, Medium::Kindle)
        };
        let chain = Chain::build(Medium::Kindle, vec![a, b, c]);
        let books: HashMap<_, _> = [book(1, Some(1_000)), book(2, Some(50_000)), book(3, Some(30_000))]
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        let projection = project_chain(&chain, &books, day(40), 3_000);

        assert_eq!(projection.current.map(|d| d.est_finish), Some(day(10)));
        assert_eq!(projection.future.len(), 1);
        assert_eq!(projection.future[0].entry_id, 3);
        assert_eq!(projection.future[0].est_start, day(10));
        assert_eq!(projection.future[0].est_finish, day(20));
        assert!(projection.warnings.is_empty());
    }

    #[test]
    fn chain_projection_without_current_starts_today() {
        let first = ReadingEntry::new(1, 1, Medium::Audio);
        let second = ReadingEntry {
            previous_id: Some(1),
            ..ReadingEntry::new(2, 2, Medium::Audio)
        };
        let chain = Chain::build(Medium::Audio, vec![first, second]);
        let books: HashMap<_, _> = [book(1, Some(20_000))].into_iter().map(|b| (b.id, b)).collect();

        let projection = project_chain(&chain, &books, day(5), 10_000);

        assert!(projection.current.is_none());
        assert_eq!(projection.future[0].est_start, day(5));
        assert_eq!(projection.future[0].est_finish, day(7));
        // Book 2 is unknown, so it is a placeholder
        assert_eq!(projection.future[1].est_start, day(7));
        assert_eq!(projection.future[1].est_finish, day(7));
        assert_eq!(projection.warnings, vec![ProjectionWarning::MissingWordCount { entry_id: 2 }]);
        assert_eq!(projection.dates_for(2).map(|d| d.duration_days), Some(0));
    }

    #[test]
    fn progress_matches_day_counts() {
        assert_eq!(progress_on(day(1), day(4), day(0)), Progress::NotStarted);
        assert_eq!(progress_on(day(1), day(4), day(1)), Progress::Percent(25));
        assert_eq!(progress_on(day(1), day(4), day(2)), Progress::Percent(50));
        assert_eq!(progress_on(day(1), day(4), day(4)), Progress::Percent(100));
        assert_eq!(progress_on(day(1), day(4), day(5)), Progress::Done);
        assert_eq!(Progress::Percent(50).to_string(), "50%");
    }
}
