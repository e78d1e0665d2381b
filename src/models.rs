use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a reading entry
pub type EntryId = i64;

/// Identifier of a book
pub type BookId = i64;

/// Reading format. Each medium owns one independent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    Kindle,
    Hardcover,
    Audio,
}

impl Medium {
    pub const ALL: [Medium; 3] = [Medium::Kindle, Medium::Hardcover, Medium::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Medium::Kindle => "kindle",
            Medium::Hardcover => "hardcover",
            Medium::Audio => "audio",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Medium {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kindle" => Ok(Medium::Kindle),
            "hardcover" => Ok(Medium::Hardcover),
            "audio" => Ok(Medium::Audio),
            other => Err(format!("unknown medium '{}' (expected kindle, hardcover or audio)", other)),
        }
    }
}

/// Where an entry stands, derived from its dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Completed,
    Current,
    Future,
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReadingStatus::Completed => "completed",
            ReadingStatus::Current => "current",
            ReadingStatus::Future => "future",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub word_count: Option<i64>,
    pub page_count: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Book {
    pub fn new(id: BookId, title: String) -> Self {
        let now = crate::utils::now_timestamp();
        Self {
            id,
            title,
            author: None,
            word_count: None,
            page_count: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingEntry {
    pub id: EntryId,
    pub book_id: BookId,
    pub medium: Medium,
    pub previous_id: Option<EntryId>, // None marks the tail (oldest end)
    pub date_started: Option<NaiveDate>,
    pub date_finished_actual: Option<NaiveDate>,
    pub words_per_day_goal: Option<u32>,
    pub date_est_start: Option<NaiveDate>,
    pub date_est_end: Option<NaiveDate>,
}

impl ReadingEntry {
    pub fn new(id: EntryId, book_id: BookId, medium: Medium) -> Self {
        Self {
            id,
            book_id,
            medium,
            previous_id: None,
            date_started: None,
            date_finished_actual: None,
            words_per_day_goal: None,
            date_est_start: None,
            date_est_end: None,
        }
    }

    pub fn status(&self) -> ReadingStatus {
        if self.date_finished_actual.is_some() {
            ReadingStatus::Completed
        } else if self.date_started.is_some() {
            ReadingStatus::Current
        } else {
            ReadingStatus::Future
        }
    }

    /// Days actually spent reading, counting both the start and finish day
    pub fn days_elapsed(&self) -> Option<i64> {
        match (self.date_started, self.date_finished_actual) {
            (Some(started), Some(finished)) => Some((finished - started).num_days() + 1),
            _ => None,
        }
    }
}

/// Request to plan or begin a new reading
#[derive(Debug, Clone)]
pub struct NewReading {
    pub book_id: BookId,
    pub medium: Medium,
    pub date_started: Option<NaiveDate>,
    pub words_per_day_goal: Option<u32>,
}

impl NewReading {
    pub fn new(book_id: BookId, medium: Medium) -> Self {
        Self {
            book_id,
            medium,
            date_started: None,
            words_per_day_goal: None,
        }
    }

    pub fn into_entry(self, id: EntryId) -> ReadingEntry {
        ReadingEntry {
            date_started: self.date_started,
            words_per_day_goal: self.words_per_day_goal,
            ..ReadingEntry::new(id, self.book_id, self.medium)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn status_follows_dates() {
        let mut entry = ReadingEntry::new(1, 1, Medium::Kindle);
        assert_eq!(entry.status(), ReadingStatus::Future);

        entry.date_started = Some(date("2024-03-01"));
        assert_eq!(entry.status(), ReadingStatus::Current);

        entry.date_finished_actual = Some(date("2024-03-05"));
        assert_eq!(entry.status(), ReadingStatus::Completed);
        assert_eq!(entry.days_elapsed(), Some(5));
    }

    #[test]
    fn medium_parses_case_insensitively() {
        assert_eq!("Kindle".parse::<Medium>(), Ok(Medium::Kindle));
        assert_eq!(" AUDIO ".parse::<Medium>(), Ok(Medium::Audio));
        assert!("paperback".parse::<Medium>().is_err());
        assert_eq!(Medium::Hardcover.to_string(), "hardcover");
    }
}
