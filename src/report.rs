use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;

use crate::chain::{Chain, ChainProjection};
use crate::models::{Book, BookId, EntryId, Medium, ReadingStatus};

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub reading_id: EntryId,
    pub book_id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub words: Option<i64>,
    pub status: ReadingStatus,
    pub date_started: Option<NaiveDate>,
    pub date_finished: Option<NaiveDate>,
    pub est_start: Option<NaiveDate>,
    pub est_finish: Option<NaiveDate>,
    pub days_elapsed: Option<i64>,
}

/// One medium's chain in reading order with its projected dates and caveats
#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub medium: Medium,
    pub generated: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub faults: Vec<String>,
    pub warnings: Vec<String>,
}

impl ChainReport {
    pub fn assemble(
        chain: &Chain,
        projection: &ChainProjection,
        books: &HashMap<BookId, Book>,
        today: NaiveDate,
    ) -> Self {
        let rows = chain
            .iter()
            .map(|entry| {
                let book = books.get(&entry.book_id);
                let dates = projection.dates_for(entry.id);
                ReportRow {
                    reading_id: entry.id,
                    book_id: entry.book_id,
                    title: book
                        .map(|b| b.title.clone())
                        .unwrap_or_else(|| format!("<missing book {}>", entry.book_id)),
                    author: book.and_then(|b| b.author.clone()),
                    words: book.and_then(|b| b.word_count),
                    status: entry.status(),
                    date_started: entry.date_started,
                    date_finished: entry.date_finished_actual,
                    est_start: dates.map(|d| d.est_start),
                    est_finish: dates.map(|d| d.est_finish),
                    days_elapsed: entry.days_elapsed(),
                }
            })
            .collect();

        Self {
            medium: chain.medium(),
            generated: today,
            rows,
            faults: chain.faults().iter().map(|f| f.to_string()).collect(),
            warnings: projection.warnings.iter().map(|w| w.to_string()).collect(),
        }
    }

    pub fn has_caveats(&self) -> bool {
        !self.faults.is_empty() || !self.warnings.is_empty()
    }

    /// Plain text table, oldest entry first
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} chain ({} readings, as of {})", self.medium, self.rows.len(), self.generated);
        let _ = writeln!(
            out,
            "{:>6}  {:<36} {:<10} {:>9}  {:<10}  {:<10}",
            "ID", "Title", "Status", "Words", "Start", "Finish"
        );

        for row in &self.rows {
            let (start, finish) = match row.status {
                ReadingStatus::Completed => (row.date_started, row.date_finished),
                _ => (row.date_started.or(row.est_start), row.est_finish),
            };
            let _ = writeln!(
                out,
                "{:>6}  {:<36} {:<10} {:>9}  {:<10}  {:<10}",
                row.reading_id,
                truncate(&row.title, 36),
                row.status.to_string(),
                row.words.map(|w| w.to_string()).unwrap_or_else(|| "-".to_string()),
                format_date(start),
                format_date(finish),
            );
        }

        if self.has_caveats() {
            let _ = writeln!(out, "\nComputed with caveats:");
            for fault in &self.faults {
                let _ = writeln!(out, "  fault: {}", fault);
            }
            for warning in &self.warnings {
                let _ = writeln!(out, "  warning: {}", warning);
            }
        }
        out
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "TBD".to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::project_chain;
    use crate::models::ReadingEntry;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rows_follow_chain_order_with_projected_dates() {
        let done = ReadingEntry {
            date_started: Some(date(2024, 1, 1)),
            date_finished_actual: Some(date(2024, 1, 3)),
            ..ReadingEntry::new(1, 10, Medium::Hardcover)
        };
        let next = ReadingEntry {
            previous_id: Some(1),
            ..ReadingEntry::new(2, 20, Medium::Hardcover)
        };
        let chain = Chain::build(Medium::Hardcover, vec![next, done]);
        let mut books = HashMap::new();
        books.insert(10, Book { word_count: Some(1_000), ..Book::new(10, "Dune".to_string()) });
        books.insert(20, Book { word_count: Some(25_000), ..Book::new(20, "Hyperion".to_string()) });

        let today = date(2024, 2, 1);
        let projection = project_chain(&chain, &books, today, 12_500);
        let report = ChainReport::assemble(&chain, &projection, &books, today);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].title, "Dune");
        assert_eq!(report.rows[0].days_elapsed, Some(3));
        assert_eq!(report.rows[1].est_start, Some(today));
        assert_eq!(report.rows[1].est_finish, Some(date(2024, 2, 3)));
        assert!(!report.has_caveats());

        let text = report.render_text();
        assert!(text.contains("Hyperion"));
        assert!(text.contains("2024-02-03"));
        assert!(!text.contains("caveats"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["medium"], "hardcover");
        assert_eq!(json["rows"][1]["status"], "future");
    }

    #[test]
    fn caveats_are_listed() {
        let orphan = ReadingEntry {
            previous_id: Some(99),
            ..ReadingEntry::new(1, 10, Medium::Kindle)
        };
        let chain = Chain::build(Medium::Kindle, vec![orphan]);
        let books = HashMap::new();
        let today = date(2024, 2, 1);
        let projection = project_chain(&chain, &books, today, 10_000);
        let report = ChainReport::assemble(&chain, &projection, &books, today);

        assert!(report.has_caveats());
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.rows[0].title.contains("missing book"));
        assert!(report.render_text().contains("Computed with caveats"));
    }

    #[test]
    fn long_titles_are_cut() {
        assert_eq!(truncate("abcdef", 4), "abc~");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
