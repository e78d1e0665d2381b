use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chain::{self, Chain, ChainError, ProjectedDates, UpdateSet};
use crate::models::{Book, BookId, EntryId, Medium, NewReading, ReadingEntry};
use crate::utils::now_timestamp;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("{0}")]
    Chain(#[from] ChainError),
    #[error("Reading {entry} changed since the chain was loaded; nothing was saved")]
    StaleChain { entry: EntryId },
    #[error("Reading {0} not found")]
    ReadingNotFound(EntryId),
    #[error("Book {0} not found")]
    BookNotFound(BookId),
    #[error("Reading {open} is already in progress in the {medium} chain")]
    AlreadyReading { medium: Medium, open: EntryId },
    #[error("Reading {entry} would finish on {finished}, before it started on {started}")]
    FinishBeforeStart {
        entry: EntryId,
        started: NaiveDate,
        finished: NaiveDate,
    },
}

/// What the chain engine needs from persistent storage
pub trait EntryStore {
    type Error;

    fn load_entries_by_medium(&self, medium: Medium) -> Result<Vec<ReadingEntry>, Self::Error>;

    /// Apply every change in `updates`, or none of them
    fn apply_updates(&self, updates: &UpdateSet) -> Result<(), Self::Error>;

    fn load_book(&self, book_id: BookId) -> Result<Book, Self::Error>;
}

/// Where `insert_reading` places the new entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Most-future end of the chain
    Head,
    /// Oldest end of the chain
    Tail,
    After(EntryId),
}

impl ToSql for Medium {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Medium {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

const ENTRY_COLUMNS: &str = "id, book_id, medium, previous_id, date_started, date_finished_actual,
     words_per_day_goal, date_est_start, date_est_end";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new(path: &str) -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(path);

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        debug!(path = %db_path.display(), "opened database");

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Private database that disappears on drop
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize the database schema (tables and indexes)
    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS books (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                title           TEXT NOT NULL,
                author          TEXT,
                word_count      INTEGER,
                page_count      INTEGER,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;

        // No foreign key on previous_id; broken links surface as chain faults
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS readings (
                id                    INTEGER PRIMARY KEY,
                book_id               INTEGER NOT NULL REFERENCES books(id),
                medium                TEXT NOT NULL,
                previous_id           INTEGER,
                date_started          TEXT,
                date_finished_actual  TEXT,
                words_per_day_goal    INTEGER,
                date_est_start        TEXT,
                date_est_end          TEXT,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_readings_medium ON readings(medium)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_readings_previous_id ON readings(previous_id)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)",
            [],
        )?;

        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Insert a book and return its ID. `book.id` is ignored.
    pub fn insert_book(&self, book: &Book) -> Result<BookId, DatabaseError> {
        self.conn.execute(
            "INSERT INTO books (title, author, word_count, page_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                book.title,
                book.author,
                book.word_count,
                book.page_count,
                book.created_at,
                book.updated_at
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(book = id, title = %book.title, "inserted book");
        Ok(id)
    }

    /// Helper function to map a row to a Book
    fn row_to_book(row: &rusqlite::Row) -> Result<Book, rusqlite::Error> {
        Ok(Book {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            word_count: row.get(3)?,
            page_count: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    /// Get a single book by ID
    pub fn get_book(&self, id: BookId) -> Result<Book, DatabaseError> {
        self.conn
            .query_row(
                "SELECT id, title, author, word_count, page_count, created_at, updated_at
                 FROM books WHERE id = ?1",
                rusqlite::params![id],
                Self::row_to_book,
            )
            .optional()?
            .ok_or(DatabaseError::BookNotFound(id))
    }

    /// Get all books ordered by title
    pub fn get_all_books(&self) -> Result<Vec<Book>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, author, word_count, page_count, created_at, updated_at
             FROM books ORDER BY title COLLATE NOCASE ASC, id ASC",
        )?;
        let books = stmt
            .query_map([], Self::row_to_book)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    /// All books keyed by ID, for projection and reports
    pub fn books_by_id(&self) -> Result<HashMap<BookId, Book>, DatabaseError> {
        Ok(self
            .get_all_books()?
            .into_iter()
            .map(|book| (book.id, book))
            .collect())
    }

    /// Helper function to map a row to a ReadingEntry
    fn row_to_entry(row: &rusqlite::Row) -> Result<ReadingEntry, rusqlite::Error> {
        Ok(ReadingEntry {
            id: row.get(0)?,
            book_id: row.get(1)?,
            medium: row.get(2)?,
            previous_id: row.get(3)?,
            date_started: row.get(4)?,
            date_finished_actual: row.get(5)?,
            words_per_day_goal: row.get(6)?,
            date_est_start: row.get(7)?,
            date_est_end: row.get(8)?,
        })
    }

    fn query_entries(conn: &Connection, medium: Option<Medium>) -> Result<Vec<ReadingEntry>, DatabaseError> {
        let entries = match medium {
            Some(medium) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM readings WHERE medium = ?1 ORDER BY id ASC",
                    ENTRY_COLUMNS
                ))?;
                stmt.query_map(rusqlite::params![medium], Self::row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM readings ORDER BY id ASC",
                    ENTRY_COLUMNS
                ))?;
                stmt.query_map([], Self::row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(entries)
    }

    fn query_entry(conn: &Connection, id: EntryId) -> Result<ReadingEntry, DatabaseError> {
        conn.query_row(
            &format!("SELECT {} FROM readings WHERE id = ?1", ENTRY_COLUMNS),
            rusqlite::params![id],
            Self::row_to_entry,
        )
        .optional()?
        .ok_or(DatabaseError::ReadingNotFound(id))
    }

    /// The medium's in-progress reading other than `except`, if any
    fn open_reading(conn: &Connection, medium: Medium, except: Option<EntryId>) -> Result<Option<EntryId>, DatabaseError> {
        Ok(conn
            .query_row(
                "SELECT id FROM readings
                 WHERE medium = ?1 AND date_started IS NOT NULL AND date_finished_actual IS NULL
                   AND id IS NOT ?2
                 ORDER BY id ASC LIMIT 1",
                rusqlite::params![medium, except],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn ensure_none_open(conn: &Connection, medium: Medium, except: Option<EntryId>) -> Result<(), DatabaseError> {
        match Self::open_reading(conn, medium, except)? {
            Some(open) => Err(DatabaseError::AlreadyReading { medium, open }),
            None => Ok(()),
        }
    }

    fn query_chain(conn: &Connection, medium: Medium) -> Result<Chain, DatabaseError> {
        let all = Self::query_entries(conn, None)?;
        let chain = Chain::build_from_all(medium, &all);
        for fault in chain.faults() {
            warn!(%medium, "chain fault: {}", fault);
        }
        Ok(chain)
    }

    /// Get a single reading by ID
    pub fn get_reading(&self, id: EntryId) -> Result<ReadingEntry, DatabaseError> {
        Self::query_entry(&self.conn, id)
    }

    /// Every reading of every medium
    pub fn load_all_entries(&self) -> Result<Vec<ReadingEntry>, DatabaseError> {
        Self::query_entries(&self.conn, None)
    }

    /// Build the ordered chain for one medium
    pub fn load_chain(&self, medium: Medium) -> Result<Chain, DatabaseError> {
        Self::query_chain(&self.conn, medium)
    }

    /// Write an update set inside an already open transaction
    fn apply_in(conn: &Connection, updates: &UpdateSet) -> Result<(), DatabaseError> {
        let now = now_timestamp();

        if let Some(id) = updates.removed {
            let deleted = conn.execute(
                "DELETE FROM readings WHERE id = ?1 AND medium = ?2",
                rusqlite::params![id, updates.medium],
            )?;
            if deleted == 0 {
                return Err(DatabaseError::StaleChain { entry: id });
            }
        }

        if let Some(entry) = &updates.inserted {
            conn.execute(
                "INSERT INTO readings (id, book_id, medium, previous_id, date_started, date_finished_actual,
                     words_per_day_goal, date_est_start, date_est_end, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    entry.id,
                    entry.book_id,
                    entry.medium,
                    entry.previous_id,
                    entry.date_started,
                    entry.date_finished_actual,
                    entry.words_per_day_goal,
                    entry.date_est_start,
                    entry.date_est_end,
                    now,
                    now
                ],
            )?;
        }

        let inserted_id = updates.inserted.as_ref().map(|e| e.id);
        for change in &updates.changes {
            // The inserted row already carries its final pointer
            if Some(change.entry_id) == inserted_id {
                continue;
            }
            let written = conn.execute(
                "UPDATE readings SET previous_id = ?1, updated_at = ?2
                 WHERE id = ?3 AND medium = ?4 AND previous_id IS ?5",
                rusqlite::params![
                    change.new_previous,
                    now,
                    change.entry_id,
                    updates.medium,
                    change.old_previous
                ],
            )?;
            if written == 0 {
                return Err(DatabaseError::StaleChain { entry: change.entry_id });
            }
        }

        Ok(())
    }

    /// Insert a new reading into its medium's chain and return its ID.
    ///
    /// The ID is the next free one (`MAX(id) + 1`); allocation, placement and
    /// pointer updates share one transaction.
    pub fn insert_reading(&self, new: NewReading, placement: Placement) -> Result<EntryId, DatabaseError> {
        self.get_book(new.book_id)?;

        let tx = self.conn.unchecked_transaction()?;
        if new.date_started.is_some() {
            Self::ensure_none_open(&tx, new.medium, None)?;
        }
        let id: EntryId = tx.query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM readings", [], |row| row.get(0))?;
        let chain = Self::query_chain(&tx, new.medium)?;
        let after = match placement {
            Placement::Head => chain.head().map(|entry| entry.id),
            Placement::Tail => None,
            Placement::After(target) => Some(target),
        };

        let updates = chain::insert_after(&chain, new.into_entry(id), after)?;
        Self::apply_in(&tx, &updates)?;
        tx.commit()?;

        info!(reading = id, medium = %updates.medium, after = ?after, "inserted reading");
        Ok(id)
    }

    /// Splice a reading out of its chain and delete it
    pub fn remove_reading(&self, id: EntryId) -> Result<UpdateSet, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let entry = Self::query_entry(&tx, id)?;
        let chain = Self::query_chain(&tx, entry.medium)?;

        let updates = chain::remove(&chain, id)?;
        Self::apply_in(&tx, &updates)?;
        tx.commit()?;

        info!(reading = id, medium = %entry.medium, "removed reading");
        Ok(updates)
    }

    /// Set or clear the start date of a reading.
    ///
    /// Starting is refused while another reading of the same medium is in
    /// progress, or when the reading already finished before `date`.
    pub fn set_started(&self, id: EntryId, date: Option<NaiveDate>) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let entry = Self::query_entry(&tx, id)?;
        if let Some(started) = date {
            match entry.date_finished_actual {
                Some(finished) if finished < started => {
                    return Err(DatabaseError::FinishBeforeStart { entry: id, started, finished });
                }
                Some(_) => {}
                None => Self::ensure_none_open(&tx, entry.medium, Some(id))?,
            }
        }

        tx.execute(
            "UPDATE readings SET date_started = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![date, now_timestamp(), id],
        )?;
        tx.commit()?;
        debug!(reading = id, started = ?date, "set start date");
        Ok(())
    }

    /// Set or clear the actual finish date of a reading.
    ///
    /// A reading finished without a start date is taken to have started the
    /// same day.
    pub fn set_finished(&self, id: EntryId, date: Option<NaiveDate>) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let entry = Self::query_entry(&tx, id)?;
        if let (Some(started), Some(finished)) = (entry.date_started, date) {
            if finished < started {
                return Err(DatabaseError::FinishBeforeStart { entry: id, started, finished });
            }
        }
        if date.is_none() && entry.date_started.is_some() {
            // Reopening makes the reading current again
            Self::ensure_none_open(&tx, entry.medium, Some(id))?;
        }

        tx.execute(
            "UPDATE readings SET date_started = COALESCE(date_started, ?1), date_finished_actual = ?1,
                 updated_at = ?2
             WHERE id = ?3",
            rusqlite::params![date, now_timestamp(), id],
        )?;
        tx.commit()?;
        debug!(reading = id, finished = ?date, "set finish date");
        Ok(())
    }

    /// Store projected dates; returns how many readings actually changed
    pub fn save_projection(&self, dates: &[ProjectedDates]) -> Result<usize, DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        let now = now_timestamp();
        let mut changed = 0;
        for projected in dates {
            changed += tx.execute(
                "UPDATE readings SET date_est_start = ?1, date_est_end = ?2, updated_at = ?3
                 WHERE id = ?4 AND (date_est_start IS NOT ?1 OR date_est_end IS NOT ?2)",
                rusqlite::params![projected.est_start, projected.est_finish, now, projected.entry_id],
            )?;
        }
        tx.commit()?;
        debug!(changed, total = dates.len(), "saved projection");
        Ok(changed)
    }
}

impl EntryStore for Database {
    type Error = DatabaseError;

    fn load_entries_by_medium(&self, medium: Medium) -> Result<Vec<ReadingEntry>, DatabaseError> {
        Self::query_entries(&self.conn, Some(medium))
    }

    fn apply_updates(&self, updates: &UpdateSet) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        Self::apply_in(&tx, updates)?;
        tx.commit()?;
        info!(medium = %updates.medium, changes = updates.touched(), "applied chain updates");
        Ok(())
    }

    fn load_book(&self, book_id: BookId) -> Result<Book, DatabaseError> {
        self.get_book(book_id)
    }
}
