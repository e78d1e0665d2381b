use clap::{Parser, Subcommand};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

use crate::chain::{self, Chain, Progress, UpdateSet};
use crate::config::Config;
use crate::database::{Database, DatabaseError, EntryStore, Placement};
use crate::models::{Book, BookId, EntryId, Medium, NewReading, ReadingEntry, ReadingStatus};
use crate::report::ChainReport;
use crate::utils::{parse_date, today};

#[derive(Parser)]
#[command(name = "rchain")]
#[command(about = "Reading chains - what you read next, and when you will finish it")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a book to the catalogue
    AddBook {
        /// Book title
        title: String,
        #[arg(long)]
        author: Option<String>,
        /// Word count, used for projections
        #[arg(long)]
        words: Option<i64>,
        #[arg(long)]
        pages: Option<i64>,
    },
    /// List books
    Books,
    /// Plan a reading in a medium's chain (appended after the head by default)
    NewReading {
        book_id: BookId,
        /// kindle, hardcover or audio
        medium: Medium,
        /// Place the reading right after this reading ID
        #[arg(long, conflicts_with = "tail")]
        after: Option<EntryId>,
        /// Place the reading at the oldest end of the chain
        #[arg(long)]
        tail: bool,
        /// Start date (YYYY-MM-DD) if already reading
        #[arg(long)]
        started: Option<String>,
        /// Words per day for this reading
        #[arg(long)]
        wpd: Option<u32>,
    },
    /// Remove a reading and close the gap in its chain
    RemoveReading { id: EntryId },
    /// Move a reading to sit right after another one
    Reorder {
        id: EntryId,
        /// Reading to place it after
        #[arg(required_unless_present = "tail")]
        target: Option<EntryId>,
        /// Move to the oldest end of the chain instead
        #[arg(long, conflicts_with = "target")]
        tail: bool,
        /// Show the pointer changes without saving them
        #[arg(long)]
        dry_run: bool,
    },
    /// Mark a reading as started
    Start {
        id: EntryId,
        /// Start date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Mark a reading as finished
    Finish {
        id: EntryId,
        /// Finish date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Start the next reading in the chain the following day
        #[arg(long)]
        start_next: bool,
    },
    /// Show a medium's chain with projected dates
    Chain {
        medium: Medium,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Store the projected dates
        #[arg(long)]
        save: bool,
    },
    /// Show the chain around one reading
    Inspect {
        id: EntryId,
        /// Readings to show on each side
        #[arg(long)]
        window: Option<usize>,
    },
    /// Report structural faults
    Check { medium: Option<Medium> },
    /// Relink a faulted chain in its best-effort order
    Repair {
        medium: Medium,
        #[arg(long)]
        dry_run: bool,
    },
    /// Current readings with today's progress
    Status,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Rejected, no change made: {0}")]
    Rejected(String),
    #[error("Failed to encode JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Validation failures become rejections; everything else stays a database error
fn rejected(err: DatabaseError) -> CliError {
    match err {
        DatabaseError::Chain(e) => CliError::Rejected(e.to_string()),
        DatabaseError::StaleChain { .. }
        | DatabaseError::AlreadyReading { .. }
        | DatabaseError::FinishBeforeStart { .. } => CliError::Rejected(err.to_string()),
        other => CliError::DatabaseError(other),
    }
}

fn parse_optional_date(value: Option<String>) -> Result<Option<chrono::NaiveDate>, CliError> {
    value
        .map(|s| {
            parse_date(&s)
                .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", s, e)))
        })
        .transpose()
}

fn title_of(books: &HashMap<BookId, Book>, entry: &ReadingEntry) -> String {
    books
        .get(&entry.book_id)
        .map(|b| b.title.clone())
        .unwrap_or_else(|| format!("<missing book {}>", entry.book_id))
}

fn print_updates(updates: &UpdateSet) {
    if updates.is_empty() {
        println!("Nothing to change");
        return;
    }
    for change in &updates.changes {
        println!(
            "  reading {}: previous {} -> {}",
            change.entry_id,
            change.old_previous.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()),
            change.new_previous.map(|id| id.to_string()).unwrap_or_else(|| "none".to_string()),
        );
    }
    if let Some(id) = updates.removed {
        println!("  reading {} removed", id);
    }
}

/// Handle the add-book command
pub fn handle_add_book(
    title: String,
    author: Option<String>,
    words: Option<i64>,
    pages: Option<i64>,
    db: &Database,
) -> Result<(), CliError> {
    let mut book = Book::new(0, title);
    book.author = author;
    book.word_count = words;
    book.page_count = pages;

    let id = db.insert_book(&book)?;
    println!("Book created successfully (ID: {})", id);
    Ok(())
}

/// Handle the books command
pub fn handle_books(db: &Database) -> Result<(), CliError> {
    let books = db.get_all_books()?;
    if books.is_empty() {
        println!("No books yet");
        return Ok(());
    }
    for book in books {
        println!(
            "{:>5}  {}{}  ({} words)",
            book.id,
            book.title,
            book.author.map(|a| format!(" by {}", a)).unwrap_or_default(),
            book.word_count.map(|w| w.to_string()).unwrap_or_else(|| "?".to_string()),
        );
    }
    Ok(())
}

/// Handle the new-reading command
pub fn handle_new_reading(
    book_id: BookId,
    medium: Medium,
    after: Option<EntryId>,
    tail: bool,
    started: Option<String>,
    wpd: Option<u32>,
    db: &Database,
) -> Result<(), CliError> {
    let placement = match (after, tail) {
        (Some(id), _) => Placement::After(id),
        (None, true) => Placement::Tail,
        (None, false) => Placement::Head,
    };

    let mut new = NewReading::new(book_id, medium);
    new.date_started = parse_optional_date(started)?;
    new.words_per_day_goal = wpd;

    let id = db.insert_reading(new, placement).map_err(rejected)?;
    let entry = db.get_reading(id)?;
    println!("Reading created successfully (ID: {})", id);
    println!(
        "Previous reading in the {} chain: {}",
        medium,
        entry.previous_id.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string())
    );
    Ok(())
}

/// Handle the remove-reading command
pub fn handle_remove_reading(id: EntryId, db: &Database) -> Result<(), CliError> {
    let updates = db.remove_reading(id).map_err(rejected)?;
    print_updates(&updates);
    println!("Reading {} removed", id);
    Ok(())
}

/// Handle the reorder command
pub fn handle_reorder(
    id: EntryId,
    target: Option<EntryId>,
    tail: bool,
    dry_run: bool,
    db: &Database,
) -> Result<(), CliError> {
    let target = if tail { None } else { target };
    let entry = db.get_reading(id)?;
    let chain = db.load_chain(entry.medium)?;

    let updates = chain::move_after(&chain, id, target)
        .map_err(|e| CliError::Rejected(e.to_string()))?;
    print_updates(&updates);

    if dry_run {
        println!("Dry run, nothing saved");
    } else if !updates.is_empty() {
        db.apply_updates(&updates).map_err(rejected)?;
        println!("Chain updated successfully");
    }
    Ok(())
}

/// Handle the start command
pub fn handle_start(id: EntryId, date: Option<String>, db: &Database) -> Result<(), CliError> {
    let date = parse_optional_date(date)?.unwrap_or_else(today);
    db.set_started(id, Some(date)).map_err(rejected)?;
    println!("Reading {} started on {}", id, date);
    Ok(())
}

/// Handle the finish command
pub fn handle_finish(
    id: EntryId,
    date: Option<String>,
    start_next: bool,
    db: &Database,
) -> Result<(), CliError> {
    let date = parse_optional_date(date)?.unwrap_or_else(today);
    let entry = db.get_reading(id)?;
    db.set_finished(id, Some(date)).map_err(rejected)?;
    println!("Reading {} finished on {}", id, date);

    if !start_next {
        return Ok(());
    }

    let chain = db.load_chain(entry.medium)?;
    if chain.is_faulted() {
        println!("The {} chain has faults; run `rchain check` before starting the next reading", entry.medium);
        return Ok(());
    }
    match chain.successor(id).filter(|next| next.status() == ReadingStatus::Future) {
        Some(next) => {
            let start = date.succ_opt().unwrap_or(date);
            db.set_started(next.id, Some(start)).map_err(rejected)?;
            println!("Next reading {} starts on {}", next.id, start);
        }
        None => println!("No next reading in the {} chain", entry.medium),
    }
    Ok(())
}

fn project_medium(
    medium: Medium,
    db: &Database,
    config: &Config,
) -> Result<(Chain, HashMap<BookId, Book>, chain::ChainProjection), CliError> {
    let chain = db.load_chain(medium)?;
    let books = db.books_by_id()?;
    let projection = chain::project_chain(&chain, &books, today(), config.words_per_day(medium));
    for warning in &projection.warnings {
        warn!(%medium, "projection: {}", warning);
    }
    Ok((chain, books, projection))
}

/// Handle the chain command
pub fn handle_chain(
    medium: Medium,
    json: bool,
    save: bool,
    db: &Database,
    config: &Config,
) -> Result<(), CliError> {
    let (chain, books, projection) = project_medium(medium, db, config)?;

    if save {
        let changed = db.save_projection(&projection.all())?;
        eprintln!("Saved projected dates for {} reading(s)", changed);
    }

    let report = ChainReport::assemble(&chain, &projection, &books, today());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

/// Handle the inspect command
pub fn handle_inspect(
    id: EntryId,
    window: Option<usize>,
    db: &Database,
    config: &Config,
) -> Result<(), CliError> {
    let entry = db.get_reading(id)?;
    let chain = db.load_chain(entry.medium)?;
    let books = db.books_by_id()?;
    let window = window.unwrap_or(config.inspect_window);

    let Some((before, target, after)) = chain.window(id, window) else {
        return Err(CliError::Rejected(format!("reading {} is not in the {} chain", id, entry.medium)));
    };

    let line = |e: &ReadingEntry| {
        format!("  {:>5}  {:<10} {}", e.id, e.status().to_string(), title_of(&books, e))
    };
    if !before.is_empty() {
        println!("Previous readings:");
        before.iter().for_each(|e| println!("{}", line(e)));
    }
    println!("Reading:");
    println!("{}", line(target));
    if !after.is_empty() {
        println!("Next readings:");
        after.iter().for_each(|e| println!("{}", line(e)));
    }

    let pos = chain.position(id).unwrap_or(0);
    println!(
        "Chain summary: {} before, {} after, {} in the {} chain",
        pos,
        chain.len() - pos - 1,
        chain.len(),
        entry.medium
    );
    Ok(())
}

/// Handle the check command
pub fn handle_check(medium: Option<Medium>, db: &Database) -> Result<(), CliError> {
    let mediums = medium.map(|m| vec![m]).unwrap_or_else(|| Medium::ALL.to_vec());
    for medium in mediums {
        let chain = db.load_chain(medium)?;
        if chain.faults().is_empty() {
            println!("{}: {} readings, no faults", medium, chain.len());
            continue;
        }
        println!("{}: {} readings, {} fault(s)", medium, chain.len(), chain.faults().len());
        for fault in chain.faults() {
            println!("  {}", fault);
        }
    }
    Ok(())
}

/// Handle the repair command
pub fn handle_repair(medium: Medium, dry_run: bool, db: &Database) -> Result<(), CliError> {
    let chain = db.load_chain(medium)?;
    let updates = chain::repair(&chain);
    print_updates(&updates);

    if dry_run {
        println!("Dry run, nothing saved");
    } else if !updates.is_empty() {
        db.apply_updates(&updates).map_err(rejected)?;
        println!("{} chain relinked", medium);
    }
    Ok(())
}

/// Handle the status command
pub fn handle_status(db: &Database, config: &Config) -> Result<(), CliError> {
    let today = today();
    for medium in Medium::ALL {
        let (chain, books, projection) = project_medium(medium, db, config)?;
        let Some(current) = chain.current() else {
            println!("{:<10} nothing in progress", medium);
            continue;
        };
        let progress = projection
            .current
            .map(|dates| chain::progress_on(dates.est_start, dates.est_finish, today))
            .unwrap_or(Progress::NotStarted);
        println!(
            "{:<10} {} (reading {}), est. finish {}, {}",
            medium,
            title_of(&books, current),
            current.id,
            projection
                .current
                .map(|d| d.est_finish.to_string())
                .unwrap_or_else(|| "TBD".to_string()),
            progress
        );
    }
    Ok(())
}
