use chrono::NaiveDate;
use reading_chain::chain;
use reading_chain::database::DatabaseError;
use reading_chain::models::{EntryId, NewReading};
use reading_chain::{Book, Database, EntryStore, Medium, Placement};
use tempfile::TempDir;

fn open() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("readings.db");
    let db = Database::new(path.to_str().unwrap()).unwrap();
    (dir, db)
}

fn book(db: &Database, title: &str, words: Option<i64>) -> i64 {
    let mut book = Book::new(0, title.to_string());
    book.word_count = words;
    db.insert_book(&book).unwrap()
}

fn order(db: &Database, medium: Medium) -> Vec<EntryId> {
    let chain = db.load_chain(medium).unwrap();
    assert!(chain.faults().is_empty(), "unexpected faults: {:?}", chain.faults());
    chain.iter().map(|e| e.id).collect()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn new_readings_append_after_the_head_by_default() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", Some(180_000));

    let first = db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    let second = db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    let third = db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();

    assert_eq!((first, second, third), (1, 2, 3));
    assert_eq!(order(&db, Medium::Kindle), vec![1, 2, 3]);
    assert_eq!(db.get_reading(1).unwrap().previous_id, None);
    assert_eq!(db.get_reading(3).unwrap().previous_id, Some(2));
}

#[test]
fn ids_are_shared_across_mediums_but_chains_are_not() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);

    db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    db.insert_reading(NewReading::new(b, Medium::Audio), Placement::Head).unwrap();
    db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();

    assert_eq!(order(&db, Medium::Kindle), vec![1, 3]);
    assert_eq!(order(&db, Medium::Audio), vec![2]);
    assert!(order(&db, Medium::Hardcover).is_empty());
}

#[test]
fn tail_and_after_placements() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    for _ in 0..2 {
        db.insert_reading(NewReading::new(b, Medium::Hardcover), Placement::Head).unwrap();
    }

    let at_tail = db.insert_reading(NewReading::new(b, Medium::Hardcover), Placement::Tail).unwrap();
    assert_eq!(order(&db, Medium::Hardcover), vec![at_tail, 1, 2]);

    let middle = db
        .insert_reading(NewReading::new(b, Medium::Hardcover), Placement::After(1))
        .unwrap();
    assert_eq!(order(&db, Medium::Hardcover), vec![at_tail, 1, middle, 2]);
}

#[test]
fn inserting_after_a_missing_reading_saves_nothing() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();

    let err = db
        .insert_reading(NewReading::new(b, Medium::Kindle), Placement::After(42))
        .unwrap_err();
    assert!(matches!(err, DatabaseError::Chain(_)));
    assert_eq!(db.load_all_entries().unwrap().len(), 1);
}

#[test]
fn unknown_book_is_rejected() {
    let (_dir, db) = open();
    let err = db
        .insert_reading(NewReading::new(7, Medium::Kindle), Placement::Head)
        .unwrap_err();
    assert!(matches!(err, DatabaseError::BookNotFound(7)));
}

#[test]
fn removing_a_reading_closes_the_gap() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    for _ in 0..3 {
        db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    }

    let updates = db.remove_reading(2).unwrap();
    assert_eq!(updates.removed, Some(2));
    assert_eq!(updates.changes.len(), 1);
    assert_eq!(order(&db, Medium::Kindle), vec![1, 3]);
    assert!(matches!(db.get_reading(2), Err(DatabaseError::ReadingNotFound(2))));
}

#[test]
fn moves_are_applied_through_the_store() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    for _ in 0..3 {
        db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    }

    let chain = db.load_chain(Medium::Kindle).unwrap();
    let updates = chain::move_after(&chain, 3, Some(1)).unwrap();
    assert_eq!(updates.changes.len(), 2);
    db.apply_updates(&updates).unwrap();

    assert_eq!(order(&db, Medium::Kindle), vec![1, 3, 2]);

    // Replaying the same update set finds the pointers already moved
    let err = db.apply_updates(&updates).unwrap_err();
    assert!(matches!(err, DatabaseError::StaleChain { .. }));
}

#[test]
fn stale_update_rolls_back_every_change() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    for _ in 0..3 {
        db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    }

    let chain = db.load_chain(Medium::Kindle).unwrap();
    let updates = chain::move_after(&chain, 3, Some(1)).unwrap();
    let last = updates.changes.last().unwrap().entry_id;

    // Someone else repoints the last entry the update set touches
    db.conn()
        .execute("UPDATE readings SET previous_id = NULL WHERE id = ?1", [last])
        .unwrap();

    let err = db.apply_updates(&updates).unwrap_err();
    assert!(matches!(err, DatabaseError::StaleChain { entry } if entry == last));

    let first = updates.changes.first().unwrap();
    assert_eq!(
        db.get_reading(first.entry_id).unwrap().previous_id,
        first.old_previous
    );
}

#[test]
fn loading_through_the_store_trait_keeps_mediums_apart() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    db.insert_reading(NewReading::new(b, Medium::Audio), Placement::Head).unwrap();
    db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();

    let audio = db.load_entries_by_medium(Medium::Audio).unwrap();
    assert_eq!(audio.len(), 1);
    assert_eq!(audio[0].medium, Medium::Audio);
    assert_eq!(db.load_book(b).unwrap().title, "Dune");
}

#[test]
fn projection_is_saved_only_when_it_changes() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", Some(10_000));
    let mut started = NewReading::new(b, Medium::Kindle);
    started.date_started = Some(date("2024-03-01"));
    db.insert_reading(started, Placement::Head).unwrap();
    db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();

    let chain = db.load_chain(Medium::Kindle).unwrap();
    let books = db.books_by_id().unwrap();
    let projection = chain::project_chain(&chain, &books, date("2024-03-02"), 5000);

    assert_eq!(db.save_projection(&projection.all()).unwrap(), 2);
    assert_eq!(db.save_projection(&projection.all()).unwrap(), 0);

    let next = db.get_reading(2).unwrap();
    assert_eq!(next.date_est_start, Some(date("2024-03-03")));
    assert_eq!(next.date_est_end, Some(date("2024-03-05")));
}

#[test]
fn start_and_finish_dates_round_trip() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    let id = db.insert_reading(NewReading::new(b, Medium::Audio), Placement::Head).unwrap();

    db.set_started(id, Some(date("2024-05-01"))).unwrap();
    db.set_finished(id, Some(date("2024-05-09"))).unwrap();

    let entry = db.get_reading(id).unwrap();
    assert_eq!(entry.days_elapsed(), Some(9));
    assert!(matches!(db.set_started(99, None), Err(DatabaseError::ReadingNotFound(99))));
}

#[test]
fn repair_relinks_a_divergent_chain() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    for _ in 0..3 {
        db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    }
    db.conn()
        .execute("UPDATE readings SET previous_id = 1 WHERE id = 3", [])
        .unwrap();

    let chain = db.load_chain(Medium::Kindle).unwrap();
    assert!(chain.is_faulted());

    db.apply_updates(&chain::repair(&chain)).unwrap();
    let fixed = db.load_chain(Medium::Kindle).unwrap();
    assert!(fixed.faults().is_empty());
    assert_eq!(fixed.len(), 3);
}

#[test]
fn a_second_open_reading_is_refused_and_nothing_is_written() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", Some(50_000));
    let mut first = NewReading::new(b, Medium::Kindle);
    first.date_started = Some(date("2024-03-01"));
    db.insert_reading(first, Placement::Head).unwrap();

    let mut second = NewReading::new(b, Medium::Kindle);
    second.date_started = Some(date("2024-03-02"));
    let err = db.insert_reading(second, Placement::Head).unwrap_err();
    assert!(matches!(err, DatabaseError::AlreadyReading { open: 1, medium: Medium::Kindle }));
    assert_eq!(order(&db, Medium::Kindle), vec![1]);

    let queued = db.insert_reading(NewReading::new(b, Medium::Kindle), Placement::Head).unwrap();
    assert!(db.set_started(queued, Some(date("2024-03-02"))).is_err());

    let open: Vec<EntryId> = db
        .load_chain(Medium::Kindle)
        .unwrap()
        .iter()
        .filter(|e| e.status() == reading_chain::ReadingStatus::Current)
        .map(|e| e.id)
        .collect();
    assert_eq!(open, vec![1]);
}

#[test]
fn finish_before_start_is_refused() {
    let (_dir, db) = open();
    let b = book(&db, "Dune", None);
    let id = db.insert_reading(NewReading::new(b, Medium::Audio), Placement::Head).unwrap();
    db.set_started(id, Some(date("2024-03-01"))).unwrap();

    let err = db.set_finished(id, Some(date("2024-01-01"))).unwrap_err();
    assert!(matches!(err, DatabaseError::FinishBeforeStart { .. }));

    let entry = db.get_reading(id).unwrap();
    assert_eq!(entry.date_finished_actual, None);
    assert_eq!(entry.days_elapsed(), None);
}
