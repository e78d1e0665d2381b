pub mod chain;
pub mod cli;
pub mod config;
pub mod database;
pub mod logging;
pub mod models;
pub mod report;
pub mod utils;

pub use chain::{Chain, ChainError, StructuralFault, UpdateSet};
pub use config::Config;
pub use database::{Database, EntryStore, Placement};
pub use models::{Book, Medium, ReadingEntry, ReadingStatus};
pub use utils::Profile;
