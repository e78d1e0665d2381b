use clap::Parser;
use color_eyre::Result;
use reading_chain::{Config, Database, Profile, cli::{self, Cli, Commands}, logging};
use std::path::Path;

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev {
        Profile::Dev
    } else {
        Profile::Prod
    };

    // An explicit --config file wins over the profile's config
    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(Path::new(path))?,
        None => Config::load_with_profile(profile)?,
    };

    logging::init(&config.log_level);

    // Initialize database
    let db_path = config.get_database_path();
    let db = Database::new(
        db_path.to_str()
            .ok_or_else(|| color_eyre::eyre::eyre!("Database path contains invalid UTF-8"))?
    )?;

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::AddBook { title, author, words, pages } => {
            cli::handle_add_book(title, author, words, pages, &db)?;
        }
        Commands::Books => {
            cli::handle_books(&db)?;
        }
        Commands::NewReading { book_id, medium, after, tail, started, wpd } => {
            cli::handle_new_reading(book_id, medium, after, tail, started, wpd, &db)?;
        }
        Commands::RemoveReading { id } => {
            cli::handle_remove_reading(id, &db)?;
        }
        Commands::Reorder { id, target, tail, dry_run } => {
            cli::handle_reorder(id, target, tail, dry_run, &db)?;
        }
        Commands::Start { id, date } => {
            cli::handle_start(id, date, &db)?;
        }
        Commands::Finish { id, date, start_next } => {
            cli::handle_finish(id, date, start_next, &db)?;
        }
        Commands::Chain { medium, json, save } => {
            cli::handle_chain(medium, json, save, &db, &config)?;
        }
        Commands::Inspect { id, window } => {
            cli::handle_inspect(id, window, &db, &config)?;
        }
        Commands::Check { medium } => {
            cli::handle_check(medium, &db)?;
        }
        Commands::Repair { medium, dry_run } => {
            cli::handle_repair(medium, dry_run, &db)?;
        }
        Commands::Status => {
            cli::handle_status(&db, &config)?;
        }
    }

    Ok(())
}
