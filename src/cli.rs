//! CLI interface for memonote

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossterm::{execute, style::{Color, Print, ResetColor, SetForegroundColor}};
use rustyline::error::ReadlineError;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::Config;
use crate::error::CoreError;
use crate::library::NoteLibrary;
use crate::market::{CatalogQuery, Marketplace, SortKey};
use crate::model::{Category, MasteryLevel, Note, UserAccount};
use crate::store::{InMemoryStore, Stores};
use crate::study::{Command, Direction, ExitAction, Phase, StudyExecutor};
use crate::types::{ListingId, NoteId, ReviewId, UserId};

#[derive(Parser)]
#[command(name = "memonote")]
#[command(about = "Study word lists as flashcards and trade them on the marketplace", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage your notes
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
    /// Study a note interactively
    Study {
        /// Note id
        note_id: String,
    },
    /// Browse, sell and buy notes
    Market {
        #[command(subcommand)]
        command: MarketCommands,
    },
    /// Rate listings you bought
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
    /// Show (or top up) your balance
    Balance {
        /// Add currency to your balance
        #[arg(long)]
        deposit: Option<i64>,
    },
    /// Configure memonote
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum NotesCommands {
    /// List your notes
    List {
        /// Only notes due for study
        #[arg(long)]
        due: bool,
    },
    /// Show a note and its words
    Show { id: String },
    /// Create an empty note
    Create {
        title: String,
        #[arg(short, long, default_value = "other")]
        category: Category,
    },
    /// Append a word to a note
    AddWord {
        id: String,
        text: String,
        meaning: String,
    },
    /// Delete a note
    Delete { id: String },
}

#[derive(Subcommand)]
enum MarketCommands {
    /// Browse the catalog
    List {
        #[arg(short, long)]
        category: Option<Category>,
        /// Title substring
        #[arg(short, long)]
        query: Option<String>,
        /// score, reviews, sales or newest
        #[arg(short, long)]
        sort: Option<SortKey>,
    },
    /// Your notes that are long enough to sell
    Sellable,
    /// List one of your notes for sale
    Publish { note_id: String, price: i64 },
    /// Take one of your listings off the market
    Unpublish { listing_id: String },
    /// Buy a listing
    Buy { listing_id: String },
    /// Notes you bought
    History,
    /// Finish a transfer that stopped halfway (lists unsettled ones without an id)
    Reconcile { transfer_id: Option<String> },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Review a listing with a score from 1 to 5
    Post {
        listing_id: String,
        score: u8,
        #[arg(default_value = "")]
        text: String,
    },
    /// Show a listing's reviews
    List { listing_id: String },
    /// Delete one of your reviews
    Delete { listing_id: String, review_id: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Sign in as a user
    SetUser { user: String },
    /// Reset configuration to defaults
    Reset,
}

/// Loaded configuration and the snapshot-backed stores
struct App {
    config: Config,
    store: InMemoryStore,
    stores: Stores,
    snapshot_path: PathBuf,
}

impl App {
    async fn open() -> Result<Self> {
        let config = Config::load()?;
        let snapshot_path = config.snapshot_path()?;
        let store = InMemoryStore::load(&snapshot_path).await?;
        let stores = Stores::in_memory(&store);
        Ok(Self { config, store, stores, snapshot_path })
    }

    /// The signed-in user, with an account created on first use
    async fn user(&self) -> Result<UserId> {
        let user = self.config.current_user()
            .context("Run 'memonote config set-user <id>' first")?;
        match self.stores.accounts.get(&user).await {
            Ok(_) => {}
            Err(CoreError::NotFound { .. }) => {
                let account = UserAccount::new(user.clone(), user.as_str(), "");
                self.stores.accounts.put(&account).await?;
                tracing::info!("Created account for {}", user);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(user)
    }

    fn library(&self) -> NoteLibrary {
        NoteLibrary::new(self.stores.notes.clone())
    }

    fn market(&self) -> Marketplace {
        Marketplace::new(self.stores.clone(), self.config.market.settings())
    }

    async fn save(&self) -> Result<()> {
        self.store.save(&self.snapshot_path).await
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { command } = &cli.command {
        return match command {
            ConfigCommands::Show => crate::config::show_config(),
            ConfigCommands::SetUser { user } => crate::config::set_current_user(user),
            ConfigCommands::Reset => crate::config::reset_config(),
        };
    }

    let app = App::open().await?;
    let user = app.user().await?;

    match cli.command {
        Commands::Notes { command } => run_notes(&app, &user, command).await?,
        Commands::Study { note_id } => run_study(&app, &user, &NoteId::from(note_id)).await?,
        Commands::Market { command } => run_market(&app, &user, command).await?,
        Commands::Review { command } => run_review(&app, &user, command).await?,
        Commands::Balance { deposit } => {
            if let Some(amount) = deposit {
                if amount <= 0 {
                    anyhow::bail!("Deposit must be positive");
                }
                app.stores.balances.adjust(&user, amount).await?;
            }
            println!("Balance: {}", app.stores.balances.get(&user).await?);
        }
        Commands::Config { .. } => {}
    }

    app.save().await
}

async fn run_notes(app: &App, user: &UserId, command: NotesCommands) -> Result<()> {
    let library = app.library();
    match command {
        NotesCommands::List { due } => {
            let notes = if due {
                library.due(user, Utc::now()).await?
            } else {
                library.list(user).await?
            };
            if notes.is_empty() {
                println!("No notes.");
            }
            for note in &notes {
                print_note_line(note);
            }
        }
        NotesCommands::Show { id } => {
            let note = library.get(user, &NoteId::from(id)).await?;
            print_note_line(&note);
            println!("  {}", note.mastery_summary());
            if note.repeat_count > 0 {
                println!(
                    "  first test {:.0}% / last test {:.0}%",
                    note.first_test_result * 100.0,
                    note.last_test_result * 100.0
                );
            }
            for (i, word) in note.words.iter().enumerate() {
                println!("  {:>3}. {:<24} {:<32} [{}]", i + 1, word.text, word.meaning, word.mastery_level);
            }
        }
        NotesCommands::Create { title, category } => {
            let note = library.create(user, &title, category, Utc::now()).await?;
            print_success(&format!("Created note {}\n", note.id));
        }
        NotesCommands::AddWord { id, text, meaning } => {
            library.add_word(user, &NoteId::from(id), &text, &meaning, Utc::now()).await?;
            print_success("Word added\n");
        }
        NotesCommands::Delete { id } => {
            library.delete(user, &NoteId::from(id)).await?;
            println!("Note deleted.");
        }
    }
    Ok(())
}

fn print_note_line(note: &Note) {
    let due = match note.next_study_timestamp {
        Some(at) => format!("next {}", at.format("%Y-%m-%d")),
        None => "due".to_string(),
    };
    let bought = if note.is_purchased() { " (bought)" } else { "" };
    println!(
        "{}  {} [{}] {} words, {} repetitions, {}{}",
        note.id, note.title, note.category, note.word_count(), note.repeat_count, due, bought
    );
}

const STUDY_HELP: &[(&str, &str)] = &[
    ("r", "reveal / hide the answer"),
    ("x", "swap word and meaning"),
    ("h / n / e", "rate hard / normal / easy (scored sessions)"),
    ("> / <", "next / previous word (unscored sessions)"),
    ("end", "leave an unscored session"),
    ("finish", "record the result of a completed scored session"),
    ("reset", "clear this note's study history"),
    ("q", "leave without an exit action"),
];

fn parse_study_input(input: &str) -> Option<Command> {
    match input {
        "r" | "reveal" => Some(Command::ToggleReveal),
        "x" | "reverse" => Some(Command::ToggleReversed),
        ">" | "next" => Some(Command::Advance(Direction::Next)),
        "<" | "prev" => Some(Command::Advance(Direction::Previous)),
        "end" => Some(Command::Exit(ExitAction::End)),
        "finish" => Some(Command::Exit(ExitAction::Finish)),
        "reset" => Some(Command::Exit(ExitAction::Reset)),
        other => match other.parse::<MasteryLevel>() {
            Ok(MasteryLevel::Unrated) | Err(_) => None,
            Ok(level) => Some(Command::Rate(level)),
        },
    }
}

fn print_study_help() {
    for (key, desc) in STUDY_HELP {
        println!("  \x1b[36m{:<10}\x1b[0m {}", key, desc);
    }
}

fn print_card(exec: &StudyExecutor) {
    let session = exec.session();
    match session.phase() {
        Phase::Active => {
            let (position, total) = session.progress();
            if let Some((front, back)) = session.card() {
                print_dim(&format!("[{}/{}] ", position, total));
                print_colored(front, Color::White);
                match back {
                    Some(answer) => print_colored(&format!("  =>  {}\n", answer), Color::Cyan),
                    None => println!(),
                }
            }
        }
        Phase::Complete if session.kind().is_scored() => {
            print_info(&format!(
                "All words rated. Result {:.0}%. Type 'finish' to record it.\n",
                session.test_result() * 100.0
            ));
        }
        Phase::Complete => print_info("End of the list. Type 'end' to count this repetition.\n"),
        Phase::Exited => {}
    }
}

async fn run_study(app: &App, user: &UserId, note_id: &NoteId) -> Result<()> {
    let mut exec = app.library().study(user, note_id, app.config.study.schedule()).await?;
    let kind = if exec.session().kind().is_scored() { "scored" } else { "review" };
    print_header(&format!("{} ({} session, repetition {})", exec.note().title, kind, exec.note().repeat_count + 1));
    print_dim("Type ? for keys\n");

    let mut rl = rustyline::DefaultEditor::new()?;
    loop {
        print_card(&exec);
        if exec.session().phase() == Phase::Exited {
            break;
        }

        match rl.readline("\x1b[32m❯\x1b[0m ") {
            Ok(line) => {
                let input = line.trim().to_lowercase();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input.as_str());
                match input.as_str() {
                    "?" | "help" => print_study_help(),
                    "q" | "quit" => break,
                    other => match parse_study_input(other) {
                        Some(command) => {
                            if !exec.dispatch(command, Utc::now()) {
                                print_error("Not available right now\n");
                            }
                        }
                        None => print_error(&format!("Unknown key '{}'. Type ? for keys\n", other)),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C abandons anything not yet written
                exec.cancel();
                print_dim("Cancelled\n");
                return app.save().await;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let flushed = exec.flush().await;
    if let Some(finished) = exec.finished() {
        match finished.test_result {
            Some(result) => print_success(&format!("Recorded {:.0}%\n", result * 100.0)),
            None => print_success(&format!("Session {:?}\n", finished.action)),
        }
        if let Some(next) = exec.note().next_study_timestamp {
            println!("Next study: {}", next.format("%Y-%m-%d"));
        }
    }
    app.save().await?;
    flushed.map_err(Into::into)
}

async fn run_market(app: &App, user: &UserId, command: MarketCommands) -> Result<()> {
    let market = app.market();
    match command {
        MarketCommands::List { category, query, sort } => {
            let query = CatalogQuery {
                category,
                query,
                sort: sort.or(app.config.market.default_sort),
            };
            let listings = market.browse(&query).await?;
            if listings.is_empty() {
                println!("No listings.");
            }
            for listing in &listings {
                println!(
                    "{}  {} [{}] {} words, price {}, score {:.1} ({} reviews), {} sold",
                    listing.id,
                    listing.title,
                    listing.category,
                    listing.word_count(),
                    listing.price,
                    listing.average_score(),
                    listing.review_count,
                    listing.sales_count
                );
            }
        }
        MarketCommands::Sellable => {
            let notes = market.sellable_notes(user).await?;
            if notes.is_empty() {
                println!(
                    "No notes with at least {} words.",
                    market.settings().min_sellable_words
                );
            }
            for note in &notes {
                print_note_line(note);
            }
        }
        MarketCommands::Publish { note_id, price } => {
            let listing = market.publish(user, &NoteId::from(note_id), price, Utc::now()).await?;
            print_success(&format!("Listed as {}\n", listing.id));
        }
        MarketCommands::Unpublish { listing_id } => {
            market.unpublish(user, &ListingId::from(listing_id)).await?;
            println!("Listing removed.");
        }
        MarketCommands::Buy { listing_id } => {
            let mut listing = market.find_listing(&ListingId::from(listing_id)).await?;
            match market.purchase(user, &mut listing, Utc::now()).await {
                Ok(receipt) => print_success(&format!(
                    "Bought '{}' for {}. New note {}, balance {}\n",
                    receipt.note.title, receipt.price, receipt.note.id, receipt.buyer_balance
                )),
                Err(CoreError::InsufficientBalance { balance, price }) => {
                    print_error(&format!("Not enough currency: have {}, need {}\n", balance, price));
                }
                Err(e) => {
                    // Keep whatever part of the transfer landed
                    app.save().await?;
                    return Err(e.into());
                }
            }
        }
        MarketCommands::History => {
            let notes = market.purchase_history(user).await?;
            if notes.is_empty() {
                println!("No purchases.");
            }
            for note in &notes {
                print_note_line(note);
            }
        }
        MarketCommands::Reconcile { transfer_id } => match transfer_id {
            Some(id) => {
                let id = Uuid::parse_str(&id).context("Invalid transfer id")?;
                let intent = market.reconcile(&id).await?;
                println!("Transfer {} is {}", intent.id, intent.status);
            }
            None => {
                let open = market.unsettled_transfers().await?;
                if open.is_empty() {
                    println!("All transfers settled.");
                }
                for t in &open {
                    println!(
                        "{}  {} -> {} amount {} [{}] debit {} credit {} delivered {} counted {}",
                        t.id,
                        t.buyer,
                        t.seller,
                        t.amount,
                        t.status,
                        t.debit_applied,
                        t.credit_applied,
                        t.delivered_note.is_some(),
                        t.sale_recorded
                    );
                }
            }
        },
    }
    Ok(())
}

async fn run_review(app: &App, user: &UserId, command: ReviewCommands) -> Result<()> {
    let market = app.market();
    match command {
        ReviewCommands::Post { listing_id, score, text } => {
            let mut listing = market.find_listing(&ListingId::from(listing_id)).await?;
            let review = market.post_review(user, &mut listing, score, &text, Utc::now()).await?;
            print_success(&format!(
                "Posted review {}. Listing now averages {:.1}\n",
                review.id,
                listing.average_score()
            ));
        }
        ReviewCommands::List { listing_id } => {
            let listing = market.find_listing(&ListingId::from(listing_id)).await?;
            let reviews = market.reviews(&listing).await?;
            println!("{} ({:.1} from {} reviews)", listing.title, listing.average_score(), listing.review_count);
            for review in &reviews {
                println!("  {}  {}/5 by {}: {}", review.id, review.score, review.author_user_id, review.text);
            }
        }
        ReviewCommands::Delete { listing_id, review_id } => {
            let mut listing = market.find_listing(&ListingId::from(listing_id)).await?;
            market.delete_review(user, &mut listing, &ReviewId::from(review_id)).await?;
            println!("Review deleted.");
        }
    }
    Ok(())
}

/// Print colored output
fn print_colored(text: &str, color: Color) {
    let _ = execute!(
        io::stdout(),
        SetForegroundColor(color),
        Print(text),
        ResetColor
    );
}

fn print_dim(text: &str) {
    print_colored(text, Color::DarkGrey);
}

fn print_success(text: &str) {
    print_colored(text, Color::Green);
}

fn print_info(text: &str) {
    print_colored(text, Color::Cyan);
}

fn print_error(text: &str) {
    print_colored(text, Color::Red);
}

fn print_header(text: &str) {
    print_colored(&format!("\n{}\n", text), Color::Cyan);
}
