use std::error::Error;
use std::fmt;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use flash_core::model::{Deck, FilterSettings, Grade};
use services::{Clock, GradeOutcome, SessionEngine, SessionTicker, TimerTick};
use storage::json::JsonDeckSource;
use storage::repository::{DeckSource, SessionStore, Storage};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    EmptyValue { flag: &'static str },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::EmptyValue { flag } => write!(f, "{flag} must not be empty"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    let value = args.next().ok_or(ArgsError::MissingValue { flag })?;
    if value.trim().is_empty() {
        return Err(ArgsError::EmptyValue { flag });
    }
    Ok(value)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--deck <path>] [--store <dir>] [--tag <tag>]");
    eprintln!("                      [--shuffle | --no-shuffle] [--hard]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --deck deck.json");
    eprintln!("  --store .flash-sessions");
    eprintln!("  shuffle follows the deck's session settings");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FLASH_DECK_PATH, FLASH_STORE_DIR, RUST_LOG");
}

struct Args {
    deck_path: PathBuf,
    store_dir: PathBuf,
    tag: Option<String>,
    shuffle: Option<bool>,
    hard: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut deck_path = std::env::var("FLASH_DECK_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from("deck.json"), PathBuf::from);
        let mut store_dir = std::env::var("FLASH_STORE_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(".flash-sessions"), PathBuf::from);
        let mut tag = None;
        let mut shuffle = None;
        let mut hard = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--deck" => deck_path = PathBuf::from(require_value(args, "--deck")?),
                "--store" => store_dir = PathBuf::from(require_value(args, "--store")?),
                "--tag" => tag = Some(require_value(args, "--tag")?),
                "--shuffle" => shuffle = Some(true),
                "--no-shuffle" => shuffle = Some(false),
                "--hard" => hard = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            deck_path,
            store_dir,
            tag,
            shuffle,
            hard,
        })
    }

    /// Start-screen filters: deck defaults overridden by flags.
    fn filters(&self, deck: &Deck) -> FilterSettings {
        let defaults = FilterSettings::from_deck(deck);
        FilterSettings::new(
            self.tag.clone(),
            self.hard,
            self.shuffle.unwrap_or(defaults.shuffle),
        )
    }
}

type SharedEngine = Arc<Mutex<SessionEngine>>;

fn lock(engine: &SharedEngine) -> Result<MutexGuard<'_, SessionEngine>, Box<dyn Error>> {
    engine.lock().map_err(|_| "session lock poisoned".into())
}

/// Reads one trimmed line from stdin. `None` on end of input.
async fn prompt(label: &str) -> Result<Option<String>, Box<dyn Error>> {
    print!("{label} > ");
    std::io::stdout().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut buf = String::new();
        std::io::stdin().read_line(&mut buf).map(|n| (n > 0).then_some(buf))
    })
    .await??;
    Ok(line.map(|l| l.trim().to_string()))
}

enum Screen {
    Start,
    Card(SharedEngine),
    Summary(SharedEngine),
    Quit,
}

struct Terminal {
    deck: Arc<Deck>,
    store: Arc<dyn SessionStore>,
    clock: Clock,
    filters: FilterSettings,
    ticker: SessionTicker,
}

impl Terminal {
    fn new(deck: Arc<Deck>, store: Arc<dyn SessionStore>, filters: FilterSettings) -> Self {
        Self {
            deck,
            store,
            clock: Clock::default_clock(),
            filters,
            ticker: SessionTicker::new(),
        }
    }

    fn begin(&self, filters: FilterSettings) -> Result<SessionEngine, Box<dyn Error>> {
        Ok(SessionEngine::start(
            Arc::clone(&self.deck),
            filters,
            Arc::clone(&self.store),
            self.clock,
        )?)
    }

    /// Resume a saved session if there is one.
    fn launch_screen(&mut self) -> Result<Screen, Box<dyn Error>> {
        let Some(saved) = self.store.load(self.deck.title())? else {
            return Ok(Screen::Start);
        };
        self.filters = saved.filter_settings().clone();
        let engine = self.begin(self.filters.clone())?;
        if engine.is_empty() {
            self.store.clear(self.deck.title())?;
            return Ok(Screen::Start);
        }
        println!("Resuming your session.");
        let completed = engine.is_completed();
        let shared = Arc::new(Mutex::new(engine));
        Ok(if completed {
            Screen::Summary(shared)
        } else {
            Screen::Card(shared)
        })
    }

    async fn run(mut self) -> Result<(), Box<dyn Error>> {
        let mut screen = self.launch_screen()?;
        loop {
            screen = match screen {
                Screen::Start => self.start_screen().await?,
                Screen::Card(engine) => self.card_view(engine).await?,
                Screen::Summary(engine) => self.summary_screen(engine).await?,
                Screen::Quit => break,
            };
        }
        self.ticker.stop();
        Ok(())
    }

    async fn start_screen(&mut self) -> Result<Screen, Box<dyn Error>> {
        println!();
        println!("== {} ({} cards) ==", self.deck.title(), self.deck.cards().len());
        let tags = self.deck.tags();
        if !tags.is_empty() {
            println!("Tags: {}", tags.join(", "));
        }

        loop {
            println!(
                "Filters: tag={} shuffle={} hard-only={}",
                self.filters.filter_tag.as_deref().unwrap_or("(all)"),
                self.filters.shuffle,
                self.filters.repeat_only_hard
            );
            println!("  [enter] start  t <tag> / t  set or clear tag  s  toggle shuffle  h  toggle hard-only  q  quit");
            let Some(input) = prompt("start").await? else {
                return Ok(Screen::Quit);
            };
            let (cmd, rest) = input.split_once(' ').unwrap_or((input.as_str(), ""));
            match cmd {
                "" => {
                    let engine = self.begin(self.filters.clone())?;
                    self.filters = engine.effective_filters().clone();
                    if engine.is_empty() {
                        println!("No cards match these filters. Change them and try again.");
                        continue;
                    }
                    return Ok(Screen::Card(Arc::new(Mutex::new(engine))));
                }
                "t" => {
                    let tag = rest.trim();
                    if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                        println!("Unknown tag: {tag}");
                        continue;
                    }
                    self.filters = FilterSettings::new(
                        (!tag.is_empty()).then(|| tag.to_string()),
                        false,
                        self.filters.shuffle,
                    );
                }
                "s" => self.filters.shuffle = !self.filters.shuffle,
                "h" => {
                    self.filters.repeat_only_hard = !self.filters.repeat_only_hard;
                    if self.filters.repeat_only_hard {
                        self.filters.filter_tag = None;
                    }
                }
                "q" => return Ok(Screen::Quit),
                other => println!("Unknown command: {other}"),
            }
        }
    }

    fn restart_ticker(&mut self, engine: &SharedEngine) {
        self.ticker.stop();
        if self.deck.session().show_timer() {
            self.ticker.start(Arc::clone(engine), |tick: TimerTick| {
                eprint!("\r[session {} | card {}] ", tick.total(), tick.card());
            });
        }
    }

    fn render_card(engine: &SessionEngine, revealed: bool) {
        let Some(card) = engine.current_card() else {
            return;
        };
        let progress = engine.progress();
        println!();
        println!(
            "Card {}/{} ({} graded)",
            progress.position + 1,
            progress.total,
            progress.graded
        );
        if let Some(tag) = card.tag() {
            println!("#{tag}");
        }
        println!("Q: {}", card.front());
        if revealed {
            println!("A: {}", card.back());
        }
        if let Some(result) = engine.current_result().filter(|r| r.is_graded()) {
            println!("Graded: {:?}", result.grade);
        }
    }

    async fn card_view(&mut self, engine: SharedEngine) -> Result<Screen, Box<dyn Error>> {
        let mut revealed = lock(&engine)?.is_current_card_graded();
        self.restart_ticker(&engine);

        loop {
            Self::render_card(&*lock(&engine)?, revealed);
            println!("  r  reveal  k  known  n  not yet  >  next  <  previous  f  finish  q  quit");
            let Some(input) = prompt("card").await? else {
                return Ok(Screen::Quit);
            };

            let moved = match input.as_str() {
                "r" => {
                    revealed = true;
                    continue;
                }
                "k" | "n" => {
                    let grade = if input == "k" { Grade::Known } else { Grade::NotYet };
                    let mut guard = lock(&engine)?;
                    match guard.grade_card(grade)? {
                        GradeOutcome::Applied { .. } if guard.is_completed() => {
                            drop(guard);
                            return Ok(Screen::Summary(engine));
                        }
                        GradeOutcome::Applied { .. } => guard.go_to_next()?,
                        GradeOutcome::Rejected(reason) => {
                            println!("{reason}");
                            false
                        }
                    }
                }
                ">" => lock(&engine)?.go_to_next()?,
                "<" => lock(&engine)?.go_to_previous()?,
                "f" => {
                    if lock(&engine)?.can_finish() {
                        return Ok(Screen::Summary(engine));
                    }
                    println!("Grade every card before finishing.");
                    false
                }
                "q" => return Ok(Screen::Quit),
                other => {
                    println!("Unknown command: {other}");
                    false
                }
            };

            if moved {
                revealed = lock(&engine)?.is_current_card_graded();
            }
        }
    }

    async fn summary_screen(&mut self, engine: SharedEngine) -> Result<Screen, Box<dyn Error>> {
        self.ticker.stop();
        let summary = lock(&engine)?.summary();

        println!();
        println!("== {} : session summary ==", self.deck.title());
        println!("Known:    {}", summary.known());
        println!("Not yet:  {}", summary.not_yet());
        println!("Graded:   {}/{}", summary.graded(), summary.total_cards());
        println!("Total:    {}", summary.total_time());
        println!("Average:  {}", summary.avg_time());
        if !summary.hard_cards().is_empty() {
            println!("Hard cards:");
            for card in summary.hard_cards() {
                println!("  - {}", card.front());
            }
        }

        loop {
            println!("  h  repeat hard cards  s  return to start  q  quit");
            let Some(input) = prompt("summary").await? else {
                return Ok(Screen::Quit);
            };
            match input.as_str() {
                "h" => {
                    let follow_up = lock(&engine)?.reset_for_hard_cards()?;
                    self.store.clear(self.deck.title())?;
                    if follow_up.is_empty() {
                        println!("No hard cards to repeat. Starting over.");
                        return Ok(Screen::Start);
                    }
                    self.filters = follow_up.effective_filters().clone();
                    return Ok(Screen::Card(Arc::new(Mutex::new(follow_up))));
                }
                "s" => {
                    self.store.clear(self.deck.title())?;
                    return Ok(Screen::Start);
                }
                "q" => return Ok(Screen::Quit),
                other => println!("Unknown command: {other}"),
            }
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let mut argv = std::env::args().skip(1);
    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let deck = JsonDeckSource::new(&parsed.deck_path)
        .load_deck()
        .map_err(|e| format!("cannot load deck {}: {e}", parsed.deck_path.display()))?;
    let storage = Storage::json_dir(&parsed.store_dir)?;
    tracing::info!(
        deck = deck.title(),
        store = %parsed.store_dir.display(),
        "flashcards ready"
    );

    let filters = parsed.filters(&deck);
    Terminal::new(Arc::new(deck), storage.sessions, filters)
        .run()
        .await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app=info,services=info,storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
