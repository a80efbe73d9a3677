use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use shelfmark_client::{ApiClient, AuthService, BookService, CatalogService, ClientError};
use shelfmark_core::{
    AppConfig, Availability, Book, BookDraft, DashboardData, ExitCode, FilterSet, LoginRequest,
    SessionStore, ShelfmarkError, SignupRequest, SortColumn, SortDirection, SortSpec,
};
use shelfmark_view::{
    CollectionController, CollectionOptions, DashboardController, LoginController,
    SignupController,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shelfmark",
    about = "Library catalog client — browse, search and manage books",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting SHELFMARK_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account.
    Signup {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// M or F.
        #[arg(long)]
        gender: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },

    /// Sign out and forget the stored session.
    Logout,

    /// Show the signed-in user.
    Whoami,

    /// Catalog operations.
    Books {
        #[command(subcommand)]
        action: BooksAction,
    },

    /// List genres.
    Genres,

    /// List authors.
    Authors,

    /// Show the dashboard for the signed-in user.
    Dashboard,

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ─── Book Actions ───────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum BooksAction {
    /// List one page of the catalog.
    List {
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        /// available | unavailable
        #[arg(long)]
        availability: Option<Availability>,
        #[arg(long)]
        search: Option<String>,
        /// title, author, genre, isbn, published, copies, availability
        #[arg(long)]
        sort: Option<SortColumn>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value = "1")]
        page: u32,
        /// Browse interactively: read commands from stdin.
        #[arg(long, short)]
        interactive: bool,
    },

    /// Get a book by ID.
    Get { id: String },

    /// Add a book. Genre and author accept an ID or a name.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        genre: String,
        #[arg(long)]
        author: String,
        #[arg(long, default_value = "")]
        isbn: String,
        /// Publication date, e.g. 1965-08-01.
        #[arg(long, default_value = "")]
        published: String,
        #[arg(long, default_value = "1")]
        copies: u32,
        #[arg(long, default_value = "")]
        summary: String,
    },

    /// Update a book.
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        isbn: Option<String>,
        #[arg(long)]
        published: Option<String>,
        #[arg(long)]
        copies: Option<u32>,
        #[arg(long)]
        summary: Option<String>,
    },

    /// Delete a book.
    Delete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },
}

// ─── Config Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective config values.
    Show,
    /// Write a default config file if none exists.
    Init,
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let json_output = cli.json || std::env::var("SHELFMARK_JSON").as_deref() == Ok("1");

    if let Err(err) = run(cli.command, json_output).await {
        let code = exit_code(&err);
        if json_output {
            let body = serde_json::json!({
                "status": "error",
                "error": format!("{code:?}"),
                "message": error_message(&err),
            });
            println!("{body:#}");
        } else {
            eprintln!("error: {}", error_message(&err));
        }
        std::process::exit(code as i32);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SHELFMARK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct Context {
    config: AppConfig,
    api: Arc<ApiClient>,
}

impl Context {
    fn load() -> Result<Self> {
        let config = AppConfig::load()?;
        let session = Arc::new(SessionStore::open(config.session_path()));
        let api = Arc::new(ApiClient::new(&config.api, session)?);
        Ok(Self { config, api })
    }

    fn session(&self) -> &Arc<SessionStore> {
        self.api.session()
    }

    fn catalog(&self) -> Arc<dyn CatalogService> {
        Arc::new(BookService::new(Arc::clone(&self.api)))
    }

    fn collection(&self) -> CollectionController {
        CollectionController::new(
            self.catalog(),
            self.session().role(),
            CollectionOptions::from(&self.config),
        )
    }
}

async fn run(command: Commands, json_output: bool) -> Result<()> {
    let start = Instant::now();

    let ctx = Context::load()?;

    match command {
        Commands::Login { email, password } => {
            let mut login = LoginController::new(AuthService::new(Arc::clone(&ctx.api)));
            login.form = LoginRequest { email, password };
            let user = login.submit().await?;
            if json_output {
                print_ok(&serde_json::to_value(&user)?, start)?;
            } else {
                println!("Signed in as {} ({})", user.display_name(), user.role);
            }
        }

        Commands::Signup {
            first_name,
            last_name,
            gender,
            email,
            password,
            confirm_password,
        } => {
            let mut signup = SignupController::new(AuthService::new(Arc::clone(&ctx.api)));
            signup.form = SignupRequest {
                first_name,
                last_name,
                gender,
                email,
                password,
                confirm_password,
            };
            let resp = signup.submit().await?;
            if json_output {
                print_ok(&serde_json::to_value(&resp)?, start)?;
            } else if let Some(msg) = signup.success() {
                println!("{msg}");
            }
        }

        Commands::Logout => {
            let auth = AuthService::new(Arc::clone(&ctx.api));
            if !auth.is_authenticated() {
                println!("Not signed in.");
                return Ok(());
            }
            // The local session is gone either way; a failed server call is only reported.
            if let Err(e) = auth.logout().await {
                eprintln!("warning: {}", e.user_message());
            }
            if json_output {
                print_ok(&serde_json::json!({ "signed_out": true }), start)?;
            } else {
                println!("Signed out.");
            }
        }

        Commands::Whoami => {
            let user = ctx.session().require_user()?;
            if json_output {
                print_ok(&serde_json::to_value(&user)?, start)?;
            } else {
                println!("{} <{}>", user.display_name(), user.email);
                println!("  role: {}", user.role);
                println!("  id:   {}", user.user_id);
            }
        }

        Commands::Books { action } => run_books(&ctx, action, json_output, start).await?,

        Commands::Genres => {
            let genres = ctx.catalog().list_genres().await?;
            if json_output {
                print_ok(&serde_json::to_value(&genres)?, start)?;
            } else {
                for g in &genres {
                    println!("{:<12}  {}", g.id, g.name);
                }
            }
        }

        Commands::Authors => {
            let authors = ctx.catalog().list_authors().await?;
            if json_output {
                print_ok(&serde_json::to_value(&authors)?, start)?;
            } else {
                for a in &authors {
                    println!("{:<12}  {}", a.id, a.name);
                }
            }
        }

        Commands::Dashboard => {
            let mut dashboard = DashboardController::new(Arc::clone(&ctx.api));
            let data = dashboard.load().await?;
            if json_output {
                print_ok(&serde_json::to_value(data)?, start)?;
            } else {
                print_dashboard(data);
            }
        }

        Commands::Config { action } => run_config(&ctx.config, action, json_output)?,
    }

    Ok(())
}

// ─── Books ───────────────────────────────────────────────────────────────────

async fn run_books(
    ctx: &Context,
    action: BooksAction,
    json_output: bool,
    start: Instant,
) -> Result<()> {
    match action {
        BooksAction::List {
            author,
            year,
            availability,
            search,
            sort,
            desc,
            page,
            interactive,
        } => {
            let mut list = ctx.collection();
            let filters = FilterSet {
                author,
                published_year: year,
                availability,
                search,
            };
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            list.set_query(filters, SortSpec { column: sort, direction }, page);
            list.apply_filters().await?;

            if interactive {
                return browse(list).await;
            }
            if json_output {
                let page = list.result().context("no page loaded")?;
                print_ok(&serde_json::to_value(page)?, start)?;
            } else {
                print_page(&list);
            }
        }

        BooksAction::Get { id } => {
            let book = ctx.catalog().get_book(&id).await?;
            if json_output {
                print_ok(&serde_json::to_value(&book)?, start)?;
            } else {
                print_book(&book);
            }
        }

        BooksAction::Add {
            title,
            genre,
            author,
            isbn,
            published,
            copies,
            summary,
        } => {
            let mut list = ctx.collection();
            list.load_references().await?;
            let draft = BookDraft {
                title,
                summary,
                isbn,
                published_on: published,
                total_copies: copies,
                genre_id: resolve_genre(&list, &genre)?,
                author_id: resolve_author(&list, &author)?,
            };
            let book = list.create_item(draft).await?;
            if json_output {
                print_ok(&serde_json::to_value(&book)?, start)?;
            } else {
                println!("Added: {} ({})", book.title, book.id);
            }
        }

        BooksAction::Update {
            id,
            title,
            genre,
            author,
            isbn,
            published,
            copies,
            summary,
        } => {
            let mut list = ctx.collection();
            list.load_references().await?;
            let mut book = list.catalog().get_book(&id).await?;

            if let Some(t) = title {
                book.title = t;
            }
            if let Some(g) = genre {
                book.genre.id = resolve_genre(&list, &g)?;
            }
            if let Some(a) = author {
                book.author.id = resolve_author(&list, &a)?;
            }
            if let Some(i) = isbn {
                book.isbn = shelfmark_core::Isbn::parse(&i)?.isbn13;
            }
            if let Some(p) = published {
                book.published_on = p;
            }
            if let Some(c) = copies {
                book.total_copies = c;
            }
            if let Some(s) = summary {
                book.summary = s;
            }
            list.reconcile_references(&mut book);

            let updated = list.update_item(&book).await?;
            if json_output {
                print_ok(&serde_json::to_value(&updated)?, start)?;
            } else {
                println!("Updated: {}", updated.title);
            }
        }

        BooksAction::Delete { id, confirm } => {
            if !confirm {
                bail!(ShelfmarkError::Validation(
                    "Add --confirm to delete without prompt.".to_string()
                ));
            }
            let mut list = ctx.collection();
            list.delete_item(&id).await?;
            if json_output {
                print_ok(&serde_json::json!({ "deleted": id }), start)?;
            } else {
                println!("Deleted book: {id}");
            }
        }
    }
    Ok(())
}

fn resolve_genre(list: &CollectionController, key: &str) -> Result<String> {
    list.genres()
        .iter()
        .find(|g| g.id == key || g.name.eq_ignore_ascii_case(key))
        .map(|g| g.id.clone())
        .ok_or_else(|| ShelfmarkError::Validation(format!("Unknown genre: {key}")).into())
}

fn resolve_author(list: &CollectionController, key: &str) -> Result<String> {
    list.authors()
        .iter()
        .find(|a| a.id == key || a.name.eq_ignore_ascii_case(key))
        .map(|a| a.id.clone())
        .ok_or_else(|| ShelfmarkError::Validation(format!("Unknown author: {key}")).into())
}

const BROWSE_HELP: &str = "\
commands:
  n / p            next / previous page
  g <page>         go to page
  s <column>       sort by column (again to flip direction)
  /<text>          search (applied once typing pauses)
  a <name>         filter by author (empty to clear)
  y <year>         filter by year (0 to clear)
  v [available|unavailable]  filter by availability
  c                clear all filters
  q                quit";

/// Line-driven browsing. Search lines go through the debouncer, so a burst of
/// pasted lines issues a single request.
async fn browse(mut list: CollectionController) -> Result<()> {
    print_page(&list);
    println!("{BROWSE_HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == "q" {
                    break;
                }
                match browse_command(&mut list, line).await {
                    Ok(true) => print_page(&list),
                    Ok(false) => {}
                    Err(e) => eprintln!("{}", e.user_message()),
                }
            }
            Some(term) = list.next_search_term() => match list.commit_search(term).await {
                Ok(_) => print_page(&list),
                Err(e) => eprintln!("{}", e.user_message()),
            }
        }
    }
    Ok(())
}

/// Returns whether the page should be redrawn.
async fn browse_command(list: &mut CollectionController, line: &str) -> Result<bool, ClientError> {
    let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));
    let arg = arg.trim();
    let page = list.window().page;

    match cmd {
        "n" if page < list.total_pages() => list.on_page_change(page + 1).await?,
        "p" if page > 1 => list.on_page_change(page - 1).await?,
        "n" | "p" => return Ok(false),
        "g" => match arg.parse::<u32>() {
            Ok(p) if (1..=list.total_pages().max(1)).contains(&p) => list.on_page_change(p).await?,
            _ => {
                eprintln!("page must be between 1 and {}", list.total_pages().max(1));
                return Ok(false);
            }
        },
        "s" => {
            let column = arg.parse::<SortColumn>()?;
            list.sort(column).await?
        }
        "a" => list.set_author_filter(Some(arg.to_string())).await?,
        "y" => {
            let year = arg
                .parse::<i32>()
                .map_err(|_| ShelfmarkError::Validation(format!("Invalid year: {arg}")))?;
            list.set_year_filter(Some(year)).await?
        }
        "v" => {
            let availability = if arg.is_empty() {
                None
            } else {
                Some(arg.parse::<Availability>()?)
            };
            list.set_availability_filter(availability).await?
        }
        "c" => list.clear_filters().await?,
        _ if cmd.starts_with('/') => {
            list.on_search_input(line.trim_start_matches('/'));
            return Ok(false);
        }
        "" => return Ok(false),
        _ => {
            println!("{BROWSE_HELP}");
            return Ok(false);
        }
    };
    Ok(true)
}

// ─── Config ──────────────────────────────────────────────────────────────────

fn run_config(config: &AppConfig, action: ConfigAction, json_output: bool) -> Result<()> {
    let path = AppConfig::config_path();
    match action {
        ConfigAction::Show => {
            if json_output {
                println!(
                    "{:#}",
                    serde_json::json!({
                        "status": "ok",
                        "data": { "path": path, "config": config },
                    })
                );
            } else {
                println!("# {}", path.display());
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
        ConfigAction::Init => {
            if path.exists() {
                println!("Config already exists: {}", path.display());
            } else {
                AppConfig::default().save_to(&path)?;
                println!("Wrote default config: {}", path.display());
            }
        }
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn print_ok(data: &serde_json::Value, start: Instant) -> Result<()> {
    let body = serde_json::json!({
        "status": "ok",
        "data": data,
        "meta": { "duration_ms": start.elapsed().as_millis() as u64 },
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn print_page(list: &CollectionController) {
    let sort = list.sort_spec();
    println!(
        "{id:<10}  {title:<36}  {author:<22}  {genre:<14}  {year:<5}  {avail}",
        id = "ID",
        title = format!("Title {}", sort.indicator(SortColumn::Title)),
        author = format!("Author {}", sort.indicator(SortColumn::Author)),
        genre = format!("Genre {}", sort.indicator(SortColumn::Genre)),
        year = format!("Yr {}", sort.indicator(SortColumn::PublishedOn)),
        avail = format!("Status {}", sort.indicator(SortColumn::Availability)),
    );
    for book in list.items() {
        println!(
            "{id:<10}  {title:<36}  {author:<22}  {genre:<14}  {year:<5}  {avail}",
            id = truncate(&book.id, 10),
            title = truncate(&book.title, 36),
            author = truncate(&book.author.name, 22),
            genre = truncate(&book.genre.name, 14),
            year = book.published_year().map(|y| y.to_string()).unwrap_or_default(),
            avail = book.availability,
        );
    }

    let window = list.window();
    match window.visible_range() {
        Some((from, to)) => print!("Showing {from}–{to} of {}", window.total),
        None => print!("No books found"),
    }
    let pages: Vec<String> = list
        .page_numbers()
        .into_iter()
        .map(|p| if p == window.page { format!("[{p}]") } else { p.to_string() })
        .collect();
    if pages.is_empty() {
        println!();
    } else {
        println!("  ·  page {}/{}  ·  {}", window.page, list.total_pages(), pages.join(" "));
    }
}

fn print_book(book: &Book) {
    println!("{}", book.title);
    println!("  id:        {}", book.id);
    println!("  author:    {}", book.author.name);
    println!("  genre:     {}", book.genre.name);
    if !book.isbn.is_empty() {
        println!("  isbn:      {}", book.isbn);
    }
    if !book.published_on.is_empty() {
        println!("  published: {}", book.published_on);
    }
    println!("  copies:    {}", book.total_copies);
    println!("  status:    {}", book.availability);
    if !book.summary.is_empty() {
        println!("\n{}", book.summary);
    }
}

fn print_dashboard(data: &DashboardData) {
    if data.is_empty() {
        println!("Nothing to show yet.");
        return;
    }
    for card in &data.cards {
        println!("{:<24} {}", card.label, card.metrics);
    }
    for table in &data.tables {
        println!("\n{}", table.title);
        println!("  {}", table.columns.join("  |  "));
        for row in 0..table.items.len() {
            let cells: Vec<String> = table.columns.iter().map(|c| table.cell(row, c)).collect();
            println!("  {}", cells.join("  |  "));
        }
    }
    for list in &data.lists {
        println!("\n{}", list.title);
        for item in &list.items {
            println!("  • {item}");
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    if let Some(e) = err.downcast_ref::<ClientError>() {
        e.exit_code()
    } else if let Some(e) = err.downcast_ref::<ShelfmarkError>() {
        e.exit_code()
    } else {
        ExitCode::GeneralError
    }
}

fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ClientError>() {
        Some(e) => e.user_message(),
        None => format!("{err:#}"),
    }
}
