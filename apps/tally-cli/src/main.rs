//! # tally: Stock Reconciliation CLI
//!
//! ## Commands
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tally report    ──► StockQuery::update ──► text table or JSON         │
//! │  tally open-day  ─┐                                                     │
//! │  tally sale       │                                                     │
//! │  tally receive    ├─► StockLedger ──► upsert row ──► invalidation      │
//! │  tally count      │                                                     │
//! │  tally correct   ─┘                                                     │
//! │  tally price     ──► StockLedger::update_prices ──► invalidation       │
//! │  tally rows      ──► StockRepository, paged in SQL                     │
//! │  tally products / stores / status  ──► repositories                    │
//! │  tally config    ──► print (or save) the effective TallyConfig         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Startup
//! 1. Parse arguments
//! 2. Load `TallyConfig` (file, then `TALLY_*` env, then `--db`), logging
//!    through a scoped subscriber with the default filter
//! 3. Install tracing (`RUST_LOG` wins over the configured filter)
//! 4. Open the database, running migrations
//! 5. Run the command with a `SessionContext` built from config

mod config;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tally_core::validation::{validate_page, validate_page_size, validate_search_term};
use tally_core::{DateRange, Dimension, PageRequest, Selection, SortSpec, StockCorrection};
use tally_db::{migrations, Database, DbConfig, EntryQuery};
use tally_query::{
    InvalidationBus, ReportSettings, SessionContext, StockLedger, StockQuery, StockQueryParams,
};
use tracing::{debug, error, info, Subscriber};
use tracing_subscriber::EnvFilter;

use config::{TallyConfig, DEFAULT_LOG_FILTER};
use error::{CliError, CliResult};
use output::MoneyFormat;

#[derive(Debug, Parser)]
#[command(name = "tally", version, about = "Daily stock reconciliation for multi-store retail")]
struct Cli {
    /// Database file path (overrides config and TALLY_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file path (default: <config dir>/tally.toml)
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconciled stock report for a date range
    Report(ReportArgs),

    /// Open the day's row, carrying opening stock forward
    OpenDay(RowArgs),

    /// Record units sold
    Sale(QtyArgs),

    /// Record a delivery
    Receive(QtyArgs),

    /// Record a physical count
    Count(CountArgs),

    /// Overwrite a row's counts
    Correct(CorrectArgs),

    /// Set a product's selling and cost price
    Price(PriceArgs),

    /// Raw stock rows, paged by the database
    Rows(RowsArgs),

    /// List active products
    Products,

    /// List active stores
    Stores,

    /// Database health, migrations and catalogue counts
    Status,

    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// First day (default: today)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day (default: --from)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Store id or "all"
    #[arg(long, default_value = "all")]
    store: String,

    /// Product id or "all"
    #[arg(long, default_value = "all")]
    product: String,

    /// Matches product, store or operator name
    #[arg(long, default_value = "")]
    search: String,

    /// date, units_sold, sales_amount, profit or product_loss
    #[arg(long, default_value = "")]
    sort: String,

    /// asc or desc
    #[arg(long, default_value = "desc")]
    direction: String,

    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Rows per page (default: from config)
    #[arg(long)]
    page_size: Option<u32>,

    /// Add a per-store or per-product breakdown
    #[arg(long)]
    by: Option<Dimension>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct RowArgs {
    #[arg(long)]
    product: String,

    #[arg(long)]
    store: String,

    /// Trading day (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,
}

impl RowArgs {
    fn day(&self) -> NaiveDate {
        self.date.unwrap_or_else(today)
    }
}

#[derive(Debug, Args)]
struct QtyArgs {
    #[command(flatten)]
    row: RowArgs,

    #[arg(long)]
    qty: i64,
}

#[derive(Debug, Args)]
struct CountArgs {
    #[command(flatten)]
    row: RowArgs,

    #[arg(long)]
    counted: i64,
}

#[derive(Debug, Args)]
struct CorrectArgs {
    #[command(flatten)]
    row: RowArgs,

    #[arg(long)]
    opening: Option<i64>,

    #[arg(long)]
    closing: Option<i64>,

    #[arg(long)]
    added: Option<i64>,

    #[arg(long, conflicts_with = "clear_actual")]
    actual: Option<i64>,

    /// Remove the recorded physical count
    #[arg(long)]
    clear_actual: bool,
}

impl CorrectArgs {
    fn correction(&self) -> StockCorrection {
        let actual_stock = if self.clear_actual {
            Some(None)
        } else {
            self.actual.map(Some)
        };
        StockCorrection {
            opening_stock: self.opening,
            closing_stock: self.closing,
            stock_added: self.added,
            actual_stock,
        }
    }
}

#[derive(Debug, Args)]
struct PriceArgs {
    #[arg(long)]
    product: String,

    /// Selling price in cents
    #[arg(long)]
    price_cents: i64,

    /// Cost price in cents; omit for an uncosted product
    #[arg(long)]
    cost_cents: Option<i64>,
}

#[derive(Debug, Args)]
struct RowsArgs {
    /// First day (default: today)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day (default: --from)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Store id or "all"
    #[arg(long, default_value = "all")]
    store: String,

    /// Product id or "all"
    #[arg(long, default_value = "all")]
    product: String,

    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Rows per page (default: from config)
    #[arg(long)]
    page_size: Option<u32>,
}

fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> CliResult<DateRange> {
    let from = from.unwrap_or_else(today);
    Ok(DateRange::new(from, to.unwrap_or(from))?)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    // the configured filter is unknown until the config is read
    let mut config = tracing::subscriber::with_default(stderr_subscriber(DEFAULT_LOG_FILTER), || {
        TallyConfig::load(cli.config.clone())
    })?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    init_tracing(&config.log_filter);
    debug!(?config, "Configuration loaded");

    if let Command::Config { save } = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        if save {
            let path = config.save(cli.config)?;
            eprintln!("Saved to {}", path.display());
        }
        return Ok(());
    }

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Arc::new(Database::new(DbConfig::new(config.database_path.clone())).await?);

    let user = config.user_name.clone().unwrap_or_default();
    let mut context = SessionContext::new(user.clone(), user);
    if let Some(scope) = &config.store_scope {
        context = context.with_store_scope(scope.clone());
    }

    let money = MoneyFormat {
        symbol: config.currency_symbol.clone(),
        decimals: config.currency_decimals,
    };

    let result = match cli.command {
        Command::Report(args) => {
            let query = StockQuery::new(
                Arc::clone(&db),
                context,
                ReportSettings::new(config.page_size),
            );
            report(&query, args, &money).await
        }
        Command::Rows(args) => rows(&db, &context, &args, config.page_size).await,
        Command::Products => list_products(&db, &money).await,
        Command::Stores => list_stores(&db).await,
        Command::Status => status(&db, &config).await,
        Command::Price(args) => {
            let ledger = StockLedger::new(Arc::clone(&db), InvalidationBus::default(), context);
            price(&ledger, &args, &money).await
        }
        command => {
            let ledger = StockLedger::new(Arc::clone(&db), InvalidationBus::default(), context);
            movement(&ledger, command).await
        }
    };

    db.close().await;
    result
}

/// A stderr subscriber, so JSON output on stdout stays clean. `RUST_LOG`
/// wins over `default_filter`.
fn stderr_subscriber(default_filter: &str) -> impl Subscriber + Send + Sync + 'static {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

/// Installs the global subscriber.
fn init_tracing(default_filter: &str) {
    if tracing::subscriber::set_global_default(stderr_subscriber(default_filter)).is_err() {
        debug!("Global subscriber already installed");
    }
}

/// Validates the report flags and turns them into query params.
fn report_params(args: &ReportArgs) -> CliResult<StockQueryParams> {
    let range = date_range(args.from, args.to)?;
    let search = validate_search_term(&args.search)?;
    validate_page(args.page)?;
    if let Some(size) = args.page_size {
        validate_page_size(size)?;
    }

    let mut params = StockQueryParams::new(range)
        .search(search)
        .store(Selection::parse(&args.store))
        .product(Selection::parse(&args.product))
        .sort(SortSpec::from_params(&args.sort, &args.direction))
        .page(args.page);
    if let Some(size) = args.page_size {
        params = params.page_size(size);
    }
    if let Some(dimension) = args.by {
        params = params.group_by(dimension);
    }
    Ok(params)
}

async fn report(
    query: &StockQuery<Database>,
    args: ReportArgs,
    money: &MoneyFormat,
) -> CliResult<()> {
    let params = report_params(&args)?;
    let report = query.update(params).await;
    info!(
        rows = report.rows.len(),
        filtered = report.filtered_count,
        "Report ready"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !report.is_error() {
        print!("{}", output::render_report(&report, money));
    }

    match report.error {
        Some(message) => Err(CliError::Report(message)),
        None => Ok(()),
    }
}

/// Builds the repository query for `tally rows`. A store-scoped session
/// only ever sees its own store.
fn rows_query(
    args: &RowsArgs,
    context: &SessionContext,
    default_page_size: u32,
) -> CliResult<EntryQuery> {
    let range = date_range(args.from, args.to)?;
    let page_size = args.page_size.unwrap_or(default_page_size);
    validate_page(args.page)?;
    validate_page_size(page_size)?;

    Ok(EntryQuery::new(range)
        .store(context.effective_store(&Selection::parse(&args.store)))
        .product(Selection::parse(&args.product))
        .page(PageRequest::new(args.page, page_size)))
}

async fn rows(
    db: &Database,
    context: &SessionContext,
    args: &RowsArgs,
    default_page_size: u32,
) -> CliResult<()> {
    let query = rows_query(args, context, default_page_size)?;
    let repo = db.stock_entries();
    let entries = repo.list(&query).await?;
    let total = repo.count(&query).await?;

    for entry in &entries {
        println!("{}", output::render_entry(entry));
    }
    let page = query.page.unwrap_or_default();
    println!(
        "Page {} of {} ({} rows)",
        page.page,
        page.page_count(usize::try_from(total).unwrap_or_default()),
        total
    );
    Ok(())
}

async fn list_products(db: &Database, money: &MoneyFormat) -> CliResult<()> {
    let products = db.products().list_active().await?;
    print!("{}", output::render_products(&products, money));
    Ok(())
}

async fn list_stores(db: &Database) -> CliResult<()> {
    let stores = db.stores().list_active().await?;
    print!("{}", output::render_stores(&stores));
    Ok(())
}

async fn price(ledger: &StockLedger<Database>, args: &PriceArgs, money: &MoneyFormat) -> CliResult<()> {
    let product = ledger
        .update_prices(&args.product, args.price_cents, args.cost_cents)
        .await?;
    println!("{}", output::render_product(&product, money));
    Ok(())
}

async fn status(db: &Database, config: &TallyConfig) -> CliResult<()> {
    if !db.health_check().await {
        return Err(CliError::Unhealthy);
    }
    let (embedded, applied) = migrations::migration_status(db.pool()).await?;
    let products = db.products().count().await?;
    let stores = db.stores().count().await?;
    info!(embedded, applied, products, stores, "Status checked");

    println!("Database:    {}", config.database_path.display());
    println!("Migrations:  {applied} of {embedded} applied");
    println!("Products:    {products} active");
    println!("Stores:      {stores} active");
    Ok(())
}

async fn movement(ledger: &StockLedger<Database>, command: Command) -> CliResult<()> {
    let entry = match command {
        Command::OpenDay(row) => {
            ledger
                .open_day(&row.product, &row.store, row.day())
                .await?
        }
        Command::Sale(args) => {
            let row = &args.row;
            ledger
                .record_sale(&row.product, &row.store, row.day(), args.qty)
                .await?
        }
        Command::Receive(args) => {
            let row = &args.row;
            ledger
                .record_receipt(&row.product, &row.store, row.day(), args.qty)
                .await?
        }
        Command::Count(args) => {
            let row = &args.row;
            ledger
                .record_count(&row.product, &row.store, row.day(), args.counted)
                .await?
        }
        Command::Correct(args) => {
            let correction = args.correction();
            if correction.is_empty() {
                return Err(CliError::EmptyCorrection);
            }
            let row = &args.row;
            ledger
                .correct(&row.product, &row.store, row.day(), &correction)
                .await?
        }
        Command::Report(_)
        | Command::Price(_)
        | Command::Rows(_)
        | Command::Products
        | Command::Stores
        | Command::Status
        | Command::Config { .. } => return Ok(()),
    };

    println!("{}", output::render_entry(&entry));
    Ok(())
}
