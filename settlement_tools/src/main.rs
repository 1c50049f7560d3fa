use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use cod_settlement_engine::{
    config::SettlementConfig,
    sqlite::db::db_url,
    EarningsApi,
    ReconciliationApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

mod formatting;

use crate::formatting::{format_balance, format_daily_report, format_reconciliations, format_released};

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Operator tools for the COD settlement engine")]
pub struct Arguments {
    /// The database to operate on. Defaults to COD_DATABASE_URL
    #[arg(short, long)]
    database: Option<String>,
    /// The user id recorded in the activity log for changes made by this tool
    #[arg(short, long)]
    actor: Option<i64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "migrate", about = "Create the database if necessary and bring the schema up to date")]
    Migrate,
    #[clap(name = "release-earnings", about = "Make every pending earning whose hold period has passed available")]
    ReleaseEarnings,
    #[clap(name = "reconcile", about = "Generate the daily cash reconciliation")]
    Reconcile(ReconcileParams),
    #[clap(name = "auto-verify", about = "Verify every pending reconciliation without a discrepancy")]
    AutoVerify,
    #[clap(name = "balance", about = "Print a vendor's earnings balance")]
    Balance {
        #[arg(short, long)]
        vendor: i64,
    },
}

#[derive(Debug, Args)]
pub struct ReconcileParams {
    /// The day to reconcile, as YYYY-MM-DD. Defaults to yesterday (UTC)
    #[arg(short, long)]
    date: Option<NaiveDate>,
    /// Only reconcile this delivery person
    #[arg(short = 'p', long = "delivery-person")]
    delivery_person: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let url = cli.database.clone().unwrap_or_else(db_url);
    if matches!(cli.command, Command::Migrate) {
        create_database_if_missing(&url).await?;
    }
    let db = SqliteDatabase::new_with_url(&url, 1).await?;
    let result = run(cli.command, &db, &url, cli.actor).await;
    db.close().await;
    result
}

async fn run(command: Command, db: &SqliteDatabase, url: &str, actor: Option<i64>) -> Result<()> {
    let config = SettlementConfig::from_env_or_default();
    match command {
        Command::Migrate => {
            db.migrate().await?;
            println!("Database at {url} is up to date");
        },
        Command::ReleaseEarnings => {
            let api = EarningsApi::new(db.clone(), config.earnings);
            let released = api.make_earnings_available(actor).await?;
            println!("{}", format_released(&released));
        },
        Command::Reconcile(params) => {
            let date = params.date.unwrap_or_else(|| Utc::now().date_naive() - Duration::days(1));
            let api = ReconciliationApi::new(db.clone());
            let report = api.generate_daily_report(date, params.delivery_person, actor).await?;
            println!("{}", format_daily_report(&report));
        },
        Command::AutoVerify => {
            let api = ReconciliationApi::new(db.clone());
            let verified = api.auto_verify_zero_discrepancy(actor).await?;
            println!("{} reconciliations verified", verified.len());
            if !verified.is_empty() {
                println!("{}", format_reconciliations(&verified));
            }
        },
        Command::Balance { vendor } => {
            let api = EarningsApi::new(db.clone(), config.earnings);
            let balance = api.vendor_balance(vendor).await?;
            println!("{}", format_balance(&balance));
        },
    }
    Ok(())
}

async fn create_database_if_missing(url: &str) -> Result<()> {
    if !Sqlite::database_exists(url).await? {
        info!("🗃️ Creating database at {url}");
        Sqlite::create_database(url).await?;
    }
    Ok(())
}
