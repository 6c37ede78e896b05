use clap::Parser;
use log::info;

use tg_funnel::bot::TelegramBot;
use tg_funnel::config::Config;
use tg_funnel::db;
use tg_funnel::migrations::MigrationManager;

#[derive(Parser)]
#[command(name = "tg-funnel")]
#[command(about = "A Telegram sales funnel bot")]
struct Args {
    /// apply database migrations and exit
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // initialize rustls crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    // load .env file if it exists
    if let Err(e) = dotenvy::dotenv() {
        // only warn if .env file exists but failed to load
        match e {
            dotenvy::Error::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {}
            _ => {
                eprintln!("warning: failed to load .env file: {}", e);
            }
        }
    }

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url)?;
    MigrationManager::run_migrations(&pool).await?;
    if args.migrate_only {
        info!("Migrations applied, exiting");
        return Ok(());
    }

    info!("Starting bot...");

    let bot = TelegramBot::new(config, pool).await?;
    bot.run().await;

    Ok(())
}
