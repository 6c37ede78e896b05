use clap::Parser;
use dotenvy::dotenv;
use std::error::Error;
use std::path::PathBuf;

use tg_funnel::db;
use tg_funnel::export;
use tg_funnel::repo::Repositories;

#[derive(Parser)]
#[command(name = "export_users")]
#[command(about = "Export bot users with purchase and lesson progress to CSV")]
struct Cli {
    /// Output file, defaults to users_<timestamp>.csv in the current directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")?;
    let repos = Repositories::new(db::create_pool(&database_url)?);

    let rows = repos.users().export_rows().await?;
    let bytes = export::write_users_csv(&rows)?;

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(export::export_file_name(chrono::Utc::now())));
    tokio::fs::write(&output, bytes).await?;

    println!("Exported {} users to {}", rows.len(), output.display());
    Ok(())
}
