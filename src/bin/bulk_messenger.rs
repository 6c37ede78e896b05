use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use std::error::Error;

use tg_funnel::db;
use tg_funnel::mailing::ContentKind;
use tg_funnel::repo::Repositories;
use tg_funnel::transport::MediaKind;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Segment {
    /// every user who accepted the offer
    All,
    /// users with a paid purchase
    Paid,
    /// users without a paid purchase
    Unpaid,
}

#[derive(Parser)]
#[command(name = "bulk_messenger")]
#[command(about = "Queue a broadcast message for a segment of bot users")]
struct Cli {
    /// Who receives the message
    #[arg(short, long, value_enum, default_value = "all")]
    segment: Segment,

    /// Message text (html), used as the caption when a file is attached
    #[arg(short, long)]
    message: Option<String>,

    /// Telegram file id of an attachment
    #[arg(long, requires = "kind")]
    file_id: Option<String>,

    /// Attachment type: photo, video, document, ...
    #[arg(long)]
    kind: Option<String>,

    /// Print the number of recipients without queueing anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    let content_kind = match cli.kind.as_deref() {
        Some(name) => ContentKind::Media(
            MediaKind::from_name(name).ok_or_else(|| format!("Unknown attachment type: {}", name))?,
        ),
        None => ContentKind::Text,
    };
    if content_kind == ContentKind::Text && cli.message.as_deref().unwrap_or_default().is_empty() {
        return Err("A text broadcast needs --message".into());
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let repos = Repositories::new(db::create_pool(&database_url)?);

    let user_ids = match cli.segment {
        Segment::All => repos.users().all_user_ids().await?,
        Segment::Paid => repos.users().user_ids_by_payment(true).await?,
        Segment::Unpaid => repos.users().user_ids_by_payment(false).await?,
    };

    if cli.dry_run {
        println!("Would queue {} messages ({:?})", user_ids.len(), cli.segment);
        return Ok(());
    }

    let count = repos
        .message_queue()
        .enqueue_for_all(
            &user_ids,
            content_kind.as_str(),
            cli.message.as_deref(),
            cli.file_id.as_deref(),
        )
        .await?;

    println!("Queued {} messages", count);
    Ok(())
}
