use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::error::Error;

use tg_funnel::db;
use tg_funnel::repo::{Product, ProductUpdate, Repositories};

#[derive(Parser)]
#[command(name = "manage_products")]
#[command(about = "Create, list, update and delete products sold by the bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new product
    Add {
        #[arg(long)]
        name: String,
        /// Short text used on receipts
        #[arg(long)]
        info: String,
        /// Product page text, `+br+` starts a new line
        #[arg(long)]
        description: Option<String>,
        /// Price in rubles
        #[arg(long)]
        price: i32,
    },
    /// List all products
    List,
    /// Change selected fields of a product
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        info: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<i32>,
    },
    /// Delete a product
    Delete { id: i64 },
}

fn print_product(product: &Product) {
    println!(
        "#{} {} ({} ₽)\n  info: {}\n  description: {}",
        product.id,
        product.name,
        product.price,
        product.info,
        product.description.as_deref().unwrap_or("-")
    );
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
    let products = Repositories::new(db::create_pool(&database_url)?).products();

    match cli.command {
        Commands::Add {
            name,
            info,
            description,
            price,
        } => {
            let product = products
                .create_product(&name, &info, description.as_deref(), price)
                .await?;
            println!("Created product:");
            print_product(&product);
        }
        Commands::List => {
            let all = products.get_all_products().await?;
            if all.is_empty() {
                println!("No products");
            }
            for product in &all {
                print_product(product);
            }
        }
        Commands::Update {
            id,
            name,
            info,
            description,
            price,
        } => {
            let product = products
                .update_product(
                    id,
                    ProductUpdate {
                        name,
                        info,
                        description,
                        price,
                    },
                )
                .await?;
            println!("Updated product:");
            print_product(&product);
        }
        Commands::Delete { id } => {
            if products.delete_product(id).await? {
                println!("Deleted product {}", id);
            } else {
                println!("Product {} not found", id);
            }
        }
    }
    Ok(())
}
