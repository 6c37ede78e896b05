use deadpool_postgres::Pool;
use log::info;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use super::RepoError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub info: String,
    pub description: Option<String>,
    pub price: i32, // rubles
}

impl Product {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            name: row.get(1),
            info: row.get(2),
            description: row.get(3),
            price: row.get(4),
        }
    }
}

/// partial update, None leaves the column untouched
#[derive(Debug, Default, Clone)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub info: Option<String>,
    pub description: Option<String>,
    pub price: Option<i32>,
}

const PRODUCT_COLUMNS: &str = "id, name, info, description, price";

pub struct ProductRepository {
    pool: Pool,
}

impl ProductRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn create_product(
        &self,
        name: &str,
        info: &str,
        description: Option<&str>,
        price: i32,
    ) -> Result<Product, RepoError> {
        if price < 0 {
            return Err(RepoError::InvalidInput(format!("negative price {}", price)));
        }
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO products (name, info, description, price) VALUES ($1, $2, $3, $4) RETURNING {}",
                    PRODUCT_COLUMNS
                ),
                &[&name, &info, &description, &price],
            )
            .await?;
        let product = Product::from_row(&row);
        info!("Created product {} ({})", product.id, product.name);
        Ok(product)
    }

    pub async fn get_product_by_id(&self, id: i64) -> Result<Option<Product>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(Product::from_row))
    }

    pub async fn get_all_products(&self) -> Result<Vec<Product>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {} FROM products ORDER BY id", PRODUCT_COLUMNS),
                &[],
            )
            .await?;
        Ok(rows.iter().map(Product::from_row).collect())
    }

    pub async fn update_product(&self, id: i64, update: ProductUpdate) -> Result<Product, RepoError> {
        if let Some(price) = update.price {
            if price < 0 {
                return Err(RepoError::InvalidInput(format!("negative price {}", price)));
            }
        }

        let mut sets = Vec::new();
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = vec![Box::new(id)];
        if let Some(name) = update.name {
            params.push(Box::new(name));
            sets.push(format!("name = ${}", params.len()));
        }
        if let Some(info) = update.info {
            params.push(Box::new(info));
            sets.push(format!("info = ${}", params.len()));
        }
        if let Some(description) = update.description {
            params.push(Box::new(description));
            sets.push(format!("description = ${}", params.len()));
        }
        if let Some(price) = update.price {
            params.push(Box::new(price));
            sets.push(format!("price = ${}", params.len()));
        }

        let client = self.pool.get().await?;
        let row = if sets.is_empty() {
            client
                .query_opt(
                    &format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS),
                    &[&id],
                )
                .await?
        } else {
            let query = format!(
                "UPDATE products SET {} WHERE id = $1 RETURNING {}",
                sets.join(", "),
                PRODUCT_COLUMNS
            );
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            client.query_opt(&query, &refs).await?
        };

        row.as_ref()
            .map(Product::from_row)
            .ok_or(RepoError::NotFound("product", id))
    }

    pub async fn delete_product(&self, id: i64) -> Result<bool, RepoError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM products WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}
