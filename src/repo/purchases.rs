use deadpool_postgres::Pool;
use log::info;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use super::RepoError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Purchase {
    pub id: i64,
    pub payment_id: Option<i64>,
    pub user_id: i64,
    pub product_id: i64,
    pub link: Option<String>,
    pub amount: i32,
    pub is_paid: bool,
}

impl Purchase {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            payment_id: row.get(1),
            user_id: row.get(2),
            product_id: row.get(3),
            link: row.get(4),
            amount: row.get(5),
            is_paid: row.get(6),
        }
    }

    /// a purchase can be reused only while it still has a payment link
    pub fn has_payment_link(&self) -> bool {
        self.payment_id.is_some() && self.link.as_deref().is_some_and(|l| !l.is_empty())
    }
}

const PURCHASE_COLUMNS: &str = "id, payment_id, user_id, product_id, link, amount, is_paid";

pub struct PurchaseRepository {
    pool: Pool,
}

impl PurchaseRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn create_purchase(
        &self,
        user_id: i64,
        product_id: i64,
        amount: i32,
    ) -> Result<Purchase, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO purchases (user_id, product_id, amount) VALUES ($1, $2, $3) RETURNING {}",
                    PURCHASE_COLUMNS
                ),
                &[&user_id, &product_id, &amount],
            )
            .await?;
        let purchase = Purchase::from_row(&row);
        info!(
            "Created purchase {} for user {} (product {}, {}₽)",
            purchase.id, user_id, product_id, amount
        );
        Ok(purchase)
    }

    pub async fn get_purchase_by_id(&self, id: i64) -> Result<Option<Purchase>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM purchases WHERE id = $1", PURCHASE_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(Purchase::from_row))
    }

    /// latest purchase of the user
    pub async fn get_purchase_by_user(&self, user_id: i64) -> Result<Option<Purchase>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {} FROM purchases WHERE user_id = $1 ORDER BY id DESC LIMIT 1",
                    PURCHASE_COLUMNS
                ),
                &[&user_id],
            )
            .await?;
        Ok(row.as_ref().map(Purchase::from_row))
    }

    pub async fn update_purchase(
        &self,
        id: i64,
        payment_id: i64,
        link: &str,
    ) -> Result<Purchase, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE purchases SET payment_id = $2, link = $3, updated_at = NOW() WHERE id = $1 RETURNING {}",
                    PURCHASE_COLUMNS
                ),
                &[&id, &payment_id, &link],
            )
            .await?
            .ok_or(RepoError::NotFound("purchase", id))?;
        Ok(Purchase::from_row(&row))
    }

    /// flips an unpaid purchase to paid; None when it is missing or already paid,
    /// so only one caller ever sees the transition
    pub async fn mark_paid(&self, id: i64) -> Result<Option<Purchase>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE purchases SET is_paid = TRUE, updated_at = NOW() WHERE id = $1 AND NOT is_paid RETURNING {}",
                    PURCHASE_COLUMNS
                ),
                &[&id],
            )
            .await?;
        if row.is_some() {
            info!("Purchase {} marked as paid", id);
        }
        Ok(row.as_ref().map(Purchase::from_row))
    }

    pub async fn delete_purchase(&self, id: i64) -> Result<bool, RepoError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM purchases WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }

    /// number of distinct users with at least one paid purchase
    pub async fn paid_users_count(&self) -> Result<i64, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT COUNT(DISTINCT user_id) FROM purchases WHERE is_paid",
                &[],
            )
            .await?;
        Ok(row.get(0))
    }
}
