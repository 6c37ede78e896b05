use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use log::info;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use super::RepoError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64, // telegram user id
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_premium: Option<bool>,
    pub deeplink: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            username: row.get(1),
            full_name: row.get(2),
            is_premium: row.get(3),
            deeplink: row.get(4),
            created_at: row.get(5),
        }
    }
}

/// one line of the users export
#[derive(Debug, Clone)]
pub struct UserExportRow {
    pub id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub deeplink: Option<i32>,
    pub has_paid: bool,
    pub is_premium: Option<bool>,
    pub lesson_number: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

const USER_COLUMNS: &str = "id, username, full_name, is_premium, deeplink, created_at";

pub struct UserRepository {
    pool: Pool,
}

impl UserRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// returns the user and whether it was created by this call
    pub async fn get_or_create_user(
        &self,
        id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
        is_premium: Option<bool>,
        deeplink: Option<i32>,
    ) -> Result<(User, bool), RepoError> {
        let client = self.pool.get().await?;

        let inserted = client
            .execute(
                "INSERT INTO users (id, username, full_name, is_premium, deeplink)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (id) DO NOTHING",
                &[&id, &username, &full_name, &is_premium, &deeplink],
            )
            .await?;

        let row = client
            .query_one(
                &format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS),
                &[&id],
            )
            .await?;

        let created = inserted > 0;
        if created {
            info!("Created new user {} (deeplink: {:?})", id, deeplink);
        }
        Ok((User::from_row(&row), created))
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(User::from_row))
    }

    /// None keeps the stored username
    pub async fn update_user(&self, id: i64, username: Option<&str>) -> Result<User, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "UPDATE users SET username = COALESCE($2, username), updated_at = NOW() WHERE id = $1 RETURNING {}",
                    USER_COLUMNS
                ),
                &[&id, &username],
            )
            .await?
            .ok_or(RepoError::NotFound("user", id))?;
        Ok(User::from_row(&row))
    }

    /// purchases and lesson progress go with the user
    pub async fn delete_user(&self, id: i64) -> Result<bool, RepoError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM users WHERE id = $1", &[&id])
            .await?;
        if deleted > 0 {
            info!("Deleted user {}", id);
        }
        Ok(deleted > 0)
    }

    pub async fn count_users(&self) -> Result<i64, RepoError> {
        let client = self.pool.get().await?;
        let row = client.query_one("SELECT COUNT(*) FROM users", &[]).await?;
        Ok(row.get(0))
    }

    pub async fn all_user_ids(&self) -> Result<Vec<i64>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT id FROM users ORDER BY created_at, id", &[])
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    /// users split by whether they have a paid purchase
    pub async fn user_ids_by_payment(&self, paid: bool) -> Result<Vec<i64>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT u.id FROM users u
                 WHERE EXISTS (SELECT 1 FROM purchases p WHERE p.user_id = u.id AND p.is_paid) = $1
                 ORDER BY u.created_at, u.id",
                &[&paid],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    pub async fn export_rows(&self) -> Result<Vec<UserExportRow>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT u.id, u.full_name, u.username, u.deeplink,
                        EXISTS (SELECT 1 FROM purchases p WHERE p.user_id = u.id AND p.is_paid),
                        u.is_premium, l.lesson_number, u.created_at
                 FROM users u
                 LEFT JOIN lessons l ON l.user_id = u.id
                 ORDER BY u.created_at, u.id",
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| UserExportRow {
                id: row.get(0),
                full_name: row.get(1),
                username: row.get(2),
                deeplink: row.get(3),
                has_paid: row.get(4),
                is_premium: row.get(5),
                lesson_number: row.get(6),
                created_at: row.get(7),
            })
            .collect())
    }
}
