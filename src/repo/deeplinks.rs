use deadpool_postgres::Pool;
use log::info;
use serde::{Deserialize, Serialize};
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use super::RepoError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Deeplink {
    pub id: i32,
    pub source: String,
    pub target: String,
    pub link: Option<String>,
}

impl Deeplink {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            source: row.get(1),
            target: row.get(2),
            link: row.get(3),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct DeeplinkUpdate {
    pub source: Option<String>,
    pub target: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeeplinkStats {
    pub deeplink: Deeplink,
    pub users: i64,
    pub paid_users: i64,
}

const DEEPLINK_COLUMNS: &str = "id, source, target, link";

pub struct DeeplinkRepository {
    pool: Pool,
}

impl DeeplinkRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn create_deeplink(
        &self,
        source: &str,
        target: &str,
        link: Option<&str>,
    ) -> Result<Deeplink, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO deeplinks (source, target, link) VALUES ($1, $2, $3) RETURNING {}",
                    DEEPLINK_COLUMNS
                ),
                &[&source, &target, &link],
            )
            .await?;
        let deeplink = Deeplink::from_row(&row);
        info!(
            "Created deeplink {} ({} -> {})",
            deeplink.id, deeplink.source, deeplink.target
        );
        Ok(deeplink)
    }

    pub async fn get_deeplink_by_id(&self, id: i32) -> Result<Option<Deeplink>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM deeplinks WHERE id = $1", DEEPLINK_COLUMNS),
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(Deeplink::from_row))
    }

    pub async fn get_all_deeplinks(&self) -> Result<Vec<Deeplink>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!("SELECT {} FROM deeplinks ORDER BY id", DEEPLINK_COLUMNS),
                &[],
            )
            .await?;
        Ok(rows.iter().map(Deeplink::from_row).collect())
    }

    pub async fn update_deeplink(&self, id: i32, update: DeeplinkUpdate) -> Result<Deeplink, RepoError> {
        let mut sets = Vec::new();
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = vec![Box::new(id)];
        if let Some(source) = update.source {
            params.push(Box::new(source));
            sets.push(format!("source = ${}", params.len()));
        }
        if let Some(target) = update.target {
            params.push(Box::new(target));
            sets.push(format!("target = ${}", params.len()));
        }
        if let Some(link) = update.link {
            params.push(Box::new(link));
            sets.push(format!("link = ${}", params.len()));
        }

        let client = self.pool.get().await?;
        let row = if sets.is_empty() {
            client
                .query_opt(
                    &format!("SELECT {} FROM deeplinks WHERE id = $1", DEEPLINK_COLUMNS),
                    &[&id],
                )
                .await?
        } else {
            let query = format!(
                "UPDATE deeplinks SET {} WHERE id = $1 RETURNING {}",
                sets.join(", "),
                DEEPLINK_COLUMNS
            );
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            client.query_opt(&query, &refs).await?
        };

        row.as_ref()
            .map(Deeplink::from_row)
            .ok_or(RepoError::NotFound("deeplink", id as i64))
    }

    /// users who came through the link keep their account, the reference is nulled
    pub async fn delete_deeplink(&self, id: i32) -> Result<bool, RepoError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM deeplinks WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }

    pub async fn deeplink_stats(&self) -> Result<Vec<DeeplinkStats>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT d.id, d.source, d.target, d.link,
                        COUNT(DISTINCT u.id),
                        COUNT(DISTINCT p.user_id)
                 FROM deeplinks d
                 LEFT JOIN users u ON u.deeplink = d.id
                 LEFT JOIN purchases p ON p.user_id = u.id AND p.is_paid
                 GROUP BY d.id
                 ORDER BY d.id",
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| DeeplinkStats {
                deeplink: Deeplink::from_row(row),
                users: row.get(4),
                paid_users: row.get(5),
            })
            .collect())
    }
}
