use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use super::users::User;
use super::RepoError;

/// last lesson of the free course
pub const MAX_LESSON: i32 = 3;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Lesson {
    pub id: i64,
    pub user_id: i64,
    pub lesson_number: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Lesson {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            user_id: row.get(1),
            lesson_number: row.get(2),
            completed_at: row.get(3),
        }
    }
}

const LESSON_COLUMNS: &str = "id, user_id, lesson_number, completed_at";

pub struct LessonRepository {
    pool: Pool,
}

impl LessonRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// a user has a single progress row; an existing one is returned unchanged
    pub async fn get_or_create_lesson_progress(
        &self,
        user_id: i64,
        lesson_number: i32,
    ) -> Result<Lesson, RepoError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO lessons (user_id, lesson_number, completed_at) VALUES ($1, $2, NOW())
                 ON CONFLICT (user_id) DO NOTHING",
                &[&user_id, &lesson_number],
            )
            .await?;
        let row = client
            .query_one(
                &format!("SELECT {} FROM lessons WHERE user_id = $1", LESSON_COLUMNS),
                &[&user_id],
            )
            .await?;
        Ok(Lesson::from_row(&row))
    }

    /// moves the user to the next lesson, stopping at MAX_LESSON
    pub async fn update_lesson_progress(&self, user_id: i64) -> Result<Option<Lesson>, RepoError> {
        let client = self.pool.get().await?;
        let updated = client
            .query_opt(
                &format!(
                    "UPDATE lessons SET lesson_number = lesson_number + 1, completed_at = NOW()
                     WHERE user_id = $1 AND lesson_number < $2
                     RETURNING {}",
                    LESSON_COLUMNS
                ),
                &[&user_id, &MAX_LESSON],
            )
            .await?;

        match updated {
            Some(row) => Ok(Some(Lesson::from_row(&row))),
            None => {
                let row = client
                    .query_opt(
                        &format!("SELECT {} FROM lessons WHERE user_id = $1", LESSON_COLUMNS),
                        &[&user_id],
                    )
                    .await?;
                Ok(row.as_ref().map(Lesson::from_row))
            }
        }
    }

    pub async fn get_lesson_progress_by_user(&self, user_id: i64) -> Result<Option<Lesson>, RepoError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!("SELECT {} FROM lessons WHERE user_id = $1", LESSON_COLUMNS),
                &[&user_id],
            )
            .await?;
        Ok(row.as_ref().map(Lesson::from_row))
    }

    pub async fn get_users_lesson_progress(&self) -> Result<Vec<(User, Lesson)>, RepoError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT u.id, u.username, u.full_name, u.is_premium, u.deeplink, u.created_at,
                        l.id, l.user_id, l.lesson_number, l.completed_at
                 FROM lessons l
                 JOIN users u ON u.id = l.user_id
                 ORDER BY l.id",
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let user = User {
                    id: row.get(0),
                    username: row.get(1),
                    full_name: row.get(2),
                    is_premium: row.get(3),
                    deeplink: row.get(4),
                    created_at: row.get(5),
                };
                let lesson = Lesson {
                    id: row.get(6),
                    user_id: row.get(7),
                    lesson_number: row.get(8),
                    completed_at: row.get(9),
                };
                (user, lesson)
            })
            .collect())
    }
}
