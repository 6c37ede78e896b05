use deadpool_postgres::Pool;
use std::error::Error;
use std::fmt;

pub mod deeplinks;
pub mod lessons;
pub mod message_queue;
pub mod products;
pub mod purchases;
pub mod users;

pub use deeplinks::{Deeplink, DeeplinkRepository, DeeplinkStats, DeeplinkUpdate};
pub use lessons::{Lesson, LessonRepository, MAX_LESSON};
pub use message_queue::{MessageQueueRepository, QueueStatusCounts, QueuedMessage};
pub use products::{Product, ProductRepository, ProductUpdate};
pub use purchases::{Purchase, PurchaseRepository};
pub use users::{User, UserExportRow, UserRepository};

#[derive(Debug)]
pub enum RepoError {
    NotFound(&'static str, i64), // entity, id
    InvalidInput(String),
    DatabaseError(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::NotFound(entity, id) => write!(f, "{} {} not found", entity, id),
            RepoError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            RepoError::DatabaseError(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl Error for RepoError {}

impl From<tokio_postgres::Error> for RepoError {
    fn from(err: tokio_postgres::Error) -> Self {
        RepoError::DatabaseError(Box::new(err))
    }
}

impl From<deadpool_postgres::PoolError> for RepoError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        RepoError::DatabaseError(Box::new(err))
    }
}

/// entry point to every table; cheap to clone, all repositories share the pool
#[derive(Clone)]
pub struct Repositories {
    pool: Pool,
}

impl Repositories {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.pool.clone())
    }

    pub fn purchases(&self) -> PurchaseRepository {
        PurchaseRepository::new(self.pool.clone())
    }

    pub fn deeplinks(&self) -> DeeplinkRepository {
        DeeplinkRepository::new(self.pool.clone())
    }

    pub fn lessons(&self) -> LessonRepository {
        LessonRepository::new(self.pool.clone())
    }

    pub fn message_queue(&self) -> MessageQueueRepository {
        MessageQueueRepository::new(self.pool.clone())
    }
}
