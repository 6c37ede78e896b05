use deadpool_postgres::Pool;
use log::info;

/// ordered schema versions; a version is never edited once released, add a new one instead
const MIGRATIONS: &[(i32, &str)] = &[
    (
        1,
        r#"
        -- deep links are created by admins and referenced by users who came through them
        CREATE TABLE deeplinks (
            id SERIAL PRIMARY KEY,
            source VARCHAR(64) NOT NULL,
            target VARCHAR(64) NOT NULL,
            link TEXT,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        );

        -- users are keyed by their telegram id
        CREATE TABLE users (
            id BIGINT PRIMARY KEY,
            username VARCHAR(255),
            full_name VARCHAR(255),
            is_premium BOOLEAN,
            deeplink INTEGER REFERENCES deeplinks(id) ON DELETE SET NULL,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        );

        CREATE TABLE products (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            info VARCHAR(255) NOT NULL,
            description VARCHAR(500),
            price INTEGER NOT NULL CHECK (price >= 0)
        );

        -- order ids sent to the gateway start at 50
        CREATE SEQUENCE purchase_id_seq START WITH 50;

        CREATE TABLE purchases (
            id BIGINT PRIMARY KEY DEFAULT nextval('purchase_id_seq'),
            payment_id BIGINT,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            product_id BIGINT NOT NULL REFERENCES products(id),
            link TEXT,
            amount INTEGER NOT NULL,
            is_paid BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        );
        ALTER SEQUENCE purchase_id_seq OWNED BY purchases.id;

        CREATE TABLE lessons (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            lesson_number INTEGER NOT NULL DEFAULT 1,
            completed_at TIMESTAMP WITH TIME ZONE,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        );

        CREATE INDEX idx_users_deeplink ON users(deeplink);
        CREATE INDEX idx_purchases_user_id ON purchases(user_id);
        CREATE INDEX idx_purchases_paid ON purchases(is_paid);
        CREATE UNIQUE INDEX idx_lessons_user_id ON lessons(user_id);
        "#,
    ),
    (
        2,
        r#"
        -- broadcast queue; media messages are sent by file id
        CREATE TABLE message_queue (
            id SERIAL PRIMARY KEY,
            telegram_user_id BIGINT NOT NULL,
            content_type VARCHAR(20) NOT NULL DEFAULT 'text',
            text TEXT,
            file_id TEXT,
            status VARCHAR(20) NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'sending', 'sent', 'failed')),
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            sent_at TIMESTAMP WITH TIME ZONE,
            error_message TEXT
        );

        CREATE INDEX idx_message_queue_status ON message_queue(status, created_at);
        "#,
    ),
];

pub struct MigrationManager;

impl MigrationManager {
    /// applies every version newer than the one recorded in schema_migrations,
    /// all in a single transaction
    pub async fn run_migrations(pool: &Pool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Running database migrations...");
        let mut client = pool.get().await?;

        client
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
                )",
            )
            .await?;

        let current: i32 = client
            .query_one("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", &[])
            .await?
            .get(0);

        let pending: Vec<&(i32, &str)> = MIGRATIONS
            .iter()
            .filter(|(version, _)| *version > current)
            .collect();
        if pending.is_empty() {
            info!("Database schema is up to date (version {})", current);
            return Ok(());
        }

        let transaction = client.transaction().await?;
        for (version, sql) in pending {
            info!("Applying migration {}", version);
            transaction.batch_execute(sql).await?;
            transaction
                .execute(
                    "INSERT INTO schema_migrations (version) VALUES ($1)",
                    &[version],
                )
                .await?;
        }
        transaction.commit().await?;

        info!(
            "Database migrated from version {} to {}",
            current,
            Self::latest_version()
        );
        Ok(())
    }

    pub fn latest_version() -> i32 {
        MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
    }
}
