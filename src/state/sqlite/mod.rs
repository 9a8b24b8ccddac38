mod checks;
mod pets;
mod settings;


use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Durable store for the two entity collections (pets, checks) and the
/// scalar settings. The store exclusively owns the durable representations;
/// everything else holds transient copies.
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub async fn new(db_path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    /// Create collections/settings if absent. No further migration mechanism
    /// exists in this design.
    async fn create_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                species TEXT NOT NULL,
                breed TEXT,
                age REAL NOT NULL,
                weight_kg REAL NOT NULL,
                notes TEXT,
                original_image BLOB,
                portrait BLOB,
                allergies TEXT NOT NULL DEFAULT '[]',
                conditions TEXT NOT NULL DEFAULT '[]'
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checks (
                id TEXT PRIMARY KEY,
                pet_id TEXT NOT NULL,
                food_name TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                verdict TEXT NOT NULL,
                image BLOB,
                barcode TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_checks_created ON checks(created_at_ms DESC)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
