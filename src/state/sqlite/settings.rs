use async_trait::async_trait;
use sqlx::Row;

use super::SqliteStateStore;
use crate::entitlement::INITIAL_FREE_CREDITS;
use crate::traits::SettingsStore;

const ONBOARDED_KEY: &str = "onboarded";
const ENTITLED_KEY: &str = "is_pro";
const CREDITS_KEY: &str = "free_credits";

impl SqliteStateStore {
    async fn get_setting(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set_setting(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_flag(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.get_setting(key).await?.as_deref() == Some("true"))
    }
}

#[async_trait]
impl SettingsStore for SqliteStateStore {
    async fn has_onboarded(&self) -> anyhow::Result<bool> {
        self.get_flag(ONBOARDED_KEY).await
    }

    async fn complete_onboarding(&self) -> anyhow::Result<()> {
        self.set_setting(ONBOARDED_KEY, "true").await?;
        // Seed credits only on the first completion; a wiped counter is
        // only re-granted by clear_all followed by fresh onboarding.
        if self.get_setting(CREDITS_KEY).await?.is_none() {
            self.set_setting(CREDITS_KEY, &INITIAL_FREE_CREDITS.to_string())
                .await?;
        }
        Ok(())
    }

    async fn is_entitled(&self) -> anyhow::Result<bool> {
        self.get_flag(ENTITLED_KEY).await
    }

    async fn set_entitled(&self) -> anyhow::Result<()> {
        self.set_setting(ENTITLED_KEY, "true").await
    }

    async fn free_credits(&self) -> anyhow::Result<u32> {
        Ok(self
            .get_setting(CREDITS_KEY)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    async fn spend_credit(&self) -> anyhow::Result<()> {
        // Read-modify-write in one statement, floored at zero.
        sqlx::query(
            "UPDATE settings
             SET value = CAST(MAX(CAST(value AS INTEGER) - 1, 0) AS TEXT),
                 updated_at = datetime('now')
             WHERE key = ?",
        )
        .bind(CREDITS_KEY)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_all(&self) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM pets").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM checks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM settings").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
