use anyhow::Context;
use async_trait::async_trait;
use chrono::TimeZone;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::SqliteStateStore;
use crate::traits::CheckStore;
use crate::types::AnalysisRecord;

fn row_to_check(row: &SqliteRow) -> anyhow::Result<AnalysisRecord> {
    let created_at_ms: i64 = row.try_get("created_at_ms")?;
    let verdict: String = row.try_get("verdict")?;
    Ok(AnalysisRecord {
        id: row.try_get("id")?,
        pet_id: row.try_get("pet_id")?,
        food_name: row.try_get("food_name")?,
        created_at: chrono::Utc
            .timestamp_millis_opt(created_at_ms)
            .single()
            .context("check timestamp out of range")?,
        verdict: serde_json::from_str(&verdict)?,
        image: row.try_get("image")?,
        barcode: row.try_get("barcode")?,
    })
}

impl SqliteStateStore {
    async fn fetch_checks(&self) -> anyhow::Result<Vec<AnalysisRecord>> {
        // Newest first. Timestamps are integer millis, so ordering is
        // numeric rather than a string compare.
        let rows = sqlx::query("SELECT * FROM checks ORDER BY created_at_ms DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_check).collect()
    }
}

#[async_trait]
impl CheckStore for SqliteStateStore {
    async fn list_checks(&self) -> Vec<AnalysisRecord> {
        match self.fetch_checks().await {
            Ok(checks) => checks,
            Err(e) => {
                tracing::warn!(error = %e, "check read failed, degrading to empty list");
                Vec::new()
            }
        }
    }

    async fn upsert_check(&self, check: &AnalysisRecord) -> anyhow::Result<Vec<AnalysisRecord>> {
        sqlx::query(
            "INSERT INTO checks
                (id, pet_id, food_name, created_at_ms, verdict, image, barcode)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                pet_id = excluded.pet_id,
                food_name = excluded.food_name,
                created_at_ms = excluded.created_at_ms,
                verdict = excluded.verdict,
                image = excluded.image,
                barcode = excluded.barcode",
        )
        .bind(&check.id)
        .bind(&check.pet_id)
        .bind(&check.food_name)
        .bind(check.created_at.timestamp_millis())
        .bind(serde_json::to_string(&check.verdict)?)
        .bind(&check.image)
        .bind(&check.barcode)
        .execute(&self.pool)
        .await?;

        Ok(self.list_checks().await)
    }
}
