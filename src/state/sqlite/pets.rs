use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::SqliteStateStore;
use crate::traits::PetStore;
use crate::types::{PetProfile, Species};

fn row_to_pet(row: &SqliteRow) -> anyhow::Result<PetProfile> {
    let species: String = row.try_get("species")?;
    let allergies: String = row.try_get("allergies")?;
    let conditions: String = row.try_get("conditions")?;
    Ok(PetProfile {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        species: Species::from_label(&species),
        breed: row.try_get("breed")?,
        age: row.try_get("age")?,
        weight_kg: row.try_get("weight_kg")?,
        notes: row.try_get("notes")?,
        original_image: row.try_get("original_image")?,
        portrait: row.try_get("portrait")?,
        allergies: serde_json::from_str(&allergies)?,
        conditions: serde_json::from_str(&conditions)?,
    })
}

impl SqliteStateStore {
    async fn fetch_pets(&self) -> anyhow::Result<Vec<PetProfile>> {
        let rows = sqlx::query("SELECT * FROM pets ORDER BY name COLLATE NOCASE")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_pet).collect()
    }
}

#[async_trait]
impl PetStore for SqliteStateStore {
    async fn list_pets(&self) -> Vec<PetProfile> {
        match self.fetch_pets().await {
            Ok(pets) => pets,
            Err(e) => {
                tracing::warn!(error = %e, "pet read failed, degrading to empty list");
                Vec::new()
            }
        }
    }

    async fn upsert_pet(&self, pet: &PetProfile) -> anyhow::Result<Vec<PetProfile>> {
        sqlx::query(
            "INSERT INTO pets
                (id, name, species, breed, age, weight_kg, notes,
                 original_image, portrait, allergies, conditions)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                species = excluded.species,
                breed = excluded.breed,
                age = excluded.age,
                weight_kg = excluded.weight_kg,
                notes = excluded.notes,
                original_image = excluded.original_image,
                portrait = excluded.portrait,
                allergies = excluded.allergies,
                conditions = excluded.conditions",
        )
        .bind(&pet.id)
        .bind(&pet.name)
        .bind(pet.species.to_string())
        .bind(&pet.breed)
        .bind(pet.age)
        .bind(pet.weight_kg)
        .bind(&pet.notes)
        .bind(&pet.original_image)
        .bind(&pet.portrait)
        .bind(serde_json::to_string(&pet.allergies)?)
        .bind(serde_json::to_string(&pet.conditions)?)
        .execute(&self.pool)
        .await?;

        Ok(self.list_pets().await)
    }

    async fn delete_pet(&self, id: &str) -> anyhow::Result<Vec<PetProfile>> {
        sqlx::query("DELETE FROM pets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(self.list_pets().await)
    }
}
