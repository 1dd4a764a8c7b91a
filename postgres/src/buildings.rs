use crate::PostgresStore;
use crate::rows::{BUILDING_COLUMNS, BuildingRow, db};
use async_trait::async_trait;
use dormclean_core::providers::BuildingStore;
use dormclean_core::{Building, BuildingId, Error, Result};
use sqlx::types::Json;

#[async_trait]
impl BuildingStore for PostgresStore {
    async fn get_building(&self, id: &BuildingId) -> Result<Option<Building>> {
        let row = sqlx::query_as::<_, BuildingRow>(&format!("SELECT {BUILDING_COLUMNS} FROM buildings WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get building"))?;
        Ok(row.map(Building::from))
    }

    async fn list_buildings(&self) -> Result<Vec<Building>> {
        let rows = sqlx::query_as::<_, BuildingRow>(&format!("SELECT {BUILDING_COLUMNS} FROM buildings ORDER BY name, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db("list buildings"))?;
        Ok(rows.into_iter().map(Building::from).collect())
    }

    async fn insert_building(&self, building: &Building) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO buildings
                (id, name, location, room_types, assigned_provider_id, assigned_provider_name, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(building.id.as_uuid())
        .bind(&building.name)
        .bind(&building.location)
        .bind(Json(&building.room_types))
        .bind(building.assigned_provider_id.as_ref().map(|id| id.as_str()))
        .bind(&building.assigned_provider_name)
        .bind(building.created_at)
        .bind(building.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db("insert building"))?;
        Ok(())
    }

    async fn update_building(&self, building: &Building) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE buildings
            SET name = $2,
                location = $3,
                room_types = $4,
                assigned_provider_id = $5,
                assigned_provider_name = $6,
                updated_at = $7
            WHERE id = $1
            ",
        )
        .bind(building.id.as_uuid())
        .bind(&building.name)
        .bind(&building.location)
        .bind(Json(&building.room_types))
        .bind(building.assigned_provider_id.as_ref().map(|id| id.as_str()))
        .bind(&building.assigned_provider_name)
        .bind(building.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db("update building"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Building", building.id));
        }
        Ok(())
    }

    async fn delete_building(&self, id: &BuildingId) -> Result<()> {
        let result = sqlx::query("DELETE FROM buildings WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db("delete building"))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("Building", id));
        }
        Ok(())
    }
}
