use crate::PostgresStore;
use crate::rows::{PROFILE_COLUMNS, ProfileRow, convert, db};
use async_trait::async_trait;
use dormclean_core::providers::ProfileStore;
use dormclean_core::{Profile, ProfileId, Result, Role};

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn get_profile(&self, id: &ProfileId) -> Result<Option<Profile>> {
        sqlx::query_as::<_, ProfileRow>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get profile"))?
            .map(Profile::try_from)
            .transpose()
    }

    async fn save_profile(&self, profile: &Profile) -> Result<()> {
        let commission = profile
            .commission
            .map(|rate| i32::try_from(rate.basis_points()).unwrap_or(i32::MAX));
        sqlx::query(
            r"
            INSERT INTO profiles (id, name, email, phone, role, commission_bps, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                role = EXCLUDED.role,
                commission_bps = EXCLUDED.commission_bps,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(profile.id.as_str())
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(profile.role.as_str())
        .bind(commission)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db("save profile"))?;
        Ok(())
    }

    async fn list_profiles(&self, role: Option<Role>) -> Result<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE ($1::text IS NULL OR role = $1) ORDER BY name, id"
        ))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db("list profiles"))?;
        convert(rows)
    }
}
