use crate::PostgresStore;
use crate::rows::{COMPLAINT_COLUMNS, ComplaintRow, ResponseRow, convert, db};
use async_trait::async_trait;
use dormclean_core::providers::{ComplaintScope, ComplaintStore};
use dormclean_core::{Complaint, ComplaintId, ComplaintResponse, Error, ProfileId, Result};

#[async_trait]
impl ComplaintStore for PostgresStore {
    async fn get_complaint(&self, id: &ComplaintId) -> Result<Option<Complaint>> {
        sqlx::query_as::<_, ComplaintRow>(&format!("SELECT {COMPLAINT_COLUMNS} FROM complaints WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db("get complaint"))?
            .map(Complaint::try_from)
            .transpose()
    }

    async fn insert_complaint(&self, complaint: &Complaint) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO complaints ({COMPLAINT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(complaint.id.as_uuid())
        .bind(complaint.customer_id.as_str())
        .bind(&complaint.customer_name)
        .bind(complaint.booking_id.map(|id| *id.as_uuid()))
        .bind(&complaint.building)
        .bind(complaint.complaint_type.as_str())
        .bind(&complaint.text)
        .bind(&complaint.image_url)
        .bind(complaint.status.as_str())
        .bind(complaint.provider_id.as_ref().map(ProfileId::as_str))
        .bind(&complaint.provider_name)
        .bind(complaint.last_response_at)
        .bind(complaint.created_at)
        .execute(&self.pool)
        .await
        .map_err(db("insert complaint"))?;
        Ok(())
    }

    async fn add_response(&self, complaint: &Complaint, response: &ComplaintResponse) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db("begin"))?;

        let updated = sqlx::query("UPDATE complaints SET status = $2, last_response_at = $3 WHERE id = $1")
            .bind(complaint.id.as_uuid())
            .bind(complaint.status.as_str())
            .bind(complaint.last_response_at)
            .execute(&mut *tx)
            .await
            .map_err(db("update complaint"))?;
        if updated.rows_affected() == 0 {
            return Err(Error::not_found("Complaint", complaint.id));
        }

        sqlx::query(
            r"
            INSERT INTO complaint_responses (complaint_id, text, responder_role, responder_name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(response.complaint_id.as_uuid())
        .bind(&response.text)
        .bind(response.responder_role.as_str())
        .bind(&response.responder_name)
        .bind(response.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db("insert complaint response"))?;

        tx.commit().await.map_err(db("commit"))?;
        Ok(())
    }

    async fn list_responses(&self, id: &ComplaintId) -> Result<Vec<ComplaintResponse>> {
        let rows = sqlx::query_as::<_, ResponseRow>(
            r"
            SELECT complaint_id, text, responder_role, responder_name, created_at
            FROM complaint_responses
            WHERE complaint_id = $1
            ORDER BY id
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db("list complaint responses"))?;
        convert(rows)
    }

    async fn list_complaints(&self, scope: ComplaintScope) -> Result<Vec<Complaint>> {
        let (customer, provider) = match &scope {
            ComplaintScope::All => (None, None),
            ComplaintScope::Customer(id) => (Some(id.as_str()), None),
            ComplaintScope::Provider(id) => (None, Some(id.as_str())),
        };
        let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints \
             WHERE ($1::text IS NULL OR customer_id = $1) AND ($2::text IS NULL OR provider_id = $2) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer)
        .bind(provider)
        .fetch_all(&self.pool)
        .await
        .map_err(db("list complaints"))?;
        convert(rows)
    }
}
