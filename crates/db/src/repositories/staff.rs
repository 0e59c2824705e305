use async_trait::async_trait;
use chrono::Utc;

use leadflow_core::domain::lead::CustomerType;
use leadflow_core::domain::staff::{StaffId, StaffMember};
use leadflow_core::leads::followup::{
    StaffDirectory, StaffDirectoryError, WorkloadStore, WorkloadStoreError,
};

use super::{column, parse_json, to_json, RepositoryError};
use crate::DbPool;

pub struct SqlStaffDirectory {
    pool: DbPool,
}

impl SqlStaffDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<StaffMember>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, name, location_slugs_json, specializations_json, rotation_order, active
             FROM staff_member
             ORDER BY rotation_order ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_staff_member).collect::<Result<Vec<_>, _>>()
    }

    /// Inserts or updates the member and makes sure a workload counter exists for it.
    /// Existing counters are left untouched.
    pub async fn upsert(&self, member: &StaffMember) -> Result<(), RepositoryError> {
        let locations = to_json("location_slugs_json", &member.location_slugs)?;
        let specializations = to_json("specializations_json", &member.specializations)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO staff_member
                 (id, name, location_slugs_json, specializations_json, rotation_order, active)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 location_slugs_json = excluded.location_slugs_json,
                 specializations_json = excluded.specializations_json,
                 rotation_order = excluded.rotation_order,
                 active = excluded.active",
        )
        .bind(&member.id.0)
        .bind(&member.name)
        .bind(&locations)
        .bind(&specializations)
        .bind(i64::from(member.rotation_order))
        .bind(member.active)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO staff_workload (staff_id, open_leads, updated_at)
             VALUES (?, 0, ?)
             ON CONFLICT(staff_id) DO NOTHING",
        )
        .bind(&member.id.0)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn row_to_staff_member(row: &sqlx::sqlite::SqliteRow) -> Result<StaffMember, RepositoryError> {
    let id: String = column(row, "id")?;
    let locations: String = column(row, "location_slugs_json")?;
    let specializations: String = column(row, "specializations_json")?;
    let rotation_order: i64 = column(row, "rotation_order")?;

    Ok(StaffMember {
        id: StaffId(id),
        name: column(row, "name")?,
        location_slugs: parse_json("location_slugs_json", &locations)?,
        specializations: parse_json::<Vec<CustomerType>>("specializations_json", &specializations)?,
        rotation_order: u32::try_from(rotation_order).unwrap_or(u32::MAX),
        active: column(row, "active")?,
    })
}

#[async_trait]
impl StaffDirectory for SqlStaffDirectory {
    async fn list_staff(&self) -> Result<Vec<StaffMember>, StaffDirectoryError> {
        Ok(self.list().await?)
    }
}

pub struct SqlWorkloadStore {
    pool: DbPool,
}

impl SqlWorkloadStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open_leads(&self, staff: &StaffId) -> Result<Option<u32>, RepositoryError> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT open_leads FROM staff_workload WHERE staff_id = ?")
                .bind(&staff.0)
                .fetch_optional(&self.pool)
                .await?;
        Ok(count.map(|count| u32::try_from(count).unwrap_or(0)))
    }

    /// Every counter, ordered by staff id. Read-only.
    pub async fn snapshot(&self) -> Result<Vec<(StaffId, u32)>, RepositoryError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT staff_id, open_leads FROM staff_workload ORDER BY staff_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(staff_id, count)| (StaffId(staff_id), u32::try_from(count).unwrap_or(0)))
            .collect())
    }

    async fn increment_least_loaded(
        &self,
        candidates: &[StaffId],
    ) -> Result<Option<StaffId>, RepositoryError> {
        let ids = candidates.iter().map(|id| id.0.as_str()).collect::<Vec<_>>();
        let candidates_json = to_json("candidates", &ids)?;

        // json_each keys are array positions, so ties resolve in candidate order.
        let staff_id: Option<String> = sqlx::query_scalar(
            "UPDATE staff_workload
             SET open_leads = open_leads + 1, updated_at = ?
             WHERE staff_id = (
                 SELECT w.staff_id
                 FROM staff_workload w
                 JOIN json_each(?) AS candidate ON candidate.value = w.staff_id
                 ORDER BY w.open_leads ASC, candidate.key ASC
                 LIMIT 1
             )
             RETURNING staff_id",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&candidates_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(staff_id.map(StaffId))
    }
}

#[async_trait]
impl WorkloadStore for SqlWorkloadStore {
    async fn assign_least_loaded(
        &self,
        candidates: &[StaffId],
    ) -> Result<StaffId, WorkloadStoreError> {
        if candidates.is_empty() {
            return Err(WorkloadStoreError::NoCounter);
        }
        self.increment_least_loaded(candidates).await?.ok_or(WorkloadStoreError::NoCounter)
    }
}
