//! Database queries for the donation registry.

use async_trait::async_trait;
use donations_core::db::unix_timestamp_millis;

use super::DonationStore;
use super::db::{DatabaseError, DonationDatabase};
use super::models::{DonationRecord, NewDonation};

const SELECT_COLUMNS: &str = "SELECT id, player_nickname, package_name, amount, status, phone, \
     notes, created_at, updated_at FROM donations";

#[async_trait]
impl DonationStore for DonationDatabase {
    async fn list_recent(&self, limit: i64) -> Result<Vec<DonationRecord>, DatabaseError> {
        let mut conn = self.pool().acquire().await?;

        let rows = sqlx::query_as::<_, DonationRecord>(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    async fn insert(&self, donation: &NewDonation, status: &str) -> Result<i64, DatabaseError> {
        let now = unix_timestamp_millis();
        let mut tx = self.pool().begin().await?;

        let row: (i64,) = sqlx::query_as(
            "INSERT INTO donations (player_nickname, package_name, amount, phone, status, notes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, '', ?, ?) RETURNING id",
        )
        .bind(&donation.player_nickname)
        .bind(&donation.package_name)
        .bind(donation.amount)
        .bind(&donation.phone)
        .bind(status)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.0)
    }

    async fn update_status(
        &self,
        id: i64,
        status: &str,
        notes: &str,
    ) -> Result<u64, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        // Never let updated_at fall behind created_at or a previous update,
        // even if the wall clock steps back.
        let result = sqlx::query(
            "UPDATE donations SET status = ?, notes = ?, updated_at = MAX(?, updated_at + 1) WHERE id = ?",
        )
        .bind(status)
        .bind(notes)
        .bind(unix_timestamp_millis())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn update_status_from(
        &self,
        id: i64,
        from: &[&str],
        status: &str,
        notes: &str,
    ) -> Result<u64, DatabaseError> {
        if from.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE donations SET status = ?, notes = ?, updated_at = MAX(?, updated_at + 1) \
             WHERE id = ? AND status IN ({placeholders})"
        );

        let mut tx = self.pool().begin().await?;

        let mut query = sqlx::query::<sqlx::Sqlite>(&sql)
            .bind(status)
            .bind(notes)
            .bind(unix_timestamp_millis())
            .bind(id);
        for current in from {
            query = query.bind(*current);
        }
        let result = query.execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, id: i64) -> Result<Option<DonationRecord>, DatabaseError> {
        let mut conn = self.pool().acquire().await?;

        let row = sqlx::query_as::<_, DonationRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row)
    }
}
