//! `SQLite` storage for the donation registry.
//!
//! Provides the [`DonationStore`] seam and its `SQLite` implementation.

mod db;
mod models;
mod queries;


pub use db::{DatabaseError, DonationDatabase};
pub use models::*;

use async_trait::async_trait;

/// The storage collaborator the registry depends on.
///
/// Each call is one atomic unit; implementations must not hold a connection
/// across calls.
#[async_trait]
pub trait DonationStore: Send + Sync {
    /// Newest `created_at` first, at most `limit` rows.
    async fn list_recent(&self, limit: i64) -> Result<Vec<DonationRecord>, DatabaseError>;

    /// Insert a record with the given status. Returns the assigned id.
    async fn insert(&self, donation: &NewDonation, status: &str) -> Result<i64, DatabaseError>;

    /// Overwrite `status` and `notes`, refreshing `updated_at`.
    /// Returns the number of rows touched (0 when `id` does not exist).
    async fn update_status(&self, id: i64, status: &str, notes: &str)
    -> Result<u64, DatabaseError>;

    /// Like [`update_status`](Self::update_status), but only writes when the
    /// row's current status is one of `from`. The check and the write are a
    /// single statement. Returns the number of rows touched.
    async fn update_status_from(
        &self,
        id: i64,
        from: &[&str],
        status: &str,
        notes: &str,
    ) -> Result<u64, DatabaseError>;

    async fn get(&self, id: i64) -> Result<Option<DonationRecord>, DatabaseError>;
}
