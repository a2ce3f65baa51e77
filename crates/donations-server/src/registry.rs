//! Donation registry: the pledge lifecycle on top of a [`DonationStore`].
//!
//! Statuses are free-form tags. Under [`StatusPolicy::Open`] an update is a
//! blind overwrite: unknown statuses, backward moves and ids that do not
//! exist are all accepted. [`StatusPolicy::Guarded`] makes the write
//! conditional on [`allowed_transition`], so a concurrent update cannot slip
//! an illegal move past the check.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use donations_core::StatusPolicy;

use crate::storage::{DatabaseError, DonationRecord, DonationStore, NewDonation, STATUS_PENDING};

/// Maximum number of records a listing returns. Older records are not
/// reachable through the registry.
pub const LIST_LIMIT: i64 = 100;

/// Statuses whose amounts count as received money.
const SETTLED_STATUSES: &[&str] = &["confirmed", "completed"];

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No storage location was configured.
    #[error("Database not configured")]
    NotConfigured,

    #[error("Storage unavailable: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

/// Whether `from -> to` is a legal move under [`StatusPolicy::Guarded`].
///
/// `pending` may move to `confirmed` or `rejected`. Re-writing the current
/// status (to change only the notes) is always allowed.
pub fn allowed_transition(from: &str, to: &str) -> bool {
    from == to || (from == STATUS_PENDING && matches!(to, "confirmed" | "rejected"))
}

/// Every status from which `to` may be reached, per [`allowed_transition`].
fn allowed_sources(to: &str) -> Vec<&str> {
    let mut sources = vec![to];
    if to != STATUS_PENDING && allowed_transition(STATUS_PENDING, to) {
        sources.push(STATUS_PENDING);
    }
    sources
}

/// Aggregates shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DonationSummary {
    pub total: usize,
    pub pending: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Sum of amounts in settled statuses.
    pub revenue: i64,
}

impl DonationSummary {
    pub fn from_records(records: &[DonationRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            *summary.by_status.entry(record.status.clone()).or_default() += 1;
            if SETTLED_STATUSES.contains(&record.status.as_str()) {
                summary.revenue = summary.revenue.saturating_add(record.amount);
            }
        }
        summary.pending = summary.by_status.get(STATUS_PENDING).copied().unwrap_or(0);
        summary
    }
}

#[derive(Clone)]
pub struct DonationRegistry {
    store: Arc<dyn DonationStore>,
    policy: StatusPolicy,
}

impl DonationRegistry {
    pub fn new(store: Arc<dyn DonationStore>, policy: StatusPolicy) -> Self {
        Self { store, policy }
    }

    pub const fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// The most recent [`LIST_LIMIT`] records, newest first.
    #[instrument(skip(self), fields(op = "List"))]
    pub async fn list(&self) -> Result<Vec<DonationRecord>, RegistryError> {
        self.store
            .list_recent(LIST_LIMIT)
            .await
            .map_err(storage_failure)
    }

    /// Record a new pledge. The status is always `pending`.
    #[instrument(skip(self, donation), fields(op = "Create"))]
    pub async fn create(&self, donation: NewDonation) -> Result<i64, RegistryError> {
        let id = self
            .store
            .insert(&donation, STATUS_PENDING)
            .await
            .map_err(storage_failure)?;

        info!(
            id,
            player = %donation.player_nickname,
            package = %donation.package_name,
            amount = donation.amount,
            "Donation created"
        );
        Ok(id)
    }

    /// Set `status` and `notes` on a record.
    ///
    /// A missing `id` is not an error: nothing is written and the call
    /// succeeds.
    #[instrument(skip(self, notes), fields(op = "UpdateStatus"))]
    pub async fn update_status(
        &self,
        id: i64,
        status: &str,
        notes: &str,
    ) -> Result<(), RegistryError> {
        let touched = match self.policy {
            StatusPolicy::Open => self
                .store
                .update_status(id, status, notes)
                .await
                .map_err(storage_failure)?,
            StatusPolicy::Guarded => self.guarded_update(id, status, notes).await?,
        };

        if touched == 0 {
            warn!(id, "Status update matched no donation");
        } else {
            info!(id, status = %status, "Donation updated");
        }
        Ok(())
    }

    /// Conditional write: the store only touches the row while its status
    /// is still one `status` may be reached from. A zero-row result is then
    /// either a missing id (silent success) or a refused move.
    async fn guarded_update(
        &self,
        id: i64,
        status: &str,
        notes: &str,
    ) -> Result<u64, RegistryError> {
        let touched = self
            .store
            .update_status_from(id, &allowed_sources(status), status, notes)
            .await
            .map_err(storage_failure)?;
        if touched > 0 {
            return Ok(touched);
        }

        match self.store.get(id).await.map_err(storage_failure)? {
            None => Ok(0),
            Some(current) => {
                warn!(id, from = %current.status, to = %status, "Rejected status transition");
                Err(RegistryError::IllegalTransition {
                    from: current.status,
                    to: status.to_string(),
                })
            }
        }
    }

    /// Dashboard aggregates over the same window [`list`](Self::list) returns.
    #[instrument(skip(self), fields(op = "Summary"))]
    pub async fn summary(&self) -> Result<DonationSummary, RegistryError> {
        let records = self.list().await?;
        Ok(DonationSummary::from_records(&records))
    }
}

fn storage_failure(e: DatabaseError) -> RegistryError {
    error!(error = %e, "Storage operation failed");
    RegistryError::Storage(e)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::storage::DonationDatabase;

    async fn registry(policy: StatusPolicy) -> DonationRegistry {
        let db = DonationDatabase::open_in_memory().await.unwrap();
        DonationRegistry::new(Arc::new(db), policy)
    }

    fn pledge(nickname: &str, amount: i64) -> NewDonation {
        NewDonation {
            player_nickname: nickname.into(),
            package_name: "Gold".into(),
            amount,
            phone: "+70000000000".into(),
        }
    }

    fn record(status: &str, amount: i64) -> DonationRecord {
        DonationRecord {
            id: 0,
            player_nickname: String::new(),
            package_name: String::new(),
            amount,
            status: status.into(),
            phone: String::new(),
            notes: String::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// A store whose every call fails, recording how often it was hit.
    #[derive(Default)]
    struct FailingStore {
        calls: Mutex<usize>,
    }

    impl FailingStore {
        fn fail(&self) -> DatabaseError {
            *self.calls.lock().unwrap() += 1;
            DatabaseError::Connection("connection refused".into())
        }
    }

    #[async_trait]
    impl DonationStore for FailingStore {
        async fn list_recent(&self, _: i64) -> Result<Vec<DonationRecord>, DatabaseError> {
            Err(self.fail())
        }
        async fn insert(&self, _: &NewDonation, _: &str) -> Result<i64, DatabaseError> {
            Err(self.fail())
        }
        async fn update_status(&self, _: i64, _: &str, _: &str) -> Result<u64, DatabaseError> {
            Err(self.fail())
        }
        async fn update_status_from(
            &self,
            _: i64,
            _: &[&str],
            _: &str,
            _: &str,
        ) -> Result<u64, DatabaseError> {
            Err(self.fail())
        }
        async fn get(&self, _: i64) -> Result<Option<DonationRecord>, DatabaseError> {
            Err(self.fail())
        }
    }

    #[tokio::test]
    async fn example_lifecycle() {
        let registry = registry(StatusPolicy::Open).await;

        let id = registry.create(pledge("Rex", 300)).await.unwrap();
        assert_eq!(id, 1);

        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, "pending");

        registry
            .update_status(id, "confirmed", "paid via SBP")
            .await
            .unwrap();

        let listed = registry.list().await.unwrap();
        assert_eq!(listed[0].status, "confirmed");
        assert_eq!(listed[0].notes, "paid via SBP");
    }

    #[tokio::test]
    async fn list_caps_at_one_hundred() {
        let registry = registry(StatusPolicy::Open).await;
        for i in 0..105 {
            registry.create(pledge(&format!("p{i}"), i)).await.unwrap();
        }

        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 100);
        assert_eq!(listed[0].player_nickname, "p104");
        assert_eq!(listed[99].player_nickname, "p5");
    }

    #[tokio::test]
    async fn open_policy_allows_any_transition() {
        let registry = registry(StatusPolicy::Open).await;
        let id = registry.create(pledge("Rex", 300)).await.unwrap();

        registry.update_status(id, "rejected", "").await.unwrap();
        registry.update_status(id, "pending", "").await.unwrap();
        registry.update_status(id, "whatever", "n").await.unwrap();

        let listed = registry.list().await.unwrap();
        assert_eq!(listed[0].status, "whatever");
    }

    #[tokio::test]
    async fn missing_id_is_silent_success() {
        let registry = registry(StatusPolicy::Open).await;
        let id = registry.create(pledge("Rex", 300)).await.unwrap();
        let before = registry.list().await.unwrap();

        registry.update_status(id + 1, "confirmed", "").await.unwrap();

        assert_eq!(registry.list().await.unwrap(), before);
    }

    #[tokio::test]
    async fn guarded_policy_rejects_illegal_moves() {
        let registry = registry(StatusPolicy::Guarded).await;
        let id = registry.create(pledge("Rex", 300)).await.unwrap();

        registry.update_status(id, "rejected", "no payment").await.unwrap();
        let err = registry.update_status(id, "pending", "").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::IllegalTransition { ref from, ref to } if from == "rejected" && to == "pending"
        ));

        // Notes can still be edited without changing status.
        registry.update_status(id, "rejected", "refunded").await.unwrap();
        let listed = registry.list().await.unwrap();
        assert_eq!(listed[0].status, "rejected");
        assert_eq!(listed[0].notes, "refunded");
    }

    /// Commits another admin's `pending -> confirmed` just before its own
    /// conditional write runs, the way a concurrent request would.
    struct InterleavingStore {
        inner: DonationDatabase,
    }

    #[async_trait]
    impl DonationStore for InterleavingStore {
        async fn list_recent(&self, limit: i64) -> Result<Vec<DonationRecord>, DatabaseError> {
            self.inner.list_recent(limit).await
        }
        async fn insert(&self, d: &NewDonation, status: &str) -> Result<i64, DatabaseError> {
            self.inner.insert(d, status).await
        }
        async fn update_status(&self, id: i64, status: &str, notes: &str) -> Result<u64, DatabaseError> {
            self.inner.update_status(id, status, notes).await
        }
        async fn update_status_from(
            &self,
            id: i64,
            from: &[&str],
            status: &str,
            notes: &str,
        ) -> Result<u64, DatabaseError> {
            self.inner.update_status(id, "confirmed", "other admin").await?;
            self.inner.update_status_from(id, from, status, notes).await
        }
        async fn get(&self, id: i64) -> Result<Option<DonationRecord>, DatabaseError> {
            self.inner.get(id).await
        }
    }

    #[tokio::test]
    async fn guarded_policy_holds_under_concurrent_confirm() {
        let db = DonationDatabase::open_in_memory().await.unwrap();
        let id = db.insert(&pledge("Rex", 300), STATUS_PENDING).await.unwrap();
        let registry = DonationRegistry::new(
            Arc::new(InterleavingStore { inner: db.clone() }),
            StatusPolicy::Guarded,
        );

        let err = registry.update_status(id, "rejected", "").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::IllegalTransition { ref from, ref to } if from == "confirmed" && to == "rejected"
        ));

        let record = db.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, "confirmed");
        assert_eq!(record.notes, "other admin");
    }

    #[test]
    fn allowed_sources_follow_transition_table() {
        assert_eq!(allowed_sources("confirmed"), ["confirmed", "pending"]);
        assert_eq!(allowed_sources("rejected"), ["rejected", "pending"]);
        assert_eq!(allowed_sources("pending"), ["pending"]);
        assert_eq!(allowed_sources("completed"), ["completed"]);
    }

    #[tokio::test]
    async fn guarded_policy_missing_id_is_silent_success() {
        let registry = registry(StatusPolicy::Guarded).await;
        registry.update_status(7, "confirmed", "").await.unwrap();
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failures_surface() {
        let store = Arc::new(FailingStore::default());
        let registry = DonationRegistry::new(store.clone(), StatusPolicy::Open);

        assert!(matches!(registry.list().await, Err(RegistryError::Storage(_))));
        assert!(matches!(
            registry.create(NewDonation::default()).await,
            Err(RegistryError::Storage(_))
        ));
        assert!(matches!(
            registry.update_status(1, "confirmed", "").await,
            Err(RegistryError::Storage(_))
        ));
        assert_eq!(*store.calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn summary_counts_and_revenue() {
        let registry = registry(StatusPolicy::Open).await;
        let a = registry.create(pledge("a", 100)).await.unwrap();
        let b = registry.create(pledge("b", 250)).await.unwrap();
        registry.create(pledge("c", 999)).await.unwrap();
        registry.update_status(a, "confirmed", "").await.unwrap();
        registry.update_status(b, "completed", "").await.unwrap();

        let summary = registry.summary().await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.revenue, 350);
        assert_eq!(summary.by_status.get("confirmed"), Some(&1));
    }

    #[test]
    fn summary_ignores_unsettled_amounts() {
        let summary = DonationSummary::from_records(&[
            record("pending", 10),
            record("rejected", 20),
            record("cancelled", 30),
        ]);
        assert_eq!(summary.revenue, 0);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 1);
    }

    #[test]
    fn transition_table() {
        assert!(allowed_transition("pending", "confirmed"));
        assert!(allowed_transition("pending", "rejected"));
        assert!(allowed_transition("confirmed", "confirmed"));
        assert!(!allowed_transition("confirmed", "rejected"));
        assert!(!allowed_transition("rejected", "pending"));
        assert!(!allowed_transition("pending", "completed"));
    }
}
