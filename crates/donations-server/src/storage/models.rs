//! Data models for donation storage.

use serde::{Deserialize, Serialize};

/// Status every new pledge starts in.
pub const STATUS_PENDING: &str = "pending";

/// One pledge. Timestamps are Unix milliseconds set by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DonationRecord {
    pub id: i64,
    pub player_nickname: String,
    pub package_name: String,
    pub amount: i64,
    pub status: String,
    pub phone: String,
    pub notes: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Caller-supplied fields of a new pledge. Status is not caller-controlled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewDonation {
    pub player_nickname: String,
    pub package_name: String,
    pub amount: i64,
    pub phone: String,
}
