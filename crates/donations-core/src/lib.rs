//! Donations Core Library
//!
//! Shared functionality for the donations service:
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers and storage errors
//! - SBP payment reference formatting
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod payment;
pub mod tracing_init;

pub use config::{Config, PaymentConfig, StatusPolicy};
pub use error::{Error, Result};
pub use payment::{PaymentReference, PaymentReferenceFormatter};
