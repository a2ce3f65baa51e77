//! Donations Server Library
//!
//! Core functionality for the donations service:
//! - `SQLite` storage for donation records
//! - Donation registry (list, create, status updates, summary)
//! - Request envelope dispatch
//! - HTTP routes with CORS

pub mod envelope;
pub mod registry;
pub mod routes;
pub mod storage;

pub use envelope::{ApiRequest, ApiResponse, Dispatcher, Method};
pub use registry::{DonationRegistry, RegistryError};
