//! Transport-neutral request/response envelope and operation dispatch.
//!
//! The hosting layer (see [`crate::routes`]) turns whatever arrived on the
//! wire into an [`ApiRequest`] and serialises the [`ApiResponse`] it gets
//! back. Missing or mistyped body fields are coerced to defaults, never
//! rejected.

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use tracing::debug;

use donations_core::PaymentReferenceFormatter;

use crate::registry::{DonationRegistry, RegistryError};
use crate::storage::NewDonation;

/// Operation requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// CORS preflight; never touches storage.
    Options,
    ListRecords,
    CreateRecord,
    UpdateRecord,
    ReadPaymentRef,
    ReadSummary,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: HashMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The body as an object; anything else reads as empty.
    fn body_fields(&self) -> Map<String, Value> {
        match &self.body {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// `None` means an empty body.
    pub body: Option<Value>,
}

impl ApiResponse {
    pub const fn empty() -> Self {
        Self {
            status: 200,
            body: None,
        }
    }

    pub const fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }
}

/// Failures as the caller sees them.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    UnsupportedMethod,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ApiError {
    pub const fn status(&self) -> u16 {
        match self {
            Self::UnsupportedMethod => 405,
            Self::Registry(RegistryError::IllegalTransition { .. }) => 409,
            Self::Registry(RegistryError::NotConfigured | RegistryError::Storage(_)) => 500,
        }
    }

    /// Message returned to the caller. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Registry(RegistryError::Storage(_)) => "Storage unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ApiError> for ApiResponse {
    fn from(e: ApiError) -> Self {
        Self::json(e.status(), json!({ "error": e.public_message() }))
    }
}

/// Routes [`ApiRequest`]s to the registry or the payment formatter.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Option<DonationRegistry>,
    formatter: PaymentReferenceFormatter,
}

impl Dispatcher {
    /// `registry` is `None` when no storage location is configured.
    pub const fn new(
        registry: Option<DonationRegistry>,
        formatter: PaymentReferenceFormatter,
    ) -> Self {
        Self {
            registry,
            formatter,
        }
    }

    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        debug!(method = ?request.method, "Dispatching request");
        match self.dispatch(&request).await {
            Ok(response) => response,
            Err(e) => e.into(),
        }
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        match request.method {
            Method::Options => return Ok(ApiResponse::empty()),
            Method::ReadPaymentRef => return Ok(self.payment_reference(request)),
            Method::Other(_) => return Err(ApiError::UnsupportedMethod),
            _ => {}
        }

        let registry = self
            .registry
            .as_ref()
            .ok_or(RegistryError::NotConfigured)?;

        match request.method {
            Method::ListRecords => {
                let donations = registry.list().await?;
                Ok(ApiResponse::json(200, json!({ "donations": donations })))
            }
            Method::CreateRecord => {
                let id = registry.create(new_donation(&request.body_fields())).await?;
                Ok(ApiResponse::json(
                    201,
                    json!({
                        "success": true,
                        "id": id,
                        "message": "Donation created successfully",
                    }),
                ))
            }
            Method::UpdateRecord => {
                let fields = request.body_fields();
                registry
                    .update_status(
                        id_field(&fields),
                        &text_field(&fields, "status"),
                        &text_field(&fields, "notes"),
                    )
                    .await?;
                Ok(ApiResponse::json(
                    200,
                    json!({ "success": true, "message": "Donation updated" }),
                ))
            }
            Method::ReadSummary => {
                let summary = registry.summary().await?;
                Ok(ApiResponse::json(200, json!(summary)))
            }
            Method::Options | Method::ReadPaymentRef | Method::Other(_) => {
                Err(ApiError::UnsupportedMethod)
            }
        }
    }

    fn payment_reference(&self, request: &ApiRequest) -> ApiResponse {
        let amount = request.query.get("amount").map(String::as_str);
        let package = request.query.get("package").map(String::as_str);
        let reference = self.formatter.format(amount, package);
        ApiResponse::json(200, json!(reference))
    }
}

fn new_donation(fields: &Map<String, Value>) -> NewDonation {
    NewDonation {
        player_nickname: text_field(fields, "player_nickname"),
        package_name: text_field(fields, "package_name"),
        amount: amount_field(fields),
        phone: text_field(fields, "phone"),
    }
}

/// Strings as-is, numbers and booleans rendered, anything else empty.
fn text_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        _ => String::new(),
    }
}

/// Whole-unit amount: integers as-is, fractions rounded, numeric strings
/// parsed; anything else is 0.
#[allow(clippy::cast_possible_truncation)]
fn amount_field(fields: &Map<String, Value>) -> i64 {
    match fields.get("amount") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.round() as i64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Record id; a missing or unusable id becomes 0, which matches no row.
fn id_field(fields: &Map<String, Value>) -> i64 {
    match fields.get("id") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
