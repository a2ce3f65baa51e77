//! HTTP surface: maps axum requests onto the [`Dispatcher`].

use std::collections::HashMap;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderName, Method as HttpMethod, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::any;
use tower_http::cors::{Any, CorsLayer};

use crate::envelope::{ApiRequest, ApiResponse, Dispatcher, Method};

const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Build the application router.
///
/// The admin routes and the public payment route carry separate CORS
/// policies. `/sbp-payment` only answers reads, so its preflight offers
/// GET and OPTIONS with `Content-Type`.
pub fn build_router(dispatcher: Dispatcher) -> Router {
    let admin = Router::new()
        .route("/donations", any(donations))
        .route("/donations/summary", any(summary))
        .layer(admin_cors_layer());
    let payment = Router::new()
        .route("/sbp-payment", any(sbp_payment))
        .layer(payment_cors_layer());

    admin.merge(payment).with_state(dispatcher)
}

fn admin_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            HttpMethod::GET,
            HttpMethod::POST,
            HttpMethod::PUT,
            HttpMethod::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-admin-token")])
        .max_age(CORS_MAX_AGE)
}

fn payment_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([HttpMethod::GET, HttpMethod::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(CORS_MAX_AGE)
}

/// `/donations`: list (GET), create (POST), update (PUT).
async fn donations(
    State(dispatcher): State<Dispatcher>,
    method: HttpMethod,
    body: Bytes,
) -> Response {
    let method = match method {
        HttpMethod::GET => Method::ListRecords,
        HttpMethod::POST => Method::CreateRecord,
        HttpMethod::PUT => Method::UpdateRecord,
        other => non_read_method(&other),
    };
    let mut request = ApiRequest::new(method);
    request.body = parse_body(&body);
    into_response(dispatcher.handle(request).await)
}

/// `GET /donations/summary`: dashboard aggregates.
async fn summary(State(dispatcher): State<Dispatcher>, method: HttpMethod) -> Response {
    let method = match method {
        HttpMethod::GET => Method::ReadSummary,
        other => non_read_method(&other),
    };
    into_response(dispatcher.handle(ApiRequest::new(method)).await)
}

/// `GET /sbp-payment?amount=&package=`: transfer reference.
async fn sbp_payment(
    State(dispatcher): State<Dispatcher>,
    method: HttpMethod,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let method = match method {
        HttpMethod::GET => Method::ReadPaymentRef,
        other => non_read_method(&other),
    };
    let request = ApiRequest::new(method).with_query(query);
    into_response(dispatcher.handle(request).await)
}

fn non_read_method(method: &HttpMethod) -> Method {
    if *method == HttpMethod::OPTIONS {
        Method::Options
    } else {
        Method::Other(method.to_string())
    }
}

/// Empty or malformed bodies read as absent.
fn parse_body(body: &[u8]) -> Option<serde_json::Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body).ok()
}

fn into_response(response: ApiResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match response.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    }
}
