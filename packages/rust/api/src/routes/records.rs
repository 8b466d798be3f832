//! CRUD routes for customers, vehicles, workshops, orders and the
//! interaction log.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use autoservice_shared::{
    AgentInteraction, AutoserviceError, Customer, NewCustomer, NewServiceOrder, NewVehicle,
    NewWorkshop, ServiceOrder, Vehicle, Workshop,
};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiResult;

#[derive(Debug, Serialize)]
struct DeletedResponse {
    message: String,
}

fn deleted(entity: &str, id: i64) -> Json<DeletedResponse> {
    Json(DeletedResponse {
        message: format!("{entity} {id} deleted"),
    })
}

/// Reject blank required text fields.
fn require(field: &str, value: &str) -> Result<(), AutoserviceError> {
    if value.trim().is_empty() {
        return Err(AutoserviceError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/customers/{id}/vehicles", get(customer_vehicles))
        .route("/vehicles", get(list_vehicles).post(create_vehicle))
        .route(
            "/vehicles/{id}",
            get(get_vehicle).put(update_vehicle).delete(delete_vehicle),
        )
        .route("/vehicles/{id}/orders", get(vehicle_orders))
        .route("/workshops", get(list_workshops).post(create_workshop))
        .route(
            "/workshops/{id}",
            get(get_workshop).put(update_workshop).delete(delete_workshop),
        )
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/orders/status/{status}", get(orders_by_status))
        .route("/interactions", get(list_interactions))
}

// ============================================================================
// Customers
// ============================================================================

fn validate_customer(body: &NewCustomer) -> Result<(), AutoserviceError> {
    require("name", &body.name)?;
    require("email", &body.email)
}

async fn list_customers(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.db().await?.list_customers().await?))
}

async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Customer>> {
    let customer = state
        .db()
        .await?
        .get_customer(id)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("customer", id))?;
    Ok(Json(customer))
}

async fn create_customer(
    State(state): State<AppState>,
    Json(body): Json<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    validate_customer(&body)?;
    let created = state.db().await?.insert_customer(&body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewCustomer>,
) -> ApiResult<Json<Customer>> {
    validate_customer(&body)?;
    let updated = state
        .db()
        .await?
        .update_customer(id, &body)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("customer", id))?;
    Ok(Json(updated))
}

async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeletedResponse>> {
    if !state.db().await?.delete_customer(id).await? {
        return Err(AutoserviceError::not_found("customer", id).into());
    }
    Ok(deleted("customer", id))
}

async fn customer_vehicles(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Vehicle>>> {
    let db = state.db().await?;
    if db.get_customer(id).await?.is_none() {
        return Err(AutoserviceError::not_found("customer", id).into());
    }
    Ok(Json(db.list_vehicles_by_customer(id).await?))
}

// ============================================================================
// Vehicles
// ============================================================================

fn validate_vehicle(body: &NewVehicle) -> Result<(), AutoserviceError> {
    require("make", &body.make)?;
    require("model", &body.model)
}

async fn list_vehicles(State(state): State<AppState>) -> ApiResult<Json<Vec<Vehicle>>> {
    Ok(Json(state.db().await?.list_vehicles().await?))
}

async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vehicle>> {
    let vehicle = state
        .db()
        .await?
        .get_vehicle(id)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("vehicle", id))?;
    Ok(Json(vehicle))
}

async fn create_vehicle(
    State(state): State<AppState>,
    Json(body): Json<NewVehicle>,
) -> ApiResult<(StatusCode, Json<Vehicle>)> {
    validate_vehicle(&body)?;
    let created = state.db().await?.insert_vehicle(&body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewVehicle>,
) -> ApiResult<Json<Vehicle>> {
    validate_vehicle(&body)?;
    let updated = state
        .db()
        .await?
        .update_vehicle(id, &body)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("vehicle", id))?;
    Ok(Json(updated))
}

async fn delete_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeletedResponse>> {
    if !state.db().await?.delete_vehicle(id).await? {
        return Err(AutoserviceError::not_found("vehicle", id).into());
    }
    Ok(deleted("vehicle", id))
}

async fn vehicle_orders(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<ServiceOrder>>> {
    let db = state.db().await?;
    if db.get_vehicle(id).await?.is_none() {
        return Err(AutoserviceError::not_found("vehicle", id).into());
    }
    Ok(Json(db.list_orders_by_vehicle(id).await?))
}

// ============================================================================
// Workshops
// ============================================================================

fn validate_workshop(body: &NewWorkshop) -> Result<(), AutoserviceError> {
    require("name", &body.name)?;
    require("city", &body.city)
}

async fn list_workshops(State(state): State<AppState>) -> ApiResult<Json<Vec<Workshop>>> {
    Ok(Json(state.db().await?.list_workshops().await?))
}

async fn get_workshop(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Workshop>> {
    let workshop = state
        .db()
        .await?
        .get_workshop(id)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("workshop", id))?;
    Ok(Json(workshop))
}

async fn create_workshop(
    State(state): State<AppState>,
    Json(body): Json<NewWorkshop>,
) -> ApiResult<(StatusCode, Json<Workshop>)> {
    validate_workshop(&body)?;
    let created = state.db().await?.insert_workshop(&body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_workshop(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewWorkshop>,
) -> ApiResult<Json<Workshop>> {
    validate_workshop(&body)?;
    let updated = state
        .db()
        .await?
        .update_workshop(id, &body)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("workshop", id))?;
    Ok(Json(updated))
}

async fn delete_workshop(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeletedResponse>> {
    if !state.db().await?.delete_workshop(id).await? {
        return Err(AutoserviceError::not_found("workshop", id).into());
    }
    Ok(deleted("workshop", id))
}

// ============================================================================
// Service orders
// ============================================================================

fn validate_order(body: &NewServiceOrder) -> Result<(), AutoserviceError> {
    require("description", &body.description)?;
    require("status", &body.status)?;
    if body.cost < 0.0 {
        return Err(AutoserviceError::validation("cost must not be negative"));
    }
    Ok(())
}

async fn list_orders(State(state): State<AppState>) -> ApiResult<Json<Vec<ServiceOrder>>> {
    Ok(Json(state.db().await?.list_orders().await?))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ServiceOrder>> {
    let order = state
        .db()
        .await?
        .get_order(id)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("order", id))?;
    Ok(Json(order))
}

async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<NewServiceOrder>,
) -> ApiResult<(StatusCode, Json<ServiceOrder>)> {
    validate_order(&body)?;
    let created = state.db().await?.insert_order(&body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewServiceOrder>,
) -> ApiResult<Json<ServiceOrder>> {
    validate_order(&body)?;
    let updated = state
        .db()
        .await?
        .update_order(id, &body)
        .await?
        .ok_or_else(|| AutoserviceError::not_found("order", id))?;
    Ok(Json(updated))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeletedResponse>> {
    if !state.db().await?.delete_order(id).await? {
        return Err(AutoserviceError::not_found("order", id).into());
    }
    Ok(deleted("order", id))
}

async fn orders_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> ApiResult<Json<Vec<ServiceOrder>>> {
    Ok(Json(state.db().await?.list_orders_by_status(&status).await?))
}

// ============================================================================
// Interaction log
// ============================================================================

async fn list_interactions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AgentInteraction>>> {
    Ok(Json(state.db().await?.list_interactions().await?))
}
