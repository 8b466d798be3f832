//! Order intake: turn a customer message into a service order.

use autoservice_shared::{
    AgentInteraction, AutoserviceError, NewServiceOrder, Result, STATUS_OPEN,
};
use autoservice_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Reply stored when the message names neither a vehicle nor a customer.
pub const MISSING_ID_REPLY: &str =
    "Danke für Ihre Nachricht. Bitte geben Sie mindestens eine Fahrzeug- oder Kunden-ID an.";

/// An order request in free text, with optional record ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderIntakeRequest {
    pub message: String,
    #[serde(default)]
    pub workshop_id: Option<i64>,
    #[serde(default)]
    pub vehicle_id: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<i64>,
}

/// Create an order from `request` and log the exchange.
///
/// - no workshop id: the first workshop is assigned
/// - neither vehicle nor customer id: no order, the reply asks for one
/// - customer id only: the customer's first vehicle is used
///
/// Every successful call records exactly one interaction.
#[instrument(skip_all, fields(
    workshop_id = ?request.workshop_id,
    vehicle_id = ?request.vehicle_id,
    customer_id = ?request.customer_id,
))]
pub async fn intake_order(
    storage: &Storage,
    request: &OrderIntakeRequest,
) -> Result<AgentInteraction> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AutoserviceError::validation("message must not be empty"));
    }

    if request.vehicle_id.is_none() && request.customer_id.is_none() {
        info!("no vehicle or customer id, asking for one");
        return storage.insert_interaction(message, MISSING_ID_REPLY, None).await;
    }

    let workshop_id = resolve_workshop(storage, request.workshop_id).await?;
    let vehicle_id = resolve_vehicle(storage, request.vehicle_id, request.customer_id).await?;

    let order = storage
        .insert_order(&NewServiceOrder {
            description: message.to_string(),
            status: STATUS_OPEN.to_string(),
            vehicle_id,
            workshop_id,
            created_on: None,
            cost: 0.0,
        })
        .await?;

    let reply = format!(
        "Ihr Auftrag wurde erstellt (ID {}). Wir haben Werkstatt-ID {} zugewiesen.",
        order.id, workshop_id
    );
    info!(order_id = order.id, workshop_id, vehicle_id, "order created from message");
    storage.insert_interaction(message, &reply, Some(order.id)).await
}

async fn resolve_workshop(storage: &Storage, requested: Option<i64>) -> Result<i64> {
    match requested {
        Some(id) => storage
            .get_workshop(id)
            .await?
            .map(|w| w.id)
            .ok_or_else(|| AutoserviceError::not_found("workshop", id)),
        None => storage
            .first_workshop()
            .await?
            .map(|w| w.id)
            .ok_or_else(|| AutoserviceError::validation("no workshop available to assign")),
    }
}

async fn resolve_vehicle(
    storage: &Storage,
    vehicle_id: Option<i64>,
    customer_id: Option<i64>,
) -> Result<i64> {
    if let Some(id) = vehicle_id {
        return storage
            .get_vehicle(id)
            .await?
            .map(|v| v.id)
            .ok_or_else(|| AutoserviceError::not_found("vehicle", id));
    }

    let Some(customer_id) = customer_id else {
        return Err(AutoserviceError::validation("vehicle or customer id required"));
    };
    if storage.get_customer(customer_id).await?.is_none() {
        return Err(AutoserviceError::not_found("customer", customer_id));
    }
    storage
        .list_vehicles_by_customer(customer_id)
        .await?
        .into_iter()
        .next()
        .map(|v| v.id)
        .ok_or_else(|| {
            AutoserviceError::validation(format!("customer {customer_id} has no vehicle on record"))
        })
}
