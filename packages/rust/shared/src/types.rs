//! Core domain records for the vehicle-service backend.
//!
//! Every persisted entity comes as a pair: the stored record carrying its
//! `id`, and a `New*` payload used for both inserts and full-field updates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Status assigned to orders created from a chat message.
pub const STATUS_OPEN: &str = "open";

// ---------------------------------------------------------------------------
// Customer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

// ---------------------------------------------------------------------------
// Vehicle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub customer_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub customer_id: i64,
}

// ---------------------------------------------------------------------------
// Workshop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workshop {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkshop {
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
}

/// A workshop together with the number of service orders assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkshopSummary {
    #[serde(flatten)]
    pub workshop: Workshop,
    pub order_count: usize,
}

// ---------------------------------------------------------------------------
// ServiceOrder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: i64,
    pub description: String,
    pub status: String,
    pub created_on: NaiveDate,
    pub vehicle_id: i64,
    pub workshop_id: i64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewServiceOrder {
    pub description: String,
    pub status: String,
    pub vehicle_id: i64,
    pub workshop_id: i64,
    /// Defaults to today when omitted.
    #[serde(default)]
    pub created_on: Option<NaiveDate>,
    #[serde(default)]
    pub cost: f64,
}

// ---------------------------------------------------------------------------
// AgentInteraction
// ---------------------------------------------------------------------------

/// One logged exchange between a user message and an AI-generated reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInteraction {
    pub id: i64,
    pub message: String,
    pub reply: String,
    pub created_on: NaiveDate,
    /// Set when the message led to a new service order.
    pub order_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_defaults_date_and_cost() {
        let json = r#"{"description":"Ölwechsel","status":"open","vehicle_id":1,"workshop_id":2}"#;
        let order: NewServiceOrder = serde_json::from_str(json).unwrap();
        assert!(order.created_on.is_none());
        assert_eq!(order.cost, 0.0);
    }

    #[test]
    fn workshop_summary_flattens_workshop() {
        let summary = WorkshopSummary {
            workshop: Workshop {
                id: 1,
                name: "Meister Auto".into(),
                address: "Hauptstraße 123".into(),
                postal_code: "10115".into(),
                city: "Berlin".into(),
            },
            order_count: 2,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["name"], "Meister Auto");
        assert_eq!(json["order_count"], 2);
    }
}
