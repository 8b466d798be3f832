//! Demo data for a fresh database.

use autoservice_shared::{
    AutoserviceError, NewCustomer, NewServiceOrder, NewVehicle, NewWorkshop, Result,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::Storage;

/// Counts of rows inserted by [`Storage::seed_demo_data`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub customers: usize,
    pub vehicles: usize,
    pub workshops: usize,
    pub orders: usize,
}

impl SeedReport {
    pub fn is_empty(&self) -> bool {
        self.customers == 0 && self.vehicles == 0 && self.workshops == 0 && self.orders == 0
    }
}

const CUSTOMERS: &[(&str, &str, &str)] = &[
    ("Max Mustermann", "max@example.com", "+49 123 456789"),
    ("Anna Schmidt", "anna@example.com", "+49 987 654321"),
    ("Peter Müller", "peter@example.com", "+49 555 123456"),
];

/// (make, model, year, customer index)
const VEHICLES: &[(&str, &str, i32, usize)] = &[
    ("BMW", "3er", 2020, 0),
    ("Mercedes", "C-Klasse", 2019, 0),
    ("VW", "Golf", 2021, 1),
    ("Audi", "A4", 2022, 2),
];

const WORKSHOPS: &[(&str, &str, &str, &str)] = &[
    ("Meister Auto", "Hauptstraße 123", "10115", "Berlin"),
    ("KFZ Profis", "Musterweg 45", "80331", "München"),
    ("Auto Service Plus", "Parkstraße 78", "20095", "Hamburg"),
];

/// (description, status, (y, m, d), vehicle index, workshop index, cost)
const ORDERS: &[(&str, &str, (i32, u32, u32), usize, usize, f64)] = &[
    ("Ölwechsel und Inspektion", "open", (2024, 11, 1), 0, 0, 150.00),
    ("Bremsen wechseln", "in_progress", (2024, 11, 5), 1, 0, 320.50),
    ("TÜV-Vorbereitung", "closed", (2024, 10, 20), 2, 1, 89.90),
    ("Reifen wechseln", "open", (2024, 11, 8), 3, 2, 200.00),
];

impl Storage {
    /// Fill an empty database with demo customers, vehicles, workshops and
    /// orders. Does nothing when any customer or workshop already exists.
    ///
    /// All rows go in within one transaction; a failure leaves the database
    /// empty.
    pub async fn seed_demo_data(&self) -> Result<SeedReport> {
        self.check_writable()?;

        if !self.list_customers().await?.is_empty() || !self.list_workshops().await?.is_empty() {
            info!("database already populated, skipping demo data");
            return Ok(SeedReport::default());
        }

        self.conn
            .execute_batch("BEGIN")
            .await
            .map_err(AutoserviceError::storage)?;

        let report = match self.insert_demo_rows().await {
            Ok(report) => report,
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK").await {
                    warn!(error = %rollback, "rollback of demo data failed");
                }
                return Err(e);
            }
        };

        self.conn
            .execute_batch("COMMIT")
            .await
            .map_err(AutoserviceError::storage)?;

        info!(
            customers = report.customers,
            vehicles = report.vehicles,
            workshops = report.workshops,
            orders = report.orders,
            "demo data inserted"
        );
        Ok(report)
    }

    async fn insert_demo_rows(&self) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
        for (name, email, phone) in CUSTOMERS {
            let customer = self
                .insert_customer(&NewCustomer {
                    name: (*name).into(),
                    email: (*email).into(),
                    phone: (*phone).into(),
                })
                .await?;
            customer_ids.push(customer.id);
            report.customers += 1;
        }

        let mut vehicle_ids = Vec::with_capacity(VEHICLES.len());
        for (make, model, year, owner) in VEHICLES {
            let vehicle = self
                .insert_vehicle(&NewVehicle {
                    make: (*make).into(),
                    model: (*model).into(),
                    year: *year,
                    customer_id: customer_ids[*owner],
                })
                .await?;
            vehicle_ids.push(vehicle.id);
            report.vehicles += 1;
        }

        let mut workshop_ids = Vec::with_capacity(WORKSHOPS.len());
        for (name, address, postal_code, city) in WORKSHOPS {
            let workshop = self
                .insert_workshop(&NewWorkshop {
                    name: (*name).into(),
                    address: (*address).into(),
                    postal_code: (*postal_code).into(),
                    city: (*city).into(),
                })
                .await?;
            workshop_ids.push(workshop.id);
            report.workshops += 1;
        }

        for (description, status, (y, m, d), vehicle, workshop, cost) in ORDERS {
            self.insert_order(&NewServiceOrder {
                description: (*description).into(),
                status: (*status).into(),
                vehicle_id: vehicle_ids[*vehicle],
                workshop_id: workshop_ids[*workshop],
                created_on: NaiveDate::from_ymd_opt(*y, *m, *d),
                cost: *cost,
            })
            .await?;
            report.orders += 1;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::test_storage;

    #[tokio::test]
    async fn seeds_empty_database_once() {
        let storage = test_storage().await;

        let first = storage.seed_demo_data().await.unwrap();
        assert_eq!(first.customers, 3);
        assert_eq!(first.vehicles, 4);
        assert_eq!(first.workshops, 3);
        assert_eq!(first.orders, 4);

        let second = storage.seed_demo_data().await.unwrap();
        assert!(second.is_empty());
        assert_eq!(storage.list_customers().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn seeded_counts_match_orders() {
        let storage = test_storage().await;
        storage.seed_demo_data().await.unwrap();

        let summaries = storage.list_workshops_with_order_counts().await.unwrap();
        let counts: Vec<(String, usize)> = summaries
            .into_iter()
            .map(|s| (s.workshop.city, s.order_count))
            .collect();
        assert_eq!(
            counts,
            vec![
                ("Berlin".to_string(), 2),
                ("München".to_string(), 1),
                ("Hamburg".to_string(), 1),
            ]
        );

        let open = storage.list_orders_by_status("OPEN").await.unwrap();
        assert_eq!(open.len(), 2);
    }

    #[tokio::test]
    async fn failed_seed_leaves_database_empty() {
        let storage = test_storage().await;
        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_orders BEFORE INSERT ON service_orders
                 BEGIN SELECT RAISE(ABORT, 'orders rejected'); END;",
            )
            .await
            .unwrap();

        assert!(storage.seed_demo_data().await.is_err());
        assert!(storage.list_customers().await.unwrap().is_empty());
        assert!(storage.list_vehicles().await.unwrap().is_empty());
        assert!(storage.list_workshops().await.unwrap().is_empty());

        storage
            .conn
            .execute_batch("DROP TRIGGER reject_orders;")
            .await
            .unwrap();
        let report = storage.seed_demo_data().await.unwrap();
        assert_eq!(report.orders, 4);
    }
}
