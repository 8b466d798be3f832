//! libSQL storage layer for the vehicle-service backend.
//!
//! The [`Storage`] struct wraps a libSQL database holding customers, vehicles,
//! workshops, service orders, and the agent interaction log.
//!
//! **Access rules:**
//! - HTTP handlers and the CLI: read-write via [`Storage::open`] / [`Storage::connect`]
//! - Workshop agent: read-only via [`Storage::connect_readonly`], opened per workshop lookup

mod migrations;
mod seed;

use std::path::Path;
use std::sync::Arc;

use autoservice_shared::{
    AgentInteraction, AutoserviceError, Customer, NewCustomer, NewServiceOrder, NewVehicle,
    NewWorkshop, Result, ServiceOrder, Vehicle, Workshop, WorkshopSummary,
};
use chrono::{NaiveDate, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Database, Row, params};

pub use seed::SeedReport;

/// Date format used for every `*_on` column.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Primary storage handle wrapping a libSQL database connection.
///
/// Handles are cheap: [`Storage::connect`] opens another connection on the
/// same database, and dropping a handle releases its connection.
pub struct Storage {
    db: Arc<Database>,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| AutoserviceError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(AutoserviceError::storage)?;

        let conn = db.connect().map_err(AutoserviceError::storage)?;
        enable_foreign_keys(&conn).await?;

        let storage = Self {
            db: Arc::new(db),
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a fresh read-write handle on the same database.
    pub async fn connect(&self) -> Result<Self> {
        self.scoped(false).await
    }

    /// Open a fresh handle on the same database that rejects every write.
    pub async fn connect_readonly(&self) -> Result<Self> {
        self.scoped(true).await
    }

    async fn scoped(&self, readonly: bool) -> Result<Self> {
        let conn = self.db.connect().map_err(AutoserviceError::storage)?;
        enable_foreign_keys(&conn).await?;
        Ok(Self {
            db: Arc::clone(&self.db),
            conn,
            readonly,
        })
    }

    /// Whether this handle rejects writes.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        AutoserviceError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(AutoserviceError::Storage(
                "database handle is read-only".into(),
            ));
        }
        Ok(())
    }

    /// Run a query and map every row.
    async fn query_all<T>(
        &self,
        sql: &str,
        params: impl IntoParams,
        map: fn(&Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(AutoserviceError::storage)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(AutoserviceError::storage)? {
            results.push(map(&row)?);
        }
        Ok(results)
    }

    /// Run a query and map the first row, if any.
    async fn query_one<T>(
        &self,
        sql: &str,
        params: impl IntoParams,
        map: fn(&Row) -> Result<T>,
    ) -> Result<Option<T>> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(AutoserviceError::storage)?;

        match rows.next().await.map_err(AutoserviceError::storage)? {
            Some(row) => Ok(Some(map(&row)?)),
            None => Ok(None),
        }
    }

    /// Execute a write statement and return the number of affected rows.
    ///
    /// Foreign-key violations surface as validation errors: the caller
    /// referenced a missing record or deleted one that is still in use.
    async fn write(&self, sql: &str, params: impl IntoParams) -> Result<u64> {
        self.check_writable()?;
        self.conn.execute(sql, params).await.map_err(|e| {
            let message = e.to_string();
            if message.contains("FOREIGN KEY constraint failed") {
                AutoserviceError::validation(
                    "referenced record does not exist or is still referenced",
                )
            } else {
                AutoserviceError::Storage(message)
            }
        })
    }

    // -----------------------------------------------------------------------
    // Customer operations
    // -----------------------------------------------------------------------

    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        self.query_all(
            "SELECT id, name, email, phone FROM customers ORDER BY id",
            params![],
            row_to_customer,
        )
        .await
    }

    pub async fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        self.query_one(
            "SELECT id, name, email, phone FROM customers WHERE id = ?1",
            params![id],
            row_to_customer,
        )
        .await
    }

    pub async fn insert_customer(&self, new: &NewCustomer) -> Result<Customer> {
        self.write(
            "INSERT INTO customers (name, email, phone) VALUES (?1, ?2, ?3)",
            params![new.name.as_str(), new.email.as_str(), new.phone.as_str()],
        )
        .await?;
        Ok(Customer {
            id: self.conn.last_insert_rowid(),
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
        })
    }

    /// Overwrite every field of a customer. Returns `None` for an unknown id.
    pub async fn update_customer(&self, id: i64, new: &NewCustomer) -> Result<Option<Customer>> {
        let affected = self
            .write(
                "UPDATE customers SET name = ?1, email = ?2, phone = ?3 WHERE id = ?4",
                params![new.name.as_str(), new.email.as_str(), new.phone.as_str(), id],
            )
            .await?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_customer(id).await
    }

    /// Delete a customer. Returns `false` when no such customer exists.
    pub async fn delete_customer(&self, id: i64) -> Result<bool> {
        let affected = self
            .write("DELETE FROM customers WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Vehicle operations
    // -----------------------------------------------------------------------

    pub async fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        self.query_all(
            "SELECT id, make, model, year, customer_id FROM vehicles ORDER BY id",
            params![],
            row_to_vehicle,
        )
        .await
    }

    pub async fn get_vehicle(&self, id: i64) -> Result<Option<Vehicle>> {
        self.query_one(
            "SELECT id, make, model, year, customer_id FROM vehicles WHERE id = ?1",
            params![id],
            row_to_vehicle,
        )
        .await
    }

    pub async fn list_vehicles_by_customer(&self, customer_id: i64) -> Result<Vec<Vehicle>> {
        self.query_all(
            "SELECT id, make, model, year, customer_id FROM vehicles
             WHERE customer_id = ?1 ORDER BY id",
            params![customer_id],
            row_to_vehicle,
        )
        .await
    }

    pub async fn insert_vehicle(&self, new: &NewVehicle) -> Result<Vehicle> {
        self.write(
            "INSERT INTO vehicles (make, model, year, customer_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                new.make.as_str(),
                new.model.as_str(),
                i64::from(new.year),
                new.customer_id
            ],
        )
        .await?;
        Ok(Vehicle {
            id: self.conn.last_insert_rowid(),
            make: new.make.clone(),
            model: new.model.clone(),
            year: new.year,
            customer_id: new.customer_id,
        })
    }

    pub async fn update_vehicle(&self, id: i64, new: &NewVehicle) -> Result<Option<Vehicle>> {
        let affected = self
            .write(
                "UPDATE vehicles SET make = ?1, model = ?2, year = ?3, customer_id = ?4
                 WHERE id = ?5",
                params![
                    new.make.as_str(),
                    new.model.as_str(),
                    i64::from(new.year),
                    new.customer_id,
                    id
                ],
            )
            .await?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_vehicle(id).await
    }

    pub async fn delete_vehicle(&self, id: i64) -> Result<bool> {
        let affected = self
            .write("DELETE FROM vehicles WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Workshop operations
    // -----------------------------------------------------------------------

    pub async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        self.query_all(
            "SELECT id, name, address, postal_code, city FROM workshops ORDER BY id",
            params![],
            row_to_workshop,
        )
        .await
    }

    pub async fn get_workshop(&self, id: i64) -> Result<Option<Workshop>> {
        self.query_one(
            "SELECT id, name, address, postal_code, city FROM workshops WHERE id = ?1",
            params![id],
            row_to_workshop,
        )
        .await
    }

    /// The workshop with the lowest id, used as the default assignment.
    pub async fn first_workshop(&self) -> Result<Option<Workshop>> {
        self.query_one(
            "SELECT id, name, address, postal_code, city FROM workshops ORDER BY id LIMIT 1",
            params![],
            row_to_workshop,
        )
        .await
    }

    /// Every workshop with the number of service orders assigned to it.
    pub async fn list_workshops_with_order_counts(&self) -> Result<Vec<WorkshopSummary>> {
        self.query_all(
            "SELECT w.id, w.name, w.address, w.postal_code, w.city, COUNT(o.id)
             FROM workshops w
             LEFT JOIN service_orders o ON o.workshop_id = w.id
             GROUP BY w.id
             ORDER BY w.id",
            params![],
            |row| {
                Ok(WorkshopSummary {
                    workshop: row_to_workshop(row)?,
                    order_count: row.get::<i64>(5).map_err(AutoserviceError::storage)? as usize,
                })
            },
        )
        .await
    }

    pub async fn insert_workshop(&self, new: &NewWorkshop) -> Result<Workshop> {
        self.write(
            "INSERT INTO workshops (name, address, postal_code, city) VALUES (?1, ?2, ?3, ?4)",
            params![
                new.name.as_str(),
                new.address.as_str(),
                new.postal_code.as_str(),
                new.city.as_str()
            ],
        )
        .await?;
        Ok(Workshop {
            id: self.conn.last_insert_rowid(),
            name: new.name.clone(),
            address: new.address.clone(),
            postal_code: new.postal_code.clone(),
            city: new.city.clone(),
        })
    }

    pub async fn update_workshop(&self, id: i64, new: &NewWorkshop) -> Result<Option<Workshop>> {
        let affected = self
            .write(
                "UPDATE workshops SET name = ?1, address = ?2, postal_code = ?3, city = ?4
                 WHERE id = ?5",
                params![
                    new.name.as_str(),
                    new.address.as_str(),
                    new.postal_code.as_str(),
                    new.city.as_str(),
                    id
                ],
            )
            .await?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_workshop(id).await
    }

    pub async fn delete_workshop(&self, id: i64) -> Result<bool> {
        let affected = self
            .write("DELETE FROM workshops WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Service order operations
    // -----------------------------------------------------------------------

    pub async fn list_orders(&self) -> Result<Vec<ServiceOrder>> {
        self.query_all(
            "SELECT id, description, status, created_on, vehicle_id, workshop_id, cost
             FROM service_orders ORDER BY id",
            params![],
            row_to_order,
        )
        .await
    }

    pub async fn get_order(&self, id: i64) -> Result<Option<ServiceOrder>> {
        self.query_one(
            "SELECT id, description, status, created_on, vehicle_id, workshop_id, cost
             FROM service_orders WHERE id = ?1",
            params![id],
            row_to_order,
        )
        .await
    }

    pub async fn list_orders_by_vehicle(&self, vehicle_id: i64) -> Result<Vec<ServiceOrder>> {
        self.query_all(
            "SELECT id, description, status, created_on, vehicle_id, workshop_id, cost
             FROM service_orders WHERE vehicle_id = ?1 ORDER BY id",
            params![vehicle_id],
            row_to_order,
        )
        .await
    }

    /// Orders whose status matches `status`, ignoring ASCII case.
    /// `%` and `_` act as wildcards.
    pub async fn list_orders_by_status(&self, status: &str) -> Result<Vec<ServiceOrder>> {
        self.query_all(
            "SELECT id, description, status, created_on, vehicle_id, workshop_id, cost
             FROM service_orders WHERE status LIKE ?1 ORDER BY id",
            params![status],
            row_to_order,
        )
        .await
    }

    /// Insert an order; a missing `created_on` becomes today.
    pub async fn insert_order(&self, new: &NewServiceOrder) -> Result<ServiceOrder> {
        let created_on = new.created_on.unwrap_or_else(today);
        self.write(
            "INSERT INTO service_orders (description, status, created_on, vehicle_id, workshop_id, cost)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.description.as_str(),
                new.status.as_str(),
                created_on.format(DATE_FORMAT).to_string(),
                new.vehicle_id,
                new.workshop_id,
                new.cost
            ],
        )
        .await?;
        Ok(ServiceOrder {
            id: self.conn.last_insert_rowid(),
            description: new.description.clone(),
            status: new.status.clone(),
            created_on,
            vehicle_id: new.vehicle_id,
            workshop_id: new.workshop_id,
            cost: new.cost,
        })
    }

    /// Overwrite every field of an order; a missing `created_on` keeps the stored date.
    pub async fn update_order(
        &self,
        id: i64,
        new: &NewServiceOrder,
    ) -> Result<Option<ServiceOrder>> {
        let created_on = new.created_on.map(|d| d.format(DATE_FORMAT).to_string());
        let affected = self
            .write(
                "UPDATE service_orders SET
                   description = ?1,
                   status = ?2,
                   created_on = COALESCE(?3, created_on),
                   vehicle_id = ?4,
                   workshop_id = ?5,
                   cost = ?6
                 WHERE id = ?7",
                params![
                    new.description.as_str(),
                    new.status.as_str(),
                    created_on,
                    new.vehicle_id,
                    new.workshop_id,
                    new.cost,
                    id
                ],
            )
            .await?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_order(id).await
    }

    pub async fn delete_order(&self, id: i64) -> Result<bool> {
        let affected = self
            .write("DELETE FROM service_orders WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Agent interaction log
    // -----------------------------------------------------------------------

    /// Record one message/reply exchange, dated today.
    pub async fn insert_interaction(
        &self,
        message: &str,
        reply: &str,
        order_id: Option<i64>,
    ) -> Result<AgentInteraction> {
        let created_on = today();
        self.write(
            "INSERT INTO agent_interactions (message, reply, created_on, order_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                message,
                reply,
                created_on.format(DATE_FORMAT).to_string(),
                order_id
            ],
        )
        .await?;
        Ok(AgentInteraction {
            id: self.conn.last_insert_rowid(),
            message: message.to_string(),
            reply: reply.to_string(),
            created_on,
            order_id,
        })
    }

    pub async fn list_interactions(&self) -> Result<Vec<AgentInteraction>> {
        self.query_all(
            "SELECT id, message, reply, created_on, order_id
             FROM agent_interactions ORDER BY id",
            params![],
            row_to_interaction,
        )
        .await
    }
}

/// SQLite leaves foreign keys off unless asked, per connection.
async fn enable_foreign_keys(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .await
        .map_err(AutoserviceError::storage)?;
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| AutoserviceError::Storage(format!("invalid date '{s}': {e}")))
}

fn row_to_customer(row: &Row) -> Result<Customer> {
    Ok(Customer {
        id: row.get::<i64>(0).map_err(AutoserviceError::storage)?,
        name: row.get::<String>(1).map_err(AutoserviceError::storage)?,
        email: row.get::<String>(2).map_err(AutoserviceError::storage)?,
        phone: row.get::<String>(3).map_err(AutoserviceError::storage)?,
    })
}

fn row_to_vehicle(row: &Row) -> Result<Vehicle> {
    Ok(Vehicle {
        id: row.get::<i64>(0).map_err(AutoserviceError::storage)?,
        make: row.get::<String>(1).map_err(AutoserviceError::storage)?,
        model: row.get::<String>(2).map_err(AutoserviceError::storage)?,
        year: row.get::<i64>(3).map_err(AutoserviceError::storage)? as i32,
        customer_id: row.get::<i64>(4).map_err(AutoserviceError::storage)?,
    })
}

fn row_to_workshop(row: &Row) -> Result<Workshop> {
    Ok(Workshop {
        id: row.get::<i64>(0).map_err(AutoserviceError::storage)?,
        name: row.get::<String>(1).map_err(AutoserviceError::storage)?,
        address: row.get::<String>(2).map_err(AutoserviceError::storage)?,
        postal_code: row.get::<String>(3).map_err(AutoserviceError::storage)?,
        city: row.get::<String>(4).map_err(AutoserviceError::storage)?,
    })
}

fn row_to_order(row: &Row) -> Result<ServiceOrder> {
    Ok(ServiceOrder {
        id: row.get::<i64>(0).map_err(AutoserviceError::storage)?,
        description: row.get::<String>(1).map_err(AutoserviceError::storage)?,
        status: row.get::<String>(2).map_err(AutoserviceError::storage)?,
        created_on: {
            let s: String = row.get(3).map_err(AutoserviceError::storage)?;
            parse_date(&s)?
        },
        vehicle_id: row.get::<i64>(4).map_err(AutoserviceError::storage)?,
        workshop_id: row.get::<i64>(5).map_err(AutoserviceError::storage)?,
        cost: row.get::<f64>(6).map_err(AutoserviceError::storage)?,
    })
}

fn row_to_interaction(row: &Row) -> Result<AgentInteraction> {
    Ok(AgentInteraction {
        id: row.get::<i64>(0).map_err(AutoserviceError::storage)?,
        message: row.get::<String>(1).map_err(AutoserviceError::storage)?,
        reply: row.get::<String>(2).map_err(AutoserviceError::storage)?,
        created_on: {
            let s: String = row.get(3).map_err(AutoserviceError::storage)?;
            parse_date(&s)?
        },
        order_id: row.get::<i64>(4).ok(),
    })
}
