use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub part_number: String,
    pub price: Decimal,
    /// Units currently on hand. Never negative.
    pub quantity: i32,
    /// Stock level when the product was first registered.
    pub quantity_in_store: i32,
    /// Cumulative units sold. Monotonically non-decreasing.
    pub sold_units: i32,
    /// Cumulative revenue from sales of this product.
    pub amount_collected: Decimal,
    pub deleted: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compatibility tag, many-to-many with products.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub part_number: String,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub vehicle_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub part_number: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
}
