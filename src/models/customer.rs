use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Credit customer. `remaining_balance` is what they still owe: incremented by
/// checkout totals, decremented by recorded payments.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub remaining_balance: Decimal,
    /// The sale that first created this customer record, if any.
    pub first_sale_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Body of POST /customers/{id}/payments.
#[derive(Debug, Deserialize)]
pub struct CustomerPayment {
    pub amount: Decimal,
}
