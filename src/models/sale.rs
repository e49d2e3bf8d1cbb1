use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Classification used to reconcile recorded sales against payment
/// confirmations. Pending is the initial state; approved and rejected are
/// terminal and mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sale_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Approved,
    Rejected,
}

impl SaleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_query_param(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Outcome of requesting a transition into `target`.
    ///
    /// Repeating a terminal action is a no-op success; crossing terminal
    /// states (approve a rejected sale or vice versa) is a conflict.
    pub fn transition_to(self, target: SaleStatus) -> Transition {
        match (self, target) {
            (SaleStatus::Pending, SaleStatus::Approved)
            | (SaleStatus::Pending, SaleStatus::Rejected) => Transition::Apply,
            (current, target) if current == target => Transition::AlreadyDone,
            _ => Transition::Conflict,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Transition {
    Apply,
    AlreadyDone,
    Conflict,
}

/// An immutable record of units sold at a price, at a point in time.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity_sold: i32,
    /// Price snapshot taken at sale time; never updated afterwards.
    pub price_per_unit: Decimal,
    /// Always quantity_sold * price_per_unit, computed server-side.
    pub total_amount: Decimal,
    pub date_sold: DateTime<Utc>,
    pub status: SaleStatus,
    pub created_by: Option<Uuid>,
    pub customer_id: Option<Uuid>,
}

impl Sale {
    pub fn compute_total(quantity_sold: i32, price_per_unit: Decimal) -> Decimal {
        Decimal::from(quantity_sold) * price_per_unit
    }
}

/// Sale joined with its product name, the shape the frontend lists.
#[derive(Debug, Serialize, FromRow)]
pub struct SaleResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_sold: i32,
    pub price_per_unit: Decimal,
    pub total_amount: Decimal,
    pub date_sold: DateTime<Utc>,
    pub status: SaleStatus,
    pub customer_id: Option<Uuid>,
}

/// Body of POST /products/{id}/sale.
#[derive(Debug, Deserialize)]
pub struct SingleSaleRequest {
    pub quantity_sold: i32,
    pub price_per_unit: Option<Decimal>,
}

/// One line of a cart checkout.
#[derive(Debug, Deserialize)]
pub struct TransactionItem {
    pub product: Uuid,
    pub quantity_sold: i32,
    pub price_per_unit: Decimal,
}

/// Body of POST /sales: one checkout event tied to one customer.
#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub customer_name: String,
    pub total_amount: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub items: Vec<TransactionItem>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub customer_name: String,
    pub total_amount: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub items: Vec<Sale>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn total_is_quantity_times_unit_price() {
        assert_eq!(Sale::compute_total(3, dec("5.00")), dec("15.00"));
        assert_eq!(Sale::compute_total(2, dec("4.00")), dec("8.00"));
        assert_eq!(Sale::compute_total(0, dec("9.99")), dec("0.00"));
    }

    #[test]
    fn pending_moves_to_either_terminal_state() {
        assert_eq!(
            SaleStatus::Pending.transition_to(SaleStatus::Approved),
            Transition::Apply
        );
        assert_eq!(
            SaleStatus::Pending.transition_to(SaleStatus::Rejected),
            Transition::Apply
        );
    }

    #[test]
    fn repeated_approval_is_a_no_op() {
        assert_eq!(
            SaleStatus::Approved.transition_to(SaleStatus::Approved),
            Transition::AlreadyDone
        );
        assert_eq!(
            SaleStatus::Rejected.transition_to(SaleStatus::Rejected),
            Transition::AlreadyDone
        );
    }

    #[test]
    fn terminal_states_never_cross() {
        assert_eq!(
            SaleStatus::Approved.transition_to(SaleStatus::Rejected),
            Transition::Conflict
        );
        assert_eq!(
            SaleStatus::Rejected.transition_to(SaleStatus::Approved),
            Transition::Conflict
        );
    }

    #[test]
    fn status_query_param_parsing() {
        assert_eq!(
            SaleStatus::from_query_param("pending"),
            Some(SaleStatus::Pending)
        );
        assert_eq!(
            SaleStatus::from_query_param("approved"),
            Some(SaleStatus::Approved)
        );
        assert_eq!(SaleStatus::from_query_param("verified"), None);
    }
}
