//! Stock Ledger: keeps product quantity and cumulative revenue consistent
//! with recorded sales.
//!
//! The ledger itself never rejects a change. It clamps the on-hand quantity at
//! zero and lets `sold_units` / `amount_collected` accumulate; user-facing
//! flows are expected to pre-validate stock (against a locked row) before
//! calling in. Deleting a sale does not restore stock — sales are treated as
//! append-only records.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{error::ApiError, models::Product};

/// Locks the product row for the rest of the transaction and returns it.
///
/// Concurrent sales of the same product queue up on this lock, so a stock
/// pre-check made against the returned row cannot be invalidated by a racing
/// request.
pub async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> Result<Product, ApiError> {
    sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND deleted = false FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ApiError::NotFound("Product"))
}

/// Applies a sale to the product counters inside the caller's transaction.
///
/// sold_units and amount_collected accumulate; quantity floors at zero even
/// if `sold_units` exceeds the current stock. Returns the refreshed row.
pub async fn apply_stock_change(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    sold_units: i32,
    amount_collected: Decimal,
) -> Result<Product, ApiError> {
    debug_assert!(sold_units >= 0);
    debug_assert!(amount_collected >= Decimal::ZERO);

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products
        SET sold_units = sold_units + $1,
            quantity = GREATEST(quantity - $1, 0),
            amount_collected = amount_collected + $2,
            updated_at = NOW()
        WHERE id = $3
        RETURNING *
        "#,
    )
    .bind(sold_units)
    .bind(amount_collected)
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(ApiError::NotFound("Product"))?;

    Ok(product)
}

/// The quantity a product ends up with after selling `sold_units`, floored at
/// zero. Mirrors the GREATEST clause in `apply_stock_change`.
pub fn clamped_quantity(current: i32, sold_units: i32) -> i32 {
    (current - sold_units).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_within_stock() {
        assert_eq!(clamped_quantity(10, 3), 7);
        assert_eq!(clamped_quantity(1, 1), 0);
    }

    #[test]
    fn oversell_clamps_at_zero_instead_of_going_negative() {
        assert_eq!(clamped_quantity(2, 5), 0);
        assert_eq!(clamped_quantity(0, 1), 0);
    }

    #[test]
    fn zero_units_is_a_no_op() {
        assert_eq!(clamped_quantity(4, 0), 4);
    }
}
