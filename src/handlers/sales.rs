use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    cache::PRODUCT_LIST_PREFIX,
    error::ApiError,
    middleware::current_user,
    models::{
        sale::Transition, Customer, Sale, SaleResponse, SaleStatus, TransactionRequest,
        TransactionResponse,
    },
    state::AppState,
    stock,
};

type AuthHeader = Option<TypedHeader<Authorization<Bearer>>>;

/// Customer name that marks an anonymous walk-in checkout. No customer record
/// is created or credited for these.
const WALKING_CUSTOMER: &str = "walking customer";

#[derive(Debug, Deserialize)]
pub struct ListSalesQuery {
    pub status: Option<String>,
}

const SALE_WITH_PRODUCT: &str = r#"
    SELECT s.id, s.product_id, p.name AS product_name, s.quantity_sold,
           s.price_per_unit, s.total_amount, s.date_sold, s.status, s.customer_id
    FROM sales s
    JOIN products p ON p.id = s.product_id
"#;

/// Multi-line "shopping cart" checkout: every line and the customer credit
/// commit as one transaction, or none of them do.
pub async fn record_transaction(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Json(body): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    if body.items.is_empty() {
        return Err(ApiError::Validation(
            "transaction must contain at least one item".to_string(),
        ));
    }
    for item in &body.items {
        if item.quantity_sold <= 0 {
            return Err(ApiError::Validation(
                "quantity_sold must be a positive integer".to_string(),
            ));
        }
        if item.price_per_unit < Decimal::ZERO {
            return Err(ApiError::Validation(
                "price_per_unit cannot be negative".to_string(),
            ));
        }
    }

    // The declared total must match what the line items add up to.
    let computed_total: Decimal = body
        .items
        .iter()
        .map(|item| Sale::compute_total(item.quantity_sold, item.price_per_unit))
        .sum();
    if computed_total != body.total_amount {
        return Err(ApiError::Validation(format!(
            "total_amount {} does not match line items ({})",
            body.total_amount, computed_total
        )));
    }

    let mut tx = state.db.begin().await?;

    let customer = if is_walking_customer(&body.customer_name) {
        None
    } else {
        Some(find_or_create_customer(&mut tx, &body.customer_name).await?)
    };
    let customer_id = customer.as_ref().map(|(c, _)| c.id);

    // Lock product rows in id order so two carts touching the same products
    // in opposite orders cannot deadlock each other.
    let mut available = std::collections::HashMap::new();
    for product_id in lock_order(&body.items) {
        let product = stock::lock_product(&mut tx, product_id).await?;
        available.insert(product_id, product.quantity);
    }

    let mut sales = Vec::with_capacity(body.items.len());
    for item in &body.items {
        let remaining = available
            .get_mut(&item.product)
            .ok_or(ApiError::NotFound("Product"))?;
        if item.quantity_sold > *remaining {
            return Err(ApiError::InsufficientStock);
        }
        *remaining -= item.quantity_sold;

        let total_amount = Sale::compute_total(item.quantity_sold, item.price_per_unit);

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            INSERT INTO sales (product_id, quantity_sold, price_per_unit, total_amount, created_by, customer_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(item.product)
        .bind(item.quantity_sold)
        .bind(item.price_per_unit)
        .bind(total_amount)
        .bind(user.id)
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await?;

        stock::apply_stock_change(&mut tx, item.product, item.quantity_sold, total_amount)
            .await?;

        sales.push(sale);
    }

    if let Some((customer, created_now)) = customer {
        sqlx::query("UPDATE customers SET remaining_balance = remaining_balance + $1 WHERE id = $2")
            .bind(body.total_amount)
            .bind(customer.id)
            .execute(&mut *tx)
            .await?;

        if created_now {
            if let Some(first_sale) = sales.first() {
                sqlx::query("UPDATE customers SET first_sale_id = $1 WHERE id = $2")
                    .bind(first_sale.id)
                    .bind(customer.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
    }

    tx.commit().await?;
    state.cache.invalidate(PRODUCT_LIST_PREFIX);

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            customer_name: body.customer_name,
            total_amount: body.total_amount,
            transaction_date: body.transaction_date,
            items: sales,
        }),
    ))
}

pub async fn list_sales(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Query(query): Query<ListSalesQuery>,
) -> Result<Json<Vec<SaleResponse>>, ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    let status = match query.status.as_deref() {
        Some(value) => Some(SaleStatus::from_query_param(value).ok_or_else(|| {
            ApiError::Validation(format!(
                "status must be one of pending, approved, rejected (got '{value}')"
            ))
        })?),
        None => None,
    };

    let mut sql = String::from(SALE_WITH_PRODUCT);
    sql.push_str(" WHERE ($1::sale_status IS NULL OR s.status = $1)");
    if !user.can_view_all() {
        sql.push_str(" AND p.created_by = $2");
    }
    sql.push_str(" ORDER BY s.date_sold DESC");

    let mut query_builder = sqlx::query_as::<_, SaleResponse>(&sql).bind(status);
    if !user.can_view_all() {
        query_builder = query_builder.bind(user.id);
    }

    let sales = query_builder.fetch_all(&state.db).await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<SaleResponse>, ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    let mut sql = String::from(SALE_WITH_PRODUCT);
    sql.push_str(" WHERE s.id = $1");
    if !user.can_view_all() {
        sql.push_str(" AND p.created_by = $2");
    }

    let mut query_builder = sqlx::query_as::<_, SaleResponse>(&sql).bind(sale_id);
    if !user.can_view_all() {
        query_builder = query_builder.bind(user.id);
    }

    let sale = query_builder
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Sale"))?;

    Ok(Json(sale))
}

pub async fn approve_sale(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;
    set_sale_status(&state, sale_id, SaleStatus::Approved).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Sale approved successfully",
    })))
}

pub async fn reject_sale(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Path(sale_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;
    set_sale_status(&state, sale_id, SaleStatus::Rejected).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Sale rejected successfully",
    })))
}

/// Approved-only totals for the actor's products.
pub async fn sales_summary(
    State(state): State<AppState>,
    bearer: AuthHeader,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    let mut sql = String::from(
        r#"
        SELECT COUNT(*) AS total_sales,
               COALESCE(SUM(s.total_amount), 0) AS total_revenue,
               COALESCE(SUM(s.quantity_sold), 0) AS total_products_sold
        FROM sales s
        JOIN products p ON p.id = s.product_id
        WHERE s.status = 'approved'
        "#,
    );
    if !user.can_view_all() {
        sql.push_str(" AND p.created_by = $1");
    }

    let mut query_builder = sqlx::query_as::<_, (i64, Decimal, i64)>(&sql);
    if !user.can_view_all() {
        query_builder = query_builder.bind(user.id);
    }

    let (total_sales, total_revenue, total_products_sold) =
        query_builder.fetch_one(&state.db).await?;

    Ok(Json(json!({
        "total_sales": total_sales,
        "total_revenue": total_revenue,
        "total_products_sold": total_products_sold,
    })))
}

/// Applies the pending → approved/rejected state machine to one sale.
///
/// The transition is a single conditional UPDATE: only a pending row can move
/// into a terminal state, so two racing requests cannot both apply — the loser
/// matches zero rows and is settled against whatever state won.
pub(crate) async fn set_sale_status(
    state: &AppState,
    sale_id: Uuid,
    target: SaleStatus,
) -> Result<(), ApiError> {
    let updated = sqlx::query("UPDATE sales SET status = $1 WHERE id = $2 AND status = 'pending'")
        .bind(target)
        .bind(sale_id)
        .execute(&state.db)
        .await?;

    if updated.rows_affected() > 0 {
        return Ok(());
    }

    let current = sqlx::query_scalar::<_, SaleStatus>("SELECT status FROM sales WHERE id = $1")
        .bind(sale_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(ApiError::NotFound("Sale"))?;

    settle_unapplied_transition(current, target)
}

/// Decides the response when the conditional UPDATE matched no pending row:
/// the sale is already terminal, set by an earlier request or by one we just
/// lost a race against. Repeating that same action is a no-op success;
/// anything else is a conflict.
fn settle_unapplied_transition(current: SaleStatus, target: SaleStatus) -> Result<(), ApiError> {
    match current.transition_to(target) {
        Transition::AlreadyDone => Ok(()),
        Transition::Apply | Transition::Conflict => Err(ApiError::Conflict(format!(
            "sale is already {}",
            current.as_str()
        ))),
    }
}

/// Distinct product ids of a cart, sorted, so every batch takes its row locks
/// in the same global order regardless of how the caller arranged the lines.
fn lock_order(items: &[crate::models::TransactionItem]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = items.iter().map(|item| item.product).collect();
    ids.sort();
    ids.dedup();
    ids
}

fn is_walking_customer(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(WALKING_CUSTOMER)
}

/// Returns the customer and whether it was created by this call.
async fn find_or_create_customer(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<(Customer, bool), ApiError> {
    let existing = sqlx::query_as::<_, Customer>(
        "SELECT * FROM customers WHERE LOWER(name) = LOWER($1) LIMIT 1",
    )
    .bind(name)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some(customer) = existing {
        return Ok((customer, false));
    }

    let customer =
        sqlx::query_as::<_, Customer>("INSERT INTO customers (name) VALUES ($1) RETURNING *")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?;

    Ok((customer, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walking_customer_sentinel_is_case_insensitive() {
        assert!(is_walking_customer("Walking Customer"));
        assert!(is_walking_customer("walking customer"));
        assert!(is_walking_customer("  WALKING CUSTOMER  "));
        assert!(!is_walking_customer("Jane"));
        assert!(!is_walking_customer("walking customer jr"));
    }

    #[test]
    fn losing_a_status_race_repeats_as_no_op_or_conflicts() {
        // Approve and reject race on a pending sale: only one conditional
        // UPDATE applies. The loser re-reads the winner's terminal state and
        // must see a conflict, not silently overwrite it.
        assert!(settle_unapplied_transition(SaleStatus::Approved, SaleStatus::Rejected).is_err());
        assert!(settle_unapplied_transition(SaleStatus::Rejected, SaleStatus::Approved).is_err());

        // Re-sending the action that already won stays idempotent.
        assert!(settle_unapplied_transition(SaleStatus::Approved, SaleStatus::Approved).is_ok());
        assert!(settle_unapplied_transition(SaleStatus::Rejected, SaleStatus::Rejected).is_ok());
    }

    #[test]
    fn crossing_terminal_states_reports_conflict_status() {
        let err = settle_unapplied_transition(SaleStatus::Approved, SaleStatus::Rejected)
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[test]
    fn carts_lock_products_in_one_global_order() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let item = |product| crate::models::TransactionItem {
            product,
            quantity_sold: 1,
            price_per_unit: "1.00".parse().unwrap(),
        };

        let forward = lock_order(&[item(a), item(b), item(c)]);
        let reverse = lock_order(&[item(c), item(b), item(a)]);
        assert_eq!(forward, reverse);

        // Duplicate lines lock their product once.
        assert_eq!(lock_order(&[item(b), item(b), item(a)]), vec![a, b]);
    }

    #[test]
    fn batch_total_recomputation() {
        let items = vec![
            crate::models::TransactionItem {
                product: Uuid::new_v4(),
                quantity_sold: 2,
                price_per_unit: "4.00".parse().unwrap(),
            },
            crate::models::TransactionItem {
                product: Uuid::new_v4(),
                quantity_sold: 3,
                price_per_unit: "5.00".parse().unwrap(),
            },
        ];
        let computed: Decimal = items
            .iter()
            .map(|i| Sale::compute_total(i.quantity_sold, i.price_per_unit))
            .sum();
        assert_eq!(computed, "23.00".parse::<Decimal>().unwrap());
    }
}
