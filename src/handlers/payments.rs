use axum::{extract::State, http::StatusCode, Json};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::current_user,
    models::SaleStatus,
    state::AppState,
};

type AuthHeader = Option<TypedHeader<Authorization<Bearer>>>;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub phone_number: String,
    pub amount: Decimal,
    pub order_id: String,
}

/// Fields we read out of the gateway callback. The provider sends more; the
/// full payload is stored verbatim for reconciliation.
#[derive(Debug, Deserialize)]
pub struct CallbackPayload {
    #[serde(rename = "TransactionStatus")]
    pub transaction_status: Option<String>,
    #[serde(rename = "BillRefNumber")]
    pub bill_ref_number: Option<String>,
    #[serde(rename = "MPesaReceiptNumber")]
    pub receipt_number: Option<String>,
}

/// Kicks off a USSD push on the customer's phone.
pub async fn initiate_payment(
    State(state): State<AppState>,
    bearer: AuthHeader,
    Json(body): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    current_user(&state.db, &state.config.jwt_secret, bearer).await?;

    if body.phone_number.is_empty() || body.order_id.is_empty() {
        return Err(ApiError::Validation(
            "phone_number, amount and order_id are required".to_string(),
        ));
    }
    if body.amount <= Decimal::ZERO {
        return Err(ApiError::Validation("amount must be positive".to_string()));
    }

    let message = state
        .gateway
        .initiate_ussd_push(&body.phone_number, body.amount, &body.order_id)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "PENDING",
            "message": message,
        })),
    ))
}

/// Gateway-originated confirmation webhook.
///
/// Always acknowledges with 200 so the provider never enters a retry storm;
/// internal failures are logged and swallowed. Duplicate deliveries of the
/// same reference are absorbed by the unique constraint on
/// payment_confirmations — only the first delivery changes any state.
pub async fn payment_callback(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    if let Err(err) = process_callback(&state, &payload).await {
        log::error!("error processing payment callback: {err:?}");
    }

    Json(json!({ "ResultCode": 0, "ResultDesc": "C2B Payment Received" }))
}

async fn process_callback(state: &AppState, payload: &Value) -> Result<(), ApiError> {
    let parsed: CallbackPayload =
        serde_json::from_value(payload.clone()).map_err(ApiError::internal)?;

    let reference = parsed
        .bill_ref_number
        .ok_or_else(|| ApiError::Validation("callback missing BillRefNumber".to_string()))?;
    let status = parsed
        .transaction_status
        .unwrap_or_else(|| "Unknown".to_string());

    let mut tx = state.db.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO payment_confirmations (reference, receipt, status, payload)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (reference) DO NOTHING
        "#,
    )
    .bind(&reference)
    .bind(&parsed.receipt_number)
    .bind(&status)
    .bind(payload)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        // Duplicate delivery; the first one already did the work.
        log::info!("duplicate payment callback for reference {reference}, ignoring");
        tx.commit().await?;
        return Ok(());
    }

    if status == "Completed" {
        match Uuid::parse_str(&reference) {
            Ok(sale_id) => {
                let updated = sqlx::query(
                    "UPDATE sales SET status = $1 WHERE id = $2 AND status = 'pending'",
                )
                .bind(SaleStatus::Approved)
                .bind(sale_id)
                .execute(&mut *tx)
                .await?;

                if updated.rows_affected() == 0 {
                    log::warn!(
                        "payment confirmation {reference} matched no pending sale"
                    );
                }
            }
            Err(_) => {
                log::warn!("payment confirmation with non-sale reference {reference}");
            }
        }
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_payload_extracts_provider_fields() {
        let payload = json!({
            "TransactionStatus": "Completed",
            "BillRefNumber": "4f5a0a70-1111-2222-3333-444455556666",
            "MPesaReceiptNumber": "QKX12ABC34",
            "Amount": 1500,
        });
        let parsed: CallbackPayload = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.transaction_status.as_deref(), Some("Completed"));
        assert_eq!(
            parsed.bill_ref_number.as_deref(),
            Some("4f5a0a70-1111-2222-3333-444455556666")
        );
        assert_eq!(parsed.receipt_number.as_deref(), Some("QKX12ABC34"));
    }

    #[test]
    fn callback_payload_tolerates_missing_fields() {
        let parsed: CallbackPayload = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.transaction_status.is_none());
        assert!(parsed.bill_ref_number.is_none());
        assert!(parsed.receipt_number.is_none());
    }
}
