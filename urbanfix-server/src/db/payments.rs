//! Payment Record Store (append-only: there is no update or delete)

use shared::models::{PaymentPurpose, PaymentRecord};
use sqlx::SqlitePool;

const PAYMENT_SELECT: &str = "SELECT id, email, amount, currency, purpose, issue_id, transaction_id, paid_at FROM payments";

pub struct NewPayment<'a> {
    pub email: &'a str,
    pub amount: i64,
    pub currency: &'a str,
    pub purpose: PaymentPurpose,
    pub issue_id: Option<&'a str>,
    pub transaction_id: Option<&'a str>,
    pub now: i64,
}

/// Append a payment. Returns `None` when a record with the same
/// `transaction_id` already exists.
pub async fn insert(pool: &SqlitePool, payment: &NewPayment<'_>) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let sql = "INSERT INTO payments (email, amount, currency, purpose, issue_id, transaction_id, paid_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT DO NOTHING
         RETURNING id, email, amount, currency, purpose, issue_id, transaction_id, paid_at";
    sqlx::query_as::<_, PaymentRecord>(sql)
        .bind(payment.email)
        .bind(payment.amount)
        .bind(payment.currency)
        .bind(payment.purpose)
        .bind(payment.issue_id)
        .bind(payment.transaction_id)
        .bind(payment.now)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_transaction(pool: &SqlitePool, transaction_id: &str) -> Result<Option<PaymentRecord>, sqlx::Error> {
    let sql = format!("{PAYMENT_SELECT} WHERE transaction_id = ?");
    sqlx::query_as::<_, PaymentRecord>(&sql)
        .bind(transaction_id)
        .fetch_optional(pool)
        .await
}

/// Newest first, optionally restricted to one payer
pub async fn list(pool: &SqlitePool, email: Option<&str>) -> Result<Vec<PaymentRecord>, sqlx::Error> {
    let sql = format!("{PAYMENT_SELECT} WHERE (?1 IS NULL OR email = ?1) ORDER BY paid_at DESC, id DESC");
    sqlx::query_as::<_, PaymentRecord>(&sql)
        .bind(email)
        .fetch_all(pool)
        .await
}
