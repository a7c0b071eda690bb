//! Shift Repository
//!
//! The one-open-shift rule lives in the schema: a partial unique index on
//! `status = 'OPEN'` makes a second concurrent open fail with a unique
//! violation instead of silently winning a read-then-write race.

use shared::models::order::PaymentMethod;
use shared::{
    Shift, ShiftCloseout, ShiftStatus, ShiftSummary, ShiftTransaction, ShiftTransactionKind,
    ShiftType,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};

use super::{RepoError, RepoResult};

/// Per-order increments applied to the running summary.
#[derive(Debug, Clone, Default)]
pub struct ShiftContribution {
    /// 1 per order regardless of cancellation
    pub orders: i64,
    /// Sale amount (0 for cancelled orders)
    pub sales: f64,
    pub efectivo: f64,
    pub tarjeta: f64,
    pub transferencia: f64,
    pub plataforma: f64,
    pub delivery_fees: f64,
    pub discounts: f64,
    pub commissions: f64,
}

fn validate_cash_amount(amount: f64, field_name: &str) -> RepoResult<()> {
    if amount < 0.0 {
        return Err(RepoError::Validation(format!(
            "{field_name} cannot be negative: {amount}"
        )));
    }
    Ok(())
}

fn shift_from_row(row: &SqliteRow) -> RepoResult<Shift> {
    let status_str: String = row.try_get("status")?;
    let status = ShiftStatus::parse(&status_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown shift status: {status_str}")))?;
    let type_str: String = row.try_get("shift_type")?;
    let shift_type = ShiftType::parse(&type_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown shift type: {type_str}")))?;

    let expected_cash: Option<f64> = row.try_get("expected_cash")?;
    let closeout = match (status, expected_cash) {
        (ShiftStatus::Closed, Some(expected_cash)) => Some(ShiftCloseout {
            expected_cash,
            counted_cash: row.try_get::<Option<f64>, _>("counted_cash")?.unwrap_or(0.0),
            variance: row.try_get::<Option<f64>, _>("variance")?.unwrap_or(0.0),
            notes: row.try_get("close_notes")?,
            closed_by: row.try_get::<Option<String>, _>("closed_by")?.unwrap_or_default(),
            closed_at: row.try_get::<Option<i64>, _>("closed_at")?.unwrap_or(0),
        }),
        _ => None,
    };

    Ok(Shift {
        id: row.try_get("id")?,
        date: row.try_get("date")?,
        shift_type,
        cashier_id: row.try_get("cashier_id")?,
        cashier_name: row.try_get("cashier_name")?,
        supervisor_id: row.try_get("supervisor_id")?,
        supervisor_name: row.try_get("supervisor_name")?,
        status,
        opened_at: row.try_get("opened_at")?,
        closed_at: row.try_get("closed_at")?,
        opening_float: row.try_get("opening_float")?,
        summary: ShiftSummary {
            total_orders: row.try_get("total_orders")?,
            total_sales: row.try_get("total_sales")?,
            efectivo: row.try_get("efectivo")?,
            tarjeta: row.try_get("tarjeta")?,
            transferencia: row.try_get("transferencia")?,
            plataforma: row.try_get("plataforma")?,
            total_delivery_fees: row.try_get("total_delivery_fees")?,
            total_discounts: row.try_get("total_discounts")?,
            total_commissions: row.try_get("total_commissions")?,
        },
        closeout,
    })
}

fn transaction_from_row(row: &SqliteRow) -> RepoResult<ShiftTransaction> {
    let kind_str: String = row.try_get("kind")?;
    let kind = ShiftTransactionKind::parse(&kind_str)
        .ok_or_else(|| RepoError::Database(format!("Unknown transaction kind: {kind_str}")))?;
    let method: Option<String> = row.try_get("method")?;
    Ok(ShiftTransaction {
        id: row.try_get("id")?,
        shift_id: row.try_get("shift_id")?,
        kind,
        method: method.as_deref().and_then(PaymentMethod::parse),
        amount: row.try_get("amount")?,
        detail: row.try_get("detail")?,
        timestamp: row.try_get("timestamp")?,
    })
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<Shift>> {
    let row = sqlx::query("SELECT * FROM shifts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(shift_from_row).transpose()
}

pub async fn find_any_open(pool: &SqlitePool) -> RepoResult<Option<Shift>> {
    let row = sqlx::query("SELECT * FROM shifts WHERE status = 'OPEN' LIMIT 1")
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(shift_from_row).transpose()
}

/// Insert a freshly opened shift. A second open shift (or a reuse of the
/// deterministic id) surfaces as `RepoError::Duplicate` via the unique
/// constraints, never as a silent overwrite.
pub async fn create(pool: &SqlitePool, shift: &Shift) -> RepoResult<()> {
    validate_cash_amount(shift.opening_float, "Opening float")?;

    sqlx::query(
        r#"INSERT INTO shifts (
            id, date, shift_type, cashier_id, cashier_name,
            supervisor_id, supervisor_name, status, opened_at, opening_float
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 'OPEN', ?, ?)"#,
    )
    .bind(&shift.id)
    .bind(&shift.date)
    .bind(shift.shift_type.as_str())
    .bind(&shift.cashier_id)
    .bind(&shift.cashier_name)
    .bind(&shift.supervisor_id)
    .bind(&shift.supervisor_name)
    .bind(shift.opened_at)
    .bind(shift.opening_float)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_all(pool: &SqlitePool, limit: i32, offset: i32) -> RepoResult<Vec<Shift>> {
    let rows = sqlx::query("SELECT * FROM shifts ORDER BY opened_at DESC LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    rows.iter().map(shift_from_row).collect()
}

pub async fn find_by_date_range(
    pool: &SqlitePool,
    start_millis: i64,
    end_millis: i64,
) -> RepoResult<Vec<Shift>> {
    let rows = sqlx::query(
        "SELECT * FROM shifts WHERE opened_at >= ? AND opened_at < ? ORDER BY opened_at DESC",
    )
    .bind(start_millis)
    .bind(end_millis)
    .fetch_all(pool)
    .await?;
    rows.iter().map(shift_from_row).collect()
}

/// Open shifts that started before `business_day_start`: candidates for a
/// forced corte the operator has forgotten.
pub async fn find_stale_open(pool: &SqlitePool, business_day_start: i64) -> RepoResult<Vec<Shift>> {
    let rows = sqlx::query("SELECT * FROM shifts WHERE status = 'OPEN' AND opened_at < ?")
        .bind(business_day_start)
        .fetch_all(pool)
        .await?;
    rows.iter().map(shift_from_row).collect()
}

/// Accumulate one order's contribution into the running summary. Only an
/// OPEN shift matches; contributing to a closed shift is an error.
pub async fn apply_contribution<'e, E>(
    ex: E,
    shift_id: &str,
    c: &ShiftContribution,
) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"UPDATE shifts SET
            total_orders        = total_orders + ?,
            total_sales         = total_sales + ?,
            efectivo            = efectivo + ?,
            tarjeta             = tarjeta + ?,
            transferencia       = transferencia + ?,
            plataforma          = plataforma + ?,
            total_delivery_fees = total_delivery_fees + ?,
            total_discounts     = total_discounts + ?,
            total_commissions   = total_commissions + ?
        WHERE id = ? AND status = 'OPEN'"#,
    )
    .bind(c.orders)
    .bind(c.sales)
    .bind(c.efectivo)
    .bind(c.tarjeta)
    .bind(c.transferencia)
    .bind(c.plataforma)
    .bind(c.delivery_fees)
    .bind(c.discounts)
    .bind(c.commissions)
    .bind(shift_id)
    .execute(ex)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Shift {shift_id} not found or already closed"
        )));
    }
    Ok(())
}

/// Close the shift and compute the corte in one statement:
/// `expected_cash = opening_float + efectivo`,
/// `variance = counted_cash - expected_cash`. Zero rows affected means the
/// shift is missing or already closed; closing is one-way.
pub async fn close(
    pool: &SqlitePool,
    id: &str,
    counted_cash: f64,
    notes: Option<&str>,
    closed_by: &str,
    now: i64,
) -> RepoResult<Shift> {
    validate_cash_amount(counted_cash, "Counted cash")?;

    let result = sqlx::query(
        r#"UPDATE shifts SET
            status        = 'CLOSED',
            closed_at     = ?1,
            expected_cash = opening_float + efectivo,
            counted_cash  = ?2,
            variance      = ?2 - (opening_float + efectivo),
            close_notes   = ?3,
            closed_by     = ?4
        WHERE id = ?5 AND status = 'OPEN'"#,
    )
    .bind(now)
    .bind(counted_cash)
    .bind(notes)
    .bind(closed_by)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!(
            "Shift {id} not found or already closed"
        )));
    }
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Shift {id} not found")))
}

/// Append one monetary event to the shift sub-ledger.
pub async fn append_transaction<'e, E>(
    ex: E,
    shift_id: &str,
    kind: ShiftTransactionKind,
    method: Option<PaymentMethod>,
    amount: f64,
    detail: Option<&str>,
    now: i64,
) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO shift_transactions (shift_id, kind, method, amount, detail, timestamp) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(shift_id)
    .bind(kind.as_str())
    .bind(method.map(|m| m.as_str()))
    .bind(amount)
    .bind(detail)
    .bind(now)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn find_transactions(
    pool: &SqlitePool,
    shift_id: &str,
) -> RepoResult<Vec<ShiftTransaction>> {
    let rows = sqlx::query(
        "SELECT * FROM shift_transactions WHERE shift_id = ? ORDER BY timestamp, id",
    )
    .bind(shift_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(transaction_from_row).collect()
}
