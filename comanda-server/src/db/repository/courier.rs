//! Courier Repository

use shared::{CommissionModel, Courier, CourierCreate, CourierUpdate};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool};

use super::{RepoError, RepoResult};

fn commission_from_row(row: &SqliteRow) -> RepoResult<CommissionModel> {
    let commission_type: String = row.try_get("commission_type")?;
    let rate: f64 = row.try_get("commission_rate")?;
    match commission_type.as_str() {
        "fixed" => Ok(CommissionModel::Fixed { amount: rate }),
        "percentage" => Ok(CommissionModel::Percentage { rate }),
        other => Err(RepoError::Database(format!(
            "Unknown commission type: {other}"
        ))),
    }
}

fn commission_columns(model: &CommissionModel) -> (&'static str, f64) {
    match model {
        CommissionModel::Fixed { amount } => ("fixed", *amount),
        CommissionModel::Percentage { rate } => ("percentage", *rate),
    }
}

fn courier_from_row(row: &SqliteRow) -> RepoResult<Courier> {
    Ok(Courier {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        active: row.try_get("active")?,
        available: row.try_get("available")?,
        commission: commission_from_row(row)?,
        delivered_count: row.try_get("delivered_count")?,
        cancelled_count: row.try_get("cancelled_count")?,
        pending_balance: row.try_get("pending_balance")?,
        account_id: row.try_get("account_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Courier>> {
    let row = sqlx::query("SELECT * FROM couriers WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(courier_from_row).transpose()
}

pub async fn get(pool: &SqlitePool, id: i64) -> RepoResult<Courier> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Courier {id} not found")))
}

pub async fn find_all(pool: &SqlitePool, active_only: bool) -> RepoResult<Vec<Courier>> {
    let rows = if active_only {
        sqlx::query("SELECT * FROM couriers WHERE active = 1 ORDER BY name")
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query("SELECT * FROM couriers ORDER BY name")
            .fetch_all(pool)
            .await?
    };
    rows.iter().map(courier_from_row).collect()
}

pub async fn create(pool: &SqlitePool, data: CourierCreate) -> RepoResult<Courier> {
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    let (commission_type, commission_rate) = commission_columns(&data.commission);

    sqlx::query(
        r#"INSERT INTO couriers (
            id, name, phone, active, available, commission_type, commission_rate,
            account_id, created_at, updated_at
        ) VALUES (?, ?, ?, 1, 1, ?, ?, ?, ?, ?)"#,
    )
    .bind(id)
    .bind(&data.name)
    .bind(&data.phone)
    .bind(commission_type)
    .bind(commission_rate)
    .bind(&data.account_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get(pool, id).await
}

pub async fn update(pool: &SqlitePool, id: i64, data: CourierUpdate) -> RepoResult<Courier> {
    let now = shared::util::now_millis();
    let commission = data.commission.as_ref().map(commission_columns);

    let result = sqlx::query(
        r#"UPDATE couriers SET
            name            = COALESCE(?, name),
            phone           = COALESCE(?, phone),
            active          = COALESCE(?, active),
            available       = COALESCE(?, available),
            commission_type = COALESCE(?, commission_type),
            commission_rate = COALESCE(?, commission_rate),
            updated_at      = ?
        WHERE id = ?"#,
    )
    .bind(&data.name)
    .bind(&data.phone)
    .bind(data.active)
    .bind(data.available)
    .bind(commission.map(|(t, _)| t))
    .bind(commission.map(|(_, r)| r))
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Courier {id} not found")));
    }
    get(pool, id).await
}

/// Accrue pending balance and bump the delivered counter when one of this
/// courier's orders is delivered.
pub async fn accrue_delivery<'e, E>(ex: E, id: i64, payout: f64, now: i64) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE couriers SET pending_balance = pending_balance + ?, delivered_count = delivered_count + 1, updated_at = ? WHERE id = ?",
    )
    .bind(payout)
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Courier {id} not found")));
    }
    Ok(())
}

/// Bump the cancelled counter when an assigned order is cancelled.
pub async fn accrue_cancellation<'e, E>(ex: E, id: i64, now: i64) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE couriers SET cancelled_count = cancelled_count + 1, updated_at = ? WHERE id = ?",
    )
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;
    Ok(())
}

/// Release settled payout from the pending balance, as part of the
/// settlement transaction. A full liquidación brings the balance to zero;
/// a partial batch only releases what it settled. Clamped at zero against
/// drift from historical data.
pub async fn reduce_pending_balance<'e, E>(ex: E, id: i64, amount: f64, now: i64) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE couriers SET pending_balance = MAX(0, pending_balance - ?), updated_at = ? WHERE id = ?",
    )
    .bind(amount)
    .bind(now)
    .bind(id)
    .execute(ex)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Courier {id} not found")));
    }
    Ok(())
}
