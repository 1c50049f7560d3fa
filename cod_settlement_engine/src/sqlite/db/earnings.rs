use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    cod_api::earnings_objects::EarningsQueryFilter,
    db_types::{Cents, EarningStatus, NewVendorEarning, OrderId, VendorBalance, VendorEarning},
};

/// Inserts the earning unless one already exists for the `(vendor_id, order_id)` pair. Returns the new earning, or
/// `None` if it already existed.
pub async fn idempotent_insert(
    earning: NewVendorEarning,
    conn: &mut SqliteConnection,
) -> Result<Option<VendorEarning>, sqlx::Error> {
    let result: Option<VendorEarning> = sqlx::query_as(
        r#"
            INSERT INTO vendor_earnings (
                vendor_id,
                order_id,
                amount,
                commission,
                net_amount,
                status,
                available_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $7)
            ON CONFLICT (vendor_id, order_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(earning.vendor_id)
    .bind(earning.order_id.as_str())
    .bind(earning.split.gross)
    .bind(earning.split.commission)
    .bind(earning.split.net)
    .bind(earning.available_at)
    .bind(earning.created_at)
    .fetch_optional(conn)
    .await?;
    match &result {
        Some(e) => debug!("💰️ Earning #{} of {} recorded for vendor {} on order {}", e.id, e.net_amount, e.vendor_id, e.order_id),
        None => debug!("💰️ Vendor {} already has an earning for order {}. Skipped.", earning.vendor_id, earning.order_id),
    }
    Ok(result)
}

pub async fn release_matured(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<VendorEarning>, sqlx::Error> {
    let released = sqlx::query_as(
        r#"
            UPDATE vendor_earnings SET status = 'available', updated_at = $1
            WHERE status = 'pending' AND available_at <= $1
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(released)
}

/// Moves the earning to `to` if it is currently in one of `from`. Returns `None` if the earning was not in any of the
/// expected states (or does not exist).
pub async fn compare_and_set_status(
    id: i64,
    from: &[EarningStatus],
    to: EarningStatus,
    withheld_reason: Option<&str>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<VendorEarning>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE vendor_earnings SET status = ");
    builder.push_bind(to);
    builder.push(", withheld_reason = ");
    builder.push_bind(withheld_reason);
    builder.push(", updated_at = ");
    builder.push_bind(at);
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in from {
        statuses.push_bind(*status);
    }
    statuses.push_unseparated(") RETURNING *");
    trace!("💰️ Executing query: {}", builder.sql());
    let earning = builder.build_query_as::<VendorEarning>().fetch_optional(conn).await?;
    Ok(earning)
}

/// Withholds every earning of the order that has not been reserved or paid yet.
pub async fn withhold_for_order(
    order_id: &OrderId,
    reason: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorEarning>, sqlx::Error> {
    let withheld = sqlx::query_as(
        r#"
            UPDATE vendor_earnings SET status = 'withheld', withheld_reason = $1, updated_at = $2
            WHERE order_id = $3 AND status IN ('pending', 'available')
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(at)
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await?;
    Ok(withheld)
}

pub async fn fetch_earning(id: i64, conn: &mut SqliteConnection) -> Result<Option<VendorEarning>, sqlx::Error> {
    let earning = sqlx::query_as("SELECT * FROM vendor_earnings WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(earning)
}

/// Fetches earnings according to the criteria in the filter, ordered by `created_at` (then `id`) ascending.
pub async fn search_earnings(
    filter: EarningsQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorEarning>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM vendor_earnings ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(vendor_id) = filter.vendor_id {
        where_clause.push("vendor_id = ");
        where_clause.push_bind_unseparated(vendor_id);
    }
    if let Some(order_id) = filter.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if !filter.statuses.is_empty() {
        let statuses = filter.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    if let Some(since) = filter.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = filter.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    trace!("💰️ Executing query: {}", builder.sql());
    let earnings = builder.build_query_as::<VendorEarning>().fetch_all(conn).await?;
    Ok(earnings)
}

pub async fn vendor_balance(vendor_id: i64, conn: &mut SqliteConnection) -> Result<VendorBalance, sqlx::Error> {
    let rows: Vec<(EarningStatus, i64)> = sqlx::query_as(
        "SELECT status, COALESCE(SUM(net_amount), 0) FROM vendor_earnings WHERE vendor_id = $1 GROUP BY status",
    )
    .bind(vendor_id)
    .fetch_all(conn)
    .await?;
    let balance = rows.into_iter().fold(VendorBalance::new(vendor_id), |mut balance, (status, total)| {
        balance.add(status, Cents::from(total));
        balance
    });
    Ok(balance)
}
