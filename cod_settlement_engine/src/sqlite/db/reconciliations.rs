use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    cod_api::reconciliation_objects::{CollectionTotals, ReconciliationQueryFilter},
    db_types::{Cents, CodReconciliation, ReconciliationNote, ReconciliationStatus},
};

fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Sums the expected and collected COD cash per delivery person for orders collected on `date` (UTC).
/// Only delivered (or since completed) COD orders count.
pub async fn collection_totals(
    date: NaiveDate,
    delivery_person_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CollectionTotals>, sqlx::Error> {
    let (start, end) = day_bounds(date);
    let mut builder = QueryBuilder::new(
        r#"
        SELECT delivery_person_id, COUNT(*), COALESCE(SUM(total_price), 0), COALESCE(SUM(cod_amount_collected), 0)
        FROM orders
        WHERE payment_method = 'cod'
          AND status IN ('delivered', 'completed')
          AND delivery_person_id IS NOT NULL
          AND cod_collected_at >= "#,
    );
    builder.push_bind(start);
    builder.push(" AND cod_collected_at < ");
    builder.push_bind(end);
    if let Some(id) = delivery_person_id {
        builder.push(" AND delivery_person_id = ");
        builder.push_bind(id);
    }
    builder.push(" GROUP BY delivery_person_id ORDER BY delivery_person_id");
    trace!("🧾️ Executing query: {}", builder.sql());
    let rows: Vec<(i64, i64, i64, i64)> = builder.build_query_as().fetch_all(conn).await?;
    let totals = rows
        .into_iter()
        .map(|(delivery_person_id, orders_count, expected, collected)| CollectionTotals {
            date,
            delivery_person_id,
            orders_count,
            expected: Cents::from(expected),
            collected: Cents::from(collected),
        })
        .collect();
    Ok(totals)
}

/// Inserts a pending reconciliation. Returns `None` if one already exists for the date and delivery person.
pub async fn idempotent_insert(
    totals: &CollectionTotals,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CodReconciliation>, sqlx::Error> {
    let rec: Option<CodReconciliation> = sqlx::query_as(
        r#"
            INSERT INTO cod_reconciliations (
                date,
                delivery_person_id,
                total_orders_count,
                total_cod_amount,
                collected_amount,
                discrepancy,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, $7)
            ON CONFLICT (date, delivery_person_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(totals.date)
    .bind(totals.delivery_person_id)
    .bind(totals.orders_count)
    .bind(totals.expected)
    .bind(totals.collected)
    .bind(totals.discrepancy())
    .bind(at)
    .fetch_optional(conn)
    .await?;
    if rec.is_none() {
        debug!(
            "🧾️ A reconciliation for delivery person {} on {} already exists. Skipped.",
            totals.delivery_person_id, totals.date
        );
    }
    Ok(rec)
}

pub async fn fetch_reconciliation(id: i64, conn: &mut SqliteConnection) -> Result<Option<CodReconciliation>, sqlx::Error> {
    let rec = sqlx::query_as("SELECT * FROM cod_reconciliations WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(rec)
}

pub async fn search_reconciliations(
    filter: ReconciliationQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<CodReconciliation>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM cod_reconciliations ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(from) = filter.from {
        where_clause.push("date >= ");
        where_clause.push_bind_unseparated(from);
    }
    if let Some(to) = filter.to {
        where_clause.push("date <= ");
        where_clause.push_bind_unseparated(to);
    }
    if let Some(id) = filter.delivery_person_id {
        where_clause.push("delivery_person_id = ");
        where_clause.push_bind_unseparated(id);
    }
    if !filter.statuses.is_empty() {
        let statuses = filter.statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({statuses})"));
    }
    builder.push(" ORDER BY date ASC, delivery_person_id ASC");
    trace!("🧾️ Executing query: {}", builder.sql());
    let recs = builder.build_query_as::<CodReconciliation>().fetch_all(conn).await?;
    Ok(recs)
}

/// Applies a status change (and optionally a new cash count) if the reconciliation is still in `from`.
#[allow(clippy::too_many_arguments)]
pub async fn compare_and_set_status(
    id: i64,
    from: ReconciliationStatus,
    to: ReconciliationStatus,
    collected_amount: Option<Cents>,
    verified_by: Option<i64>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<CodReconciliation>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE cod_reconciliations SET status = ");
    builder.push_bind(to);
    builder.push(", updated_at = ");
    builder.push_bind(at);
    if let Some(collected) = collected_amount {
        builder.push(", collected_amount = ");
        builder.push_bind(collected);
        builder.push(", discrepancy = ");
        builder.push_bind(collected);
        builder.push(" - total_cod_amount");
    }
    if to == ReconciliationStatus::Verified {
        builder.push(", verified_by = ");
        builder.push_bind(verified_by);
        builder.push(", verified_at = ");
        builder.push_bind(at);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND status = ");
    builder.push_bind(from);
    builder.push(" RETURNING *");
    trace!("🧾️ Executing query: {}", builder.sql());
    let rec = builder.build_query_as::<CodReconciliation>().fetch_optional(conn).await?;
    Ok(rec)
}

pub async fn auto_verify_zero_discrepancy(
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CodReconciliation>, sqlx::Error> {
    let recs = sqlx::query_as(
        r#"
            UPDATE cod_reconciliations SET status = 'verified', verified_at = $1, updated_at = $1
            WHERE status = 'pending' AND discrepancy = 0
            RETURNING *;
        "#,
    )
    .bind(at)
    .fetch_all(conn)
    .await?;
    Ok(recs)
}

pub async fn insert_note(
    reconciliation_id: i64,
    actor_id: Option<i64>,
    note: &str,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationNote, sqlx::Error> {
    let note = sqlx::query_as(
        r#"
            INSERT INTO reconciliation_notes (reconciliation_id, actor_id, note, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(reconciliation_id)
    .bind(actor_id)
    .bind(note)
    .bind(at)
    .fetch_one(conn)
    .await?;
    Ok(note)
}

pub async fn fetch_notes(
    reconciliation_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ReconciliationNote>, sqlx::Error> {
    let notes = sqlx::query_as("SELECT * FROM reconciliation_notes WHERE reconciliation_id = $1 ORDER BY id")
        .bind(reconciliation_id)
        .fetch_all(conn)
        .await?;
    Ok(notes)
}
