use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{Cents, EarningStatus, NewPayoutRequest, Payout, PayoutDetails, PayoutStatus, VendorEarning},
    traits::PayoutError,
};

/// The vendor's available earnings, oldest first.
pub async fn fetch_available_earnings(
    vendor_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorEarning>, sqlx::Error> {
    let earnings = sqlx::query_as(
        "SELECT * FROM vendor_earnings WHERE vendor_id = $1 AND status = 'available' ORDER BY created_at ASC, id ASC",
    )
    .bind(vendor_id)
    .fetch_all(conn)
    .await?;
    Ok(earnings)
}

/// Moves each earning from `from` to `to`. If any of them is not in `from` anymore, the whole set is rejected with
/// `EarningsChanged`. The caller must roll back the enclosing transaction in that case.
pub async fn move_earnings(
    earning_ids: &[i64],
    from: EarningStatus,
    to: EarningStatus,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorEarning>, PayoutError> {
    let mut moved = Vec::with_capacity(earning_ids.len());
    for id in earning_ids {
        let earning: Option<VendorEarning> = sqlx::query_as(
            "UPDATE vendor_earnings SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4 RETURNING *",
        )
        .bind(to)
        .bind(at)
        .bind(*id)
        .bind(from)
        .fetch_optional(&mut *conn)
        .await?;
        match earning {
            Some(e) => moved.push(e),
            None => {
                debug!("💸️ Earning #{id} is no longer {from}. Cannot move it to {to}.");
                return Err(PayoutError::EarningsChanged(format!("Earning #{id} is no longer {from}")));
            },
        }
    }
    trace!("💸️ Moved {} earnings from {from} to {to}", moved.len());
    Ok(moved)
}

pub async fn insert_payout(
    request: &NewPayoutRequest,
    earnings: &[VendorEarning],
    details: &PayoutDetails,
    conn: &mut SqliteConnection,
) -> Result<Payout, sqlx::Error> {
    let reserved_amount: Cents = earnings.iter().map(|e| e.net_amount).sum();
    let period_start = earnings.iter().map(|e| e.created_at).min().unwrap_or(request.created_at);
    let period_end = earnings.iter().map(|e| e.created_at).max().unwrap_or(request.created_at);
    let payout: Payout = sqlx::query_as(
        r#"
            INSERT INTO payouts (
                payout_id,
                vendor_id,
                period_start,
                period_end,
                items_count,
                amount,
                reserved_amount,
                processing_fee,
                net_amount,
                status,
                payout_details,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'pending', $10, $11, $11)
            RETURNING *;
        "#,
    )
    .bind(&request.payout_id)
    .bind(request.vendor_id)
    .bind(period_start)
    .bind(period_end)
    .bind(earnings.len() as i64)
    .bind(request.amount)
    .bind(reserved_amount)
    .bind(request.processing_fee)
    .bind(request.net_amount())
    .bind(Json(details))
    .bind(request.created_at)
    .fetch_one(&mut *conn)
    .await?;
    for earning in earnings {
        sqlx::query("INSERT INTO payout_earnings (payout_id, earning_id) VALUES ($1, $2)")
            .bind(payout.id)
            .bind(earning.id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(payout)
}

pub async fn fetch_payout(payout_id: &str, conn: &mut SqliteConnection) -> Result<Option<Payout>, sqlx::Error> {
    let payout = sqlx::query_as("SELECT * FROM payouts WHERE payout_id = $1").bind(payout_id).fetch_optional(conn).await?;
    Ok(payout)
}

pub async fn fetch_payouts_for_vendor(vendor_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payout>, sqlx::Error> {
    let payouts = sqlx::query_as("SELECT * FROM payouts WHERE vendor_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(vendor_id)
        .fetch_all(conn)
        .await?;
    Ok(payouts)
}

/// The ids of the earnings reserved by the payout (internal id), oldest first.
pub async fn reserved_earning_ids(payout_row_id: i64, conn: &mut SqliteConnection) -> Result<Vec<i64>, sqlx::Error> {
    let ids: Vec<(i64,)> = sqlx::query_as(
        r#"
            SELECT e.id FROM payout_earnings pe JOIN vendor_earnings e ON e.id = pe.earning_id
            WHERE pe.payout_id = $1
            ORDER BY e.created_at ASC, e.id ASC
        "#,
    )
    .bind(payout_row_id)
    .fetch_all(conn)
    .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

pub async fn fetch_payout_earnings(
    payout_row_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorEarning>, sqlx::Error> {
    let earnings = sqlx::query_as(
        r#"
            SELECT e.* FROM payout_earnings pe JOIN vendor_earnings e ON e.id = pe.earning_id
            WHERE pe.payout_id = $1
            ORDER BY e.created_at ASC, e.id ASC
        "#,
    )
    .bind(payout_row_id)
    .fetch_all(conn)
    .await?;
    Ok(earnings)
}

/// Changes the payout status and details, but only if the payout is still in `from`.
pub async fn compare_and_set_status(
    payout_id: &str,
    from: PayoutStatus,
    to: PayoutStatus,
    details: &PayoutDetails,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, sqlx::Error> {
    let payout = sqlx::query_as(
        r#"
            UPDATE payouts SET status = $1, payout_details = $2, updated_at = $3
            WHERE payout_id = $4 AND status = $5
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(Json(details))
    .bind(at)
    .bind(payout_id)
    .bind(from)
    .fetch_optional(conn)
    .await?;
    Ok(payout)
}
