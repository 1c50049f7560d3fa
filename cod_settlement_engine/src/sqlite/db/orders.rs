use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, NewOrderItem, Order, OrderAnnotation, OrderId, OrderItem, OrderStatusEntry, OrderStatusType},
    traits::{OrderTransition, WorkflowError},
};

/// Inserts the order and its items into the database, returning `false` in the second parameter if the order already
/// exists. Nothing is written for an existing order.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<(Order, bool), WorkflowError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let items = order.items.clone();
            let order = insert_order(order, conn).await?;
            for item in items {
                insert_item(&order.order_id, item, conn).await?;
            }
            insert_status_entry(&order.order_id, order.status, None, Some("Order placed"), order.created_at, conn)
                .await?;
            debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, WorkflowError> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_id,
                payment_method,
                total_price,
                currency,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.customer_id)
    .bind(order.payment_method)
    .bind(order.total_price)
    .bind(order.currency)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

async fn insert_item(order_id: &OrderId, item: NewOrderItem, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_items (order_id, vendor_id, product_name, quantity, price_at_purchase) VALUES ($1, $2, $3, \
         $4, $5)",
    )
    .bind(order_id.as_str())
    .bind(item.vendor_id)
    .bind(item.product_name)
    .bind(item.quantity)
    .bind(item.price_at_purchase)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn fetch_status_history(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderStatusEntry>, sqlx::Error> {
    let history = sqlx::query_as("SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY id")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(history)
}

pub async fn fetch_annotations(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderAnnotation>, sqlx::Error> {
    let annotations: Vec<(Json<OrderAnnotation>,)> =
        sqlx::query_as("SELECT annotation FROM order_annotations WHERE order_id = $1 ORDER BY id")
            .bind(order_id.as_str())
            .fetch_all(conn)
            .await?;
    Ok(annotations.into_iter().map(|(a,)| a.0).collect())
}

pub async fn insert_status_entry(
    order_id: &OrderId,
    status: OrderStatusType,
    actor_id: Option<i64>,
    comment: Option<&str>,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<OrderStatusEntry, sqlx::Error> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO order_status_history (order_id, actor_id, status, comment, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(actor_id)
    .bind(status)
    .bind(comment)
    .bind(at)
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn insert_annotation(
    order_id: &OrderId,
    annotation: &OrderAnnotation,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO order_annotations (order_id, kind, annotation, created_at) VALUES ($1, $2, $3, $4)")
        .bind(order_id.as_str())
        .bind(annotation.kind())
        .bind(Json(annotation))
        .bind(at)
        .execute(conn)
        .await?;
    Ok(())
}

/// Changes the order status and the other columns in `transition.changes`, but only if the order is still in
/// `transition.from` (and, when recording a COD collection, has not been collected yet).
///
/// Returns `None` if the compare-and-swap did not match any row.
pub async fn compare_and_set_status(
    transition: &OrderTransition,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(transition.to);
    builder.push(", updated_at = ");
    builder.push_bind(transition.at);
    let changes = &transition.changes;
    if let Some(fulfillment) = changes.fulfillment_status {
        builder.push(", fulfillment_status = ");
        builder.push_bind(fulfillment);
    }
    if let Some(delivery_person) = changes.delivery_person {
        builder.push(", delivery_person_id = ");
        builder.push_bind(delivery_person);
    }
    if let Some(collection) = changes.cod_collection {
        builder.push(", cod_collected_at = ");
        builder.push_bind(transition.at);
        builder.push(", cod_amount_collected = ");
        builder.push_bind(collection.amount);
        builder.push(", cod_collected_by = ");
        builder.push_bind(collection.collected_by);
    }
    builder.push(" WHERE order_id = ");
    builder.push_bind(transition.order_id.as_str());
    builder.push(" AND status = ");
    builder.push_bind(transition.from);
    if changes.cod_collection.is_some() {
        builder.push(" AND cod_collected_at IS NULL");
    }
    builder.push(" RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}
