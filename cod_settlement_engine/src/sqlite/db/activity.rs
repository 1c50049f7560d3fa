use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{ActivityRecord, NewActivity};

pub async fn insert_activity(activity: NewActivity, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO activity_log (actor_id, action, entity_type, entity_id, properties, created_at)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(activity.actor_id)
    .bind(activity.action)
    .bind(activity.entity_type)
    .bind(activity.entity_id)
    .bind(Json(activity.properties))
    .bind(activity.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_activity(
    entity_type: &str,
    entity_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<ActivityRecord>, sqlx::Error> {
    let records = sqlx::query_as("SELECT * FROM activity_log WHERE entity_type = $1 AND entity_id = $2 ORDER BY id")
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}
