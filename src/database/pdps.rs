use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbPdp, Pdp, PdpContent};

const PDP_COLUMNS: &str =
    "id, person_id, coach_id, version, content, focus_text, is_current, archived_at, created_at";

#[instrument(skip(pool))]
pub async fn get_current_pdp(pool: &Pool<Sqlite>, person_id: &str) -> Result<Option<Pdp>, AppError> {
    info!("Fetching current PDP");
    let row = sqlx::query_as::<_, DbPdp>(&format!(
        "SELECT {} FROM pdps WHERE person_id = ? AND is_current = TRUE
         ORDER BY version DESC LIMIT 1",
        PDP_COLUMNS
    ))
    .bind(person_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Pdp::from))
}

#[instrument(skip(pool))]
pub async fn get_pdp_history(pool: &Pool<Sqlite>, person_id: &str) -> Result<Vec<Pdp>, AppError> {
    info!("Fetching PDP history");
    let rows = sqlx::query_as::<_, DbPdp>(&format!(
        "SELECT {} FROM pdps WHERE person_id = ? ORDER BY version DESC",
        PDP_COLUMNS
    ))
    .bind(person_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Pdp::from).collect())
}

/// Archives every current PDP for the player and inserts the next version as
/// the only current one, in a single transaction.
#[instrument(skip(pool, content, focus_text))]
pub async fn replace_current_pdp(
    pool: &Pool<Sqlite>,
    person_id: &str,
    coach_id: &str,
    content: &PdpContent,
    focus_text: Option<&str>,
) -> Result<Pdp, AppError> {
    info!("Replacing current PDP");
    let now = Utc::now().naive_utc();
    let id = uuid::Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    let archived = sqlx::query(
        "UPDATE pdps SET is_current = FALSE, archived_at = ?
         WHERE person_id = ? AND is_current = TRUE",
    )
    .bind(now)
    .bind(person_id)
    .execute(&mut *tx)
    .await?;

    let (latest,): (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM pdps WHERE person_id = ?")
        .bind(person_id)
        .fetch_one(&mut *tx)
        .await?;
    let version = latest.unwrap_or(0) + 1;

    sqlx::query(
        "INSERT INTO pdps (id, person_id, coach_id, version, content, focus_text, is_current, created_at)
         VALUES (?, ?, ?, ?, ?, ?, TRUE, ?)",
    )
    .bind(&id)
    .bind(person_id)
    .bind(coach_id)
    .bind(version)
    .bind(serde_json::to_string(content)?)
    .bind(focus_text)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        version,
        archived = archived.rows_affected(),
        "Stored new current PDP"
    );

    Ok(Pdp {
        id,
        person_id: person_id.to_string(),
        coach_id: coach_id.to_string(),
        version,
        content: content.clone(),
        focus_text: focus_text.map(String::from),
        is_current: true,
        archived_at: None,
        created_at: now,
    })
}
