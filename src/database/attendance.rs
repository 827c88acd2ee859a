use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::Attendance;

/// Insert or overwrite the row for `(session_id, person_id)`.
#[instrument(skip(pool, notes))]
pub async fn upsert_attendance(
    pool: &Pool<Sqlite>,
    session_id: &str,
    person_id: &str,
    present: bool,
    notes: Option<&str>,
    recorded_by: &str,
) -> Result<(), AppError> {
    info!("Upserting attendance");
    sqlx::query(
        "INSERT INTO attendance (session_id, person_id, present, notes, recorded_by, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (session_id, person_id) DO UPDATE SET
             present = excluded.present,
             notes = excluded.notes,
             recorded_by = excluded.recorded_by,
             updated_at = excluded.updated_at",
    )
    .bind(session_id)
    .bind(person_id)
    .bind(present)
    .bind(notes)
    .bind(recorded_by)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_session_attendance(
    pool: &Pool<Sqlite>,
    session_id: &str,
) -> Result<Vec<Attendance>, AppError> {
    info!("Getting session attendance");
    let rows = sqlx::query_as::<_, Attendance>(
        "SELECT session_id, person_id, present, notes, recorded_by
         FROM attendance WHERE session_id = ? ORDER BY person_id",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
