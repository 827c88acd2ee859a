use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbSession, Session, SessionPlan, SessionStatus};

const SESSION_COLUMNS: &str = "id, coach_id, group_id, title, theme, duration_minutes, \
     session_plan, status, session_notes, coach_reflection, created_at, updated_at";

pub struct NewSession<'a> {
    pub coach_id: &'a str,
    pub group_id: Option<&'a str>,
    pub theme: Option<&'a str>,
    pub duration_minutes: i64,
    pub plan: &'a SessionPlan,
}

#[instrument(skip_all, fields(coach_id = %session.coach_id))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    session: NewSession<'_>,
) -> Result<String, AppError> {
    info!("Creating session awaiting approval");
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    sqlx::query(
        "INSERT INTO sessions
         (id, coach_id, group_id, title, theme, duration_minutes, session_plan, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(session.coach_id)
    .bind(session.group_id)
    .bind(&session.plan.title)
    .bind(session.theme)
    .bind(session.duration_minutes)
    .bind(serde_json::to_string(session.plan)?)
    .bind(SessionStatus::PendingApproval.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

#[instrument(skip(pool))]
pub async fn find_session(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Session>, AppError> {
    info!("Fetching session by ID");
    let row = sqlx::query_as::<_, DbSession>(&format!(
        "SELECT {} FROM sessions WHERE id = ?",
        SESSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Session::from))
}

#[instrument(skip(pool))]
pub async fn get_session(pool: &Pool<Sqlite>, id: &str) -> Result<Session, AppError> {
    find_session(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session with id {} not found", id)))
}

/// Sets the review status; an edited plan replaces the stored one.
#[instrument(skip(pool, plan))]
pub async fn review_session(
    pool: &Pool<Sqlite>,
    id: &str,
    status: SessionStatus,
    plan: Option<&SessionPlan>,
) -> Result<(), AppError> {
    info!(status = %status, edited = plan.is_some(), "Reviewing session");
    let now = Utc::now().naive_utc();

    let result = match plan {
        Some(plan) => {
            sqlx::query(
                "UPDATE sessions SET status = ?, session_plan = ?, title = ?, updated_at = ?
                 WHERE id = ?",
            )
            .bind(status.as_str())
            .bind(serde_json::to_string(plan)?)
            .bind(&plan.title)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?
        }
        None => {
            sqlx::query("UPDATE sessions SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Session with id {} not found",
            id
        )));
    }

    Ok(())
}

#[instrument(skip(pool, notes))]
pub async fn set_session_notes(pool: &Pool<Sqlite>, id: &str, notes: &str) -> Result<(), AppError> {
    info!("Updating session notes");
    sqlx::query("UPDATE sessions SET session_notes = ?, updated_at = ? WHERE id = ?")
        .bind(notes)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, reflection))]
pub async fn set_coach_reflection(
    pool: &Pool<Sqlite>,
    id: &str,
    reflection: &str,
) -> Result<(), AppError> {
    info!("Updating session reflection");
    let result = sqlx::query("UPDATE sessions SET coach_reflection = ?, updated_at = ? WHERE id = ?")
        .bind(reflection)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Session with id {} not found",
            id
        )));
    }

    Ok(())
}
