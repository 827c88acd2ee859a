use chrono::Utc;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbObservationLog, IntakeType, ObservationLog};

pub struct NewIntake<'a, A: Serialize> {
    pub coach_id: &'a str,
    pub session_id: Option<&'a str>,
    pub group_id: Option<&'a str>,
    pub intake_type: IntakeType,
    pub raw_text: &'a str,
    pub analysis: &'a A,
}

#[instrument(skip_all, fields(intake_type = intake.intake_type.as_str()))]
pub async fn insert_intake<A: Serialize>(
    pool: &Pool<Sqlite>,
    intake: NewIntake<'_, A>,
) -> Result<String, AppError> {
    info!("Storing observation intake");
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO observation_intake
         (id, coach_id, session_id, group_id, intake_type, raw_text, analysis, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(intake.coach_id)
    .bind(intake.session_id)
    .bind(intake.group_id)
    .bind(intake.intake_type.as_str())
    .bind(intake.raw_text)
    .bind(serde_json::to_string(intake.analysis)?)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(id)
}

pub struct NewObservationLog<'a> {
    pub intake_id: &'a str,
    pub person_id: &'a str,
    pub coach_id: &'a str,
    pub session_id: Option<&'a str>,
    pub note: &'a str,
    pub sentiment: Option<&'a str>,
    pub tag_ids: &'a [i64],
}

#[instrument(skip_all, fields(person_id = %log.person_id))]
pub async fn insert_observation_log(
    pool: &Pool<Sqlite>,
    log: NewObservationLog<'_>,
) -> Result<String, AppError> {
    info!("Storing observation log");
    let id = uuid::Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO observation_logs
         (id, intake_id, person_id, coach_id, session_id, note, sentiment, tag_ids, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(log.intake_id)
    .bind(log.person_id)
    .bind(log.coach_id)
    .bind(log.session_id)
    .bind(log.note)
    .bind(log.sentiment)
    .bind(serde_json::to_string(log.tag_ids)?)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(id)
}

#[instrument(skip(pool))]
pub async fn get_recent_observations(
    pool: &Pool<Sqlite>,
    person_id: &str,
    limit: i64,
) -> Result<Vec<ObservationLog>, AppError> {
    info!("Getting recent observations");
    let rows = sqlx::query_as::<_, DbObservationLog>(
        "SELECT id, intake_id, person_id, coach_id, session_id, note, sentiment, tag_ids, created_at
         FROM observation_logs WHERE person_id = ?
         ORDER BY created_at DESC LIMIT ?",
    )
    .bind(person_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ObservationLog::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_observations_for_intake(
    pool: &Pool<Sqlite>,
    intake_id: &str,
) -> Result<Vec<ObservationLog>, AppError> {
    let rows = sqlx::query_as::<_, DbObservationLog>(
        "SELECT id, intake_id, person_id, coach_id, session_id, note, sentiment, tag_ids, created_at
         FROM observation_logs WHERE intake_id = ?
         ORDER BY created_at",
    )
    .bind(intake_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ObservationLog::from).collect())
}

/// Unresolved player names waiting for a human to map them.
#[instrument(skip(pool, context))]
pub async fn record_flagged_entity(
    pool: &Pool<Sqlite>,
    raw_name: &str,
    entity_type: &str,
    source: &str,
    context: Option<&str>,
) -> Result<(), AppError> {
    info!("Flagging unmatched entity");
    sqlx::query(
        "INSERT INTO flagged_entities (raw_name, entity_type, source, context, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(raw_name)
    .bind(entity_type)
    .bind(source)
    .bind(context)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(())
}
