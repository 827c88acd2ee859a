use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::error::AppError;

#[instrument(skip(pool, payload))]
pub async fn insert_audit_event(
    pool: &Pool<Sqlite>,
    event_type: &str,
    actor_id: Option<&str>,
    payload: &serde_json::Value,
) -> Result<i64, AppError> {
    let res = sqlx::query(
        "INSERT INTO audit_log (event_type, actor_id, payload, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(event_type)
    .bind(actor_id)
    .bind(payload.to_string())
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Row counts for the diagnostics route.
#[instrument(skip(pool))]
pub async fn count_rows(pool: &Pool<Sqlite>, table: Table) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table.name()))
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[derive(Debug, Clone, Copy)]
pub enum Table {
    Persons,
    Sessions,
    Pdps,
    Tags,
    ObservationLogs,
    Attendance,
    AuditLog,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Persons,
        Table::Sessions,
        Table::Pdps,
        Table::Tags,
        Table::ObservationLogs,
        Table::Attendance,
        Table::AuditLog,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Persons => "persons",
            Table::Sessions => "sessions",
            Table::Pdps => "pdps",
            Table::Tags => "tags",
            Table::ObservationLogs => "observation_logs",
            Table::Attendance => "attendance",
            Table::AuditLog => "audit_log",
        }
    }
}
