use serde_json::Value;
use sqlx::{Pool, Sqlite};
use tracing::debug;

use crate::database::insert_audit_event;
use crate::error::BestEffort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent {
    AttendanceVerified,
    AttendanceLogged,
    PdpGenerated,
    PracticePlanGenerated,
    SessionReviewed,
    ObservationLogged,
    ReflectionLogged,
    SessionNotesLogged,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::AttendanceVerified => "attendance_verified",
            AuditEvent::AttendanceLogged => "attendance_logged",
            AuditEvent::PdpGenerated => "pdp_generated",
            AuditEvent::PracticePlanGenerated => "practice_plan_generated",
            AuditEvent::SessionReviewed => "session_reviewed",
            AuditEvent::ObservationLogged => "observation_logged",
            AuditEvent::ReflectionLogged => "reflection_logged",
            AuditEvent::SessionNotesLogged => "session_notes_logged",
        }
    }
}

/// Writes an audit row. Never fails the caller; insert errors are only logged.
pub async fn log_event(pool: &Pool<Sqlite>, event: AuditEvent, actor_id: &str, payload: Value) {
    let stored = insert_audit_event(pool, event.as_str(), Some(actor_id), &payload)
        .await
        .best_effort("audit log insert");

    if let Some(id) = stored {
        debug!(audit_id = id, event = event.as_str(), actor_id, "Audit event stored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::utils::TestDbBuilder;
    use serde_json::json;

    #[rocket::async_test]
    async fn events_are_stored_and_failures_swallowed() {
        let db = TestDbBuilder::new().build().await.unwrap();

        log_event(&db.pool, AuditEvent::PdpGenerated, "c1", json!({"version": 1})).await;
        assert_eq!(
            db.count("SELECT COUNT(*) FROM audit_log WHERE event_type = 'pdp_generated'")
                .await,
            1
        );

        sqlx::query("DROP TABLE audit_log")
            .execute(&db.pool)
            .await
            .unwrap();

        // Must return normally even though the insert fails.
        log_event(&db.pool, AuditEvent::SessionReviewed, "c1", json!({})).await;
    }
}
