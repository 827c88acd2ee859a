use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

fn parse_json_column<T: DeserializeOwned + Default>(column: &str, raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(column, error = %e, "Unreadable JSON column, using an empty value");
        T::default()
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    pub roles: Vec<String>,
    pub advancement_level: i64,
    pub responsibility_tier: i64,
    pub collective_growth_phase: i64,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPerson {
    pub id: String,
    pub display_name: String,
    pub aliases: String,
    pub roles: String,
    pub advancement_level: i64,
    pub responsibility_tier: i64,
    pub collective_growth_phase: i64,
}

impl From<DbPerson> for Person {
    fn from(row: DbPerson) -> Self {
        Self {
            id: row.id,
            display_name: row.display_name,
            aliases: parse_json_column("aliases", &row.aliases),
            roles: parse_json_column("roles", &row.roles),
            advancement_level: row.advancement_level,
            responsibility_tier: row.responsibility_tier,
            collective_growth_phase: row.collective_growth_phase,
        }
    }
}

impl Person {
    pub fn is_player(&self) -> bool {
        self.roles.iter().any(|r| r == "player")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub coach_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PendingApproval,
    Approved,
    Rejected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::PendingApproval => "pending_approval",
            SessionStatus::Approved => "approved",
            SessionStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_approval" => Ok(SessionStatus::PendingApproval),
            "approved" => Ok(SessionStatus::Approved),
            "rejected" => Ok(SessionStatus::Rejected),
            other => Err(AppError::Validation(format!(
                "Unknown session status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeBlock {
    pub name: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default)]
    pub constraint_tags: Vec<String>,
    #[serde(default)]
    pub coaching_cues: Vec<String>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub title: String,
    pub blocks: Vec<PracticeBlock>,
}

impl SessionPlan {
    /// Summed as u64 so no combination of block lengths can overflow.
    pub fn total_minutes(&self) -> u64 {
        self.blocks.iter().map(|b| u64::from(b.duration_minutes)).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub coach_id: String,
    pub group_id: Option<String>,
    pub title: String,
    pub theme: Option<String>,
    pub duration_minutes: i64,
    pub session_plan: SessionPlan,
    pub status: SessionStatus,
    pub session_notes: Option<String>,
    pub coach_reflection: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSession {
    pub id: String,
    pub coach_id: String,
    pub group_id: Option<String>,
    pub title: String,
    pub theme: Option<String>,
    pub duration_minutes: i64,
    pub session_plan: String,
    pub status: String,
    pub session_notes: Option<String>,
    pub coach_reflection: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<DbSession> for Session {
    fn from(row: DbSession) -> Self {
        let status = row.status.parse().unwrap_or_else(|_| {
            warn!(
                session_id = %row.id,
                status = %row.status,
                "Unknown session status, treating as pending"
            );
            SessionStatus::PendingApproval
        });

        Self {
            id: row.id,
            coach_id: row.coach_id,
            group_id: row.group_id,
            title: row.title,
            theme: row.theme,
            duration_minutes: row.duration_minutes,
            session_plan: parse_json_column("session_plan", &row.session_plan),
            status,
            session_notes: row.session_notes,
            coach_reflection: row.coach_reflection,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdpContent {
    pub summary: String,
    #[serde(default)]
    pub skill_focus: Vec<String>,
    #[serde(default)]
    pub constraint_focus: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub recommended_drills: Vec<String>,
    #[serde(default)]
    pub arc_notes: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pdp {
    pub id: String,
    pub person_id: String,
    pub coach_id: String,
    pub version: i64,
    pub content: PdpContent,
    pub focus_text: Option<String>,
    pub is_current: bool,
    pub archived_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPdp {
    pub id: String,
    pub person_id: String,
    pub coach_id: String,
    pub version: i64,
    pub content: String,
    pub focus_text: Option<String>,
    pub is_current: bool,
    pub archived_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<DbPdp> for Pdp {
    fn from(row: DbPdp) -> Self {
        Self {
            id: row.id,
            person_id: row.person_id,
            coach_id: row.coach_id,
            version: row.version,
            content: parse_json_column("content", &row.content),
            focus_text: row.focus_text,
            is_current: row.is_current,
            archived_at: row.archived_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub tag_type: String,
    pub synonyms: Vec<String>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTag {
    pub id: i64,
    pub name: String,
    pub tag_type: String,
    pub synonyms: String,
}

impl From<DbTag> for Tag {
    fn from(row: DbTag) -> Self {
        Self {
            id: row.id,
            name: row.name,
            tag_type: row.tag_type,
            synonyms: parse_json_column("synonyms", &row.synonyms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TagSuggestion {
    pub id: i64,
    pub raw_name: String,
    pub tag_type: String,
    pub source: String,
    pub context: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeType {
    Observation,
    ObservationSimple,
    Reflection,
    SessionNotes,
    AttendanceVerification,
}

impl IntakeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeType::Observation => "observation",
            IntakeType::ObservationSimple => "observation_simple",
            IntakeType::Reflection => "reflection",
            IntakeType::SessionNotes => "session_notes",
            IntakeType::AttendanceVerification => "attendance_verification",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationLog {
    pub id: String,
    pub intake_id: String,
    pub person_id: String,
    pub coach_id: String,
    pub session_id: Option<String>,
    pub note: String,
    pub sentiment: Option<String>,
    pub tag_ids: Vec<i64>,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbObservationLog {
    pub id: String,
    pub intake_id: String,
    pub person_id: String,
    pub coach_id: String,
    pub session_id: Option<String>,
    pub note: String,
    pub sentiment: Option<String>,
    pub tag_ids: String,
    pub created_at: NaiveDateTime,
}

impl From<DbObservationLog> for ObservationLog {
    fn from(row: DbObservationLog) -> Self {
        Self {
            id: row.id,
            intake_id: row.intake_id,
            person_id: row.person_id,
            coach_id: row.coach_id,
            session_id: row.session_id,
            note: row.note,
            sentiment: row.sentiment,
            tag_ids: parse_json_column("tag_ids", &row.tag_ids),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub session_id: String,
    pub person_id: String,
    pub present: bool,
    pub notes: Option<String>,
    pub recorded_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_round_trips_through_text() {
        for status in [
            SessionStatus::PendingApproval,
            SessionStatus::Approved,
            SessionStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("archived".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn malformed_json_columns_fall_back_to_empty() {
        let person = Person::from(DbPerson {
            id: "p1".to_string(),
            display_name: "Maya Lopez".to_string(),
            aliases: "not json".to_string(),
            roles: r#"["player"]"#.to_string(),
            advancement_level: 3,
            responsibility_tier: 2,
            collective_growth_phase: 1,
        });

        assert!(person.aliases.is_empty());
        assert!(person.is_player());
    }

    #[test]
    fn plan_totals_block_minutes() {
        let plan = SessionPlan {
            title: "Closeouts".to_string(),
            blocks: vec![
                PracticeBlock {
                    name: "Warmup".to_string(),
                    duration_minutes: 10,
                    ..Default::default()
                },
                PracticeBlock {
                    name: "Shell drill".to_string(),
                    duration_minutes: 25,
                    ..Default::default()
                },
            ],
        };
        assert_eq!(plan.total_minutes(), 35);
    }

    #[test]
    fn plan_total_does_not_overflow_on_huge_blocks() {
        let plan = SessionPlan {
            title: "Marathon".to_string(),
            blocks: vec![
                PracticeBlock {
                    name: "Endless shell".to_string(),
                    duration_minutes: 4_000_000_000,
                    ..Default::default()
                },
                PracticeBlock {
                    name: "Endless scrimmage".to_string(),
                    duration_minutes: 4_000_000_000,
                    ..Default::default()
                },
            ],
        };
        assert_eq!(plan.total_minutes(), 8_000_000_000);
    }
}
