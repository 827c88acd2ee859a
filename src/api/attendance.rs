use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::analysis::{AttendanceExtraction, PlayerMention};
use crate::audit::{log_event, AuditEvent};
use crate::client::ClientSelector;
use crate::database::{
    find_group, get_group_roster, get_session, insert_intake, upsert_attendance, NewIntake,
};
use crate::entities::{flag_unmatched_players, player_candidates};
use crate::error::{AppError, BestEffort};
use crate::llm::{complete_json, Completions};
use crate::matching::resolve_all;
use crate::models::{IntakeType, Person};
use crate::prompts;
use crate::validation::{non_blank, JsonValidateExt};

#[derive(Deserialize, Validate)]
pub struct AttendanceVerificationRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub reflection_text: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub group_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    AbsentCheck,
    AddConfirmation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingPlayerPrompt {
    pub person_id: String,
    pub display_name: String,
    pub prompt_type: PromptType,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionedPlayer {
    pub person_id: String,
    pub display_name: String,
    pub mentioned_as: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub group_id: String,
    pub session_id: Option<String>,
    pub roster_size: usize,
    pub mentioned_players: Vec<MentionedPlayer>,
    pub unmatched_names: Vec<String>,
    pub missing_players_prompts: Vec<MissingPlayerPrompt>,
}

#[derive(Serialize, Deserialize)]
pub struct AttendanceVerificationResponse {
    pub success: bool,
    pub verification_result: VerificationResult,
    pub using_service_role: bool,
}

/// Compares the players a reflection mentions against the roster. Everyone
/// left out gets an absence check and an offer to add a note.
pub fn verify_attendance(
    group_id: &str,
    session_id: Option<&str>,
    roster: &[Person],
    mentions: &[PlayerMention],
) -> VerificationResult {
    let names: Vec<String> = mentions.iter().map(|m| m.name.clone()).collect();
    let resolution = resolve_all(&names, &player_candidates(roster));

    let mentioned_players: Vec<MentionedPlayer> = resolution
        .matched
        .iter()
        .filter_map(|(name, person_id)| {
            let person = roster.iter().find(|p| &p.id == person_id)?;
            let note = mentions
                .iter()
                .find(|m| &m.name == name)
                .map(|m| m.note.clone())
                .unwrap_or_default();

            Some(MentionedPlayer {
                person_id: person.id.clone(),
                display_name: person.display_name.clone(),
                mentioned_as: name.clone(),
                note,
            })
        })
        .collect();

    let missing_players_prompts = roster
        .iter()
        .filter(|p| !mentioned_players.iter().any(|m| m.person_id == p.id))
        .flat_map(|p| {
            [
                MissingPlayerPrompt {
                    person_id: p.id.clone(),
                    display_name: p.display_name.clone(),
                    prompt_type: PromptType::AbsentCheck,
                    message: format!(
                        "{} wasn't mentioned in your reflection. Were they absent today?",
                        p.display_name
                    ),
                },
                MissingPlayerPrompt {
                    person_id: p.id.clone(),
                    display_name: p.display_name.clone(),
                    prompt_type: PromptType::AddConfirmation,
                    message: format!(
                        "Would you like to add a note about {} from today's practice?",
                        p.display_name
                    ),
                },
            ]
        })
        .collect();

    VerificationResult {
        group_id: group_id.to_string(),
        session_id: session_id.map(String::from),
        roster_size: roster.len(),
        mentioned_players,
        unmatched_names: resolution.unmatched,
        missing_players_prompts,
    }
}

#[post("/attendance-verification", data = "<request>")]
pub async fn api_attendance_verification(
    request: Json<AttendanceVerificationRequest>,
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
) -> Result<Json<AttendanceVerificationResponse>, AppError> {
    let request = request.validate_body()?;
    let db = selector.select().await;
    let pool = db.pool();

    find_group(pool, &request.group_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Group with id {} not found", request.group_id)))?;

    if let Some(session_id) = &request.session_id {
        get_session(pool, session_id).await?;
    }

    let roster = get_group_roster(pool, &request.group_id).await?;
    if roster.is_empty() {
        warn!(group_id = %request.group_id, "Group has no players");
    }

    let extraction: AttendanceExtraction = complete_json(
        &**llm.inner(),
        &prompts::attendance_verification(&roster, &request.reflection_text),
        "attendance_verification",
    )
    .await?;

    let result = verify_attendance(
        &request.group_id,
        request.session_id.as_deref(),
        &roster,
        &extraction.players_mentioned,
    );

    info!(
        mentioned = result.mentioned_players.len(),
        prompts = result.missing_players_prompts.len(),
        "Verified attendance"
    );

    insert_intake(
        pool,
        NewIntake {
            coach_id: &request.coach_id,
            session_id: request.session_id.as_deref(),
            group_id: Some(&request.group_id),
            intake_type: IntakeType::AttendanceVerification,
            raw_text: &request.reflection_text,
            analysis: &result,
        },
    )
    .await
    .best_effort("store attendance verification intake");

    flag_unmatched_players(
        pool,
        &result.unmatched_names,
        "attendance_verification",
        request.session_id.as_deref(),
    )
    .await;

    log_event(
        pool,
        AuditEvent::AttendanceVerified,
        &request.coach_id,
        json!({
            "group_id": request.group_id,
            "session_id": request.session_id,
            "mentioned": result.mentioned_players.len(),
            "missing": result.roster_size - result.mentioned_players.len(),
        }),
    )
    .await;

    Ok(Json(AttendanceVerificationResponse {
        success: true,
        verification_result: result,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct AttendanceLogRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub session_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "must contain at least one record"))]
    pub attendance_data: Vec<AttendanceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default)]
    pub person_id: String,
    #[serde(default)]
    pub present: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendanceRecordError {
    pub person_id: String,
    pub error: String,
}

#[derive(Serialize, Deserialize)]
pub struct AttendanceLogResponse {
    pub success: bool,
    pub session_id: String,
    pub present_count: usize,
    pub absent_count: usize,
    pub recorded_count: usize,
    pub errors: Vec<AttendanceRecordError>,
    pub using_service_role: bool,
}

#[post("/attendance-log", data = "<request>")]
pub async fn api_attendance_log(
    request: Json<AttendanceLogRequest>,
    selector: &State<ClientSelector>,
) -> Result<Json<AttendanceLogResponse>, AppError> {
    let request = request.validate_body()?;
    let db = selector.select().await;
    let pool = db.pool();

    get_session(pool, &request.session_id).await?;

    let mut present_count = 0;
    let mut absent_count = 0;
    let mut errors = Vec::new();

    for record in &request.attendance_data {
        if record.person_id.trim().is_empty() {
            errors.push(AttendanceRecordError {
                person_id: record.person_id.clone(),
                error: "person_id is required".to_string(),
            });
            continue;
        }

        let Some(present) = record.present else {
            errors.push(AttendanceRecordError {
                person_id: record.person_id.clone(),
                error: "present is required".to_string(),
            });
            continue;
        };

        match upsert_attendance(
            pool,
            &request.session_id,
            &record.person_id,
            present,
            record.notes.as_deref(),
            &request.coach_id,
        )
        .await
        {
            Ok(()) if present => present_count += 1,
            Ok(()) => absent_count += 1,
            Err(e) => {
                e.log_and_record("Attendance upsert");
                errors.push(AttendanceRecordError {
                    person_id: record.person_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let recorded_count = present_count + absent_count;
    info!(recorded_count, failed = errors.len(), "Logged attendance");

    log_event(
        pool,
        AuditEvent::AttendanceLogged,
        &request.coach_id,
        json!({
            "session_id": request.session_id,
            "present": present_count,
            "absent": absent_count,
            "errors": errors.len(),
        }),
    )
    .await;

    Ok(Json(AttendanceLogResponse {
        success: true,
        session_id: request.session_id,
        present_count,
        absent_count,
        recorded_count,
        errors,
        using_service_role: db.using_service_role(),
    }))
}
