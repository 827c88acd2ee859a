use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::analysis::{
    ObservationAnalysis, ReflectionAnalysis, SessionNotesAnalysis, SimpleObservationAnalysis,
};
use crate::audit::{log_event, AuditEvent};
use crate::client::ClientSelector;
use crate::database::{
    get_all_tags, get_person, get_roster, get_session, insert_intake, insert_observation_log,
    set_coach_reflection, set_session_notes, NewIntake, NewObservationLog,
};
use crate::entities::{record_player_mentions, resolve_tags, LoggedMention, MentionSource};
use crate::error::{AppError, BestEffort};
use crate::llm::{complete_json, Completions};
use crate::models::IntakeType;
use crate::prompts;
use crate::validation::{non_blank, JsonValidateExt};

#[derive(Deserialize, Validate)]
pub struct LogObservationRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub observation_text: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct LogObservationResponse {
    pub success: bool,
    pub intake_id: String,
    pub analysis: ObservationAnalysis,
    pub observations: Vec<LoggedMention>,
    pub unmatched_players: Vec<String>,
    pub suggested_tags: Vec<String>,
    pub using_service_role: bool,
}

#[post("/log-observation", data = "<request>")]
pub async fn api_log_observation(
    request: Json<LogObservationRequest>,
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
) -> Result<Json<LogObservationResponse>, AppError> {
    let request = request.validate_body()?;
    let db = selector.select().await;
    let pool = db.pool();

    let (roster, tags) = tokio::try_join!(
        get_roster(pool, &request.coach_id, request.group_id.as_deref()),
        get_all_tags(pool),
    )?;

    let analysis: ObservationAnalysis = complete_json(
        &**llm.inner(),
        &prompts::observation(&roster, &tags, &request.observation_text),
        "observation",
    )
    .await?;

    let intake_id = insert_intake(
        pool,
        NewIntake {
            coach_id: &request.coach_id,
            session_id: request.session_id.as_deref(),
            group_id: request.group_id.as_deref(),
            intake_type: IntakeType::Observation,
            raw_text: &request.observation_text,
            analysis: &analysis,
        },
    )
    .await?;

    let mut outcome = record_player_mentions(
        pool,
        &MentionSource {
            intake_id: &intake_id,
            coach_id: &request.coach_id,
            session_id: request.session_id.as_deref(),
            source: "observation",
        },
        &roster,
        &tags,
        &analysis.players,
    )
    .await?;

    let general_skills =
        resolve_tags(pool, &tags, &analysis.skill_tags, "skill", "observation").await;
    let general_constraints =
        resolve_tags(pool, &tags, &analysis.constraint_tags, "constraint", "observation").await;
    outcome.suggested_tags.extend(general_skills.suggested);
    outcome.suggested_tags.extend(general_constraints.suggested);

    log_event(
        pool,
        AuditEvent::ObservationLogged,
        &request.coach_id,
        json!({
            "intake_id": intake_id,
            "observations": outcome.logged.len(),
            "unmatched_players": outcome.unmatched_players,
        }),
    )
    .await;

    Ok(Json(LogObservationResponse {
        success: true,
        intake_id,
        analysis,
        observations: outcome.logged,
        unmatched_players: outcome.unmatched_players,
        suggested_tags: outcome.suggested_tags,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct LogObservationSimpleRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub person_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub observation_text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct LogObservationSimpleResponse {
    pub success: bool,
    pub intake_id: String,
    pub observation_id: String,
    pub analysis: SimpleObservationAnalysis,
    pub tag_ids: Vec<i64>,
    pub suggested_tags: Vec<String>,
    pub using_service_role: bool,
}

#[post("/log-observation-simple", data = "<request>")]
pub async fn api_log_observation_simple(
    request: Json<LogObservationSimpleRequest>,
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
) -> Result<Json<LogObservationSimpleResponse>, AppError> {
    let request = request.validate_body()?;
    let db = selector.select().await;
    let pool = db.pool();

    let (person, tags) = tokio::try_join!(
        get_person(pool, &request.person_id),
        get_all_tags(pool),
    )?;

    let analysis: SimpleObservationAnalysis = complete_json(
        &**llm.inner(),
        &prompts::simple_observation(&person, &tags, &request.observation_text),
        "simple_observation",
    )
    .await?;

    let mut resolution = resolve_tags(
        pool,
        &tags,
        &analysis.skill_tags,
        "skill",
        "observation_simple",
    )
    .await;
    resolution.merge(
        resolve_tags(
            pool,
            &tags,
            &analysis.constraint_tags,
            "constraint",
            "observation_simple",
        )
        .await,
    );

    let intake_id = insert_intake(
        pool,
        NewIntake {
            coach_id: &request.coach_id,
            session_id: request.session_id.as_deref(),
            group_id: None,
            intake_type: IntakeType::ObservationSimple,
            raw_text: &request.observation_text,
            analysis: &analysis,
        },
    )
    .await?;

    let note = if analysis.summary.trim().is_empty() {
        request.observation_text.trim()
    } else {
        analysis.summary.as_str()
    };

    let observation_id = insert_observation_log(
        pool,
        NewObservationLog {
            intake_id: &intake_id,
            person_id: &person.id,
            coach_id: &request.coach_id,
            session_id: request.session_id.as_deref(),
            note,
            sentiment: analysis.sentiment.as_deref(),
            tag_ids: &resolution.tag_ids,
        },
    )
    .await?;

    info!(%observation_id, person_id = %person.id, "Logged observation");

    log_event(
        pool,
        AuditEvent::ObservationLogged,
        &request.coach_id,
        json!({
            "intake_id": intake_id,
            "person_id": person.id,
            "observation_id": observation_id,
        }),
    )
    .await;

    Ok(Json(LogObservationSimpleResponse {
        success: true,
        intake_id,
        observation_id,
        analysis,
        tag_ids: resolution.tag_ids,
        suggested_tags: resolution.suggested,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct LogReflectionRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub reflection_text: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct LogReflectionResponse {
    pub success: bool,
    pub intake_id: String,
    pub analysis: ReflectionAnalysis,
    pub observations: Vec<LoggedMention>,
    pub unmatched_players: Vec<String>,
    pub session_updated: bool,
    pub using_service_role: bool,
}

#[post("/log-reflection", data = "<request>")]
pub async fn api_log_reflection(
    request: Json<LogReflectionRequest>,
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
) -> Result<Json<LogReflectionResponse>, AppError> {
    let request = request.validate_body()?;
    let db = selector.select().await;
    let pool = db.pool();

    let (roster, tags) = tokio::try_join!(
        get_roster(pool, &request.coach_id, request.group_id.as_deref()),
        get_all_tags(pool),
    )?;

    let analysis: ReflectionAnalysis = complete_json(
        &**llm.inner(),
        &prompts::reflection(&roster, &request.reflection_text),
        "reflection",
    )
    .await?;

    let intake_id = insert_intake(
        pool,
        NewIntake {
            coach_id: &request.coach_id,
            session_id: request.session_id.as_deref(),
            group_id: request.group_id.as_deref(),
            intake_type: IntakeType::Reflection,
            raw_text: &request.reflection_text,
            analysis: &analysis,
        },
    )
    .await?;

    let outcome = record_player_mentions(
        pool,
        &MentionSource {
            intake_id: &intake_id,
            coach_id: &request.coach_id,
            session_id: request.session_id.as_deref(),
            source: "reflection",
        },
        &roster,
        &tags,
        &analysis.players,
    )
    .await?;

    let session_updated = match request.session_id.as_deref() {
        Some(session_id) => set_coach_reflection(pool, session_id, &request.reflection_text)
            .await
            .best_effort("copy reflection onto session")
            .is_some(),
        None => false,
    };

    log_event(
        pool,
        AuditEvent::ReflectionLogged,
        &request.coach_id,
        json!({
            "intake_id": intake_id,
            "session_id": request.session_id,
            "observations": outcome.logged.len(),
        }),
    )
    .await;

    Ok(Json(LogReflectionResponse {
        success: true,
        intake_id,
        analysis,
        observations: outcome.logged,
        unmatched_players: outcome.unmatched_players,
        session_updated,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct SessionNotesRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub session_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub notes_text: String,
}

#[derive(Serialize, Deserialize)]
pub struct SessionNotesResponse {
    pub success: bool,
    pub intake_id: String,
    pub analysis: SessionNotesAnalysis,
    pub observations: Vec<LoggedMention>,
    pub unmatched_players: Vec<String>,
    pub suggested_tags: Vec<String>,
    pub using_service_role: bool,
}

#[post("/session-notes", data = "<request>")]
pub async fn api_session_notes(
    request: Json<SessionNotesRequest>,
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
) -> Result<Json<SessionNotesResponse>, AppError> {
    let request = request.validate_body()?;
    let db = selector.select().await;
    let pool = db.pool();

    let session = get_session(pool, &request.session_id).await?;

    let (roster, tags) = tokio::try_join!(
        get_roster(pool, &session.coach_id, session.group_id.as_deref()),
        get_all_tags(pool),
    )?;

    let analysis: SessionNotesAnalysis = complete_json(
        &**llm.inner(),
        &prompts::session_notes(&session.session_plan, &roster, &tags, &request.notes_text),
        "session_notes",
    )
    .await?;

    let intake_id = insert_intake(
        pool,
        NewIntake {
            coach_id: &request.coach_id,
            session_id: Some(&session.id),
            group_id: session.group_id.as_deref(),
            intake_type: IntakeType::SessionNotes,
            raw_text: &request.notes_text,
            analysis: &analysis,
        },
    )
    .await?;

    let outcome = record_player_mentions(
        pool,
        &MentionSource {
            intake_id: &intake_id,
            coach_id: &request.coach_id,
            session_id: Some(&session.id),
            source: "session_notes",
        },
        &roster,
        &tags,
        &analysis.players,
    )
    .await?;

    set_session_notes(pool, &session.id, &request.notes_text)
        .await
        .best_effort("copy notes onto session");

    log_event(
        pool,
        AuditEvent::SessionNotesLogged,
        &request.coach_id,
        json!({
            "intake_id": intake_id,
            "session_id": session.id,
            "observations": outcome.logged.len(),
        }),
    )
    .await;

    Ok(Json(SessionNotesResponse {
        success: true,
        intake_id,
        analysis,
        observations: outcome.logged,
        unmatched_players: outcome.unmatched_players,
        suggested_tags: outcome.suggested_tags,
        using_service_role: db.using_service_role(),
    }))
}
