use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::audit::{log_event, AuditEvent};
use crate::client::ClientSelector;
use crate::database::{
    create_session, find_group, find_person, get_all_tags, get_current_pdp,
    get_recent_observations, get_roster, get_session, get_session_attendance,
    replace_current_pdp, review_session, NewSession,
};
use crate::entities::{resolve_tags, TagResolution};
use crate::error::AppError;
use crate::llm::{complete_json, Completions};
use crate::models::{Attendance, Pdp, PdpContent, Session, SessionPlan, SessionStatus, Tag};
use crate::prompts::{self, PlanFocus};
use crate::validation::{non_blank, JsonValidateExt};

const PDP_OBSERVATION_WINDOW: i64 = 10;

#[derive(Deserialize, Validate)]
pub struct GeneratePdpRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub person_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    pub focus_text: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct GeneratePdpResponse {
    pub success: bool,
    pub pdp: Pdp,
    pub previous_version: Option<i64>,
    pub suggested_tags: Vec<String>,
    pub using_service_role: bool,
}

#[post("/generate-pdp", data = "<request>")]
pub async fn api_generate_pdp(
    request: Json<GeneratePdpRequest>,
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
) -> Result<Json<GeneratePdpResponse>, AppError> {
    let request = request.validate_body()?;
    let db = selector.select().await;
    let pool = db.pool();

    let (person, current, observations, tags) = tokio::try_join!(
        find_person(pool, &request.person_id),
        get_current_pdp(pool, &request.person_id),
        get_recent_observations(pool, &request.person_id, PDP_OBSERVATION_WINDOW),
        get_all_tags(pool),
    )?;

    let person = person
        .ok_or_else(|| AppError::NotFound(format!("Person with id {} not found", request.person_id)))?;

    let focus_text = request
        .focus_text
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty());

    let mut content: PdpContent = complete_json(
        &**llm.inner(),
        &prompts::player_development_plan(
            &person,
            current.as_ref(),
            &observations,
            &tags,
            focus_text,
        ),
        "player_development_plan",
    )
    .await?;

    if content.summary.trim().is_empty() {
        return Err(AppError::Extraction(
            "player_development_plan: model returned an empty summary".to_string(),
        ));
    }

    let mut resolution = resolve_tags(pool, &tags, &content.skill_focus, "skill", "pdp").await;
    resolution.merge(resolve_tags(pool, &tags, &content.constraint_focus, "constraint", "pdp").await);
    content.tag_ids = resolution.tag_ids;

    let pdp = replace_current_pdp(
        pool,
        &person.id,
        &request.coach_id,
        &content,
        focus_text,
    )
    .await?;

    let previous_version = current.map(|p| p.version);
    info!(version = pdp.version, ?previous_version, "Generated PDP");

    log_event(
        pool,
        AuditEvent::PdpGenerated,
        &request.coach_id,
        json!({
            "person_id": person.id,
            "pdp_id": pdp.id,
            "version": pdp.version,
        }),
    )
    .await;

    Ok(Json(GeneratePdpResponse {
        success: true,
        pdp,
        previous_version,
        suggested_tags: resolution.suggested,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct GenerateBlocksRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 6))]
    pub responsibility_level: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 1, max = 6))]
    pub collective_growth_level: Option<i64>,
    #[serde(default)]
    #[validate(required, range(min = 15, max = 240))]
    pub duration: Option<i64>,
}

impl GenerateBlocksRequest {
    /// A non-empty theme wins; otherwise both ARC levels are required.
    pub fn focus(&self) -> Result<PlanFocus<'_>, AppError> {
        if let Some(theme) = self.theme.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(PlanFocus::Theme(theme));
        }

        match (self.responsibility_level, self.collective_growth_level) {
            (Some(responsibility_level), Some(collective_growth_level)) => Ok(PlanFocus::Arc {
                responsibility_level,
                collective_growth_level,
            }),
            _ => Err(AppError::Validation(
                "Provide either theme or both responsibility_level and collective_growth_level"
                    .to_string(),
            )),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct GenerateBlocksResponse {
    pub success: bool,
    pub session_id: String,
    pub session_plan: SessionPlan,
    pub status: SessionStatus,
    pub suggested_tags: Vec<String>,
    pub using_service_role: bool,
}

async fn tag_plan_blocks(
    pool: &sqlx::Pool<sqlx::Sqlite>,
    tags: &[Tag],
    plan: &mut SessionPlan,
) -> TagResolution {
    let mut all = TagResolution::default();

    for block in &mut plan.blocks {
        let mut resolution =
            resolve_tags(pool, tags, &block.skill_tags, "skill", "practice_plan").await;
        resolution.merge(
            resolve_tags(pool, tags, &block.constraint_tags, "constraint", "practice_plan").await,
        );
        block.tag_ids = resolution.tag_ids.clone();
        all.merge(resolution);
    }

    all
}

#[post("/generate-blocks", data = "<request>")]
pub async fn api_generate_blocks(
    request: Json<GenerateBlocksRequest>,
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
) -> Result<Json<GenerateBlocksResponse>, AppError> {
    let request = request.validate_body()?;
    let focus = request.focus()?;
    let duration = request
        .duration
        .ok_or_else(|| AppError::Validation("duration: required".to_string()))?;

    let db = selector.select().await;
    let pool = db.pool();

    if let Some(group_id) = request.group_id.as_deref() {
        find_group(pool, group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group with id {} not found", group_id)))?;
    }

    let (roster, tags) = tokio::try_join!(
        get_roster(pool, &request.coach_id, request.group_id.as_deref()),
        get_all_tags(pool),
    )?;

    let mut plan: SessionPlan = complete_json(
        &**llm.inner(),
        &prompts::practice_plan(&focus, duration, &roster, &tags),
        "practice_plan",
    )
    .await?;

    if plan.blocks.is_empty() {
        return Err(AppError::Extraction(
            "practice_plan: model returned a plan with no blocks".to_string(),
        ));
    }

    let planned = plan.total_minutes();
    if u64::try_from(duration).ok() != Some(planned) {
        warn!(
            requested = duration,
            planned,
            "Practice plan duration differs from request"
        );
    }

    let resolution = tag_plan_blocks(pool, &tags, &mut plan).await;

    let theme = match focus {
        PlanFocus::Theme(theme) => Some(theme),
        PlanFocus::Arc { .. } => None,
    };

    let session_id = create_session(
        pool,
        NewSession {
            coach_id: &request.coach_id,
            group_id: request.group_id.as_deref(),
            theme,
            duration_minutes: duration,
            plan: &plan,
        },
    )
    .await?;

    info!(%session_id, blocks = plan.blocks.len(), "Generated practice plan");

    log_event(
        pool,
        AuditEvent::PracticePlanGenerated,
        &request.coach_id,
        json!({
            "session_id": session_id,
            "group_id": request.group_id,
            "theme": theme,
            "responsibility_level": request.responsibility_level,
            "collective_growth_level": request.collective_growth_level,
            "duration": duration,
        }),
    )
    .await;

    Ok(Json(GenerateBlocksResponse {
        success: true,
        session_id,
        session_plan: plan,
        status: SessionStatus::PendingApproval,
        suggested_tags: resolution.suggested,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session: Session,
    pub attendance: Vec<Attendance>,
    pub using_service_role: bool,
}

#[get("/sessions/<id>")]
pub async fn api_get_session(
    id: &str,
    selector: &State<ClientSelector>,
) -> Result<Json<SessionResponse>, AppError> {
    let db = selector.select().await;
    let pool = db.pool();

    let session = get_session(pool, id).await?;
    let attendance = get_session_attendance(pool, id).await?;

    Ok(Json(SessionResponse {
        success: true,
        session,
        attendance,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct ReviewSessionRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub coach_id: String,
    #[serde(default)]
    #[validate(custom(function = "non_blank"))]
    pub status: String,
    #[serde(default)]
    pub session_plan: Option<SessionPlan>,
}

#[derive(Serialize, Deserialize)]
pub struct ReviewSessionResponse {
    pub success: bool,
    pub session: Session,
    pub using_service_role: bool,
}

#[post("/sessions/<id>/review", data = "<request>")]
pub async fn api_review_session(
    id: &str,
    request: Json<ReviewSessionRequest>,
    selector: &State<ClientSelector>,
) -> Result<Json<ReviewSessionResponse>, AppError> {
    let request = request.validate_body()?;

    let status: SessionStatus = request.status.parse()?;
    if status == SessionStatus::PendingApproval {
        return Err(AppError::Validation(
            "status: must be approved or rejected".to_string(),
        ));
    }

    if let Some(plan) = &request.session_plan {
        if plan.blocks.is_empty() {
            return Err(AppError::Validation(
                "session_plan: must contain at least one block".to_string(),
            ));
        }
    }

    let db = selector.select().await;
    let pool = db.pool();

    review_session(pool, id, status, request.session_plan.as_ref()).await?;
    let session = get_session(pool, id).await?;

    log_event(
        pool,
        AuditEvent::SessionReviewed,
        &request.coach_id,
        json!({
            "session_id": id,
            "status": status,
            "edited": request.session_plan.is_some(),
        }),
    )
    .await;

    Ok(Json(ReviewSessionResponse {
        success: true,
        session,
        using_service_role: db.using_service_role(),
    }))
}
