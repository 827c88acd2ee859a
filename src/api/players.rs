use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::client::ClientSelector;
use crate::database::{
    find_person, get_current_pdp, get_pdp_history, get_pending_tag_suggestions,
    get_recent_observations,
};
use crate::error::AppError;
use crate::models::{ObservationLog, Pdp, Person, TagSuggestion};

const DEVELOPMENT_OBSERVATION_WINDOW: i64 = 20;

#[derive(Serialize, Deserialize)]
pub struct PlayerDevelopmentResponse {
    pub success: bool,
    pub person: Person,
    pub current_pdp: Option<Pdp>,
    pub archived_pdp_count: usize,
    pub recent_observations: Vec<ObservationLog>,
    pub using_service_role: bool,
}

#[get("/players/<id>/development")]
pub async fn api_player_development(
    id: &str,
    selector: &State<ClientSelector>,
) -> Result<Json<PlayerDevelopmentResponse>, AppError> {
    let db = selector.select().await;
    let pool = db.pool();

    let (person, current_pdp, history, recent_observations) = tokio::try_join!(
        find_person(pool, id),
        get_current_pdp(pool, id),
        get_pdp_history(pool, id),
        get_recent_observations(pool, id, DEVELOPMENT_OBSERVATION_WINDOW),
    )?;

    let person =
        person.ok_or_else(|| AppError::NotFound(format!("Person with id {} not found", id)))?;

    Ok(Json(PlayerDevelopmentResponse {
        success: true,
        person,
        current_pdp,
        archived_pdp_count: history.iter().filter(|p| !p.is_current).count(),
        recent_observations,
        using_service_role: db.using_service_role(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct TagSuggestionsResponse {
    pub success: bool,
    pub suggestions: Vec<TagSuggestion>,
    pub using_service_role: bool,
}

#[get("/tag-suggestions")]
pub async fn api_tag_suggestions(
    selector: &State<ClientSelector>,
) -> Result<Json<TagSuggestionsResponse>, AppError> {
    let db = selector.select().await;

    Ok(Json(TagSuggestionsResponse {
        success: true,
        suggestions: get_pending_tag_suggestions(db.pool()).await?,
        using_service_role: db.using_service_role(),
    }))
}
