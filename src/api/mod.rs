mod attendance;
mod diagnostics;
mod observations;
mod planning;
mod players;

pub use attendance::*;
pub use diagnostics::*;
pub use observations::*;
pub use planning::*;
pub use players::*;

use rocket::Route;

pub fn routes() -> Vec<Route> {
    routes![
        api_attendance_verification,
        api_attendance_log,
        api_generate_pdp,
        api_generate_blocks,
        api_get_session,
        api_review_session,
        api_log_observation,
        api_log_observation_simple,
        api_log_reflection,
        api_session_notes,
        api_player_development,
        api_tag_suggestions,
        api_diagnostics,
        health,
    ]
}
