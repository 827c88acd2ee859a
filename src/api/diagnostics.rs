use std::collections::BTreeMap;

use rocket::serde::json::Json;
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::client::{ClientSelector, CredentialRole};
use crate::database::{count_rows, Table};
use crate::env::{AppConfig, Environment};
use crate::error::BestEffort;
use crate::llm::Completions;

#[derive(Serialize, Deserialize)]
pub struct DiagnosticsResponse {
    pub success: bool,
    pub using_service_role: bool,
    pub credential_role: CredentialRole,
    pub service_role_downgraded: bool,
    pub environment: Environment,
    pub model: String,
    pub database_ok: bool,
    pub table_counts: BTreeMap<String, i64>,
}

/// Reports how the process is wired. Count failures degrade to
/// `database_ok: false` instead of an error response.
#[get("/diagnostics")]
pub async fn api_diagnostics(
    selector: &State<ClientSelector>,
    llm: &State<Completions>,
    config: &State<AppConfig>,
) -> Json<DiagnosticsResponse> {
    let db = selector.select().await;

    let mut table_counts = BTreeMap::new();
    let mut database_ok = true;
    for table in Table::ALL {
        match count_rows(db.pool(), table).await.best_effort("diagnostics row count") {
            Some(count) => {
                table_counts.insert(table.name().to_string(), count);
            }
            None => database_ok = false,
        }
    }

    Json(DiagnosticsResponse {
        success: true,
        using_service_role: db.using_service_role(),
        credential_role: db.role(),
        service_role_downgraded: selector.is_downgraded(),
        environment: config.environment,
        model: llm.model().to_string(),
        database_ok,
        table_counts,
    })
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
