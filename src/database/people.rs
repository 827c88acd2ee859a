use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbPerson, Group, Person};

const PERSON_COLUMNS: &str = "p.id, p.display_name, p.aliases, p.roles, p.advancement_level, \
     p.responsibility_tier, p.collective_growth_phase";

#[instrument(skip(pool))]
pub async fn find_person(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Person>, AppError> {
    info!("Fetching person by ID");
    let row = sqlx::query_as::<_, DbPerson>(&format!(
        "SELECT {} FROM persons p WHERE p.id = ?",
        PERSON_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Person::from))
}

#[instrument(skip(pool))]
pub async fn get_person(pool: &Pool<Sqlite>, id: &str) -> Result<Person, AppError> {
    find_person(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Person with id {} not found", id)))
}

#[instrument(skip(pool))]
pub async fn find_group(pool: &Pool<Sqlite>, id: &str) -> Result<Option<Group>, AppError> {
    info!("Fetching group by ID");
    let group = sqlx::query_as::<_, Group>("SELECT id, name, coach_id FROM groups WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(group)
}

/// Players in one group, ordered by display name.
#[instrument(skip(pool))]
pub async fn get_group_roster(pool: &Pool<Sqlite>, group_id: &str) -> Result<Vec<Person>, AppError> {
    info!("Fetching group roster");
    let rows = sqlx::query_as::<_, DbPerson>(&format!(
        "SELECT {} FROM persons p
         JOIN group_members gm ON gm.person_id = p.id
         WHERE gm.group_id = ?
         ORDER BY p.display_name",
        PERSON_COLUMNS
    ))
    .bind(group_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(Person::from)
        .filter(Person::is_player)
        .collect())
}

/// Players across every group the coach runs, used when no group is given.
#[instrument(skip(pool))]
pub async fn get_coach_roster(pool: &Pool<Sqlite>, coach_id: &str) -> Result<Vec<Person>, AppError> {
    info!("Fetching coach roster");
    let rows = sqlx::query_as::<_, DbPerson>(&format!(
        "SELECT DISTINCT {} FROM persons p
         JOIN group_members gm ON gm.person_id = p.id
         JOIN groups g ON g.id = gm.group_id
         WHERE g.coach_id = ?
         ORDER BY p.display_name",
        PERSON_COLUMNS
    ))
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(Person::from)
        .filter(Person::is_player)
        .collect())
}

/// Roster for a request: the group's when a group is named, else the coach's.
pub async fn get_roster(
    pool: &Pool<Sqlite>,
    coach_id: &str,
    group_id: Option<&str>,
) -> Result<Vec<Person>, AppError> {
    match group_id {
        Some(group_id) => get_group_roster(pool, group_id).await,
        None => get_coach_roster(pool, coach_id).await,
    }
}

#[instrument(skip(pool, aliases, roles))]
pub async fn create_person(
    pool: &Pool<Sqlite>,
    id: &str,
    display_name: &str,
    aliases: &[String],
    roles: &[&str],
) -> Result<(), AppError> {
    info!("Creating person");
    sqlx::query("INSERT INTO persons (id, display_name, aliases, roles) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(display_name)
        .bind(serde_json::to_string(aliases)?)
        .bind(serde_json::to_string(roles)?)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_arc_metrics(
    pool: &Pool<Sqlite>,
    person_id: &str,
    advancement_level: i64,
    responsibility_tier: i64,
    collective_growth_phase: i64,
) -> Result<(), AppError> {
    info!("Updating ARC metrics");
    if !(1..=9).contains(&advancement_level)
        || !(1..=6).contains(&responsibility_tier)
        || !(1..=6).contains(&collective_growth_phase)
    {
        return Err(AppError::Validation(
            "ARC metrics out of range (advancement 1-9, responsibility 1-6, collective growth 1-6)"
                .to_string(),
        ));
    }

    sqlx::query(
        "UPDATE persons
         SET advancement_level = ?, responsibility_tier = ?, collective_growth_phase = ?
         WHERE id = ?",
    )
    .bind(advancement_level)
    .bind(responsibility_tier)
    .bind(collective_growth_phase)
    .bind(person_id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn create_group(
    pool: &Pool<Sqlite>,
    id: &str,
    name: &str,
    coach_id: Option<&str>,
) -> Result<(), AppError> {
    info!("Creating group");
    sqlx::query("INSERT INTO groups (id, name, coach_id) VALUES (?, ?, ?)")
        .bind(id)
        .bind(name)
        .bind(coach_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn add_group_member(
    pool: &Pool<Sqlite>,
    group_id: &str,
    person_id: &str,
) -> Result<(), AppError> {
    info!("Adding group member");
    sqlx::query(
        "INSERT INTO group_members (group_id, person_id) VALUES (?, ?)
         ON CONFLICT (group_id, person_id) DO NOTHING",
    )
    .bind(group_id)
    .bind(person_id)
    .execute(pool)
    .await?;

    Ok(())
}
