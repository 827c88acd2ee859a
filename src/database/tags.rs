use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbTag, Tag, TagSuggestion};

#[instrument(skip(pool))]
pub async fn get_all_tags(pool: &Pool<Sqlite>) -> Result<Vec<Tag>, AppError> {
    info!("Getting all tags");
    let rows = sqlx::query_as::<_, DbTag>(
        "SELECT id, name, tag_type, synonyms FROM tags ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Tag::from).collect())
}

#[instrument(skip(pool, synonyms))]
pub async fn create_tag(
    pool: &Pool<Sqlite>,
    name: &str,
    tag_type: &str,
    synonyms: &[String],
) -> Result<i64, AppError> {
    info!("Creating tag");
    let res = sqlx::query("INSERT INTO tags (name, tag_type, synonyms) VALUES (?, ?, ?)")
        .bind(name)
        .bind(tag_type)
        .bind(serde_json::to_string(synonyms)?)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

/// Queues an AI-extracted tag name nobody has defined yet. Repeat suggestions
/// of the same pending name are collapsed.
#[instrument(skip(pool, context))]
pub async fn record_tag_suggestion(
    pool: &Pool<Sqlite>,
    raw_name: &str,
    tag_type: &str,
    source: &str,
    context: Option<&str>,
) -> Result<(), AppError> {
    info!("Recording tag suggestion");
    let existing: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM tag_suggestions
         WHERE lower(raw_name) = lower(?) AND tag_type = ? AND status = 'pending'",
    )
    .bind(raw_name)
    .bind(tag_type)
    .fetch_optional(pool)
    .await?;

    if existing.is_some() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO tag_suggestions (raw_name, tag_type, source, context, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(raw_name)
    .bind(tag_type)
    .bind(source)
    .bind(context)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn get_pending_tag_suggestions(pool: &Pool<Sqlite>) -> Result<Vec<TagSuggestion>, AppError> {
    info!("Getting pending tag suggestions");
    let suggestions = sqlx::query_as::<_, TagSuggestion>(
        "SELECT id, raw_name, tag_type, source, context, status, created_at
         FROM tag_suggestions WHERE status = 'pending'
         ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(suggestions)
}
