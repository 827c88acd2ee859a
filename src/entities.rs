//! Turns names the model extracted into roster and tag references, queueing
//! whatever does not resolve for human review.

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::analysis::PlayerMention;
use crate::database::{
    insert_observation_log, record_flagged_entity, record_tag_suggestion, NewObservationLog,
};
use crate::error::{AppError, BestEffort};
use crate::matching::{best_match, resolve_all, Candidate, MatchOutcome};
use crate::models::{Person, Tag};

pub fn player_candidates(roster: &[Person]) -> Vec<Candidate<String>> {
    roster
        .iter()
        .map(|p| Candidate::new(p.id.clone(), &p.display_name, &p.aliases))
        .collect()
}

pub fn tag_candidates(tags: &[Tag]) -> Vec<Candidate<i64>> {
    tags.iter()
        .map(|t| Candidate::new(t.id, &t.name, &t.synonyms))
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagResolution {
    pub tag_ids: Vec<i64>,
    pub suggested: Vec<String>,
}

impl TagResolution {
    pub fn merge(&mut self, other: TagResolution) {
        for id in other.tag_ids {
            if !self.tag_ids.contains(&id) {
                self.tag_ids.push(id);
            }
        }
        self.suggested.extend(other.suggested);
    }
}

/// Maps tag names onto known tags. Unknown names become tag suggestions.
#[instrument(skip(pool, tags, names))]
pub async fn resolve_tags(
    pool: &Pool<Sqlite>,
    tags: &[Tag],
    names: &[String],
    tag_type: &str,
    source: &str,
) -> TagResolution {
    let resolution = resolve_all(names, &tag_candidates(tags));

    for name in &resolution.unmatched {
        record_tag_suggestion(pool, name, tag_type, source, None)
            .await
            .best_effort("tag suggestion");
    }

    let mut tag_ids: Vec<i64> = Vec::new();
    for (_, id) in resolution.matched {
        if !tag_ids.contains(&id) {
            tag_ids.push(id);
        }
    }

    TagResolution {
        tag_ids,
        suggested: resolution.unmatched,
    }
}

pub async fn flag_unmatched_players(
    pool: &Pool<Sqlite>,
    names: &[String],
    source: &str,
    context: Option<&str>,
) {
    for name in names {
        record_flagged_entity(pool, name, "player", source, context)
            .await
            .best_effort("flag unmatched player");
    }
}

/// Where a batch of player notes came from.
pub struct MentionSource<'a> {
    pub intake_id: &'a str,
    pub coach_id: &'a str,
    pub session_id: Option<&'a str>,
    pub source: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedMention {
    pub observation_id: String,
    pub person_id: String,
    pub display_name: String,
    pub mentioned_as: String,
    pub note: String,
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MentionsOutcome {
    pub logged: Vec<LoggedMention>,
    pub unmatched_players: Vec<String>,
    pub suggested_tags: Vec<String>,
}

/// Writes one observation log per roster player mentioned. Repeat mentions of
/// the same player are merged into that row; unresolved and ambiguous names are
/// flagged instead.
#[instrument(skip_all, fields(source = %origin.source, mentions = mentions.len()))]
pub async fn record_player_mentions(
    pool: &Pool<Sqlite>,
    origin: &MentionSource<'_>,
    roster: &[Person],
    tags: &[Tag],
    mentions: &[PlayerMention],
) -> Result<MentionsOutcome, AppError> {
    let candidates = player_candidates(roster);
    let mut outcome = MentionsOutcome::default();
    let mut by_player: Vec<(&Person, Vec<&PlayerMention>)> = Vec::new();

    for mention in mentions {
        let person = match best_match(&mention.name, &candidates) {
            MatchOutcome::Matched { key, .. } => roster.iter().find(|p| p.id == key),
            MatchOutcome::Ambiguous(_) | MatchOutcome::Unmatched => None,
        };

        let Some(person) = person else {
            if !outcome.unmatched_players.contains(&mention.name) {
                outcome.unmatched_players.push(mention.name.clone());
            }
            continue;
        };

        match by_player.iter_mut().find(|(p, _)| p.id == person.id) {
            Some((_, grouped)) => grouped.push(mention),
            None => by_player.push((person, vec![mention])),
        }
    }

    for (person, grouped) in by_player {
        let mentioned_as = grouped[0].name.clone();

        let mut skill_tags: Vec<String> = Vec::new();
        for tag in grouped.iter().flat_map(|m| &m.skill_tags) {
            if !skill_tags.contains(tag) {
                skill_tags.push(tag.clone());
            }
        }
        let tag_resolution =
            resolve_tags(pool, tags, &skill_tags, "skill", origin.source).await;

        let notes: Vec<&str> = grouped
            .iter()
            .map(|m| m.note.trim())
            .filter(|n| !n.is_empty())
            .collect();
        let note = if notes.is_empty() {
            format!("Mentioned as {}", mentioned_as)
        } else {
            notes.join(" ")
        };
        let sentiment = grouped.iter().find_map(|m| m.sentiment.as_deref());

        let observation_id = insert_observation_log(
            pool,
            NewObservationLog {
                intake_id: origin.intake_id,
                person_id: &person.id,
                coach_id: origin.coach_id,
                session_id: origin.session_id,
                note: &note,
                sentiment,
                tag_ids: &tag_resolution.tag_ids,
            },
        )
        .await?;

        outcome.suggested_tags.extend(tag_resolution.suggested);
        outcome.logged.push(LoggedMention {
            observation_id,
            person_id: person.id.clone(),
            display_name: person.display_name.clone(),
            mentioned_as,
            note,
            tag_ids: tag_resolution.tag_ids,
        });
    }

    flag_unmatched_players(
        pool,
        &outcome.unmatched_players,
        origin.source,
        Some(origin.intake_id),
    )
    .await;

    info!(
        logged = outcome.logged.len(),
        unmatched = outcome.unmatched_players.len(),
        "Resolved player mentions"
    );

    Ok(outcome)
}
