use std::fmt::Write as _;

use crate::llm::CompletionRequest;
use crate::models::{ObservationLog, Pdp, Person, SessionPlan, Tag};

const SYSTEM_PREAMBLE: &str = "You are an assistant to basketball coaches. You read coaching \
    notes and produce structured data. Respond with exactly one JSON object and nothing else: \
    no markdown, no commentary.";

pub const ATTENDANCE_SCHEMA: &str =
    r#"{"players_mentioned": [{"name": "string", "note": "what the reflection says about them"}]}"#;

pub const PDP_SCHEMA: &str = r#"{"summary": "string", "skill_focus": ["tag name"], "constraint_focus": ["tag name"], "goals": ["string"], "recommended_drills": ["string"], "arc_notes": "string"}"#;

pub const SESSION_PLAN_SCHEMA: &str = r#"{"title": "string", "blocks": [{"name": "string", "duration_minutes": 10, "description": "string", "skill_tags": ["tag name"], "constraint_tags": ["tag name"], "coaching_cues": ["string"]}]}"#;

pub const OBSERVATION_SCHEMA: &str = r#"{"summary": "string", "players": [{"name": "string", "note": "string", "skill_tags": ["tag name"], "sentiment": "positive|neutral|concern"}], "skill_tags": ["tag name"], "constraint_tags": ["tag name"]}"#;

pub const SIMPLE_OBSERVATION_SCHEMA: &str = r#"{"summary": "string", "skill_tags": ["tag name"], "constraint_tags": ["tag name"], "sentiment": "positive|neutral|concern"}"#;

pub const REFLECTION_SCHEMA: &str = r#"{"summary": "string", "went_well": ["string"], "needs_work": ["string"], "players": [{"name": "string", "note": "string", "sentiment": "positive|neutral|concern"}], "themes": ["string"]}"#;

pub const SESSION_NOTES_SCHEMA: &str = r#"{"summary": "string", "block_feedback": [{"block_name": "string", "feedback": "string"}], "players": [{"name": "string", "note": "string", "skill_tags": ["tag name"]}], "follow_ups": ["string"]}"#;

/// Assembles an instruction and labelled context sections into a request.
pub struct PromptBuilder {
    instruction: String,
    sections: Vec<(String, String)>,
    schema: &'static str,
    temperature: f32,
}

impl PromptBuilder {
    pub fn new(instruction: impl Into<String>, schema: &'static str) -> Self {
        Self {
            instruction: instruction.into(),
            sections: Vec::new(),
            schema,
            temperature: 0.2,
        }
    }

    pub fn section(mut self, heading: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        let body = if body.trim().is_empty() {
            "(none)".to_string()
        } else {
            body
        };
        self.sections.push((heading.to_string(), body));
        self
    }

    pub fn list<I, S>(self, heading: &str, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = items
            .into_iter()
            .map(|item| format!("- {}", item.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");
        self.section(heading, body)
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn build(self) -> CompletionRequest {
        let system = format!(
            "{}\nThe JSON object must have this shape:\n{}",
            SYSTEM_PREAMBLE, self.schema
        );

        let mut user = self.instruction;
        for (heading, body) in &self.sections {
            let _ = write!(user, "\n\n## {}\n{}", heading, body);
        }

        CompletionRequest {
            system,
            user,
            temperature: self.temperature,
        }
    }
}

fn roster_lines(roster: &[Person]) -> Vec<String> {
    roster
        .iter()
        .map(|p| {
            if p.aliases.is_empty() {
                p.display_name.clone()
            } else {
                format!("{} (also called {})", p.display_name, p.aliases.join(", "))
            }
        })
        .collect()
}

fn tag_lines<'a>(tags: &'a [Tag], tag_type: &'a str) -> impl Iterator<Item = &'a str> {
    tags.iter()
        .filter(move |t| t.tag_type == tag_type)
        .map(|t| t.name.as_str())
}

pub fn attendance_verification(roster: &[Person], reflection_text: &str) -> CompletionRequest {
    PromptBuilder::new(
        "List every player from the roster that this practice reflection mentions by name or \
         nickname. Only include players who are actually mentioned. Use the name exactly as \
         written in the reflection.",
        ATTENDANCE_SCHEMA,
    )
    .list("Roster", roster_lines(roster))
    .section("Reflection", reflection_text)
    .temperature(0.0)
    .build()
}

pub fn player_development_plan(
    person: &Person,
    current: Option<&Pdp>,
    observations: &[ObservationLog],
    tags: &[Tag],
    focus_text: Option<&str>,
) -> CompletionRequest {
    let arc = format!(
        "Advancement level {}/9, responsibility tier {}/6, collective growth phase {}/6",
        person.advancement_level, person.responsibility_tier, person.collective_growth_phase
    );

    let previous = current
        .map(|pdp| {
            format!(
                "Version {}: {}\nSkill focus: {}",
                pdp.version,
                pdp.content.summary,
                pdp.content.skill_focus.join(", ")
            )
        })
        .unwrap_or_default();

    PromptBuilder::new(
        format!(
            "Write the next player development plan for {}. Build on the previous plan and \
             recent observations. Choose skill and constraint focus areas from the tag \
             vocabulary where possible.",
            person.display_name
        ),
        PDP_SCHEMA,
    )
    .section("ARC profile", arc)
    .section("Previous plan", previous)
    .list("Recent observations", observations.iter().map(|o| o.note.as_str()))
    .list("Skill tags", tag_lines(tags, "skill"))
    .list("Constraint tags", tag_lines(tags, "constraint"))
    .section("Coach focus request", focus_text.unwrap_or_default())
    .temperature(0.4)
    .build()
}

pub enum PlanFocus<'a> {
    Theme(&'a str),
    Arc {
        responsibility_level: i64,
        collective_growth_level: i64,
    },
}

pub fn practice_plan(
    focus: &PlanFocus<'_>,
    duration_minutes: i64,
    roster: &[Person],
    tags: &[Tag],
) -> CompletionRequest {
    let focus_section = match focus {
        PlanFocus::Theme(theme) => format!("Theme: {}", theme),
        PlanFocus::Arc {
            responsibility_level,
            collective_growth_level,
        } => format!(
            "Team responsibility tier {}/6 and collective growth phase {}/6. Pick drills that \
             stretch the group one step beyond these levels.",
            responsibility_level, collective_growth_level
        ),
    };

    PromptBuilder::new(
        format!(
            "Design a basketball practice as an ordered list of blocks. Block durations must add \
             up to {} minutes. Tag each block with skills and constraints from the vocabulary.",
            duration_minutes
        ),
        SESSION_PLAN_SCHEMA,
    )
    .section("Focus", focus_section)
    .section("Players available", roster.len().to_string())
    .list("Skill tags", tag_lines(tags, "skill"))
    .list("Constraint tags", tag_lines(tags, "constraint"))
    .list("Theme tags", tag_lines(tags, "theme"))
    .temperature(0.6)
    .build()
}

pub fn observation(roster: &[Person], tags: &[Tag], observation_text: &str) -> CompletionRequest {
    PromptBuilder::new(
        "Analyse this coach observation. Split it into one note per player mentioned and tag \
         the skills involved using the vocabulary.",
        OBSERVATION_SCHEMA,
    )
    .list("Roster", roster_lines(roster))
    .list("Skill tags", tag_lines(tags, "skill"))
    .list("Constraint tags", tag_lines(tags, "constraint"))
    .section("Observation", observation_text)
    .build()
}

pub fn simple_observation(person: &Person, tags: &[Tag], observation_text: &str) -> CompletionRequest {
    PromptBuilder::new(
        format!(
            "Summarise this observation about {} and tag the skills involved using the \
             vocabulary.",
            person.display_name
        ),
        SIMPLE_OBSERVATION_SCHEMA,
    )
    .list("Skill tags", tag_lines(tags, "skill"))
    .list("Constraint tags", tag_lines(tags, "constraint"))
    .section("Observation", observation_text)
    .build()
}

pub fn reflection(roster: &[Person], reflection_text: &str) -> CompletionRequest {
    PromptBuilder::new(
        "Analyse this post-practice reflection: what went well, what needs work, recurring \
         themes, and a note for each player mentioned.",
        REFLECTION_SCHEMA,
    )
    .list("Roster", roster_lines(roster))
    .section("Reflection", reflection_text)
    .build()
}

pub fn session_notes(
    plan: &SessionPlan,
    roster: &[Person],
    tags: &[Tag],
    notes_text: &str,
) -> CompletionRequest {
    PromptBuilder::new(
        "Analyse these notes taken during a practice. Give feedback per practice block, a note \
         per player mentioned, and follow-ups for the next session.",
        SESSION_NOTES_SCHEMA,
    )
    .section("Session", plan.title.as_str())
    .list(
        "Blocks",
        plan.blocks
            .iter()
            .map(|b| format!("{} ({} min)", b.name, b.duration_minutes)),
    )
    .list("Roster", roster_lines(roster))
    .list("Skill tags", tag_lines(tags, "skill"))
    .section("Notes", notes_text)
    .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(name: &str, aliases: &[&str]) -> Person {
        Person {
            id: name.to_lowercase(),
            display_name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            roles: vec!["player".to_string()],
            advancement_level: 4,
            responsibility_tier: 2,
            collective_growth_phase: 3,
        }
    }

    #[test]
    fn builder_puts_schema_in_system_and_context_in_user() {
        let request = PromptBuilder::new("Do the thing.", PDP_SCHEMA)
            .section("Notes", "Quick hands")
            .list("Empty", Vec::<String>::new())
            .build();

        assert!(request.system.contains(PDP_SCHEMA));
        assert!(request.system.contains("JSON"));
        assert!(request.user.starts_with("Do the thing."));
        assert!(request.user.contains("## Notes\nQuick hands"));
        assert!(request.user.contains("## Empty\n(none)"));
    }

    #[test]
    fn roster_lists_aliases() {
        let roster = vec![person("Maya Lopez", &["Mo"]), person("Eli Grant", &[])];
        let request = attendance_verification(&roster, "Mo was great");

        assert!(request.user.contains("- Maya Lopez (also called Mo)"));
        assert!(request.user.contains("- Eli Grant"));
        assert_eq!(request.temperature, 0.0);
    }

    #[test]
    fn arc_plan_mentions_levels_and_duration() {
        let focus = PlanFocus::Arc {
            responsibility_level: 3,
            collective_growth_level: 2,
        };
        let request = practice_plan(&focus, 90, &[], &[]);

        assert!(request.user.contains("tier 3/6"));
        assert!(request.user.contains("phase 2/6"));
        assert!(request.user.contains("90 minutes"));
    }
}
