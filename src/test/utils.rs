use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};

use rocket::local::asynchronous::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use tracing::log::LevelFilter;

use crate::client::ClientSelector;
use crate::database::{
    add_group_member, create_group, create_person, create_session, create_tag, insert_intake,
    update_arc_metrics, NewIntake, NewSession,
};
use crate::env::test_config;
use crate::error::AppError;
use crate::init_rocket;
use crate::llm::{CompletionRequest, CompletionService};
use crate::models::{IntakeType, PracticeBlock, SessionPlan};

static INIT: Once = Once::new();

/// Completion service that replays canned replies in order and records every
/// request it was sent. Clones share the same queue and log.
#[derive(Clone, Default)]
pub struct ScriptedCompletions {
    replies: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedCompletions {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scripted = Self::default();
        for reply in replies {
            scripted.reply(reply);
        }
        scripted
    }

    pub fn reply(&self, raw: impl Into<String>) {
        self.replies.lock().unwrap().push_back(raw.into());
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl CompletionService for ScriptedCompletions {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::ExternalService("No scripted completion left".to_string()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct TestPerson {
    id: String,
    display_name: String,
    aliases: Vec<String>,
    roles: Vec<&'static str>,
    group_id: Option<String>,
    arc: Option<(i64, i64, i64)>,
}

struct TestGroup {
    id: String,
    name: String,
    coach_id: String,
}

struct TestTag {
    name: String,
    tag_type: String,
    synonyms: Vec<String>,
}

struct TestSession {
    label: String,
    coach_id: String,
    group_id: Option<String>,
    plan: SessionPlan,
}

struct TestIntake {
    label: String,
    coach_id: String,
}

#[derive(Default)]
pub struct TestDbBuilder {
    people: Vec<TestPerson>,
    groups: Vec<TestGroup>,
    tags: Vec<TestTag>,
    sessions: Vec<TestSession>,
    intakes: Vec<TestIntake>,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coach(mut self, id: &str, display_name: &str) -> Self {
        self.people.push(TestPerson {
            id: id.to_string(),
            display_name: display_name.to_string(),
            aliases: Vec::new(),
            roles: vec!["coach"],
            group_id: None,
            arc: None,
        });
        self
    }

    pub fn player(
        mut self,
        id: &str,
        display_name: &str,
        aliases: &[&str],
        group_id: Option<&str>,
    ) -> Self {
        self.people.push(TestPerson {
            id: id.to_string(),
            display_name: display_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            roles: vec!["player"],
            group_id: group_id.map(String::from),
            arc: None,
        });
        self
    }

    /// ARC metrics for the most recently added person.
    pub fn arc(mut self, advancement: i64, responsibility: i64, collective_growth: i64) -> Self {
        if let Some(person) = self.people.last_mut() {
            person.arc = Some((advancement, responsibility, collective_growth));
        }
        self
    }

    pub fn group(mut self, id: &str, name: &str, coach_id: &str) -> Self {
        self.groups.push(TestGroup {
            id: id.to_string(),
            name: name.to_string(),
            coach_id: coach_id.to_string(),
        });
        self
    }

    pub fn tag(mut self, name: &str, tag_type: &str, synonyms: &[&str]) -> Self {
        self.tags.push(TestTag {
            name: name.to_string(),
            tag_type: tag_type.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn session(mut self, label: &str, coach_id: &str, group_id: Option<&str>) -> Self {
        self.sessions.push(TestSession {
            label: label.to_string(),
            coach_id: coach_id.to_string(),
            group_id: group_id.map(String::from),
            plan: sample_plan(),
        });
        self
    }

    pub fn intake(mut self, label: &str, coach_id: &str) -> Self {
        self.intakes.push(TestIntake {
            label: label.to_string(),
            coach_id: coach_id.to_string(),
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .filter_level(LevelFilter::Debug)
                .is_test(true)
                .try_init();
        });

        // One connection that never expires, so the in-memory database lives
        // as long as the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        for person in &self.people {
            create_person(
                &pool,
                &person.id,
                &person.display_name,
                &person.aliases,
                &person.roles,
            )
            .await?;

            if let Some((advancement, responsibility, collective_growth)) = person.arc {
                update_arc_metrics(&pool, &person.id, advancement, responsibility, collective_growth)
                    .await?;
            }
        }

        for group in &self.groups {
            create_group(&pool, &group.id, &group.name, Some(&group.coach_id)).await?;
        }

        for person in &self.people {
            if let Some(group_id) = &person.group_id {
                add_group_member(&pool, group_id, &person.id).await?;
            }
        }

        let mut tag_id_map = HashMap::new();
        for tag in &self.tags {
            let id = create_tag(&pool, &tag.name, &tag.tag_type, &tag.synonyms).await?;
            tag_id_map.insert(tag.name.clone(), id);
        }

        let mut session_id_map = HashMap::new();
        for session in &self.sessions {
            let id = create_session(
                &pool,
                NewSession {
                    coach_id: &session.coach_id,
                    group_id: session.group_id.as_deref(),
                    theme: Some("Spacing"),
                    duration_minutes: i64::try_from(session.plan.total_minutes())
                        .expect("sample plan fits in i64"),
                    plan: &session.plan,
                },
            )
            .await?;
            session_id_map.insert(session.label.clone(), id);
        }

        let mut intake_id_map = HashMap::new();
        for intake in &self.intakes {
            let id = insert_intake(
                &pool,
                NewIntake {
                    coach_id: &intake.coach_id,
                    session_id: None,
                    group_id: None,
                    intake_type: IntakeType::Observation,
                    raw_text: "seeded",
                    analysis: &serde_json::json!({}),
                },
            )
            .await?;
            intake_id_map.insert(intake.label.clone(), id);
        }

        Ok(TestDb {
            pool,
            tag_id_map,
            session_id_map,
            intake_id_map,
        })
    }
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub tag_id_map: HashMap<String, i64>,
    pub session_id_map: HashMap<String, String>,
    pub intake_id_map: HashMap<String, String>,
}

impl TestDb {
    pub fn tag_id(&self, name: &str) -> i64 {
        self.tag_id_map[name]
    }

    pub fn session_id(&self, label: &str) -> String {
        self.session_id_map[label].clone()
    }

    pub fn intake_id(&self, label: &str) -> String {
        self.intake_id_map[label].clone()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as(sql)
            .fetch_one(&self.pool)
            .await
            .expect("count query failed");
        count
    }
}

pub fn sample_plan() -> SessionPlan {
    SessionPlan {
        title: "Spacing and closeouts".to_string(),
        blocks: vec![
            PracticeBlock {
                name: "Dynamic warmup".to_string(),
                duration_minutes: 15,
                ..Default::default()
            },
            PracticeBlock {
                name: "Shell drill".to_string(),
                duration_minutes: 30,
                skill_tags: vec!["closeouts".to_string()],
                ..Default::default()
            },
            PracticeBlock {
                name: "4v4 advantage".to_string(),
                duration_minutes: 15,
                ..Default::default()
            },
        ],
    }
}

/// Coach c1 with group g1 of five players, and a scheduled session `s1`.
pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .coach("c1", "Coach Carter")
        .group("g1", "Varsity", "c1")
        .player("p1", "Maya Lopez", &["Mo"], Some("g1"))
        .arc(5, 3, 2)
        .player("p2", "Eli Grant", &[], Some("g1"))
        .player("p3", "Sam Okafor", &["Sammy"], Some("g1"))
        .player("p4", "Jordan Reyes", &[], Some("g1"))
        .player("p5", "Priya Shah", &[], Some("g1"))
        .tag("closeouts", "skill", &["closing out", "close out"])
        .tag("ball screen defense", "skill", &["pick and roll defense"])
        .tag("advantage", "constraint", &[])
        .tag("spacing", "theme", &[])
        .session("s1", "c1", Some("g1"))
        .build()
        .await
        .expect("Failed to build test database")
}

pub async fn setup_test_client(test_db: &TestDb, llm: ScriptedCompletions) -> Client {
    let selector = ClientSelector::new(Some(test_db.pool.clone()), test_db.pool.clone());
    client_for(selector, llm).await
}

/// Client whose selector has no privileged pool configured.
pub async fn setup_anon_client(test_db: &TestDb, llm: ScriptedCompletions) -> Client {
    let selector = ClientSelector::new(None, test_db.pool.clone());
    client_for(selector, llm).await
}

async fn client_for(selector: ClientSelector, llm: ScriptedCompletions) -> Client {
    let rocket = init_rocket(selector, Box::new(llm), test_config());
    Client::tracked(rocket)
        .await
        .expect("valid rocket instance")
}
