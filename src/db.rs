use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::assessment::{AssessmentAnalysis, AssessmentData, LearningStyle};
use crate::catalog::{EDUCATION_LEVELS, SUBJECTS};
use crate::content::{CourseOutline, GenerationStatus, Recommendations, Roadmap};
use crate::gamification::{AchievementState, GamificationProfile, XpAward};
use crate::nova::ConversationContext;
use crate::roles::{Role, RoleSet};

const SCHEMA: &str = "
    -- Users are created on first authenticated request
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        role TEXT,
        experience TEXT,
        education TEXT,
        location TEXT,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_roles (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, role)
    );

    -- Nova conversations: context and data kept as JSON blobs
    CREATE TABLE IF NOT EXISTS assessment_sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        context TEXT NOT NULL,
        data TEXT NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        version INTEGER NOT NULL DEFAULT 0, -- bumped on every update
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS cognitive_assessments (
        id INTEGER PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        analytical REAL,
        logical REAL,
        verbal REAL,
        spatial REAL,
        average REAL NOT NULL,
        strongest TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS personality_assessments (
        id INTEGER PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        openness REAL,
        conscientiousness REAL,
        extraversion REAL,
        agreeableness REAL,
        neuroticism REAL,
        dominant_trait TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS learning_preferences (
        user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        style TEXT,
        pace TEXT,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS subjects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS topics (
        id INTEGER PRIMARY KEY,
        subject_id TEXT NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        position INTEGER NOT NULL,
        UNIQUE(subject_id, name)
    );

    CREATE TABLE IF NOT EXISTS education_levels (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        sort_order INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS courses (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        subject_id TEXT NOT NULL REFERENCES subjects(id),
        education_level_id TEXT NOT NULL REFERENCES education_levels(id),
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        content_type TEXT NOT NULL,
        difficulty INTEGER NOT NULL,
        time_allocation INTEGER NOT NULL,
        learning_objectives TEXT NOT NULL,
        generation_status TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS course_modules (
        id INTEGER PRIMARY KEY,
        course_id TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        duration_minutes INTEGER NOT NULL,
        activities TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS career_recommendations (
        id INTEGER PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        fit_score INTEGER NOT NULL,
        reasons TEXT NOT NULL,
        generation_status TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS learning_roadmaps (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        career_title TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS roadmap_milestones (
        id INTEGER PRIMARY KEY,
        roadmap_id TEXT NOT NULL REFERENCES learning_roadmaps(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        title TEXT NOT NULL,
        target_month INTEGER NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS gamification_profiles (
        user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
        total_xp INTEGER NOT NULL DEFAULT 0,
        level INTEGER NOT NULL DEFAULT 0,
        current_streak INTEGER NOT NULL DEFAULT 0,
        longest_streak INTEGER NOT NULL DEFAULT 0,
        last_activity TEXT
    );

    CREATE TABLE IF NOT EXISTS user_achievements (
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        achievement_id TEXT NOT NULL,
        unlocked_at TEXT NOT NULL,
        PRIMARY KEY (user_id, achievement_id)
    );

    -- Append-only XP ledger
    CREATE TABLE IF NOT EXISTS xp_transactions (
        id INTEGER PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        amount INTEGER NOT NULL,
        reason TEXT NOT NULL,
        category TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_xp_transactions_user ON xp_transactions(user_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_user ON assessment_sessions(user_id);
";

// ============ Records ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub description: String,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationLevel {
    pub id: String,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSession {
    pub id: String,
    pub user_id: String,
    pub context: ConversationContext,
    pub data: AssessmentData,
    pub completed: bool,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseModule {
    pub id: i64,
    pub position: i64,
    pub title: String,
    pub content: String,
    pub duration_minutes: i64,
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub subject_id: String,
    pub education_level_id: String,
    pub title: String,
    pub description: String,
    pub content_type: String,
    pub difficulty: i64,
    pub time_allocation: i64,
    pub learning_objectives: Vec<String>,
    pub generation_status: String, // "model" | "fallback"
    pub created_at: String,
}

/// Everything needed to store a generated course
pub struct NewCourse<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub subject_id: &'a str,
    pub education_level_id: &'a str,
    pub content_type: &'a str,
    pub difficulty: u8,
    pub time_allocation: u32,
    pub learning_objectives: &'a [String],
    pub outline: &'a CourseOutline,
    pub status: &'a GenerationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpTransaction {
    pub id: i64,
    pub user_id: String,
    pub amount: i64,
    pub reason: String,
    pub category: String,
    pub created_at: String,
}

/// New profile state and the ledger rows that produced it
#[derive(Debug, Clone)]
pub struct GamificationChange {
    pub profile: GamificationProfile,
    pub awards: Vec<XpAward>,
}

fn status_str(status: &GenerationStatus) -> &'static str {
    match status {
        GenerationStatus::Model => "model",
        GenerationStatus::Fallback { .. } => "fallback",
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn from_json<T: DeserializeOwned>(column: usize, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn parse_time(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

// ============ Database ============

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        seed_reference_data(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Run `f` with exclusive access to the connection
    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        // A panic while holding the lock leaves SQLite itself consistent
        let mut conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut conn)
    }

    // ============ Users ============

    /// Create the user's rows on first sight; no-op afterwards
    pub fn ensure_user(&self, user_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let created = tx.execute(
                "INSERT OR IGNORE INTO users (id, created_at) VALUES (?1, ?2)",
                params![user_id, now],
            )?;
            if created > 0 {
                tx.execute(
                    "INSERT INTO profiles (user_id, updated_at) VALUES (?1, ?2)",
                    params![user_id, now],
                )?;
                tx.execute(
                    "INSERT INTO user_roles (user_id, role, is_active) VALUES (?1, ?2, 1)",
                    params![user_id, Role::Student.as_str()],
                )?;
                tx.execute(
                    "INSERT INTO gamification_profiles (user_id) VALUES (?1)",
                    params![user_id],
                )?;
            }
            tx.commit()
        })
    }

    // ============ Reference Data ============

    pub fn list_subjects(&self) -> Result<Vec<Subject>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, description FROM subjects ORDER BY name")?;
            let subjects = stmt
                .query_map([], |row| {
                    Ok(Subject {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        topics: Vec::new(),
                    })
                })?
                .collect::<Result<Vec<_>>>()?;

            subjects
                .into_iter()
                .map(|mut s| {
                    s.topics = topics_for(conn, &s.id)?;
                    Ok(s)
                })
                .collect()
        })
    }

    pub fn get_subject(&self, id: &str) -> Result<Option<Subject>> {
        self.with_connection(|conn| {
            let subject = conn
                .query_row(
                    "SELECT id, name, description FROM subjects WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok(Subject {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            topics: Vec::new(),
                        })
                    },
                )
                .optional()?;

            match subject {
                Some(mut s) => {
                    s.topics = topics_for(conn, &s.id)?;
                    Ok(Some(s))
                }
                None => Ok(None),
            }
        })
    }

    pub fn list_education_levels(&self) -> Result<Vec<EducationLevel>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, sort_order FROM education_levels ORDER BY sort_order",
            )?;
            let levels = stmt.query_map([], |row| {
                Ok(EducationLevel {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    sort_order: row.get(2)?,
                })
            })?;
            levels.collect()
        })
    }

    pub fn get_education_level(&self, id: &str) -> Result<Option<EducationLevel>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, name, sort_order FROM education_levels WHERE id = ?1",
                params![id],
                |row| {
                    Ok(EducationLevel {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        sort_order: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    // ============ Roles ============

    pub fn load_roles(&self, user_id: &str) -> Result<RoleSet> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT role, is_active FROM user_roles WHERE user_id = ?1")?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? != 0))
                })?
                .collect::<Result<Vec<_>>>()?;

            // Unknown role names from older rows are skipped
            let mut roles = Vec::new();
            let mut active = None;
            for (name, is_active) in rows {
                if let Some(role) = Role::from_str(&name) {
                    roles.push(role);
                    if is_active {
                        active = Some(role);
                    }
                }
            }
            Ok(RoleSet::from_parts(roles, active))
        })
    }

    pub fn save_roles(&self, user_id: &str, set: &RoleSet) -> Result<()> {
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM user_roles WHERE user_id = ?1", params![user_id])?;
            for role in &set.roles {
                tx.execute(
                    "INSERT INTO user_roles (user_id, role, is_active) VALUES (?1, ?2, ?3)",
                    params![user_id, role.as_str(), (*role == set.active) as i64],
                )?;
            }
            tx.commit()
        })
    }

    // ============ Assessment Sessions ============

    pub fn create_session(
        &self,
        id: &str,
        user_id: &str,
        context: &ConversationContext,
        data: &AssessmentData,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let context = to_json(context)?;
        let data = to_json(data)?;
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO assessment_sessions
                 (id, user_id, context, data, completed, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                params![id, user_id, context, data, now, now],
            )?;
            Ok(())
        })
    }

    /// Sessions are only visible to the user who started them
    pub fn get_session(&self, id: &str, user_id: &str) -> Result<Option<AssessmentSession>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, user_id, context, data, completed, version, created_at, updated_at
                 FROM assessment_sessions WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| {
                    Ok(AssessmentSession {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        context: from_json(2, &row.get::<_, String>(2)?)?,
                        data: from_json(3, &row.get::<_, String>(3)?)?,
                        completed: row.get::<_, i64>(4)? != 0,
                        version: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Write back a session read at `version`. Returns false (and writes
    /// nothing) if the row changed since or the session is already completed.
    pub fn update_session(
        &self,
        id: &str,
        version: i64,
        context: &ConversationContext,
        data: &AssessmentData,
        completed: bool,
    ) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let context = to_json(context)?;
        let data = to_json(data)?;
        self.with_connection(|conn| {
            let updated = conn.execute(
                "UPDATE assessment_sessions
                 SET context = ?1, data = ?2, completed = ?3, updated_at = ?4, version = version + 1
                 WHERE id = ?5 AND version = ?6 AND completed = 0",
                params![context, data, completed as i64, now, id, version],
            )?;
            Ok(updated == 1)
        })
    }

    // ============ Assessment Results ============

    /// Store one analysed assessment: score rows, preferences and the
    /// profile's basic info, in a single transaction.
    pub fn save_assessment(
        &self,
        user_id: &str,
        data: &AssessmentData,
        analysis: &AssessmentAnalysis,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            let c = &data.cognitive_scores;
            tx.execute(
                "INSERT INTO cognitive_assessments
                 (user_id, analytical, logical, verbal, spatial, average, strongest, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user_id,
                    c.analytical,
                    c.logical,
                    c.verbal,
                    c.spatial,
                    analysis.cognitive.average,
                    analysis.cognitive.strongest.map(|a| a.as_str()),
                    now
                ],
            )?;

            let p = &data.personality_scores;
            tx.execute(
                "INSERT INTO personality_assessments
                 (user_id, openness, conscientiousness, extraversion, agreeableness, neuroticism,
                  dominant_trait, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user_id,
                    p.openness,
                    p.conscientiousness,
                    p.extraversion,
                    p.agreeableness,
                    p.neuroticism,
                    analysis.personality.dominant.map(|t| t.as_str()),
                    now
                ],
            )?;

            let prefs = &data.learning_preferences;
            tx.execute(
                "INSERT INTO learning_preferences (user_id, style, pace, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                 style = excluded.style, pace = excluded.pace, updated_at = excluded.updated_at",
                params![
                    user_id,
                    prefs.style.map(|s| s.as_str()),
                    prefs.pace.map(|p| p.as_str()),
                    now
                ],
            )?;

            let info = &data.basic_info;
            tx.execute(
                "UPDATE profiles SET role = COALESCE(?1, role),
                 experience = COALESCE(?2, experience),
                 education = COALESCE(?3, education),
                 location = COALESCE(?4, location),
                 updated_at = ?5
                 WHERE user_id = ?6",
                params![info.role, info.experience, info.education, info.location, now, user_id],
            )?;

            tx.commit()
        })
    }

    pub fn get_learning_style(&self, user_id: &str) -> Result<Option<LearningStyle>> {
        self.with_connection(|conn| {
            let style: Option<Option<String>> = conn
                .query_row(
                    "SELECT style FROM learning_preferences WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(style.flatten().and_then(|s| LearningStyle::from_str(&s)))
        })
    }

    pub fn count_assessments(&self, user_id: &str) -> Result<i64> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM cognitive_assessments WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
        })
    }

    /// Store recommendations and the roadmap built from them. Returns the roadmap id.
    pub fn save_recommendations(
        &self,
        user_id: &str,
        recommendations: &Recommendations,
        status: &GenerationStatus,
        roadmap: Option<&Roadmap>,
        roadmap_id: &str,
    ) -> Result<Option<String>> {
        let now = Utc::now().to_rfc3339();
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            for career in &recommendations.careers {
                tx.execute(
                    "INSERT INTO career_recommendations
                     (user_id, title, description, fit_score, reasons, generation_status,
                      created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        user_id,
                        career.title,
                        career.description,
                        career.fit_score as i64,
                        to_json(&career.reasons)?,
                        status_str(status),
                        now
                    ],
                )?;
            }

            let saved = match roadmap {
                Some(roadmap) => {
                    tx.execute(
                        "INSERT INTO learning_roadmaps
                         (id, user_id, title, career_title, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![roadmap_id, user_id, roadmap.title, roadmap.career_title, now],
                    )?;
                    for (i, milestone) in roadmap.milestones.iter().enumerate() {
                        tx.execute(
                            "INSERT INTO roadmap_milestones
                             (roadmap_id, position, title, target_month)
                             VALUES (?1, ?2, ?3, ?4)",
                            params![
                                roadmap_id,
                                i as i64,
                                milestone.title,
                                milestone.target_month as i64
                            ],
                        )?;
                    }
                    Some(roadmap_id.to_string())
                }
                None => None,
            };

            tx.commit()?;
            Ok(saved)
        })
    }

    pub fn count_roadmap_milestones(&self, roadmap_id: &str) -> Result<i64> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM roadmap_milestones WHERE roadmap_id = ?1",
                params![roadmap_id],
                |row| row.get(0),
            )
        })
    }

    // ============ Courses ============

    pub fn save_course(&self, new: &NewCourse) -> Result<(Course, Vec<CourseModule>)> {
        let now = Utc::now().to_rfc3339();
        let objectives = to_json(&new.learning_objectives)?;
        self.with_connection(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO courses
                 (id, user_id, subject_id, education_level_id, title, description, content_type,
                 difficulty, time_allocation, learning_objectives, generation_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    new.id,
                    new.user_id,
                    new.subject_id,
                    new.education_level_id,
                    new.outline.title,
                    new.outline.description,
                    new.content_type,
                    new.difficulty as i64,
                    new.time_allocation as i64,
                    objectives,
                    status_str(new.status),
                    now
                ],
            )?;

            let mut modules = Vec::with_capacity(new.outline.modules.len());
            for (i, module) in new.outline.modules.iter().enumerate() {
                tx.execute(
                    "INSERT INTO course_modules
                     (course_id, position, title, content, duration_minutes, activities)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        new.id,
                        i as i64,
                        module.title,
                        module.content,
                        module.duration_minutes as i64,
                        to_json(&module.activities)?
                    ],
                )?;
                modules.push(CourseModule {
                    id: tx.last_insert_rowid(),
                    position: i as i64,
                    title: module.title.clone(),
                    content: module.content.clone(),
                    duration_minutes: module.duration_minutes as i64,
                    activities: module.activities.clone(),
                });
            }
            tx.commit()?;

            let course = Course {
                id: new.id.to_string(),
                subject_id: new.subject_id.to_string(),
                education_level_id: new.education_level_id.to_string(),
                title: new.outline.title.clone(),
                description: new.outline.description.clone(),
                content_type: new.content_type.to_string(),
                difficulty: new.difficulty as i64,
                time_allocation: new.time_allocation as i64,
                learning_objectives: new.learning_objectives.to_vec(),
                generation_status: status_str(new.status).to_string(),
                created_at: now,
            };
            Ok((course, modules))
        })
    }

    pub fn get_course_modules(&self, course_id: &str) -> Result<Vec<CourseModule>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, position, title, content, duration_minutes, activities
                 FROM course_modules WHERE course_id = ?1 ORDER BY position",
            )?;
            let modules = stmt.query_map(params![course_id], |row| {
                Ok(CourseModule {
                    id: row.get(0)?,
                    position: row.get(1)?,
                    title: row.get(2)?,
                    content: row.get(3)?,
                    duration_minutes: row.get(4)?,
                    activities: from_json(5, &row.get::<_, String>(5)?)?,
                })
            })?;
            modules.collect()
        })
    }

    // ============ Gamification ============

    pub fn load_gamification(&self, user_id: &str) -> Result<GamificationProfile> {
        self.with_connection(|conn| read_gamification(conn, user_id))
    }

    /// Read-modify-write of one user's profile in a single immediate
    /// transaction. `update` receives the stored profile and returns the
    /// change to persist (`None` writes nothing) plus a value for the caller.
    pub fn update_gamification<F, T>(&self, user_id: &str, update: F) -> Result<T>
    where
        F: FnOnce(GamificationProfile) -> (Option<GamificationChange>, T),
    {
        self.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let (change, value) = update(read_gamification(&tx, user_id)?);
            if let Some(change) = change {
                write_gamification(&tx, user_id, &change.profile, &change.awards)?;
            }
            tx.commit()?;
            Ok(value)
        })
    }

    pub fn xp_transactions(&self, user_id: &str) -> Result<Vec<XpTransaction>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, amount, reason, category, created_at
                 FROM xp_transactions WHERE user_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(XpTransaction {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    amount: row.get(2)?,
                    reason: row.get(3)?,
                    category: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            rows.collect()
        })
    }
}

fn read_gamification(conn: &Connection, user_id: &str) -> Result<GamificationProfile> {
    let profile = conn
        .query_row(
            "SELECT total_xp, level, current_streak, longest_streak, last_activity
             FROM gamification_profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(GamificationProfile {
                    total_xp: row.get::<_, i64>(0)?.max(0) as u64,
                    level: row.get::<_, i64>(1)?.max(0) as u32,
                    achievements: Vec::new(),
                    current_streak: row.get::<_, i64>(2)?.max(0) as u32,
                    longest_streak: row.get::<_, i64>(3)?.max(0) as u32,
                    last_activity: parse_time(row.get(4)?),
                })
            },
        )
        .optional()?;

    let mut profile = profile.unwrap_or_default();

    let mut stmt = conn.prepare(
        "SELECT achievement_id, unlocked_at FROM user_achievements
         WHERE user_id = ?1 ORDER BY unlocked_at",
    )?;
    profile.achievements = stmt
        .query_map(params![user_id], |row| {
            Ok(AchievementState {
                id: row.get(0)?,
                unlocked: true,
                unlocked_at: parse_time(row.get(1)?),
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(profile)
}

/// Upsert the totals, record unlocked achievements and append one ledger
/// row per award.
fn write_gamification(
    conn: &Connection,
    user_id: &str,
    profile: &GamificationProfile,
    awards: &[XpAward],
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO gamification_profiles
         (user_id, total_xp, level, current_streak, longest_streak, last_activity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET total_xp = excluded.total_xp, level = excluded.level,
         current_streak = excluded.current_streak, longest_streak = excluded.longest_streak,
         last_activity = excluded.last_activity",
        params![
            user_id,
            profile.total_xp as i64,
            profile.level as i64,
            profile.current_streak as i64,
            profile.longest_streak as i64,
            profile.last_activity.map(|t| t.to_rfc3339())
        ],
    )?;

    for achievement in profile.achievements.iter().filter(|a| a.unlocked) {
        let unlocked_at = achievement
            .unlocked_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| now.clone());
        conn.execute(
            "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, achievement.id, unlocked_at],
        )?;
    }

    for award in awards {
        conn.execute(
            "INSERT INTO xp_transactions (user_id, amount, reason, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                award.effective_amount() as i64,
                award.reason,
                award.category.as_str(),
                now
            ],
        )?;
    }
    Ok(())
}

fn topics_for(conn: &Connection, subject_id: &str) -> Result<Vec<Topic>> {
    let mut stmt =
        conn.prepare("SELECT id, name FROM topics WHERE subject_id = ?1 ORDER BY position")?;
    let topics = stmt.query_map(params![subject_id], |row| {
        Ok(Topic {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    topics.collect()
}

fn seed_reference_data(conn: &Connection) -> Result<()> {
    for subject in SUBJECTS {
        conn.execute(
            "INSERT OR IGNORE INTO subjects (id, name, description) VALUES (?1, ?2, ?3)",
            params![subject.id, subject.name, subject.description],
        )?;
        for (i, topic) in subject.topics.iter().enumerate() {
            conn.execute(
                "INSERT OR IGNORE INTO topics (subject_id, name, position) VALUES (?1, ?2, ?3)",
                params![subject.id, topic, i as i64],
            )?;
        }
    }
    for (id, name, order) in EDUCATION_LEVELS {
        conn.execute(
            "INSERT OR IGNORE INTO education_levels (id, name, sort_order) VALUES (?1, ?2, ?3)",
            params![id, name, order],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::analyze;
    use crate::content::{fallback_recommendations, CourseOutline, ModuleOutline};
    use crate::gamification::{award_xp, XpCategory};

    fn db_with_user(user: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user(user).unwrap();
        db
    }

    #[test]
    fn test_seeds_reference_data() {
        let db = Database::open_in_memory().unwrap();
        let math = db.get_subject("mathematics").unwrap().unwrap();
        assert_eq!(math.name, "Mathematics");
        assert!(math.topics.iter().any(|t| t.name == "Linear Equations"));
        assert_eq!(db.list_subjects().unwrap().len(), SUBJECTS.len());

        let level = db.get_education_level("o-level").unwrap().unwrap();
        assert_eq!(level.name, "O-Level");
        assert!(db.get_education_level("kindergarten").unwrap().is_none());
    }

    #[test]
    fn test_reopen_does_not_duplicate_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nova.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        let math = db.get_subject("mathematics").unwrap().unwrap();
        assert_eq!(math.topics.len(), 5);
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let db = db_with_user("user-1");
        db.ensure_user("user-1").unwrap();
        assert_eq!(db.load_roles("user-1").unwrap(), RoleSet::default());
        assert_eq!(db.load_gamification("user-1").unwrap(), GamificationProfile::default());
    }

    #[test]
    fn test_roles_round_trip() {
        let db = db_with_user("user-1");
        let mut set = db.load_roles("user-1").unwrap();
        set.add(Role::Teacher);
        set.switch(Role::Teacher).unwrap();
        db.save_roles("user-1", &set).unwrap();
        assert_eq!(db.load_roles("user-1").unwrap(), set);
    }

    #[test]
    fn test_session_is_scoped_to_owner() {
        let db = db_with_user("user-1");
        db.ensure_user("user-2").unwrap();
        let ctx = ConversationContext::new();
        let mut data = AssessmentData::default();
        db.create_session("s-1", "user-1", &ctx, &data).unwrap();

        assert!(db.get_session("s-1", "user-2").unwrap().is_none());

        data.basic_info.role = Some("Student".into());
        assert!(db.update_session("s-1", 0, &ctx, &data, false).unwrap());
        let session = db.get_session("s-1", "user-1").unwrap().unwrap();
        assert_eq!(session.data.basic_info.role.as_deref(), Some("Student"));
        assert!(!session.completed);
        assert_eq!(session.version, 1);
    }

    #[test]
    fn test_stale_session_update_is_rejected() {
        let db = db_with_user("user-1");
        let ctx = ConversationContext::new();
        let mut data = AssessmentData::default();
        db.create_session("s-1", "user-1", &ctx, &data).unwrap();

        data.basic_info.role = Some("Student".into());
        assert!(db.update_session("s-1", 0, &ctx, &data, false).unwrap());

        // A second writer that also read version 0 loses
        data.basic_info.role = Some("Teacher".into());
        assert!(!db.update_session("s-1", 0, &ctx, &data, false).unwrap());
        let session = db.get_session("s-1", "user-1").unwrap().unwrap();
        assert_eq!(session.data.basic_info.role.as_deref(), Some("Student"));

        // Completed sessions are frozen
        assert!(db.update_session("s-1", 1, &ctx, &data, true).unwrap());
        assert!(!db.update_session("s-1", 2, &ctx, &data, false).unwrap());
    }

    #[test]
    fn test_gamification_ledger() {
        let db = db_with_user("user-1");
        let award = XpAward::new(50, "course_generated", XpCategory::Course);
        let total = db
            .update_gamification("user-1", |profile| {
                let profile = award_xp(&profile, &award);
                let total = profile.total_xp;
                (Some(GamificationChange { profile, awards: vec![award.clone()] }), total)
            })
            .unwrap();
        assert_eq!(total, 50);

        // No change, no write
        db.update_gamification("user-1", |_| (None, ())).unwrap();

        let loaded = db.load_gamification("user-1").unwrap();
        assert_eq!(loaded.total_xp, 50);
        assert_eq!(loaded.current_streak, 1);
        let ledger = db.xp_transactions("user-1").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].amount, 50);
        assert_eq!(ledger[0].category, "course");
    }

    #[test]
    fn test_course_requires_known_subject() {
        let db = db_with_user("user-1");
        let outline = CourseOutline {
            title: "t".into(),
            description: "d".into(),
            modules: vec![ModuleOutline {
                title: "m".into(),
                content: "c".into(),
                duration_minutes: 10,
                activities: vec!["quiz".into()],
            }],
        };
        let objectives = vec!["x".to_string()];
        let mut new = NewCourse {
            id: "c-1",
            user_id: "user-1",
            subject_id: "mathematics",
            education_level_id: "o-level",
            content_type: "lesson",
            difficulty: 3,
            time_allocation: 10,
            learning_objectives: &objectives,
            outline: &outline,
            status: &GenerationStatus::Model,
        };
        let (course, modules) = db.save_course(&new).unwrap();
        assert_eq!(course.generation_status, "model");
        assert_eq!(db.get_course_modules("c-1").unwrap(), modules);

        new.id = "c-2";
        new.subject_id = "alchemy";
        assert!(db.save_course(&new).is_err());
    }

    #[test]
    fn test_save_assessment_and_recommendations() {
        let db = db_with_user("user-1");
        let mut data = AssessmentData::default();
        data.basic_info.education = Some("A-Level".into());
        data.technical_interests = vec!["security".into()];
        let analysis = analyze(&data);
        assert_eq!(db.get_learning_style("user-1").unwrap(), None);
        data.learning_preferences.style = Some(LearningStyle::ReadingWriting);
        db.save_assessment("user-1", &data, &analysis).unwrap();
        assert_eq!(db.count_assessments("user-1").unwrap(), 1);
        assert_eq!(db.get_learning_style("user-1").unwrap(), Some(LearningStyle::ReadingWriting));
        let education: Option<String> = db
            .with_connection(|conn| {
                conn.query_row(
                    "SELECT education FROM profiles WHERE user_id = ?1",
                    params!["user-1"],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(education.as_deref(), Some("A-Level"));

        let recs = fallback_recommendations(&analysis);
        let roadmap = crate::content::build_roadmap(&recs.careers[0], None);
        let id = db
            .save_recommendations("user-1", &recs, &GenerationStatus::Model, Some(&roadmap), "r-1")
            .unwrap();
        assert_eq!(id.as_deref(), Some("r-1"));
        assert_eq!(db.count_roadmap_milestones("r-1").unwrap(), roadmap.milestones.len() as i64);
    }
}
