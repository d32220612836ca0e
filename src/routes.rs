use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::assessment::{analyze, AssessmentAnalysis, AssessmentData, Trait};
use crate::auth::AuthenticatedUser;
use crate::content::{
    build_roadmap, course_or_fallback, recommendations_or_fallback, CourseBrief, GenerationStatus,
    Generated, LearnerProfile, Recommendations, Roadmap,
};
use crate::db::{
    AssessmentSession, Course, CourseModule, EducationLevel, NewCourse, Subject, XpTransaction,
};
use crate::error::AppError;
use crate::gamification::{
    progress_to_next_level, GamificationProfile, LevelProgress, XpAward, XpCategory, ACHIEVEMENTS,
    MAX_LEVEL,
};
use crate::logging;
use crate::nova::{inferred_trait_summary, ConversationContext, NovaResponse, Phase};
use crate::rewards::{grant, RewardOutcome};
use crate::roles::{Role, RoleSet};
use crate::state::AppState;

pub const COURSE_XP: i64 = 50;
pub const ASSESSMENT_XP: i64 = 100;
const MAX_MESSAGE_CHARS: usize = 2000;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ============ Reference Data ============

pub async fn list_subjects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Subject>>, AppError> {
    Ok(Json(state.db.list_subjects()?))
}

pub async fn list_education_levels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EducationLevel>>, AppError> {
    Ok(Json(state.db.list_education_levels()?))
}

// ============ Courses ============

fn default_content_type() -> String {
    "lesson".to_string()
}

fn default_time_allocation() -> u32 {
    60
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    pub subject_id: String,
    pub education_level_id: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub difficulty: i64,
    #[serde(default = "default_time_allocation")]
    pub time_allocation: u32, // minutes
    #[serde(default)]
    pub learning_objectives: Vec<String>,
}

impl CourseRequest {
    /// Trimmed, non-empty objectives; rejects out-of-range fields
    fn validate(&self) -> Result<(u8, Vec<String>), AppError> {
        if !(1..=10).contains(&self.difficulty) {
            return Err(AppError::BadRequest("difficulty must be between 1 and 10".to_string()));
        }
        if self.time_allocation == 0 {
            return Err(AppError::BadRequest("timeAllocation must be positive".to_string()));
        }
        let objectives: Vec<String> = self
            .learning_objectives
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if objectives.is_empty() {
            return Err(AppError::BadRequest(
                "at least one learning objective is required".to_string(),
            ));
        }
        Ok((self.difficulty as u8, objectives))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResponse {
    pub course: Course,
    pub modules: Vec<CourseModule>,
    pub generation: GenerationStatus,
    pub xp_awarded: u64,
    pub gamification: RewardOutcome,
}

pub async fn generate_course(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<CourseRequest>,
) -> Result<Json<CourseResponse>, AppError> {
    let (difficulty, objectives) = req.validate()?;

    let subject = state
        .db
        .get_subject(&req.subject_id)?
        .ok_or_else(|| AppError::NotFound(format!("Subject {}", req.subject_id)))?;
    let level = state
        .db
        .get_education_level(&req.education_level_id)?
        .ok_or_else(|| AppError::NotFound(format!("Education level {}", req.education_level_id)))?;

    let brief = CourseBrief {
        subject: subject.name.clone(),
        topics: subject.topics.iter().map(|t| t.name.clone()).collect(),
        education_level: level.name.clone(),
        content_type: req.content_type.clone(),
        difficulty,
        time_allocation: req.time_allocation,
        learning_objectives: objectives,
    };
    let learner = LearnerProfile {
        learning_style: state.db.get_learning_style(&user.user_id)?,
        level: state.db.load_gamification(&user.user_id)?.level,
    };

    logging::log_content(Some(&user.user_id), &format!(
        "Course requested: {} / {} difficulty {}",
        subject.id, level.id, difficulty
    ));
    let generated = course_or_fallback(state.content.as_ref(), &brief, &learner).await;

    let course_id = Uuid::new_v4().to_string();
    let (course, modules) = state.db.save_course(&NewCourse {
        id: &course_id,
        user_id: &user.user_id,
        subject_id: &subject.id,
        education_level_id: &level.id,
        content_type: &brief.content_type,
        difficulty,
        time_allocation: brief.time_allocation,
        learning_objectives: &brief.learning_objectives,
        outline: &generated.value,
        status: &generated.status,
    })?;

    let gamification = grant(
        &state.db,
        &user.user_id,
        vec![XpAward::new(COURSE_XP, "course_generated", XpCategory::Course)],
        None,
    )?;

    Ok(Json(CourseResponse {
        course,
        modules,
        generation: generated.status,
        xp_awarded: gamification.xp_awarded,
        gamification,
    }))
}

// ============ Assessment Analysis ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub analysis: AssessmentAnalysis,
    pub recommendations: Generated<Recommendations>,
    pub roadmap: Option<Roadmap>,
    pub roadmap_id: Option<String>,
    pub xp_awarded: u64,
    pub gamification: RewardOutcome,
}

pub async fn analyze_assessment(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(data): Json<AssessmentData>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let analysis = analyze(&data);
    state.db.save_assessment(&user.user_id, &data, &analysis)?;

    let recommendations =
        recommendations_or_fallback(state.content.as_ref(), &data, &analysis).await;
    let roadmap = recommendations
        .value
        .careers
        .first()
        .map(|career| build_roadmap(career, data.goals.timeline_months));
    let roadmap_id = state.db.save_recommendations(
        &user.user_id,
        &recommendations.value,
        &recommendations.status,
        roadmap.as_ref(),
        &Uuid::new_v4().to_string(),
    )?;

    let gamification = grant(
        &state.db,
        &user.user_id,
        vec![XpAward::new(ASSESSMENT_XP, "assessment_completed", XpCategory::Assessment)],
        Some(&data),
    )?;

    logging::log_assessment(Some(&user.user_id), &format!(
        "Analyzed assessment: {} careers ({})",
        recommendations.value.careers.len(),
        if recommendations.is_fallback() { "fallback" } else { "model" }
    ));

    Ok(Json(AnalyzeResponse {
        analysis,
        recommendations,
        roadmap,
        roadmap_id,
        xp_awarded: gamification.xp_awarded,
        gamification,
    }))
}

// ============ Roles ============

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

pub async fn get_roles(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<RoleSet>, AppError> {
    Ok(Json(state.db.load_roles(&user.user_id)?))
}

pub async fn add_role(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<RoleRequest>,
) -> Result<Json<RoleSet>, AppError> {
    let role = Role::parse(&req.role)?;
    let mut roles = state.db.load_roles(&user.user_id)?;
    if roles.add(role) {
        state.db.save_roles(&user.user_id, &roles)?;
        logging::log_request(Some(&user.user_id), &format!("Added role {}", role.as_str()));
    }
    Ok(Json(roles))
}

pub async fn switch_role(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(req): Json<RoleRequest>,
) -> Result<Json<RoleSet>, AppError> {
    let role = Role::parse(&req.role)?;
    let mut roles = state.db.load_roles(&user.user_id)?;
    roles.switch(role)?;
    state.db.save_roles(&user.user_id, &roles)?;
    Ok(Json(roles))
}

pub async fn remove_role(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(role): Path<String>,
) -> Result<Json<RoleSet>, AppError> {
    let role = Role::parse(&role)?;
    let mut roles = state.db.load_roles(&user.user_id)?;
    roles.remove(role)?;
    state.db.save_roles(&user.user_id, &roles)?;
    logging::log_request(Some(&user.user_id), &format!("Removed role {}", role.as_str()));
    Ok(Json(roles))
}

// ============ Nova Sessions ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: String,
    pub phase: Phase,
    pub response: NovaResponse,
}

pub async fn start_session(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SessionStarted>, AppError> {
    let session_id = Uuid::new_v4().to_string();
    let context = ConversationContext::new();
    let data = AssessmentData::default();
    state.db.create_session(&session_id, &user.user_id, &context, &data)?;

    logging::log_assessment(Some(&session_id), "Session started");

    Ok(Json(SessionStarted {
        response: context.welcome(&data),
        phase: context.phase,
        session_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub response: NovaResponse,
    pub phase: Phase,
    pub completed: bool,
    pub data: AssessmentData,
    pub gamification: Option<RewardOutcome>,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "message exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let session = state
        .db
        .get_session(&session_id, &user.user_id)?
        .ok_or_else(|| AppError::NotFound(format!("Session {}", session_id)))?;
    if session.completed {
        return Err(AppError::BadRequest("Session already completed".to_string()));
    }

    let mut context = session.context;
    let mut data = session.data;
    let mut response = context.process_message(&mut data, &req.message, &session_id);

    // The answer must land before its XP is paid out
    let completed = context.is_finished(&data);
    if !state.db.update_session(&session_id, session.version, &context, &data, completed)? {
        return Err(AppError::Conflict(
            "Session changed while this message was processed; send it again".to_string(),
        ));
    }
    if completed {
        logging::log_assessment(Some(&session_id), "Session completed");
    }

    let gamification = match response.xp_reward {
        Some(xp) => {
            let reason = format!("nova:{}", context.phase.as_str());
            let outcome = grant(
                &state.db,
                &user.user_id,
                vec![XpAward::new(xp as i64, &reason, XpCategory::Conversation)],
                Some(&data),
            )?;
            response.achievement = outcome.new_achievements.first().map(|a| a.title.clone());
            Some(outcome)
        }
        None => None,
    };

    Ok(Json(MessageResponse {
        response,
        phase: context.phase,
        completed,
        data,
        gamification,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: AssessmentSession,
    pub inferred_traits: Vec<TraitValue>,
}

#[derive(Debug, Serialize)]
pub struct TraitValue {
    #[serde(rename = "trait")]
    pub name: Trait,
    pub value: f64,
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = state
        .db
        .get_session(&session_id, &user.user_id)?
        .ok_or_else(|| AppError::NotFound(format!("Session {}", session_id)))?;
    let inferred_traits = inferred_trait_summary(&session.context.inferred_traits)
        .into_iter()
        .map(|(name, value)| TraitValue { name, value })
        .collect();
    Ok(Json(SessionView { session, inferred_traits }))
}

// ============ Gamification ============

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementView {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub xp_reward: u32,
    pub unlocked: bool,
    pub unlocked_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationView {
    pub profile: GamificationProfile,
    pub progress: LevelProgress,
    pub max_level: u32,
    pub unlocked_count: usize,
    pub achievements: Vec<AchievementView>,
    pub transactions: Vec<XpTransaction>,
}

pub async fn get_gamification(
    State(state): State<Arc<AppState>>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<GamificationView>, AppError> {
    let profile = state.db.load_gamification(&user.user_id)?;
    let achievements = ACHIEVEMENTS
        .iter()
        .map(|a| {
            let held = profile.achievements.iter().find(|s| s.id == a.id && s.unlocked);
            AchievementView {
                id: a.id,
                title: a.title,
                description: a.description,
                xp_reward: a.xp_reward,
                unlocked: held.is_some(),
                unlocked_at: held.and_then(|s| s.unlocked_at).map(|t| t.to_rfc3339()),
            }
        })
        .collect();

    Ok(Json(GamificationView {
        progress: progress_to_next_level(profile.total_xp),
        max_level: MAX_LEVEL,
        unlocked_count: profile.unlocked_count(),
        transactions: state.db.xp_transactions(&user.user_id)?,
        achievements,
        profile,
    }))
}
