//! Personalized content generation
//!
//! A [`ContentGenerator`] turns assessment results into career
//! recommendations and course briefs into course outlines. The LLM-backed
//! generator may fail; callers go through [`recommendations_or_fallback`]
//! and [`course_or_fallback`], which always produce content and record in
//! [`GenerationStatus`] whether it came from the model or the built-in
//! templates.

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::assessment::{AssessmentAnalysis, AssessmentData, LearningStyle};
use crate::catalog::find_career;
use crate::error::LlmError;
use crate::logging;
use crate::openai::ChatMessage;

// ============ Generated Content ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GenerationStatus {
    Model,
    Fallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generated<T> {
    #[serde(flatten)]
    pub status: GenerationStatus,
    pub value: T,
}

impl<T> Generated<T> {
    pub fn model(value: T) -> Self {
        Self { status: GenerationStatus::Model, value }
    }

    pub fn fallback(value: T, reason: impl Into<String>) -> Self {
        Self { status: GenerationStatus::Fallback { reason: reason.into() }, value }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.status, GenerationStatus::Fallback { .. })
    }
}

// ============ Recommendations ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerRecommendation {
    pub title: String,
    pub description: String,
    pub fit_score: u8,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub summary: String,
    pub careers: Vec<CareerRecommendation>,
}

// ============ Courses ============

/// A course request with its subject and level resolved from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseBrief {
    pub subject: String,
    pub topics: Vec<String>,
    pub education_level: String,
    pub content_type: String,
    pub difficulty: u8,
    pub time_allocation: u32, // minutes
    pub learning_objectives: Vec<String>,
}

/// What we know about the learner when tailoring a course
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub learning_style: Option<LearningStyle>,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleOutline {
    pub title: String,
    pub content: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOutline {
    pub title: String,
    pub description: String,
    pub modules: Vec<ModuleOutline>,
}

// ============ Generator Trait ============

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_recommendations(
        &self,
        data: &AssessmentData,
        analysis: &AssessmentAnalysis,
    ) -> Result<Recommendations, LlmError>;

    async fn generate_course(
        &self,
        brief: &CourseBrief,
        learner: &LearnerProfile,
    ) -> Result<CourseOutline, LlmError>;
}

/// A hosted chat-completion API
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;
}

/// Used when no API key is configured: every call fails straight to fallback
pub struct UnavailableGenerator;

#[async_trait]
impl ContentGenerator for UnavailableGenerator {
    async fn generate_recommendations(
        &self,
        _: &AssessmentData,
        _: &AssessmentAnalysis,
    ) -> Result<Recommendations, LlmError> {
        Err(LlmError::MissingApiKey)
    }

    async fn generate_course(
        &self,
        _: &CourseBrief,
        _: &LearnerProfile,
    ) -> Result<CourseOutline, LlmError> {
        Err(LlmError::MissingApiKey)
    }
}

// ============ LLM Generator ============

const RECOMMENDATIONS_PROMPT: &str = r#"You are Nova, a friendly career and learning guide
for students. You receive a learner's assessment and a pre-computed analysis
with catalog career matches. Refine the matches into personal recommendations.
Keep fit scores between 0 and 100.

Respond ONLY with valid JSON, no other text:
{
  "summary": "two sentences addressed to the learner",
  "careers": [
    {
      "title": "...",
      "description": "...",
      "fitScore": 80,
      "reasons": ["..."],
      "milestones": ["..."]
    }
  ]
}"#;

const COURSE_PROMPT: &str = r#"You are Nova, an instructional designer building short courses.
You receive a course brief and a learner profile. Design a course that fits the
time allocation, difficulty (1-10) and learner's preferred learning style.
Cover every learning objective.

Respond ONLY with valid JSON, no other text:
{
  "title": "...",
  "description": "...",
  "modules": [
    {"title": "...", "content": "...", "durationMinutes": 30, "activities": ["..."]}
  ]
}"#;

pub struct LlmContentGenerator {
    client: Box<dyn CompletionClient>,
    max_retries: u32,
    base_delay: Duration,
}

impl LlmContentGenerator {
    pub fn new(client: Box<dyn CompletionClient>, max_retries: u32) -> Self {
        Self {
            client,
            max_retries,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Call the model and parse its JSON, retrying transient failures
    async fn request_json<T: DeserializeOwned + Send>(
        &self,
        system_prompt: &str,
        payload: String,
        max_tokens: u32,
    ) -> Result<T, LlmError> {
        let mut attempt = 0;
        loop {
            let messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(&payload)];
            let result = match self.client.complete(messages, 0.4, max_tokens).await {
                Ok(response) => parse_json::<T>(&response),
                Err(e) => Err(e),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = backoff(self.base_delay, attempt);
                    logging::log_content(None, &format!(
                        "{} attempt {} failed ({}), retrying in {}ms",
                        self.client.name(), attempt + 1, e, delay.as_millis()
                    ));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for LlmContentGenerator {
    async fn generate_recommendations(
        &self,
        data: &AssessmentData,
        analysis: &AssessmentAnalysis,
    ) -> Result<Recommendations, LlmError> {
        let payload = serde_json::json!({ "assessment": data, "analysis": analysis }).to_string();
        let recommendations: Recommendations =
            self.request_json(RECOMMENDATIONS_PROMPT, payload, 1500).await?;
        if recommendations.careers.is_empty() {
            return Err(LlmError::Parse("no careers in recommendations".to_string()));
        }
        Ok(clamp_fit_scores(recommendations))
    }

    async fn generate_course(
        &self,
        brief: &CourseBrief,
        learner: &LearnerProfile,
    ) -> Result<CourseOutline, LlmError> {
        let payload = serde_json::json!({ "brief": brief, "learner": learner }).to_string();
        let course: CourseOutline = self.request_json(COURSE_PROMPT, payload, 3000).await?;
        if course.modules.is_empty() {
            return Err(LlmError::Parse("course has no modules".to_string()));
        }
        Ok(course)
    }
}

/// Exponential backoff with up to 50% jitter
fn backoff(base: Duration, attempt: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(attempt));
    let jitter_cap = exp.as_millis() as u64 / 2;
    let jitter = if jitter_cap == 0 { 0 } else { rand::rng().random_range(0..=jitter_cap) };
    exp + Duration::from_millis(jitter)
}

/// Strip markdown code fences and parse the JSON object inside
pub fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T, LlmError> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    // Models sometimes wrap the object in prose
    let candidate = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned,
    };

    serde_json::from_str(candidate).map_err(|e| {
        let preview: String = candidate.chars().take(200).collect();
        LlmError::Parse(format!("{} in {}", e, preview))
    })
}

fn clamp_fit_scores(mut recommendations: Recommendations) -> Recommendations {
    for career in &mut recommendations.careers {
        career.fit_score = career.fit_score.min(100);
    }
    recommendations
}

// ============ Roadmaps ============

const DEFAULT_TIMELINE_MONTHS: u32 = 12;
pub const MAX_TIMELINE_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub title: String,
    pub target_month: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
    pub title: String,
    pub career_title: String,
    pub milestones: Vec<Milestone>,
}

/// Spread the career's milestones evenly over the learner's timeline,
/// capped at `MAX_TIMELINE_MONTHS`.
pub fn build_roadmap(career: &CareerRecommendation, timeline_months: Option<u32>) -> Roadmap {
    let months = timeline_months
        .filter(|m| *m > 0)
        .unwrap_or(DEFAULT_TIMELINE_MONTHS)
        .min(MAX_TIMELINE_MONTHS) as u64;
    let count = career.milestones.len().max(1) as u64;

    let milestones = career
        .milestones
        .iter()
        .enumerate()
        .map(|(i, title)| Milestone {
            title: title.clone(),
            target_month: ((i as u64 + 1) * months).div_ceil(count) as u32,
        })
        .collect();

    Roadmap {
        title: format!("Roadmap to {}", career.title),
        career_title: career.title.clone(),
        milestones,
    }
}

// ============ Fallbacks ============

/// Recommendations built from the catalog matches alone
pub fn fallback_recommendations(analysis: &AssessmentAnalysis) -> Recommendations {
    let careers: Vec<CareerRecommendation> = analysis
        .career_matches
        .iter()
        .map(|m| {
            let catalog = find_career(&m.career_id);
            CareerRecommendation {
                title: m.title.clone(),
                description: catalog.map(|c| c.description.to_string()).unwrap_or_default(),
                fit_score: m.fit_score,
                reasons: m.reasons.clone(),
                milestones: catalog
                    .map(|c| c.milestones.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default(),
            }
        })
        .collect();

    let summary = match careers.first() {
        Some(top) => format!(
            "Based on your answers, {} looks like your strongest match at {}% fit. \
             Explore the roadmap to get started.",
            top.title, top.fit_score
        ),
        None => "Complete the assessment to see career matches.".to_string(),
    };

    Recommendations { summary, careers }
}

/// One module per learning objective, splitting the time evenly
pub fn fallback_course(brief: &CourseBrief, learner: &LearnerProfile) -> CourseOutline {
    let objectives: Vec<&str> = brief
        .learning_objectives
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect();
    let objectives = if objectives.is_empty() { vec![brief.subject.as_str()] } else { objectives };

    let per_module = (brief.time_allocation / objectives.len() as u32).max(1);
    let activity = match learner.learning_style {
        Some(LearningStyle::Visual) => "Sketch a diagram summarising the key ideas",
        Some(LearningStyle::Auditory) => "Explain the idea out loud to a study partner",
        Some(LearningStyle::ReadingWriting) => "Write a one-page summary in your own words",
        Some(LearningStyle::Kinesthetic) => "Work through a hands-on exercise",
        None => "Answer three practice questions",
    };

    let modules = objectives
        .iter()
        .enumerate()
        .map(|(i, objective)| ModuleOutline {
            title: format!("Module {}: {}", i + 1, objective),
            content: format!(
                "Study {} in {} at {} level (difficulty {}/10), focusing on: {}.",
                brief.content_type,
                brief.subject,
                brief.education_level,
                brief.difficulty,
                objective
            ),
            duration_minutes: per_module,
            activities: vec![activity.to_string(), format!("Self-check quiz on {}", objective)],
        })
        .collect();

    CourseOutline {
        title: format!("{} for {}", brief.subject, brief.education_level),
        description: format!(
            "A {}-minute {} course covering {}.",
            brief.time_allocation,
            brief.content_type,
            objectives.join(", ")
        ),
        modules,
    }
}

// ============ Entry Points ============

pub async fn recommendations_or_fallback(
    generator: &dyn ContentGenerator,
    data: &AssessmentData,
    analysis: &AssessmentAnalysis,
) -> Generated<Recommendations> {
    match generator.generate_recommendations(data, analysis).await {
        Ok(recommendations) => {
            logging::log_content(
                None,
                &format!("Model recommendations: {} careers", recommendations.careers.len()),
            );
            Generated::model(recommendations)
        }
        Err(e) => {
            logging::log_content(None, &format!("Recommendations fell back to catalog: {}", e));
            Generated::fallback(fallback_recommendations(analysis), e.to_string())
        }
    }
}

pub async fn course_or_fallback(
    generator: &dyn ContentGenerator,
    brief: &CourseBrief,
    learner: &LearnerProfile,
) -> Generated<CourseOutline> {
    match generator.generate_course(brief, learner).await {
        Ok(course) => {
            logging::log_content(
                None,
                &format!("Model course '{}' with {} modules", course.title, course.modules.len()),
            );
            Generated::model(course)
        }
        Err(e) => {
            logging::log_content(
                None,
                &format!("Course for {} fell back to template: {}", brief.subject, e),
            );
            Generated::fallback(fallback_course(brief, learner), e.to_string())
        }
    }
}
