//! Nova, the conversational assessment guide.
//!
//! Nova keeps a [`ConversationContext`] per assessment session. Each user
//! message nudges the inferred personality traits, adjusts an engagement
//! score, gets captured into [`AssessmentData`] for the current phase and
//! produces a [`NovaResponse`] from the script.
//!
//! After the welcome, the phase is never stored as an independent
//! transition: it is re-derived from which assessment fields are filled in
//! (see [`infer_phase`]).

use crate::assessment::{AssessmentData, LearningStyle, Trait};
use crate::logging;
use crate::script::{
    acknowledgement, next_cognitive_question, next_personality_question, prompt_for, InputClass,
    CORRECT_SCORE, INCORRECT_SCORE, LEARNING_STYLE_OPTIONS, LIKERT_OPTIONS, LIKERT_SCORES,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============ Phases ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BasicInfoStep {
    Role,
    Experience,
    Education,
    Location,
}

impl BasicInfoStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BasicInfoStep::Role => "role",
            BasicInfoStep::Experience => "experience",
            BasicInfoStep::Education => "education",
            BasicInfoStep::Location => "location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", content = "step", rename_all = "kebab-case")]
pub enum Phase {
    Welcome,
    BasicInfo(BasicInfoStep),
    TechnicalInterests,
    CognitiveAssessment,
    PersonalityAssessment,
    LearningPreferences,
    Results,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Welcome => "welcome",
            Phase::BasicInfo(_) => "basic-info",
            Phase::TechnicalInterests => "technical-interests",
            Phase::CognitiveAssessment => "cognitive-assessment",
            Phase::PersonalityAssessment => "personality-assessment",
            Phase::LearningPreferences => "learning-preferences",
            Phase::Results => "results",
        }
    }

    /// Key used for the raw answer in `ConversationContext::responses`
    fn response_key(&self, data: &AssessmentData) -> String {
        match self {
            Phase::BasicInfo(step) => format!("basic-info.{}", step.as_str()),
            Phase::CognitiveAssessment => match next_cognitive_question(data) {
                Some(q) => format!("cognitive.{}", q.area.as_str()),
                None => "cognitive".to_string(),
            },
            Phase::PersonalityAssessment => match next_personality_question(data) {
                Some(q) => format!("personality.{}", q.trait_.as_str()),
                None => "personality".to_string(),
            },
            other => other.as_str().to_string(),
        }
    }
}

/// Next phase as a pure function of which fields are present, checked in a
/// fixed priority order. Never returns `Welcome`.
pub fn infer_phase(data: &AssessmentData) -> Phase {
    let info = &data.basic_info;
    if info.role.is_none() {
        Phase::BasicInfo(BasicInfoStep::Role)
    } else if info.experience.is_none() {
        Phase::BasicInfo(BasicInfoStep::Experience)
    } else if info.education.is_none() {
        Phase::BasicInfo(BasicInfoStep::Education)
    } else if info.location.is_none() {
        Phase::BasicInfo(BasicInfoStep::Location)
    } else if data.technical_interests.is_empty() {
        Phase::TechnicalInterests
    } else if !data.cognitive_scores.is_complete() {
        Phase::CognitiveAssessment
    } else if !data.personality_scores.is_complete() {
        Phase::PersonalityAssessment
    } else if data.learning_preferences.style.is_none() {
        Phase::LearningPreferences
    } else {
        Phase::Results
    }
}

// ============ Trait Inference ============

pub const TRAIT_NUDGE: f64 = 10.0;
const NEUTRAL_TRAIT: f64 = 50.0;

/// Words that hint at a trait, with the direction of the nudge
static TRAIT_KEYWORDS: Lazy<Vec<(&'static str, Trait, f64)>> = Lazy::new(|| {
    vec![
        ("team", Trait::Extraversion, TRAIT_NUDGE),
        ("people", Trait::Extraversion, TRAIT_NUDGE),
        ("friends", Trait::Extraversion, TRAIT_NUDGE),
        ("alone", Trait::Extraversion, -TRAIT_NUDGE),
        ("independent", Trait::Extraversion, -TRAIT_NUDGE),
        ("quiet", Trait::Extraversion, -TRAIT_NUDGE),
        ("creative", Trait::Openness, TRAIT_NUDGE),
        ("imagine", Trait::Openness, TRAIT_NUDGE),
        ("explore", Trait::Openness, TRAIT_NUDGE),
        ("routine", Trait::Openness, -TRAIT_NUDGE),
        ("traditional", Trait::Openness, -TRAIT_NUDGE),
        ("plan", Trait::Conscientiousness, TRAIT_NUDGE),
        ("organized", Trait::Conscientiousness, TRAIT_NUDGE),
        ("schedule", Trait::Conscientiousness, TRAIT_NUDGE),
        ("procrastinate", Trait::Conscientiousness, -TRAIT_NUDGE),
        ("messy", Trait::Conscientiousness, -TRAIT_NUDGE),
        ("help", Trait::Agreeableness, TRAIT_NUDGE),
        ("kind", Trait::Agreeableness, TRAIT_NUDGE),
        ("support", Trait::Agreeableness, TRAIT_NUDGE),
        ("argue", Trait::Agreeableness, -TRAIT_NUDGE),
        ("compete", Trait::Agreeableness, -TRAIT_NUDGE),
        ("stress", Trait::Neuroticism, TRAIT_NUDGE),
        ("anxious", Trait::Neuroticism, TRAIT_NUDGE),
        ("worried", Trait::Neuroticism, TRAIT_NUDGE),
        ("nervous", Trait::Neuroticism, TRAIT_NUDGE),
        ("calm", Trait::Neuroticism, -TRAIT_NUDGE),
        ("relaxed", Trait::Neuroticism, -TRAIT_NUDGE),
    ]
});

/// Traits inferred from free text, each kept in [0, 100]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferredTraits {
    pub openness: f64,
    pub conscientiousness: f64,
    pub extraversion: f64,
    pub agreeableness: f64,
    pub neuroticism: f64,
}

impl Default for InferredTraits {
    fn default() -> Self {
        Self {
            openness: NEUTRAL_TRAIT,
            conscientiousness: NEUTRAL_TRAIT,
            extraversion: NEUTRAL_TRAIT,
            agreeableness: NEUTRAL_TRAIT,
            neuroticism: NEUTRAL_TRAIT,
        }
    }
}

impl InferredTraits {
    pub fn get(&self, t: Trait) -> f64 {
        match t {
            Trait::Openness => self.openness,
            Trait::Conscientiousness => self.conscientiousness,
            Trait::Extraversion => self.extraversion,
            Trait::Agreeableness => self.agreeableness,
            Trait::Neuroticism => self.neuroticism,
        }
    }

    fn nudge(&mut self, t: Trait, delta: f64) {
        let slot = match t {
            Trait::Openness => &mut self.openness,
            Trait::Conscientiousness => &mut self.conscientiousness,
            Trait::Extraversion => &mut self.extraversion,
            Trait::Agreeableness => &mut self.agreeableness,
            Trait::Neuroticism => &mut self.neuroticism,
        };
        *slot = (*slot + delta).clamp(0.0, 100.0);
    }
}

/// Apply one nudge per keyword found in the message. Returns the hits.
pub fn apply_trait_keywords(traits: &mut InferredTraits, message: &str) -> Vec<(Trait, f64)> {
    let lower = message.to_lowercase();
    let mut hits = Vec::new();
    for (keyword, t, delta) in TRAIT_KEYWORDS.iter() {
        if lower.contains(keyword) {
            traits.nudge(*t, *delta);
            hits.push((*t, *delta));
        }
    }
    hits
}

// ============ Engagement ============

pub const INITIAL_ENGAGEMENT: u8 = 50;
const LONG_MESSAGE_CHARS: usize = 50;
const SHORT_MESSAGE_CHARS: usize = 10;
const ENGAGEMENT_STEP: i16 = 5;

/// Long answers raise engagement, terse ones lower it; always within [0, 100]
pub fn adjust_engagement(engagement: u8, message: &str) -> u8 {
    let chars = message.chars().count();
    let delta = if chars > LONG_MESSAGE_CHARS {
        ENGAGEMENT_STEP
    } else if chars < SHORT_MESSAGE_CHARS {
        -ENGAGEMENT_STEP
    } else {
        0
    };
    (engagement as i16 + delta).clamp(0, 100) as u8
}

pub fn classify_input(message: &str) -> InputClass {
    let lower = message.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if any(&["love", "excited", "amazing", "awesome", "passionate", "can't wait", "!"]) {
        InputClass::High
    } else if any(&["curious", "interested", "wonder", "learn", "?"]) {
        InputClass::Curious
    } else if any(&["not sure", "don't know", "dunno", "meh", "bored", "whatever", "nervous"]) {
        InputClass::Low
    } else {
        InputClass::Medium
    }
}

// ============ Answer Capture ============

pub const BASIC_INFO_XP: u32 = 10;
pub const INTERESTS_XP: u32 = 15;
pub const QUESTION_XP: u32 = 20;
pub const PREFERENCES_XP: u32 = 25;
pub const GOALS_XP: u32 = 15;
pub const RESULTS_BONUS_XP: u32 = 50;

enum Capture {
    Captured { xp: u32 },
    Rejected { hint: &'static str },
    Nothing,
}

/// Split "python, data and design" into individual interests
pub fn parse_interests(message: &str) -> Vec<String> {
    message
        .split(',')
        .flat_map(|part| part.split(" and "))
        .map(|s| s.trim().trim_end_matches('.').trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Resolve an answer to an option index: exact label (case-insensitive)
/// or a 1-based number.
pub fn match_option(message: &str, options: &[&str]) -> Option<usize> {
    let answer = message.trim();
    if let Some(i) = options.iter().position(|o| o.eq_ignore_ascii_case(answer)) {
        return Some(i);
    }
    answer
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=options.len()).contains(n))
        .map(|n| n - 1)
}

fn capture_answer(phase: Phase, data: &mut AssessmentData, message: &str) -> Capture {
    let text = message.trim();

    match phase {
        Phase::Welcome => Capture::Nothing,
        Phase::BasicInfo(step) => {
            if text.is_empty() {
                return Capture::Rejected { hint: "I didn't catch that." };
            }
            let info = &mut data.basic_info;
            let slot = match step {
                BasicInfoStep::Role => &mut info.role,
                BasicInfoStep::Experience => &mut info.experience,
                BasicInfoStep::Education => &mut info.education,
                BasicInfoStep::Location => &mut info.location,
            };
            *slot = Some(text.to_string());
            Capture::Captured { xp: BASIC_INFO_XP }
        }
        Phase::TechnicalInterests => {
            let interests = parse_interests(text);
            if interests.is_empty() {
                return Capture::Rejected { hint: "Name at least one topic you'd like to explore." };
            }
            data.technical_interests = interests;
            Capture::Captured { xp: INTERESTS_XP }
        }
        Phase::CognitiveAssessment => match next_cognitive_question(data) {
            Some(q) => match match_option(text, q.options) {
                Some(i) => {
                    let score = if i == q.correct { CORRECT_SCORE } else { INCORRECT_SCORE };
                    data.cognitive_scores.set(q.area, score);
                    Capture::Captured { xp: QUESTION_XP }
                }
                None => Capture::Rejected { hint: "Pick one of the options (or its number)." },
            },
            None => Capture::Nothing,
        },
        Phase::PersonalityAssessment => match next_personality_question(data) {
            Some(q) => match match_option(text, &LIKERT_OPTIONS) {
                Some(i) => {
                    let score = if q.reversed {
                        LIKERT_SCORES[LIKERT_SCORES.len() - 1 - i]
                    } else {
                        LIKERT_SCORES[i]
                    };
                    data.personality_scores.set(q.trait_, score);
                    Capture::Captured { xp: QUESTION_XP }
                }
                None => Capture::Rejected {
                    hint: "Choose how much you agree, from strongly agree to strongly disagree.",
                },
            },
            None => Capture::Nothing,
        },
        Phase::LearningPreferences => {
            let style = match match_option(text, &LEARNING_STYLE_OPTIONS) {
                Some(0) => Some(LearningStyle::Visual),
                Some(1) => Some(LearningStyle::Auditory),
                Some(2) => Some(LearningStyle::ReadingWriting),
                Some(3) => Some(LearningStyle::Kinesthetic),
                _ => LearningStyle::from_text(text),
            };
            match style {
                Some(style) => {
                    data.learning_preferences.style = Some(style);
                    Capture::Captured { xp: PREFERENCES_XP }
                }
                None => Capture::Rejected {
                    hint: "Visual, auditory, reading & writing, or hands-on?",
                },
            }
        }
        Phase::Results => {
            if data.has_career_goals() || text.is_empty() {
                Capture::Nothing
            } else {
                data.goals.career_goals = Some(text.to_string());
                Capture::Captured { xp: GOALS_XP }
            }
        }
    }
}

// ============ Conversation ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub phase: Phase,
    pub responses: BTreeMap<String, String>,
    pub inferred_traits: InferredTraits,
    pub history: Vec<String>,
    pub engagement: u8,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            phase: Phase::Welcome,
            responses: BTreeMap::new(),
            inferred_traits: InferredTraits::default(),
            history: Vec::new(),
            engagement: INITIAL_ENGAGEMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovaResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp_reward: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_phase: Option<Phase>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening message for a fresh session
    pub fn welcome(&self, data: &AssessmentData) -> NovaResponse {
        let prompt = prompt_for(self.phase, data);
        NovaResponse {
            message: prompt.message,
            emoji: Some(prompt.emoji.to_string()),
            xp_reward: None,
            achievement: None,
            options: prompt.options,
            next_phase: None,
        }
    }

    /// Feed one user message through Nova
    pub fn process_message(
        &mut self,
        data: &mut AssessmentData,
        message: &str,
        session_id: &str,
    ) -> NovaResponse {
        self.history.push(message.to_string());

        let hits = apply_trait_keywords(&mut self.inferred_traits, message);
        if !hits.is_empty() {
            let summary: Vec<String> =
                hits.iter().map(|(t, d)| format!("{}{:+}", t.as_str(), d)).collect();
            logging::log_assessment(
                Some(session_id),
                &format!("Trait keywords: {}", summary.join(", ")),
            );
        }

        self.engagement = adjust_engagement(self.engagement, message);
        let class = classify_input(message);

        let answered = self.phase;
        let response_key = answered.response_key(data);
        let capture = capture_answer(answered, data, message);

        let (next, mut xp, hint) = match capture {
            Capture::Captured { xp } => {
                self.responses.insert(response_key, message.trim().to_string());
                (infer_phase(data), xp, None)
            }
            Capture::Nothing => (infer_phase(data), 0, None),
            Capture::Rejected { hint } => (answered, 0, Some(hint)),
        };

        if next == Phase::Results && answered != Phase::Results {
            xp += RESULTS_BONUS_XP;
        }

        let prompt = prompt_for(next, data);
        let (lead, emoji) = match hint {
            Some(hint) => (hint.to_string(), prompt.emoji),
            None => match acknowledgement(answered, class) {
                Some(line) => (line.message.to_string(), line.emoji),
                None => (String::new(), prompt.emoji),
            },
        };
        let message_text = if lead.is_empty() {
            prompt.message
        } else {
            format!("{}\n\n{}", lead, prompt.message)
        };

        logging::log_assessment(Some(session_id), &format!(
            "{} -> {} (class={}, engagement={}, xp={})",
            answered.as_str(), next.as_str(), class.as_str(), self.engagement, xp
        ));

        self.phase = next;

        NovaResponse {
            message: message_text,
            emoji: Some(emoji.to_string()),
            xp_reward: (xp > 0).then_some(xp),
            achievement: None,
            options: prompt.options,
            next_phase: (next != answered).then_some(next),
        }
    }

    pub fn is_finished(&self, data: &AssessmentData) -> bool {
        self.phase == Phase::Results && data.has_career_goals()
    }
}

/// Trait readings shown next to the explicit answers on the results screen
pub fn inferred_trait_summary(traits: &InferredTraits) -> Vec<(Trait, f64)> {
    Trait::ALL.iter().map(|t| (*t, traits.get(*t))).collect()
}
