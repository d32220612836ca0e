// Nova's script: canned acknowledgements keyed by (phase, input class) and
// the question asked in each phase.

use crate::assessment::{AssessmentData, CognitiveArea, Trait};
use crate::nova::{BasicInfoStep, Phase};
use serde::{Deserialize, Serialize};

/// Coarse read of how the learner is feeling about the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InputClass {
    High,
    Curious,
    Low,
    Medium,
}

impl InputClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputClass::High => "high",
            InputClass::Curious => "curious",
            InputClass::Low => "low",
            InputClass::Medium => "medium",
        }
    }
}

// ============ Acknowledgements ============

pub struct ScriptLine {
    pub phase: Phase,
    pub class: Option<InputClass>, // None = default for the phase
    pub message: &'static str,
    pub emoji: &'static str,
}

const fn line(
    phase: Phase,
    class: Option<InputClass>,
    message: &'static str,
    emoji: &'static str,
) -> ScriptLine {
    ScriptLine { phase, class, message, emoji }
}

use InputClass::{Curious, High, Low};

const ROLE: Phase = Phase::BasicInfo(BasicInfoStep::Role);
const EXPERIENCE: Phase = Phase::BasicInfo(BasicInfoStep::Experience);
const EDUCATION: Phase = Phase::BasicInfo(BasicInfoStep::Education);
const LOCATION: Phase = Phase::BasicInfo(BasicInfoStep::Location);

pub const ACKNOWLEDGEMENTS: &[ScriptLine] = &[
    // Welcome
    line(Phase::Welcome, Some(High), "Love the energy! This is going to be fun.", "🚀"),
    line(
        Phase::Welcome,
        Some(Curious),
        "Great question to start with. I'll explain as we go.",
        "🔍",
    ),
    line(Phase::Welcome, Some(Low), "No pressure at all. There are no wrong answers here.", "🤗"),
    line(Phase::Welcome, None, "Awesome, let's get started.", "✨"),
    // Basic info
    line(ROLE, Some(High), "Sounds like you really enjoy what you do!", "🎉"),
    line(ROLE, None, "Thanks, that helps me understand where you're coming from.", "👍"),
    line(EXPERIENCE, Some(Low), "Everyone starts somewhere. We'll build from here.", "🌱"),
    line(EXPERIENCE, None, "Got it, I'll pitch things at the right level.", "📈"),
    line(EDUCATION, None, "Noted. That tells me which courses will fit.", "🎓"),
    line(LOCATION, Some(High), "What a place to be learning from!", "🌍"),
    line(LOCATION, None, "Thanks! Basic profile done.", "📍"),
    // Interests
    line(
        Phase::TechnicalInterests,
        Some(High),
        "Those are exciting areas, and your enthusiasm shows!",
        "🔥",
    ),
    line(Phase::TechnicalInterests, Some(Curious), "Curiosity is the best fuel for learning.", "💡"),
    line(
        Phase::TechnicalInterests,
        Some(Low),
        "That's fine, interests grow once you start exploring.",
        "🧭",
    ),
    line(Phase::TechnicalInterests, None, "Nice mix of interests.", "🧩"),
    // Cognitive
    line(Phase::CognitiveAssessment, Some(Low), "Take your time, these are just warm-ups.", "🧘"),
    line(Phase::CognitiveAssessment, None, "Answer locked in.", "🧠"),
    // Personality
    line(Phase::PersonalityAssessment, None, "Thanks for being honest.", "🪞"),
    // Learning preferences
    line(Phase::LearningPreferences, Some(High), "Perfect, I'll lean into that style.", "🎯"),
    line(Phase::LearningPreferences, None, "Good to know how you learn best.", "📚"),
    // Results
    line(Phase::Results, Some(High), "Love that ambition!", "🌟"),
    line(Phase::Results, None, "Thanks for sharing your goals.", "🏁"),
];

/// Exact (phase, class) entry first, then the phase default
pub fn acknowledgement(phase: Phase, class: InputClass) -> Option<&'static ScriptLine> {
    ACKNOWLEDGEMENTS
        .iter()
        .find(|l| l.phase == phase && l.class == Some(class))
        .or_else(|| ACKNOWLEDGEMENTS.iter().find(|l| l.phase == phase && l.class.is_none()))
}

// ============ Question Bank ============

pub struct CognitiveQuestion {
    pub area: CognitiveArea,
    pub prompt: &'static str,
    pub options: &'static [&'static str],
    pub correct: usize,
}

pub const COGNITIVE_QUESTIONS: [CognitiveQuestion; 4] = [
    CognitiveQuestion {
        area: CognitiveArea::Analytical,
        prompt: "A shop sells pens at 3 for $2. How much do 12 pens cost?",
        options: &["$6", "$8", "$9", "$12"],
        correct: 1,
    },
    CognitiveQuestion {
        area: CognitiveArea::Logical,
        prompt: "All bloops are razzies and all razzies are lazzies. \
                 Are all bloops definitely lazzies?",
        options: &["Yes", "No", "Only some", "Can't tell"],
        correct: 0,
    },
    CognitiveQuestion {
        area: CognitiveArea::Verbal,
        prompt: "Which word is closest in meaning to \"meticulous\"?",
        options: &["Careless", "Careful", "Quick", "Loud"],
        correct: 1,
    },
    CognitiveQuestion {
        area: CognitiveArea::Spatial,
        prompt: "A cube is painted on every face and cut into 27 equal cubes. \
                 How many small cubes have exactly two painted faces?",
        options: &["8", "6", "12", "4"],
        correct: 2,
    },
];

pub const CORRECT_SCORE: f64 = 85.0;
pub const INCORRECT_SCORE: f64 = 45.0;

pub struct PersonalityQuestion {
    pub trait_: Trait,
    pub statement: &'static str,
    pub reversed: bool, // agreeing lowers the trait
}

pub const PERSONALITY_QUESTIONS: [PersonalityQuestion; 5] = [
    PersonalityQuestion {
        trait_: Trait::Openness,
        statement: "I enjoy trying new ways of doing things.",
        reversed: false,
    },
    PersonalityQuestion {
        trait_: Trait::Conscientiousness,
        statement: "I plan my study time and stick to it.",
        reversed: false,
    },
    PersonalityQuestion {
        trait_: Trait::Extraversion,
        statement: "I prefer working on my own rather than in a group.",
        reversed: true,
    },
    PersonalityQuestion {
        trait_: Trait::Agreeableness,
        statement: "I go out of my way to help classmates.",
        reversed: false,
    },
    PersonalityQuestion {
        trait_: Trait::Neuroticism,
        statement: "I get stressed easily before exams.",
        reversed: false,
    },
];

pub const LIKERT_OPTIONS: [&str; 5] =
    ["Strongly agree", "Agree", "Neutral", "Disagree", "Strongly disagree"];
pub const LIKERT_SCORES: [f64; 5] = [90.0, 70.0, 50.0, 30.0, 10.0];

pub const LEARNING_STYLE_OPTIONS: [&str; 4] =
    ["Visual", "Auditory", "Reading & writing", "Hands-on"];

pub fn next_cognitive_question(data: &AssessmentData) -> Option<&'static CognitiveQuestion> {
    COGNITIVE_QUESTIONS
        .iter()
        .find(|q| data.cognitive_scores.get(q.area).is_none())
}

pub fn next_personality_question(data: &AssessmentData) -> Option<&'static PersonalityQuestion> {
    PERSONALITY_QUESTIONS
        .iter()
        .find(|q| data.personality_scores.get(q.trait_).is_none())
}

// ============ Prompts ============

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub message: String,
    pub emoji: &'static str,
    pub options: Option<Vec<String>>,
}

fn options(items: &[&str]) -> Option<Vec<String>> {
    Some(items.iter().map(|s| s.to_string()).collect())
}

/// The question Nova asks when entering (or repeating) `phase`
pub fn prompt_for(phase: Phase, data: &AssessmentData) -> Prompt {
    match phase {
        Phase::Welcome => Prompt {
            message: "Hi, I'm Nova! I'll ask you a few questions so we can build a learning \
                      path that fits you. Ready?"
                .to_string(),
            emoji: "👋",
            options: options(&["Let's go!", "Tell me more first", "I'm a bit nervous"]),
        },
        Phase::BasicInfo(BasicInfoStep::Role) => Prompt {
            message: "First things first: what do you do right now?".to_string(),
            emoji: "🙋",
            options: options(&["Student", "Teacher", "Researcher", "Working professional"]),
        },
        Phase::BasicInfo(BasicInfoStep::Experience) => Prompt {
            message: "How much experience do you have with technology and coding?".to_string(),
            emoji: "🛠️",
            options: options(&["None yet", "Beginner", "Intermediate", "Advanced"]),
        },
        Phase::BasicInfo(BasicInfoStep::Education) => Prompt {
            message: "What's your current level of education?".to_string(),
            emoji: "🎓",
            options: options(&["Primary", "O-Level", "A-Level", "Undergraduate", "Postgraduate"]),
        },
        Phase::BasicInfo(BasicInfoStep::Location) => Prompt {
            message: "Where are you learning from?".to_string(),
            emoji: "🗺️",
            options: None,
        },
        Phase::TechnicalInterests => Prompt {
            message: "Which topics get you excited? List as many as you like, separated by commas."
                .to_string(),
            emoji: "💻",
            options: options(&["Programming", "Data analysis", "Design", "Security", "Science"]),
        },
        Phase::CognitiveAssessment => match next_cognitive_question(data) {
            Some(q) => Prompt {
                message: q.prompt.to_string(),
                emoji: "🧠",
                options: options(q.options),
            },
            None => prompt_for(Phase::PersonalityAssessment, data),
        },
        Phase::PersonalityAssessment => match next_personality_question(data) {
            Some(q) => Prompt {
                message: format!("How much do you agree: \"{}\"", q.statement),
                emoji: "🪞",
                options: options(&LIKERT_OPTIONS),
            },
            None => prompt_for(Phase::LearningPreferences, data),
        },
        Phase::LearningPreferences => Prompt {
            message: "Last one: how do you learn best?".to_string(),
            emoji: "📖",
            options: options(&LEARNING_STYLE_OPTIONS),
        },
        Phase::Results => {
            if data.has_career_goals() {
                Prompt {
                    message: "Your learning profile is ready. Head to your dashboard to see \
                              your recommendations."
                        .to_string(),
                    emoji: "🏆",
                    options: None,
                }
            } else {
                Prompt {
                    message: "That's everything! One more thing: what career goals are you \
                              working toward?"
                        .to_string(),
                    emoji: "🏆",
                    options: None,
                }
            }
        }
    }
}
