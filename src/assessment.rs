//! Assessment data assembled by the Nova conversation (or posted directly
//! to the analyze endpoint), and the analysis derived from it.
//!
//! Every field is optional so a half-finished intake deserializes cleanly;
//! completeness is always computed from which fields are present.

use crate::catalog::{CareerPath, CAREER_PATHS};
use serde::{Deserialize, Serialize};

// ============ Traits & Areas ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trait {
    Openness,
    Conscientiousness,
    Extraversion,
    Agreeableness,
    Neuroticism,
}

impl Trait {
    pub const ALL: [Trait; 5] = [
        Trait::Openness,
        Trait::Conscientiousness,
        Trait::Extraversion,
        Trait::Agreeableness,
        Trait::Neuroticism,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trait::Openness => "openness",
            Trait::Conscientiousness => "conscientiousness",
            Trait::Extraversion => "extraversion",
            Trait::Agreeableness => "agreeableness",
            Trait::Neuroticism => "neuroticism",
        }
    }

    /// Human label for a score band on this trait
    pub fn describe(&self, band: TraitBand) -> &'static str {
        match (self, band) {
            (Trait::Openness, TraitBand::High) => "Curious and drawn to new ideas",
            (Trait::Openness, TraitBand::Moderate) => "Open to new ideas with a practical streak",
            (Trait::Openness, TraitBand::Low) => "Prefers proven, familiar approaches",
            (Trait::Conscientiousness, TraitBand::High) => "Organised and goal-driven",
            (Trait::Conscientiousness, TraitBand::Moderate) => {
                "Balances structure with flexibility"
            }
            (Trait::Conscientiousness, TraitBand::Low) => {
                "Spontaneous, works best with light structure"
            }
            (Trait::Extraversion, TraitBand::High) => "Energised by people and collaboration",
            (Trait::Extraversion, TraitBand::Moderate) => "Comfortable both in teams and solo",
            (Trait::Extraversion, TraitBand::Low) => "Focused, prefers independent work",
            (Trait::Agreeableness, TraitBand::High) => "Cooperative and supportive",
            (Trait::Agreeableness, TraitBand::Moderate) => "Cooperative but willing to push back",
            (Trait::Agreeableness, TraitBand::Low) => "Direct and competitive",
            (Trait::Neuroticism, TraitBand::High) => {
                "Feels pressure strongly, benefits from steady pacing"
            }
            (Trait::Neuroticism, TraitBand::Moderate) => "Generally steady under pressure",
            (Trait::Neuroticism, TraitBand::Low) => "Calm and resilient under stress",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TraitBand {
    Low,
    Moderate,
    High,
}

impl TraitBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 65.0 {
            TraitBand::High
        } else if score >= 35.0 {
            TraitBand::Moderate
        } else {
            TraitBand::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CognitiveArea {
    Analytical,
    Logical,
    Verbal,
    Spatial,
}

impl CognitiveArea {
    pub const ALL: [CognitiveArea; 4] = [
        CognitiveArea::Analytical,
        CognitiveArea::Logical,
        CognitiveArea::Verbal,
        CognitiveArea::Spatial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CognitiveArea::Analytical => "analytical",
            CognitiveArea::Logical => "logical",
            CognitiveArea::Verbal => "verbal",
            CognitiveArea::Spatial => "spatial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LearningStyle {
    Visual,
    Auditory,
    ReadingWriting,
    Kinesthetic,
}

impl LearningStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningStyle::Visual => "visual",
            LearningStyle::Auditory => "auditory",
            LearningStyle::ReadingWriting => "readingWriting",
            LearningStyle::Kinesthetic => "kinesthetic",
        }
    }

    pub fn from_str(s: &str) -> Option<LearningStyle> {
        match s {
            "visual" => Some(LearningStyle::Visual),
            "auditory" => Some(LearningStyle::Auditory),
            "readingWriting" => Some(LearningStyle::ReadingWriting),
            "kinesthetic" => Some(LearningStyle::Kinesthetic),
            _ => None,
        }
    }

    /// Match free text like "hands-on" or "I like diagrams" to a style
    pub fn from_text(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        let mentions = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
        if mentions(&["visual", "diagram", "video", "picture", "watch"]) {
            Some(LearningStyle::Visual)
        } else if mentions(&["auditory", "listen", "podcast", "audio", "lecture"]) {
            Some(LearningStyle::Auditory)
        } else if mentions(&["reading", "writing", "notes", "book", "read"]) {
            Some(LearningStyle::ReadingWriting)
        } else if mentions(&["hands-on", "hands on", "kinesthetic", "doing", "practice", "build"]) {
            Some(LearningStyle::Kinesthetic)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LearningPace {
    Relaxed,
    Steady,
    Intensive,
}

impl LearningPace {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningPace::Relaxed => "relaxed",
            LearningPace::Steady => "steady",
            LearningPace::Intensive => "intensive",
        }
    }
}

// ============ Assessment Data ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    pub role: Option<String>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub location: Option<String>,
}

impl BasicInfo {
    pub fn is_complete(&self) -> bool {
        self.role.is_some()
            && self.experience.is_some()
            && self.education.is_some()
            && self.location.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveScores {
    pub analytical: Option<f64>,
    pub logical: Option<f64>,
    pub verbal: Option<f64>,
    pub spatial: Option<f64>,
}

impl CognitiveScores {
    pub fn get(&self, area: CognitiveArea) -> Option<f64> {
        match area {
            CognitiveArea::Analytical => self.analytical,
            CognitiveArea::Logical => self.logical,
            CognitiveArea::Verbal => self.verbal,
            CognitiveArea::Spatial => self.spatial,
        }
    }

    pub fn set(&mut self, area: CognitiveArea, score: f64) {
        let slot = match area {
            CognitiveArea::Analytical => &mut self.analytical,
            CognitiveArea::Logical => &mut self.logical,
            CognitiveArea::Verbal => &mut self.verbal,
            CognitiveArea::Spatial => &mut self.spatial,
        };
        *slot = Some(score.clamp(0.0, 100.0));
    }

    pub fn is_complete(&self) -> bool {
        CognitiveArea::ALL.iter().all(|a| self.get(*a).is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityScores {
    pub openness: Option<f64>,
    pub conscientiousness: Option<f64>,
    pub extraversion: Option<f64>,
    pub agreeableness: Option<f64>,
    pub neuroticism: Option<f64>,
}

impl PersonalityScores {
    pub fn get(&self, t: Trait) -> Option<f64> {
        match t {
            Trait::Openness => self.openness,
            Trait::Conscientiousness => self.conscientiousness,
            Trait::Extraversion => self.extraversion,
            Trait::Agreeableness => self.agreeableness,
            Trait::Neuroticism => self.neuroticism,
        }
    }

    pub fn set(&mut self, t: Trait, score: f64) {
        let slot = match t {
            Trait::Openness => &mut self.openness,
            Trait::Conscientiousness => &mut self.conscientiousness,
            Trait::Extraversion => &mut self.extraversion,
            Trait::Agreeableness => &mut self.agreeableness,
            Trait::Neuroticism => &mut self.neuroticism,
        };
        *slot = Some(score.clamp(0.0, 100.0));
    }

    pub fn is_complete(&self) -> bool {
        Trait::ALL.iter().all(|t| self.get(*t).is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPreferences {
    pub style: Option<LearningStyle>,
    pub pace: Option<LearningPace>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goals {
    pub career_goals: Option<String>,
    pub timeline_months: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentData {
    #[serde(default)]
    pub basic_info: BasicInfo,
    #[serde(default)]
    pub technical_interests: Vec<String>,
    #[serde(default)]
    pub cognitive_scores: CognitiveScores,
    #[serde(default)]
    pub personality_scores: PersonalityScores,
    #[serde(default)]
    pub learning_preferences: LearningPreferences,
    #[serde(default)]
    pub goals: Goals,
}

impl AssessmentData {
    pub fn has_career_goals(&self) -> bool {
        self.goals
            .career_goals
            .as_deref()
            .map(|g| !g.trim().is_empty())
            .unwrap_or(false)
    }

    /// Every section the conversation collects is filled in
    pub fn is_complete(&self) -> bool {
        self.basic_info.is_complete()
            && !self.technical_interests.is_empty()
            && self.cognitive_scores.is_complete()
            && self.personality_scores.is_complete()
            && self.learning_preferences.style.is_some()
    }
}

// ============ Analysis ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveSummary {
    pub average: f64,
    pub strongest: Option<CognitiveArea>,
    pub weakest: Option<CognitiveArea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitReading {
    #[serde(rename = "trait")]
    pub trait_: Trait,
    pub score: f64,
    pub band: TraitBand,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalitySummary {
    pub dominant: Option<Trait>,
    pub traits: Vec<TraitReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerMatch {
    pub career_id: String,
    pub title: String,
    pub fit_score: u8,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentAnalysis {
    pub cognitive: CognitiveSummary,
    pub personality: PersonalitySummary,
    pub learning_style: Option<LearningStyle>,
    pub career_matches: Vec<CareerMatch>,
}

const MAX_CAREER_MATCHES: usize = 3;

pub fn analyze(data: &AssessmentData) -> AssessmentAnalysis {
    AssessmentAnalysis {
        cognitive: summarize_cognitive(&data.cognitive_scores),
        personality: summarize_personality(&data.personality_scores),
        learning_style: data.learning_preferences.style,
        career_matches: match_careers(data),
    }
}

fn summarize_cognitive(scores: &CognitiveScores) -> CognitiveSummary {
    let present: Vec<(CognitiveArea, f64)> = CognitiveArea::ALL
        .iter()
        .filter_map(|a| scores.get(*a).map(|s| (*a, s)))
        .collect();

    if present.is_empty() {
        return CognitiveSummary { average: 0.0, strongest: None, weakest: None };
    }

    let average = present.iter().map(|(_, s)| s).sum::<f64>() / present.len() as f64;
    // Ties resolve to the earlier area in ALL order
    let strongest = present
        .iter()
        .fold(None::<(CognitiveArea, f64)>, |best, (a, s)| match best {
            Some((_, b)) if b >= *s => best,
            _ => Some((*a, *s)),
        })
        .map(|(a, _)| a);
    let weakest = present
        .iter()
        .fold(None::<(CognitiveArea, f64)>, |worst, (a, s)| match worst {
            Some((_, w)) if w <= *s => worst,
            _ => Some((*a, *s)),
        })
        .map(|(a, _)| a);

    CognitiveSummary { average, strongest, weakest }
}

fn summarize_personality(scores: &PersonalityScores) -> PersonalitySummary {
    let traits: Vec<TraitReading> = Trait::ALL
        .iter()
        .filter_map(|t| {
            scores.get(*t).map(|score| {
                let band = TraitBand::from_score(score);
                TraitReading {
                    trait_: *t,
                    score,
                    band,
                    description: t.describe(band).to_string(),
                }
            })
        })
        .collect();

    // Neuroticism is not a "dominant" trait in the portal's sense
    let dominant = traits
        .iter()
        .filter(|r| r.trait_ != Trait::Neuroticism)
        .fold(None::<&TraitReading>, |best, r| match best {
            Some(b) if b.score >= r.score => best,
            _ => Some(r),
        })
        .map(|r| r.trait_);

    PersonalitySummary { dominant, traits }
}

/// Score every catalog career against the assessment and keep the best few
pub fn match_careers(data: &AssessmentData) -> Vec<CareerMatch> {
    let mut matches: Vec<CareerMatch> =
        CAREER_PATHS.iter().map(|c| score_career(c, data)).collect();
    matches.sort_by(|a, b| {
        b.fit_score
            .cmp(&a.fit_score)
            .then_with(|| a.career_id.cmp(&b.career_id))
    });
    matches.truncate(MAX_CAREER_MATCHES);
    matches
}

/// Fit score: interests 40%, cognitive strengths 35%, personality 25%.
/// Missing scores count as a neutral 50.
pub fn score_career(career: &CareerPath, data: &AssessmentData) -> CareerMatch {
    let mut reasons = Vec::new();

    let interests: Vec<String> =
        data.technical_interests.iter().map(|i| i.to_lowercase()).collect();
    let matched_keywords: Vec<&str> = career
        .keywords
        .iter()
        .copied()
        .filter(|k| interests.iter().any(|i| i.contains(k)))
        .collect();
    let interest_ratio = (matched_keywords.len().min(3) as f64) / 3.0;
    if !matched_keywords.is_empty() {
        reasons.push(format!("Interest in {}", matched_keywords.join(", ")));
    }

    let cognitive_avg = average_or_neutral(
        career.cognitive.iter().map(|a| data.cognitive_scores.get(*a)),
    );
    if cognitive_avg >= 70.0 {
        let areas: Vec<&str> = career.cognitive.iter().map(|a| a.as_str()).collect();
        reasons.push(format!("Strong {} skills", areas.join(" and ")));
    }

    let trait_avg = average_or_neutral(
        career.traits.iter().map(|t| data.personality_scores.get(*t)),
    );
    if trait_avg >= 65.0 {
        let traits: Vec<&str> = career.traits.iter().map(|t| t.as_str()).collect();
        reasons.push(format!("Personality fit ({})", traits.join(", ")));
    }

    let raw = interest_ratio * 40.0 + cognitive_avg * 0.35 + trait_avg * 0.25;

    CareerMatch {
        career_id: career.id.to_string(),
        title: career.title.to_string(),
        fit_score: raw.round().clamp(0.0, 100.0) as u8,
        reasons,
    }
}

fn average_or_neutral(scores: impl Iterator<Item = Option<f64>>) -> f64 {
    let values: Vec<f64> = scores.map(|s| s.unwrap_or(50.0)).collect();
    if values.is_empty() {
        50.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_data() -> AssessmentData {
        let mut data = AssessmentData::default();
        data.basic_info = BasicInfo {
            role: Some("Student".into()),
            experience: Some("Beginner".into()),
            education: Some("O-Level".into()),
            location: Some("Harare".into()),
        };
        data.technical_interests = vec!["machine learning".into(), "data analysis".into()];
        for area in CognitiveArea::ALL {
            data.cognitive_scores.set(area, 80.0);
        }
        for t in Trait::ALL {
            data.personality_scores.set(t, 60.0);
        }
        data.learning_preferences.style = Some(LearningStyle::Visual);
        data
    }

    #[test]
    fn test_completeness_tracks_every_section() {
        let mut data = complete_data();
        assert!(data.is_complete());

        data.cognitive_scores.spatial = None;
        assert!(!data.is_complete());
    }

    #[test]
    fn test_scores_are_clamped_on_set() {
        let mut scores = PersonalityScores::default();
        scores.set(Trait::Openness, 140.0);
        scores.set(Trait::Neuroticism, -5.0);
        assert_eq!(scores.openness, Some(100.0));
        assert_eq!(scores.neuroticism, Some(0.0));
    }

    #[test]
    fn test_learning_style_from_text() {
        assert_eq!(LearningStyle::from_text("Hands-on projects"), Some(LearningStyle::Kinesthetic));
        assert_eq!(LearningStyle::from_text("I like diagrams"), Some(LearningStyle::Visual));
        assert_eq!(LearningStyle::from_text("no idea"), None);
    }

    #[test]
    fn test_cognitive_summary_picks_extremes() {
        let mut scores = CognitiveScores::default();
        scores.set(CognitiveArea::Analytical, 90.0);
        scores.set(CognitiveArea::Verbal, 40.0);

        let summary = summarize_cognitive(&scores);
        assert_eq!(summary.average, 65.0);
        assert_eq!(summary.strongest, Some(CognitiveArea::Analytical));
        assert_eq!(summary.weakest, Some(CognitiveArea::Verbal));
    }

    #[test]
    fn test_empty_assessment_degrades_to_neutral() {
        let analysis = analyze(&AssessmentData::default());
        assert_eq!(analysis.cognitive.average, 0.0);
        assert!(analysis.personality.traits.is_empty());
        assert_eq!(analysis.personality.dominant, None);
        assert_eq!(analysis.career_matches.len(), MAX_CAREER_MATCHES);
    }

    #[test]
    fn test_interests_drive_career_ranking() {
        let analysis = analyze(&complete_data());
        let top = &analysis.career_matches[0];
        assert_eq!(top.career_id, "data-scientist");
        assert!(top.fit_score <= 100);
        assert!(top.reasons.iter().any(|r| r.starts_with("Interest in")));
    }
}
