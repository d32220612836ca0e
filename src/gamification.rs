//! XP, levels, streaks and achievements.
//!
//! Everything here is a pure function over [`GamificationProfile`]: callers
//! get a new profile back and are responsible for persisting it. Bad input
//! never errors: negative XP counts as zero, unknown achievement ids are
//! ignored, missing assessment fields read as "not done".

use crate::assessment::AssessmentData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative XP required for each level; the level is the index of the
/// highest threshold reached.
pub const LEVEL_THRESHOLDS: [u64; 16] = [
    0, 100, 250, 450, 700, 1000, 1350, 1750, 2200, 2700, 3250, 3850, 4500, 5200, 5950, 6750,
];

pub const MAX_LEVEL: u32 = (LEVEL_THRESHOLDS.len() - 1) as u32;

// ============ Profile ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementState {
    pub id: String,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationProfile {
    pub level: u32,
    pub total_xp: u64,
    pub achievements: Vec<AchievementState>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Default for GamificationProfile {
    fn default() -> Self {
        Self {
            level: calculate_level(0),
            total_xp: 0,
            achievements: Vec::new(),
            current_streak: 0,
            longest_streak: 0,
            last_activity: None,
        }
    }
}

impl GamificationProfile {
    pub fn is_unlocked(&self, achievement_id: &str) -> bool {
        self.achievements
            .iter()
            .any(|a| a.id == achievement_id && a.unlocked)
    }

    pub fn unlocked_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.unlocked).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpCategory {
    Assessment,
    Conversation,
    Course,
    Achievement,
}

impl XpCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            XpCategory::Assessment => "assessment",
            XpCategory::Conversation => "conversation",
            XpCategory::Course => "course",
            XpCategory::Achievement => "achievement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpAward {
    pub amount: i64,
    pub reason: String,
    pub category: XpCategory,
}

impl XpAward {
    pub fn new(amount: i64, reason: &str, category: XpCategory) -> Self {
        Self {
            amount,
            reason: reason.to_string(),
            category,
        }
    }

    /// The amount that actually reaches the profile
    pub fn effective_amount(&self) -> u64 {
        self.amount.max(0) as u64
    }
}

// ============ Levels ============

/// Highest level whose threshold is <= total_xp; saturates at MAX_LEVEL
pub fn calculate_level(total_xp: u64) -> u32 {
    LEVEL_THRESHOLDS
        .iter()
        .rposition(|threshold| total_xp >= *threshold)
        .unwrap_or(0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub current: u64,    // XP earned inside the current band
    pub needed: u64,     // width of the band (0 at max level)
    pub percentage: f64, // 0-100
}

pub fn progress_to_next_level(total_xp: u64) -> LevelProgress {
    let level = calculate_level(total_xp) as usize;
    let floor = LEVEL_THRESHOLDS[level];
    let current = total_xp - floor;

    match LEVEL_THRESHOLDS.get(level + 1) {
        Some(next) => {
            let needed = next - floor;
            LevelProgress {
                current,
                needed,
                percentage: (current as f64 / needed as f64) * 100.0,
            }
        }
        None => LevelProgress {
            current,
            needed: 0,
            percentage: 100.0,
        },
    }
}

// ============ Awarding XP ============

pub fn award_xp(profile: &GamificationProfile, award: &XpAward) -> GamificationProfile {
    award_xp_at(profile, award, Utc::now())
}

/// Apply an award as of `now`. The level is always recomputed from the
/// final total, never incremented.
pub fn award_xp_at(
    profile: &GamificationProfile,
    award: &XpAward,
    now: DateTime<Utc>,
) -> GamificationProfile {
    let mut next = profile.clone();
    next.total_xp = profile.total_xp.saturating_add(award.effective_amount());
    next.level = calculate_level(next.total_xp);
    update_streak(&mut next, now);
    next.last_activity = Some(now);
    next
}

/// Daily streak: same UTC day keeps it, the following day extends it,
/// anything else restarts at 1.
fn update_streak(profile: &mut GamificationProfile, now: DateTime<Utc>) {
    let today = now.date_naive();
    profile.current_streak = match profile.last_activity.map(|t| t.date_naive()) {
        Some(last) if last == today => profile.current_streak.max(1),
        Some(last) if last.succ_opt() == Some(today) => profile.current_streak + 1,
        _ => 1,
    };
    profile.longest_streak = profile.longest_streak.max(profile.current_streak);
}

// ============ Achievements ============

pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub xp_reward: u32,
    pub unlocks: fn(&AssessmentData, &GamificationProfile) -> bool,
}

/// Evaluated in this order; later predicates see XP granted by earlier ones
pub static ACHIEVEMENTS: [Achievement; 10] = [
    Achievement {
        id: "first-steps",
        title: "First Steps",
        description: "Told Nova what you do",
        xp_reward: 25,
        unlocks: has_role,
    },
    Achievement {
        id: "open-book",
        title: "Open Book",
        description: "Completed your basic profile",
        xp_reward: 50,
        unlocks: basic_info_complete,
    },
    Achievement {
        id: "tech-explorer",
        title: "Tech Explorer",
        description: "Shared three or more technical interests",
        xp_reward: 50,
        unlocks: three_interests,
    },
    Achievement {
        id: "sharp-mind",
        title: "Sharp Mind",
        description: "Finished the cognitive assessment",
        xp_reward: 75,
        unlocks: cognitive_complete,
    },
    Achievement {
        id: "self-aware",
        title: "Self Aware",
        description: "Finished the personality assessment",
        xp_reward: 75,
        unlocks: personality_complete,
    },
    Achievement {
        id: "style-finder",
        title: "Style Finder",
        description: "Discovered your learning style",
        xp_reward: 50,
        unlocks: style_known,
    },
    Achievement {
        id: "goal-setter",
        title: "Goal Setter",
        description: "Wrote down your career goals",
        xp_reward: 25,
        unlocks: goals_written,
    },
    Achievement {
        id: "assessment-complete",
        title: "Know Thyself",
        description: "Completed the full assessment",
        xp_reward: 150,
        unlocks: assessment_complete,
    },
    Achievement {
        id: "rising-star",
        title: "Rising Star",
        description: "Reached level 5",
        xp_reward: 100,
        unlocks: reached_level_five,
    },
    Achievement {
        id: "week-streak",
        title: "On a Roll",
        description: "Kept a seven day streak",
        xp_reward: 100,
        unlocks: seven_day_streak,
    },
];

fn has_role(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.basic_info.role.is_some()
}

fn basic_info_complete(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.basic_info.is_complete()
}

fn three_interests(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.technical_interests.len() >= 3
}

fn cognitive_complete(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.cognitive_scores.is_complete()
}

fn personality_complete(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.personality_scores.is_complete()
}

fn style_known(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.learning_preferences.style.is_some()
}

fn goals_written(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.has_career_goals()
}

fn assessment_complete(data: &AssessmentData, _: &GamificationProfile) -> bool {
    data.is_complete()
}

fn reached_level_five(_: &AssessmentData, profile: &GamificationProfile) -> bool {
    profile.level >= 5
}

fn seven_day_streak(_: &AssessmentData, profile: &GamificationProfile) -> bool {
    profile.longest_streak >= 7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub xp_reward: u32,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AchievementCheck {
    pub profile: GamificationProfile,
    pub new_achievements: Vec<UnlockedAchievement>,
}

pub fn check_achievements(
    profile: &GamificationProfile,
    data: &AssessmentData,
) -> AchievementCheck {
    check_achievements_at(profile, data, Utc::now())
}

pub fn check_achievements_at(
    profile: &GamificationProfile,
    data: &AssessmentData,
    now: DateTime<Utc>,
) -> AchievementCheck {
    let mut current = profile.clone();
    let mut new_achievements = Vec::new();

    for achievement in ACHIEVEMENTS.iter() {
        if current.is_unlocked(achievement.id) || !(achievement.unlocks)(data, &current) {
            continue;
        }

        match current.achievements.iter_mut().find(|a| a.id == achievement.id) {
            Some(state) => {
                state.unlocked = true;
                state.unlocked_at = Some(now);
            }
            None => current.achievements.push(AchievementState {
                id: achievement.id.to_string(),
                unlocked: true,
                unlocked_at: Some(now),
            }),
        }

        let award = XpAward::new(
            achievement.xp_reward as i64,
            &format!("Achievement unlocked: {}", achievement.title),
            XpCategory::Achievement,
        );
        current = award_xp_at(&current, &award, now);

        new_achievements.push(UnlockedAchievement {
            id: achievement.id.to_string(),
            title: achievement.title.to_string(),
            description: achievement.description.to_string(),
            xp_reward: achievement.xp_reward,
            unlocked_at: now,
        });
    }

    AchievementCheck {
        profile: current,
        new_achievements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::{CognitiveArea, LearningStyle, Trait};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_level_at_each_threshold() {
        for (i, threshold) in LEVEL_THRESHOLDS.iter().enumerate() {
            assert_eq!(calculate_level(*threshold), i as u32);
            if *threshold > 0 {
                assert_eq!(calculate_level(threshold - 1), i as u32 - 1);
            }
        }
    }

    #[test]
    fn test_level_is_monotonic_and_saturates() {
        let mut previous = 0;
        for xp in (0..8000).step_by(7) {
            let level = calculate_level(xp);
            assert!(level >= previous);
            previous = level;
        }
        assert_eq!(calculate_level(1_000_000), MAX_LEVEL);
    }

    #[test]
    fn test_sequential_awards_match_single_award() {
        let fresh = GamificationProfile::default();
        let now = at(1, 9);

        let stepwise = award_xp_at(
            &award_xp_at(&fresh, &XpAward::new(100, "a", XpCategory::Course), now),
            &XpAward::new(200, "b", XpCategory::Course),
            now,
        );
        let single = award_xp_at(&fresh, &XpAward::new(300, "ab", XpCategory::Course), now);

        assert_eq!(stepwise.total_xp, 300);
        assert_eq!(stepwise.level, 2);
        assert_eq!(stepwise.total_xp, single.total_xp);
        assert_eq!(stepwise.level, single.level);
    }

    #[test]
    fn test_negative_award_is_ignored() {
        let profile = award_xp_at(
            &GamificationProfile::default(),
            &XpAward::new(-40, "oops", XpCategory::Conversation),
            at(1, 9),
        );
        assert_eq!(profile.total_xp, 0);
        assert_eq!(profile.last_activity, Some(at(1, 9)));
    }

    #[test]
    fn test_progress_interpolates_within_band() {
        let progress = progress_to_next_level(300);
        assert_eq!(progress.current, 50);
        assert_eq!(progress.needed, 200);
        assert_eq!(progress.percentage, 25.0);

        let maxed = progress_to_next_level(9000);
        assert_eq!(maxed.needed, 0);
        assert_eq!(maxed.percentage, 100.0);
    }

    #[test]
    fn test_streak_counts_consecutive_days() {
        let award = XpAward::new(5, "chat", XpCategory::Conversation);
        let mut profile = GamificationProfile::default();

        profile = award_xp_at(&profile, &award, at(1, 9));
        profile = award_xp_at(&profile, &award, at(1, 18));
        assert_eq!(profile.current_streak, 1);

        profile = award_xp_at(&profile, &award, at(2, 8));
        profile = award_xp_at(&profile, &award, at(3, 8));
        assert_eq!(profile.current_streak, 3);

        profile = award_xp_at(&profile, &award, at(6, 8));
        assert_eq!(profile.current_streak, 1);
        assert_eq!(profile.longest_streak, 3);
    }

    #[test]
    fn test_achievements_unlock_once() {
        let mut data = AssessmentData::default();
        data.basic_info.role = Some("Student".into());
        let now = at(4, 10);

        let first = check_achievements_at(&GamificationProfile::default(), &data, now);
        assert_eq!(first.new_achievements.len(), 1);
        assert_eq!(first.new_achievements[0].id, "first-steps");
        assert_eq!(first.profile.total_xp, 25);

        let second = check_achievements_at(&first.profile, &data, now);
        assert!(second.new_achievements.is_empty());
        assert_eq!(second.profile, first.profile);
    }

    #[test]
    fn test_unknown_achievement_ids_are_ignored() {
        let mut profile = GamificationProfile::default();
        profile.achievements.push(AchievementState {
            id: "retired-badge".into(),
            unlocked: true,
            unlocked_at: None,
        });

        let check = check_achievements_at(&profile, &AssessmentData::default(), at(4, 10));
        assert!(check.new_achievements.is_empty());
        assert_eq!(check.profile.unlocked_count(), 1);
    }

    #[test]
    fn test_catalog_order_feeds_level_achievement() {
        let mut data = AssessmentData::default();
        data.basic_info.role = Some("Student".into());
        data.basic_info.experience = Some("None".into());
        data.basic_info.education = Some("O-Level".into());
        data.basic_info.location = Some("Lusaka".into());
        data.technical_interests = vec!["a".into(), "b".into(), "c".into()];
        for area in CognitiveArea::ALL {
            data.cognitive_scores.set(area, 70.0);
        }
        for t in Trait::ALL {
            data.personality_scores.set(t, 50.0);
        }
        data.learning_preferences.style = Some(LearningStyle::Visual);
        data.goals.career_goals = Some("Become a data scientist".into());

        let mut profile = GamificationProfile::default();
        let seed = XpAward::new(300, "seed", XpCategory::Assessment);
        profile = award_xp_at(&profile, &seed, at(5, 9));

        let check = check_achievements_at(&profile, &data, at(5, 10));
        let ids: Vec<&str> = check.new_achievements.iter().map(|a| a.id.as_str()).collect();

        // 300 + 25 + 50 + 50 + 75 + 75 + 50 + 25 + 150 = 800 -> level 4, so no rising-star yet
        assert_eq!(
            ids,
            vec![
                "first-steps",
                "open-book",
                "tech-explorer",
                "sharp-mind",
                "self-aware",
                "style-finder",
                "goal-setter",
                "assessment-complete"
            ]
        );
        assert_eq!(check.profile.total_xp, 800);
        assert_eq!(check.profile.level, 4);
    }
}
