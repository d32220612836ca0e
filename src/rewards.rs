// Applies XP awards and achievement checks to a stored profile and writes
// the result back with one ledger row per award.

use serde::Serialize;

use crate::assessment::AssessmentData;
use crate::db::{Database, GamificationChange};
use crate::gamification::{
    award_xp, check_achievements, progress_to_next_level, GamificationProfile, LevelProgress,
    UnlockedAchievement, XpAward, XpCategory,
};
use crate::logging;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardOutcome {
    pub xp_awarded: u64,
    pub level: u32,
    pub total_xp: u64,
    pub leveled_up: bool,
    pub progress: LevelProgress,
    pub new_achievements: Vec<UnlockedAchievement>,
}

/// Apply `awards` in order, then unlock achievements. Without `data` only
/// the profile-based ones (level, streak) can unlock. The whole update runs
/// in one store transaction, so concurrent grants for a user serialize.
pub fn grant(
    db: &Database,
    user_id: &str,
    awards: Vec<XpAward>,
    data: Option<&AssessmentData>,
) -> rusqlite::Result<RewardOutcome> {
    let empty = AssessmentData::default();
    let data = data.unwrap_or(&empty);

    let (result, recorded) = db.update_gamification(user_id, |before| {
        let awarded = awards.iter().fold(before.clone(), |p, award| award_xp(&p, award));
        let check = check_achievements(&awarded, data);

        let mut ledger = awards;
        for unlocked in &check.new_achievements {
            ledger.push(XpAward::new(
                unlocked.xp_reward as i64,
                &format!("achievement:{}", unlocked.id),
                XpCategory::Achievement,
            ));
        }

        // Nothing happened; don't touch the streak or the ledger
        if ledger.is_empty() {
            return (None, (outcome(&before, &before, check.new_achievements), 0));
        }

        let result = outcome(&before, &check.profile, check.new_achievements);
        let recorded = ledger.len();
        (Some(GamificationChange { profile: check.profile, awards: ledger }), (result, recorded))
    })?;

    if recorded > 0 {
        logging::log_gamification(Some(user_id), &format!(
            "+{} XP ({} awards) -> total {} level {}{}",
            result.xp_awarded,
            recorded,
            result.total_xp,
            result.level,
            if result.leveled_up { " (level up)" } else { "" }
        ));
    }
    for a in &result.new_achievements {
        logging::log_gamification(
            Some(user_id),
            &format!("Achievement unlocked: {} (+{} XP)", a.id, a.xp_reward),
        );
    }

    Ok(result)
}

fn outcome(
    before: &GamificationProfile,
    after: &GamificationProfile,
    new_achievements: Vec<UnlockedAchievement>,
) -> RewardOutcome {
    RewardOutcome {
        xp_awarded: after.total_xp - before.total_xp,
        level: after.level,
        total_xp: after.total_xp,
        leveled_up: after.level > before.level,
        progress: progress_to_next_level(after.total_xp),
        new_achievements,
    }
}
