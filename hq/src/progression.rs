//! Progression calculator
//!
//! Pure functions mapping cumulative XP to a level, the XP threshold of the
//! next level, and badge tiers. A badge is earned at every fifth level and is
//! derived on read, never stored.

use serde::Serialize;

/// XP scale factor in `level = floor(sqrt(xp / 100)) + 1`
pub const XP_SCALE: u64 = 100;

/// A badge is awarded every this many levels
pub const BADGE_INTERVAL: u32 = 5;

/// Level reached with the given cumulative XP. Level 1 at 0 XP.
pub fn level(xp: u64) -> u32 {
    let root = (xp / XP_SCALE).isqrt();
    u32::try_from(root).unwrap_or(u32::MAX).saturating_add(1)
}

/// XP needed to leave `level`, i.e. `100 * level^2`
pub fn xp_for_next_level(level: u32) -> u64 {
    let level = u64::from(level);
    XP_SCALE.saturating_mul(level.saturating_mul(level))
}

/// Fraction of the way to the next level threshold, clamped to `[0, 1]`
pub fn progress_fraction(xp: u64) -> f64 {
    let threshold = xp_for_next_level(level(xp));
    if threshold == 0 {
        return 1.0;
    }
    (xp as f64 / threshold as f64).clamp(0.0, 1.0)
}

/// Number of badges earned at `level`
pub fn badge_tier(level: u32) -> u32 {
    level / BADGE_INTERVAL
}

/// Levels at which badges were earned, ascending
pub fn earned_badges(level: u32) -> Vec<u32> {
    (1..=badge_tier(level)).map(|tier| tier * BADGE_INTERVAL).collect()
}

/// Smallest badge level strictly greater than `level`
pub fn next_badge_level(level: u32) -> u32 {
    (badge_tier(level) + 1).saturating_mul(BADGE_INTERVAL)
}

/// Levels still to gain before the next badge
pub fn levels_to_next_badge(level: u32) -> u32 {
    next_badge_level(level) - level
}

/// Progress from the previous badge towards the next one, in `[0, 1)`
pub fn badge_progress(level: u32) -> f64 {
    f64::from(BADGE_INTERVAL - levels_to_next_badge(level)) / f64::from(BADGE_INTERVAL)
}

/// Level before and after an XP change, in that order
pub fn level_crossed(before_xp: u64, after_xp: u64) -> (u32, u32) {
    (level(before_xp), level(after_xp))
}

/// Everything a profile view shows about progression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressionSnapshot {
    pub xp: u64,
    pub level: u32,
    pub next_level_xp: u64,
    pub progress: f64,
    pub badges: Vec<u32>,
    pub next_badge_level: u32,
    pub badge_progress: f64,
}

impl ProgressionSnapshot {
    pub fn from_xp(xp: u64) -> Self {
        let level = level(xp);
        Self {
            xp,
            level,
            next_level_xp: xp_for_next_level(level),
            progress: progress_fraction(xp),
            badges: earned_badges(level),
            next_badge_level: next_badge_level(level),
            badge_progress: badge_progress(level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(level(0), 1);
        assert_eq!(level(99), 1);
        assert_eq!(level(100), 2);
        assert_eq!(level(399), 2);
        assert_eq!(level(400), 3);
        assert_eq!(level(900), 4);
    }

    #[test]
    fn test_xp_for_next_level() {
        assert_eq!(xp_for_next_level(1), 100);
        assert_eq!(xp_for_next_level(2), 400);
        assert_eq!(xp_for_next_level(10), 10_000);
    }

    #[test]
    fn test_level_handles_huge_xp() {
        assert!(level(u64::MAX) > 1);
        let fraction = progress_fraction(u64::MAX);
        assert!((0.0..=1.0).contains(&fraction));
    }

    #[test]
    fn test_progress_fraction() {
        assert_eq!(progress_fraction(0), 0.0);
        assert_eq!(progress_fraction(50), 0.5);
        // Level 2 spans up to 400 XP
        assert_eq!(progress_fraction(200), 0.5);
    }

    #[test]
    fn test_badges_for_level_12() {
        assert_eq!(earned_badges(12), vec![5, 10]);
        assert_eq!(next_badge_level(12), 15);
        assert_eq!(badge_tier(12), 2);
    }

    #[test]
    fn test_badges_at_exact_multiple() {
        assert_eq!(earned_badges(5), vec![5]);
        assert_eq!(next_badge_level(5), 10);
        assert_eq!(levels_to_next_badge(5), 5);
        assert_eq!(badge_progress(5), 0.0);
    }

    #[test]
    fn test_no_badges_below_five() {
        assert!(earned_badges(4).is_empty());
        assert_eq!(next_badge_level(1), 5);
        assert_eq!(levels_to_next_badge(1), 4);
    }

    #[test]
    fn test_badge_progress_level_7() {
        // Level 7 is 40% of the way from 5 to 10
        assert!((badge_progress(7) - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_level_crossed() {
        assert_eq!(level_crossed(90, 105), (1, 2));
        assert_eq!(level_crossed(100, 150), (2, 2));
    }

    #[test]
    fn test_snapshot() {
        let snapshot = ProgressionSnapshot::from_xp(450);
        assert_eq!(snapshot.level, 3);
        assert_eq!(snapshot.next_level_xp, 900);
        assert!(snapshot.badges.is_empty());
        assert_eq!(snapshot.next_badge_level, 5);
    }

    proptest! {
        #[test]
        fn prop_level_at_least_one(xp in any::<u64>()) {
            prop_assert!(level(xp) >= 1);
        }

        #[test]
        fn prop_level_non_decreasing(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level(lo) <= level(hi));
        }

        #[test]
        fn prop_threshold_is_last_xp_of_level(l in 1u32..10_000) {
            prop_assert_eq!(xp_for_next_level(l), 100 * u64::from(l) * u64::from(l));
            prop_assert_eq!(level(xp_for_next_level(l) - 1), l);
            prop_assert_eq!(level(xp_for_next_level(l)), l + 1);
        }

        #[test]
        fn prop_next_badge_is_strictly_greater(l in 1u32..100_000) {
            let next = next_badge_level(l);
            prop_assert!(next > l);
            prop_assert_eq!(next % BADGE_INTERVAL, 0);
            prop_assert!(next - l <= BADGE_INTERVAL);
        }
    }
}
