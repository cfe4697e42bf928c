//! Keep/purge decisions for individual backups
//!
//! A backup survives when at least one rule holds:
//!
//! | Rule    | Window                         | Anchor                 |
//! |---------|--------------------------------|------------------------|
//! | today   | date is today                  | -                      |
//! | daily   | newer than `count` days ago    | -                      |
//! | weekly  | newer than `count` weeks ago   | day of week (0 = Sun)  |
//! | monthly | newer than `count` months ago  | day of month           |
//! | yearly  | newer than `count` years ago   | day of year (1 = 1 Jan)|
//!
//! Windows are strict: a backup exactly `count` units old is outside.
//! Tiers with a zero count never keep anything; negative counts never expire.

use std::fmt;

use chrono::{Datelike, Days, Months, NaiveDate};

use super::identity::BackupIdentity;
use super::policy::{RetentionPolicy, Tier, TierKind};

/// Why a backup is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    /// It is today's backup
    Today,
    /// The given tier covers it
    Tier(TierKind),
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::Tier(kind) => write!(f, "{}", kind),
        }
    }
}

/// Outcome of evaluating one backup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep(KeepReason),
    Purge,
}

impl Decision {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep(_))
    }
}

/// Evaluates backups against a policy as of a fixed `today`
#[derive(Debug, Clone, Copy)]
pub struct RetentionEvaluator<'a> {
    policy: &'a RetentionPolicy,
    today: NaiveDate,
}

impl<'a> RetentionEvaluator<'a> {
    pub fn new(policy: &'a RetentionPolicy, today: NaiveDate) -> Self {
        Self { policy, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Decide whether `identity` is kept, and by which rule
    ///
    /// Rules are independent; the reason reported is the first that holds,
    /// finest tier first.
    pub fn evaluate(&self, identity: &BackupIdentity) -> Decision {
        let date = identity.date();
        if date == self.today {
            return Decision::Keep(KeepReason::Today);
        }

        TierKind::ALL
            .into_iter()
            .find(|&kind| {
                let window = self.policy.window(kind);
                window.is_active()
                    && within_window(kind, window, date, self.today)
                    && on_anchor(kind, self.policy.anchor(kind), date)
            })
            .map_or(Decision::Purge, |kind| Decision::Keep(KeepReason::Tier(kind)))
    }

    pub fn keeps(&self, identity: &BackupIdentity) -> bool {
        self.evaluate(identity).is_keep()
    }
}

/// Whether `date` is strictly newer than `window` units of `kind` before `today`
pub fn within_window(kind: TierKind, window: Tier, date: NaiveDate, today: NaiveDate) -> bool {
    if window.is_unbounded() {
        return true;
    }

    let count = window.count.unsigned_abs();
    let cutoff = match kind {
        TierKind::Daily => today.checked_sub_days(Days::new(u64::from(count))),
        TierKind::Weekly => today.checked_sub_days(Days::new(u64::from(count) * 7)),
        TierKind::Monthly => today.checked_sub_months(Months::new(count)),
        TierKind::Yearly => count
            .checked_mul(12)
            .and_then(|months| today.checked_sub_months(Months::new(months))),
    };

    // A cutoff before the start of the calendar excludes nothing
    cutoff.map_or(true, |cutoff| date > cutoff)
}

fn on_anchor(kind: TierKind, anchor: Option<u32>, date: NaiveDate) -> bool {
    let Some(anchor) = anchor else {
        return true;
    };
    match kind {
        TierKind::Daily => true,
        TierKind::Weekly => date.weekday().num_days_from_sunday() == anchor % 7,
        TierKind::Monthly => date.day() == anchor,
        TierKind::Yearly => date.ordinal() == anchor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::policy::AnchoredTier;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn backup(y: i32, m: u32, d: u32) -> BackupIdentity {
        BackupIdentity::new(date(y, m, d), None)
    }

    fn policy(daily: i32, weekly: (i32, u32), monthly: (i32, u32), yearly: (i32, u32)) -> RetentionPolicy {
        RetentionPolicy::new(
            Tier::new(daily),
            AnchoredTier::new(weekly.0, weekly.1),
            AnchoredTier::new(monthly.0, monthly.1),
            AnchoredTier::new(yearly.0, yearly.1),
        )
        .unwrap()
    }

    #[test]
    fn test_daily_window() {
        let policy = RetentionPolicy::today_only().with_daily(7);
        let evaluator = RetentionEvaluator::new(&policy, date(2024, 3, 15));

        assert_eq!(
            evaluator.evaluate(&backup(2024, 3, 10)),
            Decision::Keep(KeepReason::Tier(TierKind::Daily))
        );
        assert_eq!(evaluator.evaluate(&backup(2024, 3, 1)), Decision::Purge);
    }

    #[test]
    fn test_window_boundary_is_strict() {
        let policy = RetentionPolicy::today_only().with_daily(7);
        let evaluator = RetentionEvaluator::new(&policy, date(2024, 3, 15));

        assert!(evaluator.keeps(&backup(2024, 3, 9)));
        assert!(!evaluator.keeps(&backup(2024, 3, 8)));
    }

    #[test]
    fn test_weekly_anchor() {
        // 2024-02-25 is a Sunday, 2024-02-23 a Friday, both about three weeks back
        let policy = policy(0, (4, 0), (0, 1), (0, 1));
        let evaluator = RetentionEvaluator::new(&policy, date(2024, 3, 15));

        assert_eq!(
            evaluator.evaluate(&backup(2024, 2, 25)),
            Decision::Keep(KeepReason::Tier(TierKind::Weekly))
        );
        assert_eq!(evaluator.evaluate(&backup(2024, 2, 23)), Decision::Purge);
        // Sunday outside the four-week window
        assert_eq!(evaluator.evaluate(&backup(2024, 2, 11)), Decision::Purge);
    }

    #[test]
    fn test_monthly_anchor_and_window() {
        let policy = policy(0, (0, 0), (4, 1), (0, 1));
        let evaluator = RetentionEvaluator::new(&policy, date(2024, 3, 15));

        assert!(evaluator.keeps(&backup(2024, 3, 1)));
        assert!(evaluator.keeps(&backup(2023, 12, 1)));
        assert!(!evaluator.keeps(&backup(2023, 11, 1)));
        assert!(!evaluator.keeps(&backup(2024, 2, 2)));
    }

    #[test]
    fn test_monthly_window_clamps_to_month_end() {
        // Three months before 31 May is 29 February in a leap year
        let policy = policy(0, (0, 0), (3, 29), (0, 1));
        let evaluator = RetentionEvaluator::new(&policy, date(2024, 5, 31));

        assert!(!evaluator.keeps(&backup(2024, 2, 29)));
        assert!(evaluator.keeps(&backup(2024, 3, 29)));
    }

    #[test]
    fn test_yearly_anchor_is_one_based() {
        let policy = policy(0, (0, 0), (0, 1), (-1, 1));
        let evaluator = RetentionEvaluator::new(&policy, date(2024, 3, 15));

        assert_eq!(
            evaluator.evaluate(&backup(2015, 1, 1)),
            Decision::Keep(KeepReason::Tier(TierKind::Yearly))
        );
        assert!(!evaluator.keeps(&backup(2015, 1, 2)));
        assert!(!evaluator.keeps(&backup(2014, 12, 31)));
    }

    #[test]
    fn test_yearly_anchor_leap_day() {
        let policy = policy(0, (0, 0), (0, 1), (2, 60));
        let evaluator = RetentionEvaluator::new(&policy, date(2024, 12, 1));

        assert!(evaluator.keeps(&backup(2024, 2, 29)));
        assert!(evaluator.keeps(&backup(2023, 3, 1)));
        assert!(!evaluator.keeps(&backup(2022, 3, 1)));
    }

    #[test]
    fn test_disabled_tier_keeps_nothing() {
        let today = date(2024, 3, 15);
        let weekly_off = policy(0, (0, 0), (0, 1), (0, 1));
        let evaluator = RetentionEvaluator::new(&weekly_off, today);

        let mut day = date(2023, 1, 1);
        while day < today {
            assert!(!evaluator.keeps(&BackupIdentity::new(day, None)), "{}", day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_unbounded_window() {
        let today = date(2024, 3, 15);
        let unbounded = Tier::new(-1);

        for kind in TierKind::ALL {
            assert!(within_window(kind, unbounded, date(1970, 1, 1), today));
            assert!(within_window(kind, unbounded, date(2024, 3, 14), today));
        }

        let policy = RetentionPolicy::today_only().with_daily(-1);
        let evaluator = RetentionEvaluator::new(&policy, today);
        assert!(evaluator.keeps(&backup(1999, 7, 4)));
    }

    #[test]
    fn test_huge_window_excludes_nothing() {
        let window = Tier::new(i32::MAX);
        assert!(within_window(TierKind::Yearly, window, date(1900, 1, 1), date(2024, 3, 15)));
        assert!(within_window(TierKind::Daily, window, date(1900, 1, 1), date(2024, 3, 15)));
    }

    #[test]
    fn test_today_always_survives() {
        let policies = [
            RetentionPolicy::today_only(),
            RetentionPolicy::default(),
            policy(1, (1, 3), (1, 31), (1, 366)),
            policy(-1, (-1, 0), (-1, 1), (-1, 1)),
        ];

        let mut today = date(2024, 1, 1);
        for _ in 0..366 {
            for policy in &policies {
                let evaluator = RetentionEvaluator::new(policy, today);
                assert_eq!(
                    evaluator.evaluate(&BackupIdentity::new(today, None)),
                    Decision::Keep(KeepReason::Today)
                );
            }
            today = today.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_default_policy_shape() {
        let policy = RetentionPolicy::default();
        let today = date(2024, 3, 15);
        let evaluator = RetentionEvaluator::new(&policy, today);

        let mut kept = Vec::new();
        let mut day = date(2022, 1, 1);
        while day <= today {
            if evaluator.keeps(&BackupIdentity::new(day, None)) {
                kept.push(day);
            }
            day = day.succ_opt().unwrap();
        }

        let expected = vec![
            date(2022, 1, 1),
            date(2023, 1, 1),
            date(2023, 12, 1),
            date(2024, 1, 1),
            date(2024, 2, 1),
            date(2024, 3, 1),
            date(2024, 3, 9),
            date(2024, 3, 10),
            date(2024, 3, 11),
            date(2024, 3, 12),
            date(2024, 3, 13),
            date(2024, 3, 14),
            date(2024, 3, 15),
        ];
        assert_eq!(kept, expected);
    }
}
