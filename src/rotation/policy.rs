//! Retention policy
//!
//! Four independent tiers. A tier's `count` is its window size in the tier's
//! unit: zero disables the tier, a positive count keeps that many units back
//! from today, a negative count never expires.

use std::fmt;

use crate::error::{SpinError, SpinResult};

/// The rotation tiers, finest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl TierKind {
    pub const ALL: [TierKind; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Yearly];
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        };
        write!(f, "{}", name)
    }
}

/// A retention window of `count` tier units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub count: i32,
}

impl Tier {
    pub const DISABLED: Tier = Tier { count: 0 };

    pub fn new(count: i32) -> Self {
        Self { count }
    }

    /// Whether this tier can keep anything at all
    pub fn is_active(&self) -> bool {
        self.count != 0
    }

    /// Whether this tier keeps matching backups forever
    pub fn is_unbounded(&self) -> bool {
        self.count < 0
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            0 => write!(f, "off"),
            n if n < 0 => write!(f, "forever"),
            n => write!(f, "{}", n),
        }
    }
}

/// A tier that only keeps backups falling on its anchor day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchoredTier {
    pub window: Tier,
    /// Day of week (0 = Sunday), day of month, or day of year (1 = 1 January)
    pub anchor: u32,
}

impl AnchoredTier {
    pub fn new(count: i32, anchor: u32) -> Self {
        Self {
            window: Tier::new(count),
            anchor,
        }
    }

    pub fn disabled(anchor: u32) -> Self {
        Self {
            window: Tier::DISABLED,
            anchor,
        }
    }
}

/// The full grandfather-father-son policy for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    daily: Tier,
    weekly: AnchoredTier,
    monthly: AnchoredTier,
    yearly: AnchoredTier,
}

impl RetentionPolicy {
    /// Build a policy, checking each anchor against its tier's day range
    ///
    /// Anchors are checked even for disabled tiers so that a bad value is
    /// caught when the tier is configured, not when it is first switched on.
    pub fn new(
        daily: Tier,
        weekly: AnchoredTier,
        monthly: AnchoredTier,
        yearly: AnchoredTier,
    ) -> SpinResult<Self> {
        check_anchor(TierKind::Weekly, weekly.anchor, 0, 6)?;
        check_anchor(TierKind::Monthly, monthly.anchor, 1, 31)?;
        check_anchor(TierKind::Yearly, yearly.anchor, 1, 366)?;

        Ok(Self {
            daily,
            weekly,
            monthly,
            yearly,
        })
    }

    /// A policy that only ever keeps today's backup
    pub fn today_only() -> Self {
        Self {
            daily: Tier::DISABLED,
            weekly: AnchoredTier::disabled(0),
            monthly: AnchoredTier::disabled(1),
            yearly: AnchoredTier::disabled(1),
        }
    }

    pub fn with_daily(mut self, count: i32) -> Self {
        self.daily = Tier::new(count);
        self
    }

    pub fn daily(&self) -> Tier {
        self.daily
    }

    pub fn weekly(&self) -> AnchoredTier {
        self.weekly
    }

    pub fn monthly(&self) -> AnchoredTier {
        self.monthly
    }

    pub fn yearly(&self) -> AnchoredTier {
        self.yearly
    }

    /// Window of the given tier
    pub fn window(&self, kind: TierKind) -> Tier {
        match kind {
            TierKind::Daily => self.daily,
            TierKind::Weekly => self.weekly.window,
            TierKind::Monthly => self.monthly.window,
            TierKind::Yearly => self.yearly.window,
        }
    }

    /// Anchor of the given tier, `None` for the daily tier
    pub fn anchor(&self, kind: TierKind) -> Option<u32> {
        match kind {
            TierKind::Daily => None,
            TierKind::Weekly => Some(self.weekly.anchor),
            TierKind::Monthly => Some(self.monthly.anchor),
            TierKind::Yearly => Some(self.yearly.anchor),
        }
    }

    /// One-line description, e.g. `daily 7, weekly off, monthly 4 (day 1), yearly forever (day 1)`
    pub fn describe(&self) -> String {
        TierKind::ALL
            .iter()
            .map(|&kind| {
                let window = self.window(kind);
                match self.anchor(kind) {
                    Some(anchor) if window.is_active() => {
                        format!("{} {} (day {})", kind, window, anchor)
                    }
                    _ => format!("{} {}", kind, window),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily: Tier::new(7),
            weekly: AnchoredTier::new(0, 0),
            monthly: AnchoredTier::new(4, 1),
            yearly: AnchoredTier::new(-1, 1),
        }
    }
}

fn check_anchor(kind: TierKind, anchor: u32, min: u32, max: u32) -> SpinResult<()> {
    if (min..=max).contains(&anchor) {
        Ok(())
    } else {
        Err(SpinError::Config(format!(
            "The {} anchor must be between {} and {}, got {}",
            kind, min, max, anchor
        )))
    }
}
