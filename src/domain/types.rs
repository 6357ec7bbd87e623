//! Closed vocabularies shared by descriptors, cache keys, and job records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four offices a document can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrayerKind {
    Morning,
    Evening,
    Midday,
    Compline,
}

impl PrayerKind {
    pub const ALL: [PrayerKind; 4] = [
        PrayerKind::Morning,
        PrayerKind::Evening,
        PrayerKind::Midday,
        PrayerKind::Compline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PrayerKind::Morning => "morning",
            PrayerKind::Evening => "evening",
            PrayerKind::Midday => "midday",
            PrayerKind::Compline => "compline",
        }
    }
}

impl TryFrom<&str> for PrayerKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(PrayerKind::Morning),
            "evening" => Ok(PrayerKind::Evening),
            "midday" => Ok(PrayerKind::Midday),
            "compline" => Ok(PrayerKind::Compline),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PrayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page-size tag passed through to the typesetter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageVariant {
    #[default]
    Letter,
    /// 6.2" x 8.3" layout for the reMarkable 2 tablet.
    Remarkable,
}

impl PageVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            PageVariant::Letter => "letter",
            PageVariant::Remarkable => "remarkable",
        }
    }
}

impl TryFrom<&str> for PageVariant {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PageVariant::Letter),
            "remarkable" => Ok(PageVariant::Remarkable),
            _ => Err(()),
        }
    }
}

/// Psalter cycle used when assigning psalms to days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PsalmCycle {
    Thirty,
    Sixty,
}

impl PsalmCycle {
    pub fn days(self) -> u8 {
        match self {
            PsalmCycle::Thirty => 30,
            PsalmCycle::Sixty => 60,
        }
    }
}

impl TryFrom<u8> for PsalmCycle {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            30 => Ok(PsalmCycle::Thirty),
            60 => Ok(PsalmCycle::Sixty),
            other => Err(format!("unsupported psalm cycle `{other}`")),
        }
    }
}

impl From<PsalmCycle> for u8 {
    fn from(cycle: PsalmCycle) -> Self {
        cycle.days()
    }
}

/// Shape of the requested period; drives both the key prefix and the cost class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeClass {
    Daily,
    Monthly,
}

impl ScopeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeClass::Daily => "daily",
            ScopeClass::Monthly => "monthly",
        }
    }
}

impl TryFrom<&str> for ScopeClass {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "daily" => Ok(ScopeClass::Daily),
            "monthly" => Ok(ScopeClass::Monthly),
            _ => Err(()),
        }
    }
}

/// How a cache miss is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostClass {
    /// Generated inside the request under a deadline.
    Sync,
    /// Handed to a background job; the caller polls.
    Async,
}

impl CostClass {
    pub fn as_str(self) -> &'static str {
        match self {
            CostClass::Sync => "sync",
            CostClass::Async => "async",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prayer_kind_parses_case_insensitively() {
        assert_eq!(PrayerKind::try_from("Morning"), Ok(PrayerKind::Morning));
        assert_eq!(PrayerKind::try_from(" COMPLINE "), Ok(PrayerKind::Compline));
        assert!(PrayerKind::try_from("xyz").is_err());
        assert!(PrayerKind::try_from("").is_err());
    }

    #[test]
    fn psalm_cycle_accepts_only_known_lengths() {
        assert_eq!(PsalmCycle::try_from(30), Ok(PsalmCycle::Thirty));
        assert_eq!(PsalmCycle::try_from(60), Ok(PsalmCycle::Sixty));
        assert!(PsalmCycle::try_from(45).is_err());
    }

    #[test]
    fn psalm_cycle_serializes_as_number() {
        let json = serde_json::to_string(&PsalmCycle::Thirty).expect("serialize");
        assert_eq!(json, "30");
        assert!(serde_json::from_str::<PsalmCycle>("7").is_err());
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
