//! Cache key derivation.
//!
//! Keys are hierarchical so whole months or kinds can be dropped by prefix:
//! `{scope-class}/{kind}/{temporal}/{variant}/{cycle|default}`.

use std::fmt;

use crate::domain::descriptor::RequestDescriptor;
use crate::domain::error::DomainError;
use crate::domain::types::ScopeClass;

const UNSET_TOKEN: &str = "default";
const ARTIFACT_EXTENSION: &str = "pdf";
const JOBS_DIR: &str = "jobs";
const RESULTS_DIR: &str = "results";

/// Canonical key of a cached artifact, relative to the artifact prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blob store path of the artifact under `prefix`.
    pub fn object_path(&self, prefix: &str) -> String {
        join_prefix(prefix, &format!("{}.{ARTIFACT_EXTENSION}", self.0))
    }

    /// Rehydrate a key persisted in a job record.
    pub fn from_persisted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Recover a key from a path produced by [`CacheKey::object_path`].
    pub fn from_object_path(prefix: &str, path: &str) -> Option<Self> {
        let relative = if prefix.is_empty() {
            path
        } else {
            path.strip_prefix(prefix)?.strip_prefix('/')?
        };
        let key = relative.strip_suffix(&format!(".{ARTIFACT_EXTENSION}"))?;
        Some(Self(key.to_string()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Map a canonical descriptor to its cache key. Total and pure.
///
/// `bypass_cache` is a request directive and does not contribute.
pub fn derive_key(descriptor: &RequestDescriptor) -> CacheKey {
    let cycle = descriptor
        .cycle
        .map(|cycle| format!("cycle{}", cycle.days()))
        .unwrap_or_else(|| UNSET_TOKEN.to_string());
    CacheKey(format!(
        "{}/{}/{}/{}/{}",
        descriptor.scope.class().as_str(),
        descriptor.kind.as_str(),
        descriptor.scope.temporal_token(),
        descriptor.variant.as_str(),
        cycle
    ))
}

/// Store path of a job record.
pub fn job_record_path(job_id: &str) -> String {
    format!("{JOBS_DIR}/{job_id}.json")
}

pub fn job_records_prefix() -> String {
    format!("{JOBS_DIR}/")
}

/// Store path of a job-scoped result artifact.
pub fn job_result_path(job_id: &str) -> String {
    format!("{RESULTS_DIR}/{job_id}.{ARTIFACT_EXTENSION}")
}

/// Validated key prefix used for bulk invalidation, e.g. `monthly/morning/2025/12`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim().trim_matches('/');
        let mut segments = trimmed.split('/');
        let first = segments.next().unwrap_or_default();
        if ScopeClass::try_from(first).is_err() {
            return Err(DomainError::validation(
                "prefix",
                "key prefix must start with `daily` or `monthly`",
            ));
        }
        if segments.any(|segment| segment.is_empty() || segment == "." || segment == "..") {
            return Err(DomainError::validation(
                "prefix",
                format!("key prefix `{raw}` contains an empty or relative segment"),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Match on whole segments: `daily/morning` does not cover `daily/morningx`.
    pub fn covers(&self, key: &CacheKey) -> bool {
        let key = key.as_str();
        key == self.0
            || key
                .strip_prefix(&self.0)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Store path prefix to list candidates under `artifact_prefix`.
    pub fn object_prefix(&self, artifact_prefix: &str) -> String {
        join_prefix(artifact_prefix, &self.0)
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn join_prefix(prefix: &str, rest: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        rest.to_string()
    } else {
        format!("{prefix}/{rest}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use time::Month;
    use time::macros::date;

    use super::*;
    use crate::domain::types::{PageVariant, PrayerKind, PsalmCycle};

    #[test]
    fn daily_key_shape() {
        let descriptor = RequestDescriptor::daily(PrayerKind::Morning, date!(2025 - 11 - 08));
        assert_eq!(
            derive_key(&descriptor).as_str(),
            "daily/morning/2025-11-08/letter/default"
        );
    }

    #[test]
    fn monthly_key_shape_pads_month() {
        let descriptor = RequestDescriptor::monthly(PrayerKind::Evening, 2025, Month::March)
            .with_variant(PageVariant::Remarkable)
            .with_cycle(Some(PsalmCycle::Sixty));
        assert_eq!(
            derive_key(&descriptor).as_str(),
            "monthly/evening/2025/03/remarkable/cycle60"
        );
    }

    #[test]
    fn derivation_is_deterministic_and_ignores_bypass() {
        let descriptor = RequestDescriptor::daily(PrayerKind::Compline, date!(2025 - 01 - 31));
        assert_eq!(derive_key(&descriptor), derive_key(&descriptor.clone()));
        assert_eq!(
            derive_key(&descriptor),
            derive_key(&descriptor.with_bypass(true))
        );
    }

    #[test]
    fn every_semantic_field_separates_keys() {
        let base = RequestDescriptor::daily(PrayerKind::Morning, date!(2025 - 11 - 08));
        let variants = [
            base,
            RequestDescriptor::daily(PrayerKind::Evening, date!(2025 - 11 - 08)),
            RequestDescriptor::daily(PrayerKind::Morning, date!(2025 - 11 - 09)),
            base.with_variant(PageVariant::Remarkable),
            base.with_cycle(Some(PsalmCycle::Thirty)),
            base.with_cycle(Some(PsalmCycle::Sixty)),
            RequestDescriptor::monthly(PrayerKind::Morning, 2025, Month::November),
        ];
        let keys: HashSet<_> = variants.iter().map(derive_key).collect();
        assert_eq!(keys.len(), variants.len());
    }

    #[test]
    fn object_path_round_trips() {
        let key = derive_key(&RequestDescriptor::daily(
            PrayerKind::Midday,
            date!(2025 - 11 - 08),
        ));
        let path = key.object_path("prayers");
        assert_eq!(path, "prayers/daily/midday/2025-11-08/letter/default.pdf");
        assert_eq!(CacheKey::from_object_path("prayers", &path), Some(key));
        assert_eq!(CacheKey::from_object_path("other", &path), None);
    }

    #[test]
    fn job_paths() {
        assert_eq!(job_record_path("abc"), "jobs/abc.json");
        assert_eq!(job_result_path("abc"), "results/abc.pdf");
    }

    #[test]
    fn prefix_parsing_rejects_unknown_roots_and_traversal() {
        assert!(KeyPrefix::parse("monthly/morning/2025/12").is_ok());
        assert!(KeyPrefix::parse("/daily/").is_ok());
        assert!(KeyPrefix::parse("weekly/morning").is_err());
        assert!(KeyPrefix::parse("daily/../jobs").is_err());
        assert!(KeyPrefix::parse("daily//morning").is_err());
        assert!(KeyPrefix::parse("").is_err());
    }

    #[test]
    fn prefix_covers_whole_segments_only() {
        let prefix = KeyPrefix::parse("monthly/morning/2025/1").expect("valid");
        let december = derive_key(&RequestDescriptor::monthly(
            PrayerKind::Morning,
            2025,
            Month::December,
        ));
        assert!(!prefix.covers(&december));

        let prefix = KeyPrefix::parse("monthly/morning/2025/12").expect("valid");
        assert!(prefix.covers(&december));
        assert_eq!(
            prefix.object_prefix("prayers"),
            "prayers/monthly/morning/2025/12"
        );
    }
}
