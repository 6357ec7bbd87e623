//! Cache configuration.
//!
//! Controls the artifact cache via the `[cache]` and `[store]` sections of `dailyoffice.toml`.

const DEFAULT_TTL_DAYS: u32 = 30;
const DEFAULT_ARTIFACT_PREFIX: &str = "prayers";
const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false, lookups always miss and best-effort writes are skipped.
    pub enabled: bool,
    /// Advertised freshness of served artifacts.
    pub ttl_days: u32,
    /// Blob store prefix under which artifacts live.
    pub artifact_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_days: DEFAULT_TTL_DAYS,
            artifact_prefix: DEFAULT_ARTIFACT_PREFIX.to_string(),
        }
    }
}

impl From<&crate::config::Settings> for CacheConfig {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            enabled: settings.cache.enabled,
            ttl_days: settings.cache.ttl_days.get(),
            artifact_prefix: settings.store.artifact_prefix.clone(),
        }
    }
}

impl CacheConfig {
    /// `Cache-Control: max-age` value in seconds.
    pub fn max_age_secs(&self) -> u64 {
        u64::from(self.ttl_days) * SECONDS_PER_DAY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.ttl_days, 30);
        assert_eq!(config.artifact_prefix, "prayers");
        assert_eq!(config.max_age_secs(), 2_592_000);
    }
}
