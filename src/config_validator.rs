use tracing::warn;

use crate::config::ServiceSettings;
use crate::error::ConfigError;

/// Validates configuration for consistency before anything starts.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<(), ConfigError> {
        if url.is_empty() {
            return Err(ConfigError::Invalid("Redis URL cannot be empty".to_string()));
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(ConfigError::Invalid(
                "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates the cache, admission and retry policy.
    pub fn validate_settings(settings: &ServiceSettings) -> Result<(), ConfigError> {
        if settings.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "Cache capacity must be greater than 0".to_string(),
            ));
        }

        if settings.cache_expiration.is_zero() {
            return Err(ConfigError::Invalid(
                "Cache expiration must be greater than 0".to_string(),
            ));
        }

        if settings.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "Max connections must be greater than 0".to_string(),
            ));
        }

        if settings.rate_limit == 0 {
            return Err(ConfigError::Invalid(
                "Rate limit must be greater than 0".to_string(),
            ));
        }

        if settings.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "Max retries must be at least 1".to_string(),
            ));
        }

        if settings.replenish_workers == 0 {
            return Err(ConfigError::Invalid(
                "At least one replenish worker is required".to_string(),
            ));
        }

        if settings.store_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Store timeout must be greater than 0".to_string(),
            ));
        }

        if settings.store_timeout >= settings.admission_timeout {
            return Err(ConfigError::Invalid(format!(
                "Store timeout ({:?}) must be shorter than the admission timeout ({:?})",
                settings.store_timeout, settings.admission_timeout
            )));
        }

        Ok(())
    }

    /// Settings that are legal but probably not what was intended.
    pub fn warnings(settings: &ServiceSettings) -> Vec<String> {
        let mut warnings = Vec::new();

        if settings.cache_expiration < settings.sweep_interval {
            warnings.push(format!(
                "cache expiration ({:?}) is shorter than the sweep interval ({:?}); stale pools may be served until the next sweep",
                settings.cache_expiration, settings.sweep_interval
            ));
        }

        if settings.cache_capacity < 2 {
            warnings.push(format!(
                "cache capacity {} never drops below half, so pools are only refilled on a miss",
                settings.cache_capacity
            ));
        }

        if settings.replenish_workers > settings.max_connections {
            warnings.push(format!(
                "{} replenish workers exceed max connections ({})",
                settings.replenish_workers, settings.max_connections
            ));
        }

        warnings
    }

    /// Validates everything and logs the warnings.
    pub fn validate(redis_url: &str, settings: &ServiceSettings) -> Result<(), ConfigError> {
        Self::validate_redis_url(redis_url)?;
        Self::validate_settings(settings)?;

        for warning in Self::warnings(settings) {
            warn!("{}", warning);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_valid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("redis://localhost:6379").is_ok());
        assert!(ConfigValidator::validate_redis_url("rediss://localhost:6379").is_ok());
    }

    #[test]
    fn test_invalid_redis_url() {
        assert!(ConfigValidator::validate_redis_url("").is_err());
        assert!(ConfigValidator::validate_redis_url("http://localhost:6379").is_err());
    }

    #[test]
    fn test_default_settings_are_valid() {
        let settings = ServiceSettings::default();
        assert!(ConfigValidator::validate_settings(&settings).is_ok());
        assert!(ConfigValidator::warnings(&settings).is_empty());
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut settings = ServiceSettings::default();
        settings.cache_capacity = 0;
        assert!(ConfigValidator::validate_settings(&settings).is_err());

        let mut settings = ServiceSettings::default();
        settings.max_connections = 0;
        assert!(ConfigValidator::validate_settings(&settings).is_err());

        let mut settings = ServiceSettings::default();
        settings.max_retries = 0;
        assert!(ConfigValidator::validate_settings(&settings).is_err());
    }

    #[test]
    fn test_store_timeout_must_fit_admission_timeout() {
        let mut settings = ServiceSettings::default();
        settings.store_timeout = Duration::from_secs(10);
        let err = ConfigValidator::validate_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("Store timeout"));
    }

    #[test]
    fn test_short_expiration_warns() {
        let mut settings = ServiceSettings::default();
        settings.cache_expiration = Duration::from_secs(60);
        let warnings = ConfigValidator::warnings(&settings);
        assert_eq!(warnings.len(), 1);
        assert!(ConfigValidator::validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_capacity_one_warns_about_refill() {
        let mut settings = ServiceSettings::default();
        settings.cache_capacity = 1;
        let warnings = ConfigValidator::warnings(&settings);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("cache capacity 1"));
        assert!(ConfigValidator::validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_validate_checks_url_first() {
        let result = ConfigValidator::validate("invalid://localhost", &ServiceSettings::default());
        assert!(result.is_err());
    }
}
