use std::env;

use crate::error::AppError;
use crate::models::order::FulfillmentStyle;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub fulfillment: FulfillmentConfig,
}

/// Knobs consumed by the coordinator and the assignment queue.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    pub picker_max_concurrency: usize,
    pub rider_max_concurrency: usize,
    pub assignment_max_attempts: u32,
    pub auto_advance_max_attempts: u32,
    pub default_fulfillment_style: FulfillmentStyle,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            picker_max_concurrency: 3,
            rider_max_concurrency: 1,
            assignment_max_attempts: 3,
            auto_advance_max_attempts: 3,
            default_fulfillment_style: FulfillmentStyle::Staffed,
        }
    }
}

impl FulfillmentConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.picker_max_concurrency == 0 || self.rider_max_concurrency == 0 {
            return Err(AppError::Internal(
                "max concurrency must be > 0".to_string(),
            ));
        }
        if self.assignment_max_attempts == 0 {
            return Err(AppError::Internal(
                "ASSIGNMENT_MAX_ATTEMPTS must be > 0".to_string(),
            ));
        }
        if self.auto_advance_max_attempts == 0 {
            return Err(AppError::Internal(
                "AUTO_ADVANCE_MAX_ATTEMPTS must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = FulfillmentConfig::default();

        let fulfillment = FulfillmentConfig {
            picker_max_concurrency: parse_or_default(
                "PICKER_MAX_CONCURRENCY",
                defaults.picker_max_concurrency,
            )?,
            rider_max_concurrency: parse_or_default(
                "RIDER_MAX_CONCURRENCY",
                defaults.rider_max_concurrency,
            )?,
            assignment_max_attempts: parse_or_default(
                "ASSIGNMENT_MAX_ATTEMPTS",
                defaults.assignment_max_attempts,
            )?,
            auto_advance_max_attempts: parse_or_default(
                "AUTO_ADVANCE_MAX_ATTEMPTS",
                defaults.auto_advance_max_attempts,
            )?,
            default_fulfillment_style: parse_or_default(
                "DEFAULT_FULFILLMENT_STYLE",
                defaults.default_fulfillment_style,
            )?,
        };

        fulfillment.validate()?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            fulfillment,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::FulfillmentConfig;
    use crate::error::AppError;

    #[test]
    fn defaults_are_valid() {
        assert!(FulfillmentConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let configs = [
            FulfillmentConfig {
                picker_max_concurrency: 0,
                ..FulfillmentConfig::default()
            },
            FulfillmentConfig {
                assignment_max_attempts: 0,
                ..FulfillmentConfig::default()
            },
            FulfillmentConfig {
                auto_advance_max_attempts: 0,
                ..FulfillmentConfig::default()
            },
        ];

        for config in configs {
            assert!(matches!(config.validate(), Err(AppError::Internal(_))));
        }
    }
}
