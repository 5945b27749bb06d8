use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{PkgriskError, Result, ValidationError};
use tracing_subscriber::EnvFilter;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, reporting every problem at once
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_storage(config, &mut errors);
        Self::validate_scoring(config, &mut errors);
        Self::validate_reader(config, &mut errors);
        Self::validate_logging(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PkgriskError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_storage(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.data_dir",
                "Data directory cannot be empty",
            ));
        }
    }

    fn validate_scoring(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the policy is loaded; paths may need ~ expansion
        if let Some(path) = &config.scoring.policy_file {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    "scoring.policy_file",
                    "Policy file path cannot be empty",
                ));
            } else if !path.extension().is_some_and(|ext| ext == "toml") {
                errors.push(ValidationError::new(
                    "scoring.policy_file",
                    format!("Policy file must be a .toml file: {}", path.display()),
                ));
            }
        }
    }

    fn validate_reader(config: &Config, errors: &mut Vec<ValidationError>) {
        if config
            .reader
            .base_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            errors.push(ValidationError::new(
                "reader.base_dir",
                "Reader base directory cannot be empty",
            ));
        }
    }

    fn validate_logging(config: &Config, errors: &mut Vec<ValidationError>) {
        let filter = &config.logging.default_filter;
        if filter.trim().is_empty() {
            errors.push(ValidationError::new(
                "logging.default_filter",
                "Log filter cannot be empty",
            ));
        } else if let Err(e) = EnvFilter::try_new(filter) {
            errors.push(ValidationError::new(
                "logging.default_filter",
                format!("Invalid log filter '{}': {}", filter, e),
            ));
        }
    }
}
