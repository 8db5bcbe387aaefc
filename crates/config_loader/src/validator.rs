//! Configuration validation.
//!
//! Field-level checks come from the `validator` derive on `PipelineConfig`;
//! cross-field rules live here.

use contracts::{PipelineConfig, PipelineError};
use validator::Validate;

/// Validate a parsed configuration
pub(crate) fn validate(config: &PipelineConfig) -> Result<(), PipelineError> {
    if let Err(errors) = config.validate() {
        let (field, kinds) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, kinds)| (field.to_string(), kinds.clone()))
            .unwrap_or_default();
        let code = kinds
            .first()
            .map(|e| e.code.to_string())
            .unwrap_or_else(|| "invalid".to_string());
        return Err(PipelineError::config_validation(field, code));
    }

    // Enabling fallback requires somewhere to fall back to
    if !config.disable_fallback {
        match &config.events_fallback_endpoint {
            Some(url) if !url.is_empty() => {}
            _ => {
                return Err(PipelineError::config_validation(
                    "events_fallback_endpoint",
                    "required when fallback is enabled",
                ));
            }
        }
    }

    Ok(())
}
