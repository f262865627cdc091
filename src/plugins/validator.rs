//! Validation plugin trait.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::Plugin;
use crate::types::ExtractionResult;
use async_trait::async_trait;

/// Trait for validation hooks that run before post-processing.
///
/// Validators fail fast: a validation error aborts the pipeline and
/// surfaces to the caller.
#[async_trait]
pub trait Validator: Plugin {
    /// Inspect an extraction result; return an error to reject it.
    async fn validate(&self, result: &ExtractionResult, config: &ExtractionConfig) -> Result<()>;

    /// Whether this validator applies to the given result.
    fn should_validate(&self, _result: &ExtractionResult, _config: &ExtractionConfig) -> bool {
        true
    }
}
