//! Post-processor plugin trait.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::Plugin;
use crate::types::ExtractionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Execution stage of a post-processor.
///
/// The pipeline runs Early, then Middle, then Late; within a stage,
/// processors run in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStage {
    Early,
    Middle,
    Late,
}

/// Trait for enrichment post-processors.
///
/// Processors mutate the result they are given but must only ADD metadata
/// keys; the pipeline restores any pre-existing key a processor overwrites.
#[async_trait]
pub trait PostProcessor: Plugin {
    /// Enrich an extraction result in place.
    async fn process(&self, result: &mut ExtractionResult, config: &ExtractionConfig) -> Result<()>;

    /// Stage this processor runs in. Defaults to Middle.
    fn processing_stage(&self) -> ProcessingStage {
        ProcessingStage::Middle
    }

    /// Whether this processor applies to the given result.
    fn should_process(&self, _result: &ExtractionResult, _config: &ExtractionConfig) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StampProcessor;

    impl Plugin for StampProcessor {
        fn name(&self) -> &str {
            "stamp"
        }
    }

    #[async_trait]
    impl PostProcessor for StampProcessor {
        async fn process(&self, result: &mut ExtractionResult, _config: &ExtractionConfig) -> Result<()> {
            result
                .metadata
                .additional
                .insert("stamped".to_string(), serde_json::json!(true));
            Ok(())
        }

        fn processing_stage(&self) -> ProcessingStage {
            ProcessingStage::Late
        }
    }

    #[tokio::test]
    async fn test_processor_adds_metadata() {
        let processor = StampProcessor;
        let mut result = ExtractionResult::new("text", "text/plain");
        let config = ExtractionConfig::default();

        processor.process(&mut result, &config).await.unwrap();
        assert_eq!(result.metadata.additional.get("stamped").unwrap(), &serde_json::json!(true));
        assert_eq!(processor.processing_stage(), ProcessingStage::Late);
    }
}
