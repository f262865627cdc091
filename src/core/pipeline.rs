//! Post-processing pipeline orchestration.
//!
//! Runs after the extractor, in order: validators (fail fast), quality
//! scoring, chunking, token reduction, language detection, then registered
//! post-processors by stage (Early, Middle, Late; registration order within
//! a stage). Processor failures degrade into metadata entries; fatal errors
//! always bubble up.

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::ProcessingStage;
use crate::types::ExtractionResult;

pub async fn run_pipeline(mut result: ExtractionResult, config: &ExtractionConfig) -> Result<ExtractionResult> {
    // 1. Validators fail fast.
    {
        let validator_registry = crate::plugins::registry::get_validator_registry();
        let validators = {
            let registry = validator_registry
                .read()
                .map_err(|e| crate::KreuzbergError::Other(format!("Validator registry lock poisoned: {e}")))?;
            registry.get_all()
        };

        for validator in validators {
            if validator.should_validate(&result, config) {
                validator.validate(&result, config).await?;
            }
        }
    }

    // 2. Quality scoring.
    #[cfg(feature = "quality")]
    if config.enable_quality_processing {
        let quality_score = crate::text::calculate_quality_score(&result.content, None);
        result.metadata.additional.insert(
            "quality_score".to_string(),
            serde_json::Value::Number(serde_json::Number::from_f64(quality_score).unwrap_or(0.into())),
        );
    }

    // 3. Chunking.
    #[cfg(feature = "chunking")]
    if let Some(chunking_config) = &config.chunking {
        let chunk_config = crate::chunking::ChunkingConfig {
            max_characters: chunking_config.max_chars,
            overlap: chunking_config.max_overlap,
            trim: true,
            chunker_type: crate::chunking::ChunkerType::for_mime_type(&result.mime_type),
        };

        match crate::chunking::chunk_text(&result.content, &chunk_config) {
            Ok(chunking_result) => {
                result.chunks = chunking_result.chunks.into_iter().map(|chunk| chunk.content).collect();
            }
            Err(e) => {
                result
                    .metadata
                    .additional
                    .insert("chunking_error".to_string(), serde_json::json!(e.to_string()));
            }
        }
    }

    // 4. Token reduction.
    if let Some(reduction_config) = &config.token_reduction {
        if reduction_config.mode != "off" {
            match crate::text::reduce_tokens(&result.content, reduction_config) {
                Ok(reduced) => {
                    let statistics = crate::text::get_reduction_statistics(&result.content, &reduced);
                    result.metadata.additional.insert(
                        "token_reduction".to_string(),
                        serde_json::to_value(&statistics).unwrap_or(serde_json::Value::Null),
                    );
                    result.content = reduced;
                }
                Err(e) => {
                    result
                        .metadata
                        .additional
                        .insert("token_reduction_error".to_string(), serde_json::json!(e.to_string()));
                }
            }
        }
    }

    // 5. OCR over extracted images.
    #[cfg(feature = "ocr")]
    if let Some(image_config) = &config.images {
        if image_config.ocr_extracted_images && !result.images.is_empty() {
            let ocr_config = config.ocr.clone().unwrap_or_default();
            let processor = crate::ocr::OcrProcessor::new();
            let (min_width, min_height) = image_config.ocr_min_dimensions;

            let mut image_ocr_results = Vec::with_capacity(result.images.len());
            for image in &result.images {
                let too_small = image
                    .dimensions
                    .is_some_and(|(width, height)| width < min_width || height < min_height);
                if too_small {
                    image_ocr_results.push(crate::types::ImageOcrResult {
                        filename: image.filename.clone(),
                        content: String::new(),
                        confidence: None,
                        skipped_reason: Some("below minimum dimensions".to_string()),
                    });
                    continue;
                }

                match processor.process_image(&image.data, &ocr_config, config).await {
                    Ok(ocr_result) => image_ocr_results.push(crate::types::ImageOcrResult {
                        filename: image.filename.clone(),
                        content: ocr_result.content,
                        confidence: None,
                        skipped_reason: None,
                    }),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => image_ocr_results.push(crate::types::ImageOcrResult {
                        filename: image.filename.clone(),
                        content: String::new(),
                        confidence: None,
                        skipped_reason: Some(e.to_string()),
                    }),
                }
            }
            result.image_ocr_results = image_ocr_results;
        }
    }

    // 6. Language detection.
    #[cfg(feature = "language-detection")]
    if let Some(language_config) = &config.language_detection {
        match crate::language_detection::detect_languages(&result.content, language_config) {
            Ok(detected) => result.detected_languages = detected,
            Err(e) => {
                result
                    .metadata
                    .additional
                    .insert("language_detection_error".to_string(), serde_json::json!(e.to_string()));
            }
        }
    }

    // 7. Post-processors by stage.
    let selection = config.post_processors.clone().unwrap_or_default();
    let processor_registry = crate::plugins::registry::get_post_processor_registry();

    for stage in [ProcessingStage::Early, ProcessingStage::Middle, ProcessingStage::Late] {
        let processors = {
            let registry = processor_registry
                .read()
                .map_err(|e| crate::KreuzbergError::Other(format!("Post-processor registry lock poisoned: {e}")))?;
            registry.get_for_stage(stage)
        };

        for processor in processors {
            if !selection.permits(processor.name()) {
                continue;
            }
            if !processor.should_process(&result, config) {
                continue;
            }

            // Snapshot the extension map: processors add keys but must not
            // overwrite what earlier stages or the extractor wrote.
            let snapshot = result.metadata.additional.clone();

            match processor.process(&mut result, config).await {
                Ok(()) => {
                    for (key, original_value) in &snapshot {
                        let clobbered = result
                            .metadata
                            .additional
                            .get(key)
                            .is_none_or(|current| current != original_value);
                        if clobbered {
                            tracing::warn!(
                                processor = processor.name(),
                                key = %key,
                                "post-processor overwrote an existing metadata key; restoring"
                            );
                            result
                                .metadata
                                .additional
                                .insert(key.clone(), original_value.clone());
                        }
                    }
                }
                Err(e) => {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    let error_key = format!("processing_error_{}", processor.name());
                    result
                        .metadata
                        .additional
                        .insert(error_key, serde_json::json!(e.to_string()));
                }
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PostProcessorConfig;
    use crate::plugins::registry::get_post_processor_registry;
    use crate::plugins::{Plugin, PostProcessor};
    use async_trait::async_trait;
    use serial_test::serial;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn base_result(content: &str) -> ExtractionResult {
        ExtractionResult::new(content, "text/plain")
    }

    #[tokio::test]
    async fn test_pipeline_basic() {
        let result = base_result("test");
        let processed = run_pipeline(result, &ExtractionConfig::default()).await.unwrap();
        assert_eq!(processed.content, "test");
    }

    #[cfg(feature = "quality")]
    #[tokio::test]
    async fn test_quality_score_added() {
        let result = base_result("This is a test document with some meaningful content in it.");
        let processed = run_pipeline(result, &ExtractionConfig::default()).await.unwrap();
        assert!(processed.metadata.additional.contains_key("quality_score"));
    }

    #[tokio::test]
    async fn test_quality_disabled() {
        let config = ExtractionConfig {
            enable_quality_processing: false,
            ..Default::default()
        };
        let processed = run_pipeline(base_result("content"), &config).await.unwrap();
        assert!(!processed.metadata.additional.contains_key("quality_score"));
    }

    #[cfg(feature = "chunking")]
    #[tokio::test]
    async fn test_chunking_populates_chunks() {
        let config = ExtractionConfig {
            chunking: Some(crate::core::config::ChunkingConfig {
                max_chars: 100,
                max_overlap: 10,
            }),
            ..Default::default()
        };

        let result = base_result(&"This is a sentence that repeats. ".repeat(30));
        let processed = run_pipeline(result, &config).await.unwrap();

        assert!(processed.chunks.len() > 1);
        assert!(processed.chunks.iter().all(|chunk| chunk.len() <= 100));
    }

    #[tokio::test]
    async fn test_token_reduction_applied() {
        let config = ExtractionConfig {
            token_reduction: Some(crate::core::config::TokenReductionConfig {
                mode: "light".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let result = base_result("spaced     out      text");
        let processed = run_pipeline(result, &config).await.unwrap();

        assert_eq!(processed.content, "spaced out text");
        assert!(processed.metadata.additional.contains_key("token_reduction"));
    }

    struct CountingProcessor {
        name: &'static str,
        stage: ProcessingStage,
        counter: Arc<AtomicUsize>,
        order: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Plugin for CountingProcessor {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[async_trait]
    impl PostProcessor for CountingProcessor {
        async fn process(&self, result: &mut ExtractionResult, _config: &ExtractionConfig) -> Result<()> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            self.order.lock().unwrap().push(self.name.to_string());
            result
                .metadata
                .additional
                .insert(format!("ran_{}", self.name), serde_json::json!(true));
            Ok(())
        }

        fn processing_stage(&self) -> ProcessingStage {
            self.stage
        }
    }

    fn clear_processors() {
        let registry = get_post_processor_registry();
        let mut write = registry.write().unwrap();
        for name in write.list() {
            let _ = write.remove(&name);
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_stage_ordering() {
        clear_processors();

        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let registry = get_post_processor_registry();
        {
            let mut write = registry.write().unwrap();
            write
                .register(Arc::new(CountingProcessor {
                    name: "late",
                    stage: ProcessingStage::Late,
                    counter: Arc::clone(&counter),
                    order: Arc::clone(&order),
                }))
                .unwrap();
            write
                .register(Arc::new(CountingProcessor {
                    name: "early",
                    stage: ProcessingStage::Early,
                    counter: Arc::clone(&counter),
                    order: Arc::clone(&order),
                }))
                .unwrap();
            write
                .register(Arc::new(CountingProcessor {
                    name: "middle",
                    stage: ProcessingStage::Middle,
                    counter: Arc::clone(&counter),
                    order: Arc::clone(&order),
                }))
                .unwrap();
        }

        let processed = run_pipeline(base_result("x"), &ExtractionConfig::default()).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(*order.lock().unwrap(), vec!["early", "middle", "late"]);
        assert!(processed.metadata.additional.contains_key("ran_early"));

        clear_processors();
    }

    #[tokio::test]
    #[serial]
    async fn test_allow_deny_lists() {
        clear_processors();

        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let registry = get_post_processor_registry();
        {
            let mut write = registry.write().unwrap();
            for name in ["wanted", "unwanted"] {
                write
                    .register(Arc::new(CountingProcessor {
                        name,
                        stage: ProcessingStage::Middle,
                        counter: Arc::clone(&counter),
                        order: Arc::clone(&order),
                    }))
                    .unwrap();
            }
        }

        let config = ExtractionConfig {
            post_processors: Some(PostProcessorConfig {
                enabled: true,
                allow_list: Some(vec!["wanted".to_string()]),
                deny_list: None,
            }),
            ..Default::default()
        };

        let processed = run_pipeline(base_result("x"), &config).await.unwrap();
        assert!(processed.metadata.additional.contains_key("ran_wanted"));
        assert!(!processed.metadata.additional.contains_key("ran_unwanted"));

        clear_processors();
    }

    struct ClobberingProcessor;

    impl Plugin for ClobberingProcessor {
        fn name(&self) -> &str {
            "clobberer"
        }
    }

    #[async_trait]
    impl PostProcessor for ClobberingProcessor {
        async fn process(&self, result: &mut ExtractionResult, _config: &ExtractionConfig) -> Result<()> {
            result
                .metadata
                .additional
                .insert("existing".to_string(), serde_json::json!("overwritten"));
            result
                .metadata
                .additional
                .insert("new_key".to_string(), serde_json::json!("added"));
            Ok(())
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_no_overwrite_of_existing_keys() {
        clear_processors();

        let registry = get_post_processor_registry();
        registry.write().unwrap().register(Arc::new(ClobberingProcessor)).unwrap();

        let mut result = base_result("x");
        result
            .metadata
            .additional
            .insert("existing".to_string(), serde_json::json!("original"));

        let config = ExtractionConfig {
            enable_quality_processing: false,
            ..Default::default()
        };
        let processed = run_pipeline(result, &config).await.unwrap();

        assert_eq!(
            processed.metadata.additional.get("existing").unwrap(),
            &serde_json::json!("original")
        );
        assert_eq!(
            processed.metadata.additional.get("new_key").unwrap(),
            &serde_json::json!("added")
        );

        clear_processors();
    }

    struct FailingProcessor;

    impl Plugin for FailingProcessor {
        fn name(&self) -> &str {
            "faulty"
        }
    }

    #[async_trait]
    impl PostProcessor for FailingProcessor {
        async fn process(&self, _result: &mut ExtractionResult, _config: &ExtractionConfig) -> Result<()> {
            Err(crate::KreuzbergError::parsing("processor exploded"))
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_processor_failure_degrades() {
        clear_processors();

        let registry = get_post_processor_registry();
        registry.write().unwrap().register(Arc::new(FailingProcessor)).unwrap();

        let processed = run_pipeline(base_result("x"), &ExtractionConfig::default()).await.unwrap();
        assert!(processed.metadata.additional.contains_key("processing_error_faulty"));

        clear_processors();
    }
}
