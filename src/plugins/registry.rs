//! Plugin registration and discovery.
//!
//! Each plugin type has its own registry behind a process-global
//! `Arc<RwLock<...>>`. Reads take the shared lock; every mutation takes the
//! exclusive lock and invalidates the per-thread extractor memo so lookups
//! never serve a stale dispatch decision.

use crate::plugins::{DocumentExtractor, OcrBackend, PostProcessor, ProcessingStage, Validator};
use crate::{KreuzbergError, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Registry for OCR backend plugins, keyed by backend name.
pub struct OcrBackendRegistry {
    backends: HashMap<String, Arc<dyn OcrBackend>>,
}

impl OcrBackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register an OCR backend.
    ///
    /// Idempotent under a repeated name: the newer registration wins and a
    /// warning is logged.
    pub fn register(&mut self, backend: Arc<dyn OcrBackend>) -> Result<()> {
        let name = backend.name().to_string();

        backend.initialize()?;

        if let Some(previous) = self.backends.insert(name.clone(), backend) {
            tracing::warn!(backend = %name, "OCR backend re-registered; replacing previous registration");
            if let Err(e) = previous.shutdown() {
                tracing::warn!(backend = %name, error = %e, "previous OCR backend shutdown failed");
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn OcrBackend>> {
        self.backends.get(name).cloned().ok_or_else(|| KreuzbergError::Plugin {
            message: format!("OCR backend '{name}' not registered"),
            plugin_name: name.to_string(),
        })
    }

    /// First registered backend that supports a language code.
    pub fn get_for_language(&self, language: &str) -> Result<Arc<dyn OcrBackend>> {
        self.backends
            .values()
            .find(|backend| backend.supports_language(language))
            .cloned()
            .ok_or_else(|| KreuzbergError::Plugin {
                message: format!("No OCR backend supports language '{language}'"),
                plugin_name: language.to_string(),
            })
    }

    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        if let Some(backend) = self.backends.remove(name) {
            backend.shutdown()?;
        }
        Ok(())
    }

    pub fn shutdown_all(&mut self) -> Result<()> {
        for (_, backend) in self.backends.drain() {
            if let Err(e) = backend.shutdown() {
                tracing::warn!(error = %e, "OCR backend shutdown failed");
            }
        }
        Ok(())
    }
}

impl Default for OcrBackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry for document extractor plugins with MIME and priority routing.
#[allow(clippy::type_complexity)]
pub struct DocumentExtractorRegistry {
    // MIME type -> (priority -> extractor name -> extractor)
    extractors: HashMap<String, BTreeMap<i32, HashMap<String, Arc<dyn DocumentExtractor>>>>,
}

impl DocumentExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Register an extractor for every MIME type it supports.
    ///
    /// A previous registration under the same name is replaced.
    pub fn register(&mut self, extractor: Arc<dyn DocumentExtractor>) -> Result<()> {
        let name = extractor.name().to_string();
        let priority = extractor.priority();
        let mime_types: Vec<String> = extractor.supported_mime_types().iter().map(|s| s.to_string()).collect();

        extractor.initialize()?;

        self.remove_silent(&name);

        for mime_type in mime_types {
            self.extractors
                .entry(mime_type)
                .or_default()
                .entry(priority)
                .or_default()
                .insert(name.clone(), Arc::clone(&extractor));
        }

        crate::core::extractor::invalidate_extractor_cache();

        Ok(())
    }

    /// Highest-priority extractor for a MIME type: exact match first, then
    /// `type/*` prefix patterns.
    pub fn get(&self, mime_type: &str) -> Result<Arc<dyn DocumentExtractor>> {
        if let Some(priority_map) = self.extractors.get(mime_type) {
            if let Some((_priority, extractors)) = priority_map.iter().next_back() {
                if let Some((_name, extractor)) = extractors.iter().next() {
                    return Ok(Arc::clone(extractor));
                }
            }
        }

        let mut best_match: Option<(i32, Arc<dyn DocumentExtractor>)> = None;

        for (registered_mime, priority_map) in &self.extractors {
            if !registered_mime.ends_with("/*") {
                continue;
            }
            let prefix = &registered_mime[..registered_mime.len() - 1];
            if !mime_type.starts_with(prefix) {
                continue;
            }
            if let Some((priority, extractors)) = priority_map.iter().next_back() {
                if let Some((_name, extractor)) = extractors.iter().next() {
                    let better = match &best_match {
                        None => true,
                        Some((current, _)) => priority > current,
                    };
                    if better {
                        best_match = Some((*priority, Arc::clone(extractor)));
                    }
                }
            }
        }

        if let Some((_priority, extractor)) = best_match {
            return Ok(extractor);
        }

        Err(KreuzbergError::UnsupportedFormat(mime_type.to_string()))
    }

    pub fn supports(&self, mime_type: &str) -> bool {
        self.get(mime_type).is_ok()
    }

    pub fn list(&self) -> Vec<String> {
        let mut names = std::collections::HashSet::new();
        for priority_map in self.extractors.values() {
            for extractors in priority_map.values() {
                names.extend(extractors.keys().cloned());
            }
        }
        names.into_iter().collect()
    }

    pub fn mime_types(&self) -> Vec<String> {
        self.extractors.keys().cloned().collect()
    }

    fn remove_silent(&mut self, name: &str) -> Option<Arc<dyn DocumentExtractor>> {
        let mut removed: Option<Arc<dyn DocumentExtractor>> = None;

        for priority_map in self.extractors.values_mut() {
            for extractors in priority_map.values_mut() {
                if let Some(extractor) = extractors.remove(name) {
                    removed.get_or_insert(extractor);
                }
            }
        }

        self.extractors.retain(|_, priority_map| {
            priority_map.retain(|_, extractors| !extractors.is_empty());
            !priority_map.is_empty()
        });

        removed
    }

    /// Remove an extractor from every MIME registration and shut it down.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        if let Some(extractor) = self.remove_silent(name) {
            extractor.shutdown()?;
            crate::core::extractor::invalidate_extractor_cache();
        }
        Ok(())
    }

    pub fn shutdown_all(&mut self) -> Result<()> {
        for name in self.list() {
            self.remove(&name)?;
        }
        Ok(())
    }
}

impl Default for DocumentExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry for post-processor plugins, ordered by stage then registration.
pub struct PostProcessorRegistry {
    // Stage -> processors in registration order.
    processors: HashMap<ProcessingStage, Vec<Arc<dyn PostProcessor>>>,
}

impl PostProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Register a post-processor.
    ///
    /// Processors are deduplicated by name: re-registering replaces the
    /// previous registration in place, keeping its position in the order.
    pub fn register(&mut self, processor: Arc<dyn PostProcessor>) -> Result<()> {
        let name = processor.name().to_string();
        let stage = processor.processing_stage();

        processor.initialize()?;

        // Drop a same-named processor from any stage it previously occupied.
        let mut replaced_in_place = false;
        for (existing_stage, list) in self.processors.iter_mut() {
            if let Some(position) = list.iter().position(|p| p.name() == name) {
                if *existing_stage == stage {
                    list[position] = Arc::clone(&processor);
                    replaced_in_place = true;
                } else {
                    list.remove(position);
                }
            }
        }

        if !replaced_in_place {
            self.processors.entry(stage).or_default().push(processor);
        }

        Ok(())
    }

    /// Processors for a stage, in registration order.
    pub fn get_for_stage(&self, stage: ProcessingStage) -> Vec<Arc<dyn PostProcessor>> {
        self.processors.get(&stage).cloned().unwrap_or_default()
    }

    pub fn list(&self) -> Vec<String> {
        self.processors
            .values()
            .flatten()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let mut removed: Option<Arc<dyn PostProcessor>> = None;

        for list in self.processors.values_mut() {
            if let Some(position) = list.iter().position(|p| p.name() == name) {
                removed.get_or_insert(list.remove(position));
            }
        }

        if let Some(processor) = removed {
            processor.shutdown()?;
        }
        Ok(())
    }
}

impl Default for PostProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry for validation plugins, run in registration order.
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self { validators: Vec::new() }
    }

    pub fn register(&mut self, validator: Arc<dyn Validator>) -> Result<()> {
        validator.initialize()?;
        self.validators.retain(|v| v.name() != validator.name());
        self.validators.push(validator);
        Ok(())
    }

    pub fn get_all(&self) -> Vec<Arc<dyn Validator>> {
        self.validators.clone()
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        if let Some(position) = self.validators.iter().position(|v| v.name() == name) {
            let validator = self.validators.remove(position);
            validator.shutdown()?;
        }
        Ok(())
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static OCR_BACKEND_REGISTRY: Lazy<Arc<RwLock<OcrBackendRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(OcrBackendRegistry::new())));

static DOCUMENT_EXTRACTOR_REGISTRY: Lazy<Arc<RwLock<DocumentExtractorRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(DocumentExtractorRegistry::new())));

static POST_PROCESSOR_REGISTRY: Lazy<Arc<RwLock<PostProcessorRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(PostProcessorRegistry::new())));

static VALIDATOR_REGISTRY: Lazy<Arc<RwLock<ValidatorRegistry>>> =
    Lazy::new(|| Arc::new(RwLock::new(ValidatorRegistry::new())));

pub fn get_ocr_backend_registry() -> Arc<RwLock<OcrBackendRegistry>> {
    OCR_BACKEND_REGISTRY.clone()
}

pub fn get_document_extractor_registry() -> Arc<RwLock<DocumentExtractorRegistry>> {
    DOCUMENT_EXTRACTOR_REGISTRY.clone()
}

pub fn get_post_processor_registry() -> Arc<RwLock<PostProcessorRegistry>> {
    POST_PROCESSOR_REGISTRY.clone()
}

pub fn get_validator_registry() -> Arc<RwLock<ValidatorRegistry>> {
    VALIDATOR_REGISTRY.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ExtractionConfig;
    use crate::plugins::Plugin;
    use crate::types::ExtractionResult;
    use async_trait::async_trait;

    struct NamedExtractor {
        name: &'static str,
        mime_types: Vec<&'static str>,
        priority: i32,
    }

    impl Plugin for NamedExtractor {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[async_trait]
    impl DocumentExtractor for NamedExtractor {
        async fn extract_bytes(
            &self,
            _content: &[u8],
            mime_type: &str,
            _config: &ExtractionConfig,
        ) -> crate::Result<ExtractionResult> {
            Ok(ExtractionResult::new(self.name, mime_type))
        }

        fn supported_mime_types(&self) -> &[&str] {
            &self.mime_types
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    fn extractor(name: &'static str, mime_types: Vec<&'static str>, priority: i32) -> Arc<dyn DocumentExtractor> {
        Arc::new(NamedExtractor {
            name,
            mime_types,
            priority,
        })
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = DocumentExtractorRegistry::new();
        registry.register(extractor("pdf-a", vec!["application/pdf"], 50)).unwrap();
        assert_eq!(registry.get("application/pdf").unwrap().name(), "pdf-a");
    }

    #[test]
    fn test_priority_selection() {
        let mut registry = DocumentExtractorRegistry::new();
        registry.register(extractor("low", vec!["application/pdf"], 10)).unwrap();
        registry.register(extractor("high", vec!["application/pdf"], 100)).unwrap();
        registry.register(extractor("mid", vec!["application/pdf"], 50)).unwrap();

        assert_eq!(registry.get("application/pdf").unwrap().name(), "high");
    }

    #[test]
    fn test_prefix_matching() {
        let mut registry = DocumentExtractorRegistry::new();
        registry.register(extractor("images", vec!["image/*"], 50)).unwrap();

        assert_eq!(registry.get("image/jpeg").unwrap().name(), "images");
        assert_eq!(registry.get("image/png").unwrap().name(), "images");
    }

    #[test]
    fn test_exact_match_beats_prefix() {
        let mut registry = DocumentExtractorRegistry::new();
        registry.register(extractor("generic", vec!["image/*"], 100)).unwrap();
        registry.register(extractor("jpeg-only", vec!["image/jpeg"], 50)).unwrap();

        assert_eq!(registry.get("image/jpeg").unwrap().name(), "jpeg-only");
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = DocumentExtractorRegistry::new();
        registry.register(extractor("text", vec!["text/plain"], 50)).unwrap();
        registry.register(extractor("text", vec!["text/plain", "text/markdown"], 60)).unwrap();

        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.get("text/markdown").unwrap().name(), "text");
    }

    #[test]
    fn test_remove() {
        let mut registry = DocumentExtractorRegistry::new();
        registry.register(extractor("pdf-a", vec!["application/pdf"], 50)).unwrap();
        registry.remove("pdf-a").unwrap();
        assert!(registry.get("application/pdf").is_err());
    }

    #[test]
    fn test_unsupported_mime() {
        let registry = DocumentExtractorRegistry::new();
        assert!(matches!(
            registry.get("application/unknown"),
            Err(KreuzbergError::UnsupportedFormat(_))
        ));
    }

    struct StageProcessor {
        name: &'static str,
        stage: ProcessingStage,
    }

    impl Plugin for StageProcessor {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[async_trait]
    impl PostProcessor for StageProcessor {
        async fn process(&self, _result: &mut ExtractionResult, _config: &ExtractionConfig) -> crate::Result<()> {
            Ok(())
        }

        fn processing_stage(&self) -> ProcessingStage {
            self.stage
        }
    }

    #[test]
    fn test_post_processor_registration_order() {
        let mut registry = PostProcessorRegistry::new();
        registry
            .register(Arc::new(StageProcessor {
                name: "first",
                stage: ProcessingStage::Middle,
            }))
            .unwrap();
        registry
            .register(Arc::new(StageProcessor {
                name: "second",
                stage: ProcessingStage::Middle,
            }))
            .unwrap();

        let names: Vec<_> = registry
            .get_for_stage(ProcessingStage::Middle)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_post_processor_replace_keeps_position() {
        let mut registry = PostProcessorRegistry::new();
        registry
            .register(Arc::new(StageProcessor {
                name: "a",
                stage: ProcessingStage::Middle,
            }))
            .unwrap();
        registry
            .register(Arc::new(StageProcessor {
                name: "b",
                stage: ProcessingStage::Middle,
            }))
            .unwrap();
        registry
            .register(Arc::new(StageProcessor {
                name: "a",
                stage: ProcessingStage::Middle,
            }))
            .unwrap();

        let names: Vec<_> = registry
            .get_for_stage(ProcessingStage::Middle)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_post_processor_stage_move() {
        let mut registry = PostProcessorRegistry::new();
        registry
            .register(Arc::new(StageProcessor {
                name: "mover",
                stage: ProcessingStage::Early,
            }))
            .unwrap();
        registry
            .register(Arc::new(StageProcessor {
                name: "mover",
                stage: ProcessingStage::Late,
            }))
            .unwrap();

        assert!(registry.get_for_stage(ProcessingStage::Early).is_empty());
        assert_eq!(registry.get_for_stage(ProcessingStage::Late).len(), 1);
    }
}
