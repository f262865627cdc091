//! Configuration loading, discovery, and validation.

use kreuzberg::{ExtractionConfig, KreuzbergError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_v3_config_rejected_with_field_names() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("kreuzberg.toml");
    fs::write(&config_path, "ocr_backend = \"tesseract\"\n").unwrap();

    let err = ExtractionConfig::from_toml_file(&config_path).unwrap_err();
    assert!(matches!(err, KreuzbergError::Validation { .. }));

    let found = err.context().unwrap().get("v3_fields_found").unwrap();
    assert!(found.as_array().unwrap().contains(&serde_json::json!("ocr_backend")));
}

#[test]
fn test_v3_rejection_names_every_offending_key() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("kreuzberg.toml");
    fs::write(
        &config_path,
        "chunk_content = true\nextract_keywords = true\nauto_detect_language = true\nkeyword_count = 5\n",
    )
    .unwrap();

    let err = ExtractionConfig::from_toml_file(&config_path).unwrap_err();
    let found: Vec<String> = err
        .context()
        .unwrap()
        .get("v3_fields_found")
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    for key in ["chunk_content", "extract_keywords", "auto_detect_language", "keyword_count"] {
        assert!(found.contains(&key.to_string()), "missing {key} in {found:?}");
    }
}

#[test]
fn test_v4_config_loads() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("kreuzberg.toml");
    fs::write(
        &config_path,
        r#"
force_ocr = true
use_cache = false

[ocr]
backend = "tesseract"
language = "eng"
psm = 6

[tables]
detection_threshold = 0.75

[chunking]
max_chars = 1500
max_overlap = 200

[keywords]
algorithm = "yake"
count = 8

[entities]
entity_types = ["PERSON", "ORG"]

[language_detection]
min_confidence = 0.9

[token_reduction]
mode = "moderate"
"#,
    )
    .unwrap();

    let config = ExtractionConfig::from_toml_file(&config_path).unwrap();
    assert!(config.force_ocr);
    assert!(!config.use_cache);
    assert_eq!(config.ocr.as_ref().unwrap().psm, 6);
    assert_eq!(config.tables.as_ref().unwrap().detection_threshold, 0.75);
    assert_eq!(config.chunking.as_ref().unwrap().max_chars, 1500);
    assert_eq!(config.keywords.as_ref().unwrap().count, 8);
    assert_eq!(config.entities.as_ref().unwrap().entity_types, vec!["PERSON", "ORG"]);
    assert_eq!(config.language_detection.as_ref().unwrap().min_confidence, 0.9);
    assert_eq!(config.token_reduction.as_ref().unwrap().mode, "moderate");
}

#[test]
fn test_discovery_walks_toward_root() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("deep").join("nested").join("dir");
    fs::create_dir_all(&nested).unwrap();
    fs::write(dir.path().join("kreuzberg.toml"), "force_ocr = true\n").unwrap();

    let config = ExtractionConfig::discover_from(&nested).unwrap().unwrap();
    assert!(config.force_ocr);
}

#[test]
fn test_discovery_pyproject_table() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("pyproject.toml"),
        "[tool.kreuzberg]\nuse_cache = false\n",
    )
    .unwrap();

    let config = ExtractionConfig::discover_from(dir.path()).unwrap().unwrap();
    assert!(!config.use_cache);
}

#[test]
fn test_discovery_ignores_unrelated_pyproject() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("sub");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("pyproject.toml"), "[project]\nname = \"x\"\n").unwrap();
    fs::write(dir.path().join("kreuzberg.toml"), "force_ocr = true\n").unwrap();

    let config = ExtractionConfig::discover_from(&nested).unwrap().unwrap();
    assert!(config.force_ocr);
}

#[test]
fn test_dpi_invariant_validation() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("kreuzberg.toml");
    fs::write(&config_path, "min_dpi = 300\ntarget_dpi = 100\nmax_dpi = 600\n").unwrap();

    let err = ExtractionConfig::from_toml_file(&config_path).unwrap_err();
    assert!(matches!(err, KreuzbergError::Validation { .. }));
}

#[test]
fn test_unknown_top_level_key_rejected() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("kreuzberg.toml");
    fs::write(&config_path, "definitely_not_a_field = 1\n").unwrap();

    assert!(ExtractionConfig::from_toml_file(&config_path).is_err());
}
