//! ML-model cache directory resolution.

use std::path::PathBuf;

/// Resolve the model cache directory.
///
/// Precedence: explicit config value, then `KREUZBERG_MODEL_CACHE`, then
/// `HF_HOME`, then the legacy `TRANSFORMERS_CACHE`, then None (the model
/// runtime's own default).
pub fn resolve_model_cache_dir(config_cache_dir: Option<&str>) -> Option<PathBuf> {
    if let Some(dir) = config_cache_dir {
        if !dir.is_empty() {
            return ensure_dir(PathBuf::from(dir));
        }
    }

    for variable in ["KREUZBERG_MODEL_CACHE", "HF_HOME", "TRANSFORMERS_CACHE"] {
        if let Ok(dir) = std::env::var(variable) {
            if !dir.is_empty() {
                if variable == "TRANSFORMERS_CACHE" {
                    tracing::debug!("using legacy TRANSFORMERS_CACHE; prefer HF_HOME");
                }
                return ensure_dir(PathBuf::from(dir));
            }
        }
    }

    None
}

fn ensure_dir(path: PathBuf) -> Option<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(()) => Some(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to create model cache directory");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for variable in ["KREUZBERG_MODEL_CACHE", "HF_HOME", "TRANSFORMERS_CACHE"] {
            unsafe { std::env::remove_var(variable) };
        }
    }

    #[test]
    #[serial]
    fn test_explicit_config_wins() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("models");

        unsafe { std::env::set_var("KREUZBERG_MODEL_CACHE", dir.path().join("env")) };
        let resolved = resolve_model_cache_dir(explicit.to_str()).unwrap();
        assert_eq!(resolved, explicit);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_precedence_order() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let hf_home = dir.path().join("hf");
        let legacy = dir.path().join("legacy");

        unsafe {
            std::env::set_var("HF_HOME", &hf_home);
            std::env::set_var("TRANSFORMERS_CACHE", &legacy);
        }

        let resolved = resolve_model_cache_dir(None).unwrap();
        assert_eq!(resolved, hf_home);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_legacy_fallback() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("legacy");

        unsafe { std::env::set_var("TRANSFORMERS_CACHE", &legacy) };
        let resolved = resolve_model_cache_dir(None).unwrap();
        assert_eq!(resolved, legacy);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_default_none() {
        clear_env();
        assert!(resolve_model_cache_dir(None).is_none());
    }
}
