use std::fs;
use std::path::Path;

use dedup_engine::EngineConfig;
use engine_logging::{engine_info, engine_warn};

/// Loads engine settings from a RON file, falling back to defaults when the
/// file is missing or malformed.
pub fn load_engine_config(path: Option<&Path>) -> EngineConfig {
    let Some(path) = path else {
        return EngineConfig::default();
    };
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            engine_warn!("Config {:?} not found, using defaults", path);
            return EngineConfig::default();
        }
        Err(err) => {
            engine_warn!("Failed to read config from {:?}: {}", path, err);
            return EngineConfig::default();
        }
    };

    match ron::from_str::<EngineConfig>(&content) {
        Ok(config) => {
            engine_info!("Loaded engine config from {:?}", path);
            config
        }
        Err(err) => {
            engine_warn!("Failed to parse config from {:?}: {}", path, err);
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::load_engine_config;
    use dedup_core::BlacklistMatching;
    use dedup_engine::EngineConfig;

    #[test]
    fn missing_path_uses_defaults() {
        assert_eq!(load_engine_config(None), EngineConfig::default());
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("nope.ron");
        assert_eq!(load_engine_config(Some(missing.as_path())), EngineConfig::default());
    }

    #[test]
    fn partial_file_overrides_only_given_fields() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("engine.ron");
        std::fs::write(
            &path,
            "(max_parallel_jobs: 3, validator: (blacklist_enabled: true, blacklist_matching: IgnoreCase))",
        )
        .unwrap();

        let config = load_engine_config(Some(path.as_path()));
        assert_eq!(config.max_parallel_jobs, 3);
        assert!(config.validator.blacklist_enabled);
        assert_eq!(config.validator.blacklist_matching, BlacklistMatching::IgnoreCase);
        assert_eq!(config.worker_threads, EngineConfig::default().worker_threads);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("broken.ron");
        std::fs::write(&path, "(max_parallel_jobs: \"many\"").unwrap();
        assert_eq!(load_engine_config(Some(path.as_path())), EngineConfig::default());
    }
}
