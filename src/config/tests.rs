use super::*;
use tempfile::TempDir;

#[test]
fn defaults_are_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert!(config.retrieval.enabled);
    assert_eq!(config.retrieval.top_k, DEFAULT_RETRIEVAL_TOP_K);
    assert_eq!(
        config.session.expiration_hours,
        DEFAULT_SESSION_EXPIRATION_HOURS
    );
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = Config::load(temp_dir.path()).expect("load should succeed");
    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.generation, GenerationConfig::default());
}

#[test]
fn save_and_reload_round_trip() {
    let temp_dir = TempDir::new().expect("temp dir");
    let mut config = Config::load(temp_dir.path()).expect("load");
    config.generation.model = "test-model".to_string();
    config.retrieval.top_k = 5;
    config.save().expect("save");

    let reloaded = Config::load(temp_dir.path()).expect("reload");
    assert_eq!(reloaded.generation.model, "test-model");
    assert_eq!(reloaded.retrieval.top_k, 5);
}

#[test]
fn rejects_bad_endpoint() {
    let mut config = Config::default();
    config.embedding.endpoint = "not a url".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidUrl(_))
    ));
}

#[test]
fn rejects_empty_model() {
    let mut config = Config::default();
    config.generation.model = "  ".to_string();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidModel(_))
    ));
}

#[test]
fn rejects_out_of_range_top_k() {
    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));

    config.retrieval.top_k = 21;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTopK(21))
    ));
}

#[test]
fn rejects_out_of_range_expiration() {
    let mut config = Config::default();
    config.session.expiration_hours = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidExpiration(0))
    ));
}

#[test]
fn analyzer_unconfigured_by_default() {
    let config = Config::default();
    assert!(!config.analyzer.is_configured());

    let mut configured = config;
    configured.analyzer.endpoint = "http://localhost:9100".to_string();
    configured.analyzer.model_id = "prebuilt-document".to_string();
    assert!(configured.analyzer.is_configured());
    assert!(configured.validate().is_ok());
}
