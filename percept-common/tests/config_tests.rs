//! Unit tests for configuration and graceful degradation
//!
//! Covers root folder priority order, tolerant config-file loading and the
//! derived file paths.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PERCEPT_ROOT_FOLDER or PERCEPT_LOG_LEVEL are marked
//! with #[serial].

use percept_common::config::{
    ClientConfig, CompiledDefaults, RootFolderResolver, TomlConfig, LOG_LEVEL_ENV,
    MAX_SEARCH_RESULTS, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("percept") || defaults.root_folder.ends_with("percept_data"));
    assert_eq!(defaults.log_level, "info");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new(None, None).resolve();
    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_cli_arg_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/percept-env");

    let resolver = RootFolderResolver::new(
        Some("/tmp/percept-cli"),
        Some(PathBuf::from("/tmp/percept-toml")),
    );
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/percept-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_env_var_beats_config_file() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/percept-env");

    let resolver = RootFolderResolver::new(None, Some(PathBuf::from("/tmp/percept-toml")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/percept-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_config_file_beats_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let resolver = RootFolderResolver::new(None, Some(PathBuf::from("/tmp/percept-toml")));
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/percept-toml"));
}

#[test]
#[serial]
fn test_resolve_applies_toml_values() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(LOG_LEVEL_ENV);

    let toml_config = TomlConfig::from_toml_str(
        r#"
        root_folder = "/tmp/percept-from-toml"
        log_level = "debug"
        page_size = 12
        search_limit = 3
        "#,
    )
    .expect("valid TOML");

    let config = ClientConfig::resolve(None, toml_config);
    assert_eq!(config.root_folder, PathBuf::from("/tmp/percept-from-toml"));
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.page_size, 12);
    assert_eq!(config.search_limit, 3);
    // Untouched keys keep their defaults
    assert_eq!(config.comment_limit, 10);
    assert_eq!(config.event_capacity, 1000);
}

#[test]
#[serial]
fn test_log_level_env_overrides_toml() {
    env::set_var(LOG_LEVEL_ENV, "trace");

    let toml_config = TomlConfig::from_toml_str("log_level = \"warn\"").expect("valid TOML");
    let config = ClientConfig::resolve(Some("/tmp/percept"), toml_config);
    assert_eq!(config.log_level, "trace");

    env::remove_var(LOG_LEVEL_ENV);
}

#[test]
fn test_non_positive_limits_are_ignored() {
    let toml_config = TomlConfig::from_toml_str("page_size = 0\nsearch_limit = -4").expect("valid TOML");
    let config = ClientConfig::resolve(Some("/tmp/percept"), toml_config);
    assert_eq!(config.page_size, 8);
    assert_eq!(config.search_limit, 5);
}

#[test]
fn test_search_limit_is_capped() {
    let toml_config = TomlConfig::from_toml_str("search_limit = 20").expect("valid TOML");
    let config = ClientConfig::resolve(Some("/tmp/percept"), toml_config);
    assert_eq!(config.search_limit, MAX_SEARCH_RESULTS);
    assert_eq!(config.search_limit, 5);
}

#[test]
fn test_poll_interval_from_toml() {
    let config = ClientConfig::resolve(Some("/tmp/percept"), TomlConfig::default());
    assert_eq!(config.poll_interval().as_millis(), 1000);

    let toml_config = TomlConfig::from_toml_str("poll_interval_ms = 250").expect("valid TOML");
    let config = ClientConfig::resolve(Some("/tmp/percept"), toml_config);
    assert_eq!(config.poll_interval().as_millis(), 250);
}

#[test]
fn test_invalid_toml_is_an_error() {
    assert!(TomlConfig::from_toml_str("page_size = \"eight\"").is_err());
}

#[test]
fn test_missing_config_file_does_not_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = TomlConfig::load_or_default(&dir.path().join("config.toml"));
    assert!(config.root_folder.is_none());
}

#[test]
fn test_malformed_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is = = not toml").expect("write");

    let config = TomlConfig::load_or_default(&path);
    assert!(config.page_size.is_none());
}

#[test]
fn test_derived_paths_and_root_creation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("nested").join("percept");
    let config = ClientConfig::resolve(root.to_str(), TomlConfig::default());

    assert_eq!(config.database_path(), root.join("percept.db"));
    assert_eq!(config.prefs_path(), root.join("prefs.json"));

    config.ensure_root_folder().expect("create root");
    assert!(root.is_dir());
    // Idempotent
    config.ensure_root_folder().expect("create root again");
}
