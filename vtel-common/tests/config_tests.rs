//! Configuration resolution tests
//!
//! Tests touching VTEL_CONFIG or XDG_CONFIG_HOME are marked #[serial] so they
//! never race on the process environment.

use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;
use vtel_common::config::{TomlConfig, CONFIG_ENV_VAR};
use vtel_common::Error;

const SAMPLE: &str = r#"
[engine]
capacity = 6
flush_interval_ms = 250

[upstream]
http_base_url = "http://analytics.lan:8000"
ws_base_url = "ws://analytics.lan:8000"

[server]
port = 6100

[logging]
level = "debug"
"#;

fn write_config(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_explicit_path_wins() {
    let dir = TempDir::new().unwrap();
    let explicit = write_config(&dir, "explicit.toml", SAMPLE);
    let other = write_config(&dir, "other.toml", "[engine]\ncapacity = 2\n");
    env::set_var(CONFIG_ENV_VAR, &other);

    let config = TomlConfig::resolve(Some(&explicit)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.engine.capacity, 6);
    assert_eq!(config.engine.flush_interval_ms, 250);
    assert_eq!(config.engine.reconnect_backoff_ms, 2000);
    assert_eq!(config.upstream.http_base_url, "http://analytics.lan:8000");
    assert_eq!(config.server.port, 6100);
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_missing_explicit_path_is_error() {
    let dir = TempDir::new().unwrap();
    let result = TomlConfig::resolve(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_env_var_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "env.toml", "[engine]\ncapacity = 3\n");
    env::set_var(CONFIG_ENV_VAR, &path);

    let config = TomlConfig::resolve(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().engine.capacity, 3);
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_user_config_dir_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("vtel")).unwrap();
    write_config(&dir, "vtel/config.toml", "[server]\nport = 7000\n");
    env::remove_var(CONFIG_ENV_VAR);
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let config = TomlConfig::resolve(None);
    env::remove_var("XDG_CONFIG_HOME");

    assert_eq!(config.unwrap().server.port, 7000);
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_no_config_anywhere_uses_defaults() {
    if std::path::Path::new("/etc/vtel/config.toml").exists() {
        return;
    }
    let dir = TempDir::new().unwrap();
    env::remove_var(CONFIG_ENV_VAR);
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let config = TomlConfig::resolve(None);
    env::remove_var("XDG_CONFIG_HOME");

    assert_eq!(config.unwrap(), TomlConfig::default());
}

#[test]
#[serial]
fn test_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "bad.toml", "[engine]\ncapacity = \"many\"\n");
    let result = TomlConfig::resolve(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_unknown_sections_are_ignored() {
    let config = TomlConfig::from_toml_str("[dashboard]\ntheme = \"dark\"\n").unwrap();
    assert_eq!(config, TomlConfig::default());
}
