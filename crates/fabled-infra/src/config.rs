//! Global configuration loader for Fabled.
//!
//! Reads `config.toml` from the data directory (`~/.fabled/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed.

use std::path::{Path, PathBuf};

use fabled_types::config::GlobalConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FABLED_DATA_DIR";

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `FABLED_DATA_DIR` environment variable
/// 2. `~/.fabled`
/// 3. `.fabled` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".fabled");
    }

    PathBuf::from(".fabled")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_global_config(dir.path()).await;
        assert_eq!(config.upstream.base_url, "http://localhost:1234");
        assert_eq!(config.server.port, 5000);
    }

    #[tokio::test]
    async fn test_config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join("config.toml"),
            r#"
default_system_prompt = "Be terse."

[upstream]
base_url = "http://gpu-box:8080"
temperature = 0.2

[server]
port = 8088

[[seed_personas]]
name = "Bard"
default_model = "m1"
system_prompt = "Sing."
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(dir.path()).await;
        assert_eq!(config.upstream.base_url, "http://gpu-box:8080");
        assert!((config.upstream.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.default_system_prompt, "Be terse.");
        assert_eq!(config.seed_personas.len(), 1);
        assert_eq!(config.seed_personas[0].name, "Bard");
    }

    #[tokio::test]
    async fn test_malformed_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("config.toml"), "[upstream\nbase_url = 3")
            .await
            .unwrap();
        let config = load_global_config(dir.path()).await;
        assert_eq!(config.upstream.base_url, "http://localhost:1234");
    }
}
