// Configuration loader
// Loads ~/.amani/config.toml (or an explicit path) and applies env overrides

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Config;
use crate::errors::config_parse_error;

/// Load configuration
///
/// Resolution order: explicit path, then `AMANI_CONFIG`, then
/// `~/.amani/config.toml`. An explicit path that doesn't exist is an error;
/// a missing default file yields defaults. `ANTHROPIC_API_KEY` overrides
/// the model key in every case.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var("AMANI_CONFIG").ok().map(PathBuf::from));

    let mut config = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            load_from_file(&path)?
        }
        None => match default_config_path() {
            Some(path) if path.exists() => load_from_file(&path)?,
            _ => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config, std::env::var("ANTHROPIC_API_KEY").ok());
    config.validate()?;

    Ok(config)
}

/// Parse a TOML document into a config
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).context("Failed to parse config TOML")?;
    Ok(config)
}

fn load_from_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!(config_parse_error(path, &e)))?;

    tracing::info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    Config::amani_dir().map(|dir| dir.join("config.toml"))
}

/// Environment key wins over the file key when non-empty
fn apply_env_overrides(config: &mut Config, api_key: Option<String>) {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.model.api_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
            [degradation]
            total_budget_ms = 4000

            [analytics]
            max_batch_size = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.degradation.total_budget_ms, 4000);
        assert_eq!(config.degradation.claude_full_timeout_ms, 3000);
        assert_eq!(config.analytics.max_batch_size, 25);
        assert_eq!(config.analytics.max_wait_ms, 5000);
        assert_eq!(config.server.bind_address, "127.0.0.1:8000");
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = parse_config("").unwrap();
        assert!(config.model.api_key.is_none());
        assert_eq!(config.resources.cultural_tags.len(), 3);
    }

    #[test]
    fn test_env_key_overrides_file_key() {
        let mut config = parse_config("[model]\napi_key = \"from-file\"\n").unwrap();
        apply_env_overrides(&mut config, Some("from-env".to_string()));
        assert_eq!(config.model.api_key.as_deref(), Some("from-env"));

        apply_env_overrides(&mut config, Some("   ".to_string()));
        assert_eq!(config.model.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nmax_sessions = 7").unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.server.max_sessions, 7);
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nmax_sessions = ").unwrap();

        let err = load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
